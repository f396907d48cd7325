//! Boundary scene model.
//!
//! A [`SceneDef`] is a point-in-time snapshot of a host scene: the DAG and
//! dependency nodes the pipeline cares about, their attributes, set
//! memberships, render-layer adjustments, and the plug connections between
//! them. Snapshots are plain serde documents; all querying goes through
//! [`crate::SceneGraph`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::foundation::error::{PasslineError, PasslineResult};
use crate::scene::value::{AttrType, AttrValue};

/// Name of the default render layer every scene carries.
pub const DEFAULT_RENDER_LAYER: &str = "defaultRenderLayer";

/// Human-facing label the default layer publishes under.
pub const MASTER_LAYER_LABEL: &str = "masterLayer";

/// Node that owns render-layer linkage, one `renderLayerId` slot per layer.
pub const LAYER_MANAGER: &str = "renderLayerManager";

/// Dependency node holding frame-range, renderer, and filename settings.
pub const RENDER_GLOBALS: &str = "defaultRenderGlobals";

/// Host version from which the layer-override system is available.
pub const OVERRIDE_SYSTEM_MIN_VERSION: f64 = 2016.5;

/// Host type name of transform nodes.
pub const TYPE_TRANSFORM: &str = "transform";
/// Host type name of polygon mesh shapes.
pub const TYPE_MESH: &str = "mesh";
/// Host type name of camera shapes.
pub const TYPE_CAMERA: &str = "camera";
/// Host type name of skeleton joints.
pub const TYPE_JOINT: &str = "joint";
/// Host type name of render layers.
pub const TYPE_RENDER_LAYER: &str = "renderLayer";
/// Host type name of object sets.
pub const TYPE_OBJECT_SET: &str = "objectSet";

/// Host application metadata captured with the snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host application version (e.g. `2018.0`).
    pub version: f64,
    /// Whether the host reports the layer-override system as present.
    #[serde(default)]
    pub override_system: bool,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self {
            version: 2018.0,
            override_system: false,
        }
    }
}

/// One stored render-layer adjustment: the overridden plug and its raw value.
///
/// Raw values are untyped as the host stores them; they are re-typed against
/// the target attribute's declared type at resolve time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentDef {
    /// The plug this slot overrides (`node.attr`).
    pub plug: String,
    /// Raw override payload.
    pub value: AttrValue,
}

/// A directed plug connection (`src` feeds `dst`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDef {
    /// Source plug.
    pub src: String,
    /// Destination plug.
    pub dst: String,
}

/// An attribute entry: either a bare scalar (declared type inferred from the
/// value) or an explicit `{value, type}` pair for opaque declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrDef {
    /// Bare scalar; the declared type is the value's own.
    Scalar(AttrValue),
    /// Value with an explicit declared type.
    Typed {
        /// Stored value.
        value: AttrValue,
        /// Declared host type.
        #[serde(rename = "type")]
        ty: AttrType,
    },
}

impl<'de> Deserialize<'de> for AttrDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Typed {
                value: AttrValue,
                #[serde(rename = "type")]
                ty: AttrType,
            },
            Scalar(AttrValue),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Typed { value, ty } => Ok(Self::Typed { value, ty }),
            Repr::Scalar(v) => Ok(Self::Scalar(v)),
        }
    }
}

impl AttrDef {
    /// The stored value.
    pub fn value(&self) -> &AttrValue {
        match self {
            AttrDef::Scalar(v) => v,
            AttrDef::Typed { value, .. } => value,
        }
    }

    /// The declared type (inferred from the value for bare scalars).
    pub fn declared_type(&self) -> AttrType {
        match self {
            AttrDef::Scalar(v) => v.attr_type(),
            AttrDef::Typed { ty, .. } => *ty,
        }
    }
}

/// One node in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    /// Full DAG path (`|group|child`) or bare dependency-node name.
    pub path: String,
    /// Host node type (`transform`, `mesh`, `camera`, `renderLayer`, ...).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Whether the node comes from a file reference.
    #[serde(default)]
    pub referenced: bool,
    /// Attribute map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrDef>,
    /// Membership list for set-like nodes (render layers, object sets).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    /// Stored layer adjustments (render layers only), indexed by the
    /// `adjustments[i]` slot connections point at.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<AdjustmentDef>,
}

/// A complete scene snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDef {
    /// Scene (file) name without directory or extension.
    pub name: String,
    /// The layer the host currently has active.
    #[serde(default = "default_current_layer")]
    pub current_layer: String,
    /// Version-freeze state of the scene file.
    #[serde(default)]
    pub locked: bool,
    /// Host application metadata.
    #[serde(default)]
    pub host: HostInfo,
    /// Every captured node, in scene enumeration order.
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    /// Plug connections between captured nodes.
    #[serde(default)]
    pub connections: Vec<ConnectionDef>,
}

fn default_current_layer() -> String {
    DEFAULT_RENDER_LAYER.to_owned()
}

impl SceneDef {
    /// Parse a snapshot from JSON text.
    pub fn from_json(text: &str) -> PasslineResult<Self> {
        let def: SceneDef = serde_json::from_str(text)
            .map_err(|e| PasslineError::serde(format!("scene json: {e}")))?;
        def.validate()?;
        Ok(def)
    }

    /// Load a snapshot from a JSON file.
    pub fn from_path(path: &Path) -> PasslineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PasslineError::validation(format!("read scene '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Structural checks that must hold before any querying.
    pub fn validate(&self) -> PasslineResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for node in &self.nodes {
            if node.path.is_empty() {
                return Err(PasslineError::validation("node with empty path"));
            }
            if !seen.insert(node.path.as_str()) {
                return Err(PasslineError::validation(format!(
                    "duplicate node path '{}'",
                    node.path
                )));
            }
        }
        for conn in &self.connections {
            for plug in [conn.src.as_str(), conn.dst.as_str()] {
                let parsed = Plug::parse(plug).ok_or_else(|| {
                    PasslineError::validation(format!("malformed plug '{plug}'"))
                })?;
                if !seen.contains(parsed.node) {
                    return Err(PasslineError::validation(format!(
                        "connection references unknown node '{}'",
                        parsed.node
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A parsed plug reference (`node.attr`, `node.attr[2].child`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plug<'a> {
    /// Node path part, up to the first `.`.
    pub node: &'a str,
    /// Everything after the first `.` (may contain indices and child attrs).
    pub attr: &'a str,
}

impl<'a> Plug<'a> {
    /// Split a plug string at the node/attribute boundary.
    ///
    /// DAG paths never contain `.`, so the first `.` is always the boundary.
    pub fn parse(plug: &'a str) -> Option<Self> {
        let (node, attr) = plug.split_once('.')?;
        if node.is_empty() || attr.is_empty() {
            return None;
        }
        Some(Self { node, attr })
    }

    /// Attribute name with indices and child attrs stripped
    /// (`adjustments[2].plug` -> `adjustments`).
    pub fn root_attr(&self) -> &'a str {
        let end = self
            .attr
            .find(['[', '.'])
            .unwrap_or(self.attr.len());
        &self.attr[..end]
    }

    /// First array index, if the attribute is a multi slot.
    pub fn index(&self) -> Option<usize> {
        let start = self.attr.find('[')? + 1;
        let end = start + self.attr[start..].find(']')?;
        self.attr[start..end].parse().ok()
    }

    /// Last child-attribute component (`adjustments[2].plug` -> `plug`).
    pub fn leaf_attr(&self) -> &'a str {
        self.attr.rsplit('.').next().unwrap_or(self.attr)
    }
}
