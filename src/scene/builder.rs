use std::collections::BTreeSet;

use crate::foundation::error::{PasslineError, PasslineResult};
use crate::scene::graph::SceneGraph;
use crate::scene::model::{
    AdjustmentDef, AttrDef, ConnectionDef, DEFAULT_RENDER_LAYER, HostInfo, NodeDef, SceneDef,
};
use crate::scene::value::{AttrType, AttrValue};

/// Fluent construction of a [`NodeDef`].
#[derive(Debug, Clone)]
pub struct NodeSpec {
    def: NodeDef,
}

impl NodeSpec {
    /// Start a node at `path` with the given host type.
    pub fn new(path: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            def: NodeDef {
                path: path.into(),
                node_type: node_type.into(),
                referenced: false,
                attrs: Default::default(),
                members: Vec::new(),
                adjustments: Vec::new(),
            },
        }
    }

    /// Mark the node as coming from a file reference.
    pub fn referenced(mut self) -> Self {
        self.def.referenced = true;
        self
    }

    /// Set a scalar attribute; the declared type is the value's own.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.def
            .attrs
            .insert(name.into(), AttrDef::Scalar(value.into()));
        self
    }

    /// Attribute with an explicit declared type (opaque declarations, or raw
    /// payloads typed differently from their storage).
    pub fn typed_attr(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
        ty: AttrType,
    ) -> Self {
        self.def.attrs.insert(
            name.into(),
            AttrDef::Typed {
                value: value.into(),
                ty,
            },
        );
        self
    }

    /// Extend the membership list (set-like nodes).
    pub fn members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.members.extend(members.into_iter().map(Into::into));
        self
    }

    /// Append a stored adjustment slot (render layers only). Slots are indexed
    /// in append order; connect the overridden plug to `adjustments[i].plug`.
    pub fn adjustment(mut self, plug: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.def.adjustments.push(AdjustmentDef {
            plug: plug.into(),
            value: value.into(),
        });
        self
    }

    /// Finish into the plain [`NodeDef`].
    pub fn into_def(self) -> NodeDef {
        self.def
    }
}

/// Programmatic [`SceneDef`] construction with duplicate-path rejection.
///
/// Used by tests and tools that synthesize snapshots instead of exporting them
/// from a host session.
pub struct SceneBuilder {
    name: String,
    current_layer: String,
    locked: bool,
    host: HostInfo,
    nodes: Vec<NodeDef>,
    connections: Vec<ConnectionDef>,
    seen: BTreeSet<String>,
}

impl SceneBuilder {
    /// Start an empty scene; the default render layer is current.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_layer: DEFAULT_RENDER_LAYER.to_owned(),
            locked: false,
            host: HostInfo::default(),
            nodes: Vec::new(),
            connections: Vec::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Set which layer the host has active.
    pub fn current_layer(mut self, layer: impl Into<String>) -> Self {
        self.current_layer = layer.into();
        self
    }

    /// Set the scene's version-freeze state.
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Set host application metadata.
    pub fn host(mut self, version: f64, override_system: bool) -> Self {
        self.host = HostInfo {
            version,
            override_system,
        };
        self
    }

    /// Add a node; duplicate paths are rejected immediately.
    pub fn node(mut self, spec: NodeSpec) -> PasslineResult<Self> {
        let def = spec.into_def();
        if !self.seen.insert(def.path.clone()) {
            return Err(PasslineError::validation(format!(
                "duplicate node path '{}'",
                def.path
            )));
        }
        self.nodes.push(def);
        Ok(self)
    }

    /// Wire a plug connection; endpoints are checked at build time.
    pub fn connect(mut self, src: impl Into<String>, dst: impl Into<String>) -> PasslineResult<Self> {
        let conn = ConnectionDef {
            src: src.into(),
            dst: dst.into(),
        };
        self.connections.push(conn);
        Ok(self)
    }

    /// Declare a render layer and link it to the layer manager in one step.
    ///
    /// The linkage connection is what marks the layer as manager-owned; layers
    /// added via plain [`SceneBuilder::node`] stay unlinked.
    pub fn render_layer(self, spec: NodeSpec) -> PasslineResult<Self> {
        let path = spec.def.path.clone();
        let slot = self.connections.len();
        let mut b = self.node(spec)?;
        b.connections.push(ConnectionDef {
            src: format!("{path}.identification"),
            dst: format!("{}.renderLayerId[{slot}]", crate::scene::model::LAYER_MANAGER),
        });
        Ok(b)
    }

    /// Validate and produce the snapshot document.
    pub fn build(self) -> PasslineResult<SceneDef> {
        let def = SceneDef {
            name: self.name,
            current_layer: self.current_layer,
            locked: self.locked,
            host: self.host,
            nodes: self.nodes,
            connections: self.connections,
        };
        def.validate()?;
        Ok(def)
    }

    /// Build and index in one step.
    pub fn graph(self) -> PasslineResult<SceneGraph> {
        SceneGraph::new(self.build()?)
    }
}
