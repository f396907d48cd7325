use std::collections::{BTreeMap, BTreeSet};

use crate::foundation::error::{PasslineError, PasslineResult};
use crate::layers::resolve::resolve_truthy;
use crate::scene::graph::SceneGraph;
use crate::scene::model::{TYPE_CAMERA, TYPE_JOINT, TYPE_MESH, TYPE_TRANSFORM};
use crate::scene::paths;
use crate::scene::value::AttrValue;

/// Which hiding mechanisms [`is_visible_with`] takes into account.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityOptions {
    /// Honor disabled display layers (`overrideEnabled` without
    /// `overrideVisibility`).
    pub display_layer: bool,
    /// Honor the intermediate-object flag on shapes.
    pub intermediate_object: bool,
    /// Recurse into ancestors; a hidden parent hides the node.
    pub parent_hidden: bool,
    /// Honor the node's own `visibility` attribute.
    pub visibility: bool,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            display_layer: true,
            intermediate_object: true,
            parent_hidden: true,
            visibility: true,
        }
    }
}

/// Whether a node is visible, all hiding mechanisms considered.
///
/// Missing nodes and non-DAG nodes report `false`, not an error.
pub fn is_visible(scene: &SceneGraph, node: &str) -> bool {
    is_visible_with(scene, node, VisibilityOptions::default())
}

/// [`is_visible`] with individual checks toggled.
pub fn is_visible_with(scene: &SceneGraph, node: &str, opts: VisibilityOptions) -> bool {
    let Some(def) = scene.node(node) else {
        return false;
    };
    if !paths::is_dag(&def.path) {
        return false;
    }

    let truthy_or = |attr: &str, missing: bool| -> bool {
        scene.get_attr(node, attr).map(AttrValue::truthy).unwrap_or(missing)
    };

    if opts.visibility && !truthy_or("visibility", true) {
        return false;
    }

    // Only shapes carry the flag, so presence stands in for the shape check.
    if opts.intermediate_object && truthy_or("intermediateObject", false) {
        return false;
    }

    if opts.display_layer
        && scene.has_attr(node, "overrideEnabled")
        && truthy_or("overrideEnabled", false)
        && !truthy_or("overrideVisibility", true)
    {
        return false;
    }

    if opts.parent_hidden
        && let Some(parent) = scene.parent_of(node)
        && !is_visible_with(
            scene,
            &parent.path,
            VisibilityOptions {
                intermediate_object: false,
                ..opts
            },
        )
    {
        return false;
    }

    true
}

/// Cameras whose `renderable` attribute resolves truthy under `layer`,
/// independent of the current layer. Snapshot order.
pub fn renderable_cameras(scene: &SceneGraph, layer: &str) -> PasslineResult<Vec<String>> {
    let mut cams = Vec::new();
    for cam in scene.nodes_of_type(TYPE_CAMERA) {
        if !scene.has_attr(&cam.path, "renderable") {
            continue;
        }
        if resolve_truthy(scene, &cam.path, "renderable", layer)? {
            cams.push(cam.path.clone());
        }
    }
    Ok(cams)
}

/// Built-in viewport cameras (flagged `startupCamera`) and their transforms.
pub fn startup_cameras(scene: &SceneGraph) -> Vec<String> {
    let shapes: Vec<String> = scene
        .nodes_of_type(TYPE_CAMERA)
        .filter(|cam| {
            scene
                .get_attr(&cam.path, "startupCamera")
                .is_some_and(AttrValue::truthy)
        })
        .map(|cam| cam.path.clone())
        .collect();

    let mut out = shapes.clone();
    for shape in &shapes {
        if let Some(parent) = scene.parent_of(shape) {
            out.push(parent.path.clone());
        }
    }
    out
}

/// The subset of `nodes` with no ancestor also in `nodes`: the minimal set of
/// hierarchy roots covering the input. Expects long paths; input order kept.
pub fn highest_ancestors(nodes: &[String]) -> Vec<String> {
    let lookup: BTreeSet<&str> = nodes.iter().map(String::as_str).collect();
    nodes
        .iter()
        .filter(|node| !paths::ancestors(node).any(|a| lookup.contains(a)))
        .cloned()
        .collect()
}

/// Whether `node` is of `node_type`, either directly or through its first
/// shape child when `node` is a transform.
pub fn node_type_check(scene: &SceneGraph, node: &str, node_type: &str) -> bool {
    let Some(def) = scene.node(node) else {
        return false;
    };
    if def.node_type == TYPE_TRANSFORM {
        if node_type == TYPE_TRANSFORM {
            return true;
        }
        return scene
            .children_of(node)
            .find(|c| c.node_type != TYPE_TRANSFORM && c.node_type != TYPE_JOINT)
            .is_some_and(|shape| shape.node_type == node_type);
    }
    def.node_type == node_type
}

/// Name-duplication report: leaf name to the full paths sharing it, keeping
/// only names with more than one path.
pub fn duplicated_names(scene: &SceneGraph, nodes: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut report: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in nodes {
        if !scene.exists(node) {
            continue;
        }
        report
            .entry(paths::leaf(node).to_owned())
            .or_default()
            .push(node.clone());
    }
    report.retain(|_, full| full.len() > 1);
    report
}

/// Drop transforms that live under a mesh-bearing transform.
///
/// Exporters that reject mesh parenting get fed the surviving roots; the
/// second phase catches children that appeared in the input before their
/// offending parent.
pub fn filter_mesh_parenting(scene: &SceneGraph, transforms: &[String]) -> Vec<String> {
    let mut kept: Vec<&str> = Vec::new();
    let mut blacksheep: Vec<&str> = Vec::new();

    for node in transforms {
        if scene.node_type(node) != Some(TYPE_TRANSFORM) {
            continue;
        }
        if blacksheep.iter().any(|b| *b == node.as_str()) {
            continue;
        }

        let mut has_mesh = false;
        let mut sub_transforms: Vec<&str> = Vec::new();
        for child in scene.children_of(node) {
            match child.node_type.as_str() {
                TYPE_MESH => has_mesh = true,
                TYPE_TRANSFORM => sub_transforms.push(&child.path),
                _ => {}
            }
        }
        if has_mesh {
            blacksheep.extend(sub_transforms);
        }
        kept.push(node);
    }

    kept.into_iter()
        .filter(|node| {
            !blacksheep
                .iter()
                .any(|b| node == b || paths::is_descendant_of(node, b))
        })
        .map(str::to_owned)
        .collect()
}

/// Nodes carrying `attr`, optionally filtered to a namespace and matched
/// against an expected value. Snapshot order.
///
/// Value matching follows host plug getters: numbers compare numerically
/// (bools read as 0/1), bools compare by truthiness, strings compare exactly.
/// Anything but a JSON scalar is an unsupported match value.
pub fn find_by_attr(
    scene: &SceneGraph,
    attr: &str,
    value: Option<&serde_json::Value>,
    namespace: Option<&str>,
) -> PasslineResult<Vec<String>> {
    let expected = value.map(|v| classify_match_value(attr, v)).transpose()?;

    let mut out = Vec::new();
    for node in scene.nodes() {
        if let Some(ns) = namespace
            && !paths::in_namespace(&node.path, ns)
        {
            continue;
        }
        let Some(entry) = node.attrs.get(attr) else {
            continue;
        };
        if let Some(expected) = &expected
            && !matches_stored(expected, entry.value())
        {
            continue;
        }
        out.push(node.path.clone());
    }
    Ok(out)
}

fn classify_match_value(attr: &str, value: &serde_json::Value) -> PasslineResult<AttrValue> {
    match value {
        serde_json::Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(AttrValue::Number)
            .ok_or_else(|| {
                PasslineError::unsupported_type(format!(
                    "non-finite match value on attribute '{attr}'"
                ))
            }),
        serde_json::Value::String(s) => Ok(AttrValue::Text(s.clone())),
        other => Err(PasslineError::unsupported_type(format!(
            "{} match value on attribute '{attr}'",
            match other {
                serde_json::Value::Null => "null",
                serde_json::Value::Array(_) => "array",
                _ => "object",
            }
        ))),
    }
}

fn matches_stored(expected: &AttrValue, stored: &AttrValue) -> bool {
    match (expected, stored) {
        (AttrValue::Number(n), AttrValue::Number(m)) => n == m,
        (AttrValue::Number(n), AttrValue::Bool(b)) => *n == if *b { 1.0 } else { 0.0 },
        (AttrValue::Bool(b), stored) => stored.truthy() == *b,
        (AttrValue::Text(t), AttrValue::Text(s)) => t == s,
        _ => false,
    }
}
