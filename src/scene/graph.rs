use std::collections::HashMap;
use std::path::Path;

use smallvec::SmallVec;

use crate::foundation::error::{PasslineError, PasslineResult};
use crate::scene::model::{
    AttrDef, ConnectionDef, HostInfo, NodeDef, OVERRIDE_SYSTEM_MIN_VERSION, Plug, SceneDef,
};
use crate::scene::paths;
use crate::scene::value::{AttrType, AttrValue};

/// Indexed, read-mostly view over a [`SceneDef`].
///
/// All enumeration APIs iterate in snapshot order, so query results are stable
/// for a given document.
#[derive(Debug)]
pub struct SceneGraph {
    def: SceneDef,
    by_path: HashMap<String, usize>,
    children: Vec<SmallVec<[usize; 4]>>,
    conn_from: HashMap<String, SmallVec<[usize; 2]>>,
    conn_to: HashMap<String, SmallVec<[usize; 2]>>,
}

fn conn_key(node: &str, root_attr: &str) -> String {
    format!("{node}.{root_attr}")
}

impl SceneGraph {
    /// Validate a snapshot and build the lookup indexes.
    pub fn new(def: SceneDef) -> PasslineResult<Self> {
        def.validate()?;

        let mut by_path = HashMap::with_capacity(def.nodes.len());
        for (i, node) in def.nodes.iter().enumerate() {
            by_path.insert(node.path.clone(), i);
        }

        let mut children: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); def.nodes.len()];
        for (i, node) in def.nodes.iter().enumerate() {
            if let Some(parent) = paths::parent(&node.path)
                && let Some(&p) = by_path.get(parent)
            {
                children[p].push(i);
            }
        }

        let mut conn_from: HashMap<String, SmallVec<[usize; 2]>> = HashMap::new();
        let mut conn_to: HashMap<String, SmallVec<[usize; 2]>> = HashMap::new();
        for (i, conn) in def.connections.iter().enumerate() {
            // validate() guarantees both plugs parse.
            if let Some(src) = Plug::parse(&conn.src) {
                conn_from
                    .entry(conn_key(src.node, src.root_attr()))
                    .or_default()
                    .push(i);
            }
            if let Some(dst) = Plug::parse(&conn.dst) {
                conn_to
                    .entry(conn_key(dst.node, dst.root_attr()))
                    .or_default()
                    .push(i);
            }
        }

        Ok(Self {
            def,
            by_path,
            children,
            conn_from,
            conn_to,
        })
    }

    /// Parse and index a snapshot from JSON text.
    pub fn from_json(text: &str) -> PasslineResult<Self> {
        Self::new(SceneDef::from_json(text)?)
    }

    /// Load and index a snapshot from a JSON file.
    pub fn from_path(path: &Path) -> PasslineResult<Self> {
        Self::new(SceneDef::from_path(path)?)
    }

    /// The underlying snapshot document.
    pub fn def(&self) -> &SceneDef {
        &self.def
    }

    /// Scene name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The layer the host had active when the snapshot was taken.
    pub fn current_layer(&self) -> &str {
        &self.def.current_layer
    }

    /// Version-freeze state of the scene file.
    pub fn is_locked(&self) -> bool {
        self.def.locked
    }

    /// Host application metadata.
    pub fn host(&self) -> HostInfo {
        self.def.host
    }

    /// Whether this snapshot came from a host with the layer-override system
    /// active (newer hosts expose it alongside legacy render layers).
    pub fn using_override_system(&self) -> bool {
        self.def.host.version >= OVERRIDE_SYSTEM_MIN_VERSION && self.def.host.override_system
    }

    /// Whether a node with this path was captured.
    pub fn exists(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Node lookup by path.
    pub fn node(&self, path: &str) -> Option<&NodeDef> {
        self.by_path.get(path).map(|&i| &self.def.nodes[i])
    }

    /// Host type of a node, if it exists.
    pub fn node_type(&self, path: &str) -> Option<&str> {
        self.node(path).map(|n| n.node_type.as_str())
    }

    /// Whether the node comes from a file reference. Missing nodes read false.
    pub fn is_referenced(&self, path: &str) -> bool {
        self.node(path).is_some_and(|n| n.referenced)
    }

    /// All nodes in snapshot order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDef> {
        self.def.nodes.iter()
    }

    /// Nodes of one host type, in snapshot order.
    pub fn nodes_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = &'a NodeDef> {
        self.def
            .nodes
            .iter()
            .filter(move |n| n.node_type == node_type)
    }

    /// Nodes of one host type, optionally restricted to a namespace.
    ///
    /// With `namespace = None` this is [`SceneGraph::nodes_of_type`].
    pub fn nodes_of_type_in<'a>(
        &'a self,
        node_type: &'a str,
        namespace: Option<&'a str>,
    ) -> impl Iterator<Item = &'a NodeDef> {
        self.nodes_of_type(node_type)
            .filter(move |n| namespace.is_none_or(|ns| paths::in_namespace(&n.path, ns)))
    }

    /// Stored value and declared type of an attribute.
    pub fn attr_entry(&self, path: &str, name: &str) -> Option<(&AttrValue, AttrType)> {
        let def = self.node(path)?.attrs.get(name)?;
        Some((def.value(), def.declared_type()))
    }

    /// Stored value of an attribute (no layer resolution).
    pub fn get_attr(&self, path: &str, name: &str) -> Option<&AttrValue> {
        self.attr_entry(path, name).map(|(v, _)| v)
    }

    /// Whether the node exists and carries the attribute.
    pub fn has_attr(&self, path: &str, name: &str) -> bool {
        self.node(path).is_some_and(|n| n.attrs.contains_key(name))
    }

    /// Overwrite an attribute value, keeping any explicit type declaration.
    ///
    /// Snapshot mutation sits outside the collection path; queries never write.
    pub fn set_attr(&mut self, path: &str, name: &str, value: AttrValue) -> PasslineResult<()> {
        let Some(&idx) = self.by_path.get(path) else {
            return Err(PasslineError::not_found(format!("node '{path}'")));
        };
        let node = &mut self.def.nodes[idx];
        let entry = match node.attrs.get(name) {
            Some(AttrDef::Typed { ty, .. }) => AttrDef::Typed { value, ty: *ty },
            _ => AttrDef::Scalar(value),
        };
        node.attrs.insert(name.to_owned(), entry);
        Ok(())
    }

    /// Connections whose source is `node.root_attr` (any multi index), in
    /// snapshot order.
    pub fn connections_from(
        &self,
        node: &str,
        root_attr: &str,
    ) -> impl Iterator<Item = &ConnectionDef> {
        self.conn_from
            .get(&conn_key(node, root_attr))
            .into_iter()
            .flatten()
            .map(|&i| &self.def.connections[i])
    }

    /// Connections whose destination is `node.root_attr` (any multi index), in
    /// snapshot order.
    pub fn connections_to(
        &self,
        node: &str,
        root_attr: &str,
    ) -> impl Iterator<Item = &ConnectionDef> {
        self.conn_to
            .get(&conn_key(node, root_attr))
            .into_iter()
            .flatten()
            .map(|&i| &self.def.connections[i])
    }

    /// DAG parent of a node, if captured.
    pub fn parent_of(&self, path: &str) -> Option<&NodeDef> {
        self.node(paths::parent(path)?)
    }

    /// Direct children, in snapshot order.
    pub fn children_of(&self, path: &str) -> impl Iterator<Item = &NodeDef> {
        self.by_path
            .get(path)
            .into_iter()
            .flat_map(|&i| self.children[i].iter())
            .map(|&c| &self.def.nodes[c])
    }

    /// All descendants, preorder, children in snapshot order.
    pub fn descendants(&self, path: &str) -> Vec<&NodeDef> {
        let Some(&idx) = self.by_path.get(path) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.children[idx].iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(&self.def.nodes[i]);
            stack.extend(self.children[i].iter().rev().copied());
        }
        out
    }

    /// Membership list of a set-like node (empty for non-sets).
    pub fn members(&self, path: &str) -> &[String] {
        self.node(path).map(|n| n.members.as_slice()).unwrap_or(&[])
    }

    /// Object sets that list `path` as a member, in snapshot order.
    pub fn sets_containing(&self, path: &str) -> Vec<&NodeDef> {
        self.nodes_of_type(crate::scene::model::TYPE_OBJECT_SET)
            .filter(|set| set.members.iter().any(|m| m == path))
            .collect()
    }
}
