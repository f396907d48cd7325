use serde::Serialize;
use tracing::debug;

use crate::scene::graph::SceneGraph;
use crate::scene::model::TYPE_OBJECT_SET;
use crate::scene::paths;
use crate::scene::value::AttrValue;

/// Family tag of image-sequence publish instances.
pub const FAMILY_IMGSEQ: &str = "passline.imgseq";
/// Shadow family injected for playblast instances.
pub const FAMILY_IMGSEQ_PLAYBLAST: &str = "passline.imgseq.playblast";
/// Shadow family injected for turntable instances.
pub const FAMILY_IMGSEQ_TURNTABLE: &str = "passline.imgseq.turntable";
/// Shadow family injected for batch-render instances.
pub const FAMILY_IMGSEQ_BATCHRENDER: &str = "passline.imgseq.batchrender";

/// Marker value of the `id` attribute on instance sets.
pub const INSTANCE_ID: &str = "passline.instance";
/// Marker value of the `id` attribute on loaded-container sets.
pub const CONTAINER_ID: &str = "passline.container";

/// Farm route for jobs that run a host script (playblasts).
pub const DISPATCH_SCRIPT: &str = "dispatch.script";
/// Farm route for jobs that invoke the host renderer.
pub const DISPATCH_RENDER: &str = "dispatch.render";

/// Context-level data shared by every instance of one collection run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextData {
    /// Directory rendered frames land in (`<workspace>/renders`).
    #[serde(rename = "outputDir")]
    pub output_dir: String,
    /// How many render layers are linked to the scene's layer manager.
    #[serde(rename = "renderlayerLinkageCount")]
    pub renderlayer_linkage_count: usize,
    /// Whether the snapshot came from a host running the layer-override system.
    #[serde(rename = "usingOverrideSystem")]
    pub using_override_system: bool,
}

/// One unit of publishable work: a name, an ordered member set, and free-form
/// metadata.
///
/// Members are scene-node paths; the instance records membership only and
/// never owns the nodes. Insertion order is kept and duplicates are dropped.
#[derive(Debug, Clone, Serialize)]
pub struct PublishInstance {
    /// Instance name; for layer instances, the layer's publish label.
    pub name: String,
    members: Vec<String>,
    /// Free-form metadata consumed by downstream publish steps.
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl PublishInstance {
    fn new(name: impl Into<String>) -> Self {
        let mut data = serde_json::Map::new();
        // Publishable and deselectable unless a variant policy says otherwise.
        data.insert("optional".to_owned(), serde_json::json!(true));
        data.insert("publish".to_owned(), serde_json::json!(true));
        Self {
            name: name.into(),
            members: Vec::new(),
            data,
        }
    }

    /// Member node paths in insertion order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Append a member unless already present.
    pub fn add_member(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.members.iter().any(|m| *m == path) {
            self.members.push(path);
        }
    }

    /// Append several members, dropping duplicates.
    pub fn add_members<I, S>(&mut self, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for m in members {
            self.add_member(m);
        }
    }

    /// Store one data entry, replacing any existing value.
    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_owned(), value);
    }

    /// Data entry as text, if present and textual.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Data entry as a plain boolean, if present and boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(serde_json::Value::as_bool)
    }

    /// The instance's primary family tag.
    pub fn family(&self) -> Option<&str> {
        self.get_str("family")
    }
}

/// The publish context: ordered instances plus run-level shared data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishContext {
    instances: Vec<PublishInstance>,
    /// Run-level data shared by every instance.
    pub data: ContextData,
}

impl PublishContext {
    /// An empty context with default run data.
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected instances, oldest first.
    pub fn instances(&self) -> &[PublishInstance] {
        &self.instances
    }

    /// Append a fresh instance and hand back its handle for population.
    pub fn create_instance(&mut self, name: impl Into<String>) -> &mut PublishInstance {
        self.instances.push(PublishInstance::new(name));
        let last = self.instances.len() - 1;
        &mut self.instances[last]
    }

    /// Remove and return every instance of one family, preserving the order
    /// of the remainder.
    pub fn take_by_family(&mut self, family: &str) -> Vec<PublishInstance> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.instances.len() {
            if self.instances[i].family() == Some(family) {
                taken.push(self.instances.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }
}

/// Seed the context with pending instances declared in the scene.
///
/// An instance set is an object set whose `id` attribute carries the instance
/// marker; its attributes become instance data (the marker itself excluded),
/// its path is recorded as `objectName`, and its members carry over. Returns
/// the number of instances created.
pub fn seed_instances(scene: &SceneGraph, context: &mut PublishContext) -> usize {
    let mut created = 0;
    for set in scene.nodes_of_type(TYPE_OBJECT_SET) {
        let marked = matches!(
            set.attrs.get("id").map(|d| d.value()),
            Some(AttrValue::Text(id)) if id == INSTANCE_ID
        );
        if !marked || !set.attrs.contains_key("family") {
            continue;
        }

        let name = match set.attrs.get("subset").map(|d| d.value()) {
            Some(AttrValue::Text(subset)) => subset.clone(),
            _ => paths::leaf(&set.path).to_owned(),
        };
        debug!(set = %set.path, instance = %name, "seeding pending instance");

        let members = set.members.clone();
        let instance = context.create_instance(name);
        for (attr, def) in &set.attrs {
            if attr == "id" {
                continue;
            }
            instance.set(attr, def.value().to_json());
        }
        instance.set("objectName", serde_json::json!(set.path));
        instance.add_members(members);
        created += 1;
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::builder::{NodeSpec, SceneBuilder};

    #[test]
    fn members_stay_ordered_and_deduplicated() {
        let mut ctx = PublishContext::new();
        let inst = ctx.create_instance("layer1");
        inst.add_members(["|b", "|a", "|b", "|c"]);
        assert_eq!(inst.members(), ["|b", "|a", "|c"]);
        assert_eq!(inst.get_bool("publish"), Some(true));
        assert_eq!(inst.get_bool("optional"), Some(true));
    }

    #[test]
    fn take_by_family_preserves_remainder_order() {
        let mut ctx = PublishContext::new();
        ctx.create_instance("a").set("family", serde_json::json!("x"));
        ctx.create_instance("b").set("family", serde_json::json!("y"));
        ctx.create_instance("c").set("family", serde_json::json!("x"));

        let taken = ctx.take_by_family("x");
        assert_eq!(
            taken.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            ["a", "c"]
        );
        assert_eq!(
            ctx.instances().iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            ["b"]
        );
    }

    #[test]
    fn seed_instances_picks_up_marked_sets_only() {
        let g = SceneBuilder::new("shot")
            .node(NodeSpec::new("|char", "transform"))
            .unwrap()
            .node(
                NodeSpec::new("renderSet", TYPE_OBJECT_SET)
                    .attr("id", INSTANCE_ID)
                    .attr("family", FAMILY_IMGSEQ)
                    .attr("subset", "renderDefault")
                    .attr("renderType", "batchrender")
                    .members(["|char"]),
            )
            .unwrap()
            .node(
                NodeSpec::new("plainSet", TYPE_OBJECT_SET)
                    .attr("family", FAMILY_IMGSEQ)
                    .members(["|char"]),
            )
            .unwrap()
            .graph()
            .unwrap();

        let mut ctx = PublishContext::new();
        assert_eq!(seed_instances(&g, &mut ctx), 1);

        let inst = &ctx.instances()[0];
        assert_eq!(inst.name, "renderDefault");
        assert_eq!(inst.family(), Some(FAMILY_IMGSEQ));
        assert_eq!(inst.get_str("objectName"), Some("renderSet"));
        assert_eq!(inst.get_str("renderType"), Some("batchrender"));
        assert!(inst.data.get("id").is_none());
        assert_eq!(inst.members(), ["|char"]);
    }
}
