//! Render-layer collection: one publish instance per valid layer, classified
//! by render type and fleshed out with frame, camera, and output metadata.

use std::collections::BTreeSet;

use serde_json::json;
use tracing::{debug, warn};

use crate::collect::context::{
    ContextData, DISPATCH_RENDER, DISPATCH_SCRIPT, FAMILY_IMGSEQ, FAMILY_IMGSEQ_BATCHRENDER,
    FAMILY_IMGSEQ_PLAYBLAST, FAMILY_IMGSEQ_TURNTABLE, PublishContext, PublishInstance,
};
use crate::foundation::error::{PasslineError, PasslineResult};
use crate::layers::query::renderable_cameras;
use crate::layers::resolve::resolve;
use crate::output::filename::{file_extension, filename_prefix, layer_label};
use crate::output::paths::{compose_outputs, extract_type};
use crate::scene::graph::SceneGraph;
use crate::scene::model::{
    LAYER_MANAGER, NodeDef, Plug, RENDER_GLOBALS, TYPE_CAMERA, TYPE_MESH, TYPE_RENDER_LAYER,
};
use crate::scene::paths;

/// Rendering policy named by an instance's `renderType` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderType {
    Playblast,
    Turntable,
    Batchrender,
}

impl RenderType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "playblast" => Some(Self::Playblast),
            "turntable" => Some(Self::Turntable),
            "batchrender" => Some(Self::Batchrender),
            _ => None,
        }
    }
}

/// Turns the render layers of a scene snapshot into publish instances.
pub struct RenderLayerCollector<'a> {
    scene: &'a SceneGraph,
}

impl<'a> RenderLayerCollector<'a> {
    /// A collector bound to one scene snapshot.
    pub fn new(scene: &'a SceneGraph) -> Self {
        Self { scene }
    }

    #[tracing::instrument(skip_all, fields(scene = %self.scene.name()))]
    /// Run one collection pass.
    ///
    /// Harvests the pending image-sequence placeholder, writes the run-level
    /// context data, then walks layers in display order and emits one instance
    /// per valid layer. The first fatal failure aborts the pass; instances
    /// already in the context stay committed, including a partially populated
    /// one for the failing layer.
    pub fn collect(
        &self,
        workspace_dir: &str,
        context: &mut PublishContext,
    ) -> PasslineResult<()> {
        let (source_node, dummy_members) = harvest_placeholder(context)?;

        let linked = self.linked_layers();
        context.data = ContextData {
            output_dir: paths::slash_join(workspace_dir, "renders"),
            renderlayer_linkage_count: linked.len(),
            using_override_system: self.scene.using_override_system(),
        };

        let mut layers: Vec<&NodeDef> = self.scene.nodes_of_type(TYPE_RENDER_LAYER).collect();
        // Stable sort keeps snapshot order between equal display orders.
        layers.sort_by(|a, b| display_order(a).total_cmp(&display_order(b)));

        for layer in layers {
            debug!(layer = %layer.path, "collecting render layer");
            if let Some(reason) = layer_skip_reason(layer, &linked) {
                warn!(layer = %layer.path, reason, "render layer skipped");
                continue;
            }
            self.collect_layer(layer, &source_node, &dummy_members, context)?;
        }
        Ok(())
    }

    /// Layers wired into the manager's id array. Anything else is stale.
    fn linked_layers(&self) -> BTreeSet<&str> {
        self.scene
            .connections_to(LAYER_MANAGER, "renderLayerId")
            .filter_map(|conn| Plug::parse(&conn.src))
            .map(|plug| plug.node)
            .collect()
    }

    fn collect_layer(
        &self,
        layer: &NodeDef,
        source_node: &str,
        dummy_members: &[String],
        context: &mut PublishContext,
    ) -> PasslineResult<()> {
        let scene = self.scene;
        let layer_id = layer.path.as_str();

        // Everything below reads *for this layer*, whichever layer the host
        // had current when the snapshot was taken.
        let renderer = resolve(scene, RENDER_GLOBALS, "currentRenderer", layer_id)?.as_text();
        let start_frame = resolve(scene, RENDER_GLOBALS, "startFrame", layer_id)?.as_f64()?;
        let end_frame = resolve(scene, RENDER_GLOBALS, "endFrame", layer_id)?.as_f64()?;
        let by_frame_step = resolve(scene, RENDER_GLOBALS, "byFrameStep", layer_id)?.as_f64()?;
        let file_prefix = filename_prefix(scene, layer_id)?;
        let file_ext = file_extension(scene, layer_id)?;

        let pipeline = |attr: &str| resolve(scene, source_node, attr, layer_id);
        let render_type_raw = pipeline("renderType")?.as_text();

        let output_dir = context.data.output_dir.clone();
        let instance = context.create_instance(layer_label(layer_id));
        instance.add_members(dummy_members.iter().cloned());
        instance.set("renderlayer", json!(layer_id));
        instance.set("startFrame", json!(start_frame));
        instance.set("endFrame", json!(end_frame));
        instance.set("byFrameStep", json!(by_frame_step));
        instance.set("renderer", json!(renderer));
        instance.set("fileNamePrefix", json!(file_prefix));
        instance.set("fileExt", json!(file_ext));
        for attr in [
            "asset",
            "subset",
            "dispatchEnable",
            "dispatchPool",
            "dispatchGroup",
            "dispatchPriority",
        ] {
            instance.set(attr, pipeline(attr)?.to_json());
        }
        instance.set("renderType", json!(render_type_raw));
        instance.set("dependencies", json!({}));
        instance.set("futureDependencies", json!({}));
        instance.set("family", json!(FAMILY_IMGSEQ));
        instance.set("families", json!([]));

        match RenderType::parse(&render_type_raw) {
            Some(RenderType::Playblast) => self.prepare_playblast(instance),
            Some(RenderType::Turntable) => self.prepare_render(
                instance,
                layer_id,
                &renderer,
                &output_dir,
                FAMILY_IMGSEQ_TURNTABLE,
                format!("Turntable: {renderer}"),
            ),
            Some(RenderType::Batchrender) => self.prepare_render(
                instance,
                layer_id,
                &renderer,
                &output_dir,
                FAMILY_IMGSEQ_BATCHRENDER,
                format!("Render: {renderer}"),
            ),
            None => Err(PasslineError::configuration(format!(
                "unknown render type '{render_type_raw}' on {source_node}"
            ))),
        }?;

        self.attach_member_closure(instance, layer);
        Ok(())
    }

    /// Playblasts route through the script dispatcher and must never escape
    /// an unlocked scene.
    fn prepare_playblast(&self, instance: &mut PublishInstance) -> PasslineResult<()> {
        push_family(instance, FAMILY_IMGSEQ_PLAYBLAST);
        instance.set("category", json!("Playblast"));
        if !self.scene.is_locked() {
            instance.set("optional", json!(false));
            instance.set("publish", json!(false));
        }
        assign_dispatch(instance, DISPATCH_SCRIPT);

        let cameras = self.hierarchy_cameras(instance);
        instance.set("renderCam", json!(cameras));
        Ok(())
    }

    /// Shared turntable / batch-render policy: renderer-labelled category,
    /// layer-suffixed subset, render dispatch, renderable cameras only, and a
    /// composed output-path table. Publishable regardless of scene lock.
    fn prepare_render(
        &self,
        instance: &mut PublishInstance,
        layer: &str,
        renderer: &str,
        output_dir: &str,
        family: &'static str,
        category: String,
    ) -> PasslineResult<()> {
        push_family(instance, family);
        instance.set("category", json!(category));

        let mutated = instance
            .get_str("subset")
            .map(|subset| format!("{subset}.{}", instance.name));
        if let Some(mutated) = mutated {
            instance.set("subset", json!(mutated));
        }
        assign_dispatch(instance, DISPATCH_RENDER);

        let renderable = renderable_cameras(self.scene, layer)?;
        let cameras: Vec<String> = self
            .hierarchy_cameras(instance)
            .into_iter()
            .filter(|cam| renderable.contains(cam))
            .collect();
        instance.set("renderCam", json!(cameras));

        let outputs = compose_outputs(self.scene, output_dir, layer, renderer)?;
        let extraction = extract_type(&outputs)?;
        instance.set("outputPaths", serde_json::Value::Object(outputs));
        instance.set("extractType", json!(extraction));
        Ok(())
    }

    /// Camera shapes anywhere under the instance's current members, in
    /// hierarchy order.
    fn hierarchy_cameras(&self, instance: &PublishInstance) -> Vec<String> {
        self.expand_hierarchy(instance.members())
            .into_iter()
            .filter(|path| self.scene.node_type(path) == Some(TYPE_CAMERA))
            .collect()
    }

    /// The roots plus all their descendants, preorder, first occurrence kept.
    fn expand_hierarchy(&self, roots: &[String]) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut out: Vec<String> = Vec::new();
        for root in roots {
            if seen.insert(root) {
                out.push(root.clone());
            }
            for node in self.scene.descendants(root) {
                if seen.insert(&node.path) {
                    out.push(node.path.clone());
                }
            }
        }
        out
    }

    /// Union the layer's asset-bearing transforms into the instance members.
    ///
    /// Raw layer membership is recorded as metadata; the dependency walk
    /// expands it to descendants, keeps the non-intermediate meshes, and
    /// contributes each mesh's parent transform. Downstream dependency
    /// tracking wants concrete asset transforms, not arbitrary group nodes.
    fn attach_member_closure(&self, instance: &mut PublishInstance, layer: &NodeDef) {
        let raw = self.scene.members(&layer.path).to_vec();
        for path in self.expand_hierarchy(&raw) {
            let Some(node) = self.scene.node(&path) else {
                continue;
            };
            if node.node_type != TYPE_MESH || is_intermediate(node) {
                continue;
            }
            if let Some(parent) = self.scene.parent_of(&path) {
                instance.add_member(parent.path.clone());
            }
        }
        instance.set("renderLayerMember", json!(raw));
    }
}

/// Pull the pending image-sequence placeholder(s) out of the context.
///
/// Placeholders mark where the per-layer instances come from and never
/// publish themselves. With several, members accumulate and the last
/// `objectName` wins.
fn harvest_placeholder(context: &mut PublishContext) -> PasslineResult<(String, Vec<String>)> {
    let placeholders = context.take_by_family(FAMILY_IMGSEQ);
    if placeholders.is_empty() {
        return Err(PasslineError::configuration(
            "no pending image-sequence instance in the context; this is a bug",
        ));
    }

    let mut members: Vec<String> = Vec::new();
    let mut source_node: Option<String> = None;
    for placeholder in placeholders {
        for member in placeholder.members() {
            if !members.iter().any(|m| m == member) {
                members.push(member.clone());
            }
        }
        if let Some(name) = placeholder.get_str("objectName") {
            source_node = Some(name.to_owned());
        }
    }
    let Some(source_node) = source_node else {
        return Err(PasslineError::configuration(
            "image-sequence placeholder carries no objectName",
        ));
    };
    Ok((source_node, members))
}

fn layer_skip_reason(layer: &NodeDef, linked: &BTreeSet<&str>) -> Option<&'static str> {
    if !linked.contains(layer.path.as_str()) {
        return Some("not linked to the layer manager");
    }
    // Renderable is read straight off the layer node, not through overrides.
    let renderable = layer
        .attrs
        .get("renderable")
        .is_some_and(|d| d.value().truthy());
    if !renderable {
        return Some("not flagged renderable");
    }
    if layer.referenced {
        return Some("sourced from a reference");
    }
    None
}

fn display_order(layer: &NodeDef) -> f64 {
    layer
        .attrs
        .get("displayOrder")
        .and_then(|d| d.value().as_f64().ok())
        .unwrap_or(0.0)
}

fn is_intermediate(node: &NodeDef) -> bool {
    node.attrs
        .get("intermediateObject")
        .is_some_and(|d| d.value().truthy())
}

fn push_family(instance: &mut PublishInstance, family: &str) {
    let families = instance
        .data
        .entry("families".to_owned())
        .or_insert_with(|| json!([]));
    if let serde_json::Value::Array(list) = families {
        list.push(json!(family));
    }
}

/// Route the instance to the farm when its dispatch flag resolved truthy.
fn assign_dispatch(instance: &mut PublishInstance, route: &str) {
    let enabled = instance.data.get("dispatchEnable").is_some_and(json_truthy);
    if enabled {
        instance.set("useContractor", json!(true));
        instance.set("publishContractor", json!(route));
    }
}

fn json_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::context::seed_instances;
    use crate::scene::builder::{NodeSpec, SceneBuilder};
    use crate::scene::model::{DEFAULT_RENDER_LAYER, MASTER_LAYER_LABEL, TYPE_OBJECT_SET};

    fn base_builder(render_type: &str, locked: bool) -> SceneBuilder {
        SceneBuilder::new("shot010")
            .locked(locked)
            .node(NodeSpec::new(LAYER_MANAGER, "renderLayerManager"))
            .unwrap()
            .node(
                NodeSpec::new(RENDER_GLOBALS, "renderGlobals")
                    .attr("currentRenderer", "arnold")
                    .attr("startFrame", 101.0)
                    .attr("endFrame", 150.0)
                    .attr("byFrameStep", 1.0)
                    .attr("imageFormat", "exr")
                    .attr("extensionPadding", 4.0),
            )
            .unwrap()
            .node(NodeSpec::new("|ROOT", "transform"))
            .unwrap()
            .node(NodeSpec::new("|ROOT|char", "transform"))
            .unwrap()
            .node(NodeSpec::new("|ROOT|char|charShape", TYPE_MESH))
            .unwrap()
            .node(
                NodeSpec::new("|ROOT|char|charShapeOrig", TYPE_MESH)
                    .attr("intermediateObject", true),
            )
            .unwrap()
            .node(NodeSpec::new("|ROOT|cam", "transform"))
            .unwrap()
            .node(NodeSpec::new("|ROOT|cam|camShape", TYPE_CAMERA).attr("renderable", true))
            .unwrap()
            .node(
                NodeSpec::new("renderSet", TYPE_OBJECT_SET)
                    .attr("id", "passline.instance")
                    .attr("family", FAMILY_IMGSEQ)
                    .attr("asset", "shotA")
                    .attr("subset", "renderDefault")
                    .attr("renderType", render_type)
                    .attr("dispatchEnable", true)
                    .attr("dispatchPool", "farm")
                    .attr("dispatchGroup", "shots")
                    .attr("dispatchPriority", 80.0)
                    .members(["|ROOT"]),
            )
            .unwrap()
    }

    fn single_layer_scene(render_type: &str, locked: bool) -> SceneGraph {
        base_builder(render_type, locked)
            .render_layer(
                NodeSpec::new("layer1", TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .attr("displayOrder", 1.0)
                    .members(["|ROOT"]),
            )
            .unwrap()
            .graph()
            .unwrap()
    }

    fn collect_single(render_type: &str, locked: bool) -> PublishContext {
        let scene = single_layer_scene(render_type, locked);
        let mut context = PublishContext::new();
        assert_eq!(seed_instances(&scene, &mut context), 1);
        RenderLayerCollector::new(&scene)
            .collect("/proj/work", &mut context)
            .unwrap();
        context
    }

    #[test]
    fn layers_publish_in_display_order_with_master_label() {
        let scene = base_builder("batchrender", true)
            .render_layer(
                NodeSpec::new(DEFAULT_RENDER_LAYER, TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .attr("displayOrder", 0.0),
            )
            .unwrap()
            .render_layer(
                NodeSpec::new("charsLayer", TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .attr("displayOrder", 3.0)
                    .members(["|ROOT"]),
            )
            .unwrap()
            .render_layer(
                NodeSpec::new("bgLayer", TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .attr("displayOrder", 1.0),
            )
            .unwrap()
            .render_layer(
                NodeSpec::new("fxLayer", TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .attr("displayOrder", 2.0),
            )
            .unwrap()
            .graph()
            .unwrap();

        let mut context = PublishContext::new();
        seed_instances(&scene, &mut context);
        RenderLayerCollector::new(&scene)
            .collect("/proj/work", &mut context)
            .unwrap();

        let names: Vec<&str> = context.instances().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec![MASTER_LAYER_LABEL, "bgLayer", "fxLayer", "charsLayer"]
        );
        assert_eq!(context.data.renderlayer_linkage_count, 4);
        assert_eq!(context.data.output_dir, "/proj/work/renders");
    }

    #[test]
    fn unlinked_unrenderable_and_referenced_layers_are_skipped() {
        let scene = base_builder("batchrender", true)
            .render_layer(
                NodeSpec::new("good", TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .members(["|ROOT"]),
            )
            .unwrap()
            // Linked but switched off, linked but referenced, and never linked.
            .render_layer(NodeSpec::new("off", TYPE_RENDER_LAYER).attr("renderable", false))
            .unwrap()
            .render_layer(
                NodeSpec::new("foreign", TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .referenced(),
            )
            .unwrap()
            .node(NodeSpec::new("stale", TYPE_RENDER_LAYER).attr("renderable", true))
            .unwrap()
            .graph()
            .unwrap();

        let mut context = PublishContext::new();
        seed_instances(&scene, &mut context);
        RenderLayerCollector::new(&scene)
            .collect("/proj/work", &mut context)
            .unwrap();

        let names: Vec<&str> = context.instances().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
        // Linkage counts the manager connections, not the valid survivors.
        assert_eq!(context.data.renderlayer_linkage_count, 3);
    }

    #[test]
    fn missing_placeholder_is_a_bug_condition() {
        let scene = single_layer_scene("batchrender", true);
        let mut context = PublishContext::new();
        let err = RenderLayerCollector::new(&scene).collect("/proj/work", &mut context);
        assert!(matches!(err, Err(PasslineError::Configuration(_))));
    }

    #[test]
    fn unknown_render_type_aborts_and_keeps_the_partial_instance() {
        let scene = single_layer_scene("sketch", true);
        let mut context = PublishContext::new();
        seed_instances(&scene, &mut context);
        let err = RenderLayerCollector::new(&scene).collect("/proj/work", &mut context);
        assert!(matches!(err, Err(PasslineError::Configuration(_))));

        // The failing layer's instance stays behind, classification half done.
        assert_eq!(context.instances().len(), 1);
        let partial = &context.instances()[0];
        assert_eq!(partial.family(), Some(FAMILY_IMGSEQ));
        assert!(partial.data.get("category").is_none());
    }

    #[test]
    fn gathered_attributes_land_in_instance_data() {
        let context = collect_single("batchrender", true);
        let instance = &context.instances()[0];

        assert_eq!(instance.name, "layer1");
        assert_eq!(instance.get_str("renderlayer"), Some("layer1"));
        assert_eq!(instance.data["startFrame"], json!(101.0));
        assert_eq!(instance.data["endFrame"], json!(150.0));
        assert_eq!(instance.data["byFrameStep"], json!(1.0));
        assert_eq!(instance.get_str("renderer"), Some("arnold"));
        assert_eq!(instance.get_str("fileExt"), Some(".exr"));
        assert_eq!(
            instance.get_str("fileNamePrefix"),
            Some("shot010/layer1/shot010_layer1")
        );
        assert_eq!(instance.get_str("asset"), Some("shotA"));
        assert_eq!(instance.data["dispatchPriority"], json!(80.0));
        assert_eq!(instance.data["dependencies"], json!({}));
        assert_eq!(instance.data["futureDependencies"], json!({}));
    }

    #[test]
    fn playblast_gate_blocks_publish_from_unlocked_scenes() {
        let unlocked = collect_single("playblast", false);
        let instance = &unlocked.instances()[0];
        assert_eq!(instance.get_bool("optional"), Some(false));
        assert_eq!(instance.get_bool("publish"), Some(false));
        assert_eq!(instance.get_str("category"), Some("Playblast"));
        assert_eq!(instance.get_str("publishContractor"), Some(DISPATCH_SCRIPT));
        // All hierarchy cameras qualify for playblasts.
        assert_eq!(instance.data["renderCam"], json!(["|ROOT|cam|camShape"]));
        // No output composition for playblasts.
        assert!(instance.data.get("outputPaths").is_none());

        let locked = collect_single("playblast", true);
        let instance = &locked.instances()[0];
        assert_eq!(instance.get_bool("optional"), Some(true));
        assert_eq!(instance.get_bool("publish"), Some(true));
    }

    #[test]
    fn batchrender_publishes_regardless_of_lock_state() {
        let context = collect_single("batchrender", false);
        let instance = &context.instances()[0];
        assert_eq!(instance.get_bool("publish"), Some(true));
        assert_eq!(instance.get_bool("optional"), Some(true));
        assert_eq!(instance.get_str("category"), Some("Render: arnold"));
    }

    #[test]
    fn turntable_mutates_subset_and_composes_outputs() {
        let context = collect_single("turntable", true);
        let instance = &context.instances()[0];

        assert_eq!(instance.get_str("subset"), Some("renderDefault.layer1"));
        assert_eq!(instance.get_str("category"), Some("Turntable: arnold"));
        assert_eq!(instance.get_bool("useContractor"), Some(true));
        assert_eq!(instance.get_str("publishContractor"), Some(DISPATCH_RENDER));
        assert_eq!(instance.data["renderCam"], json!(["|ROOT|cam|camShape"]));
        assert_eq!(instance.get_str("extractType"), Some("imageSequence"));
        assert_eq!(
            instance.data["outputPaths"][""],
            json!("/proj/work/renders/shot010/layer1/shot010_layer1.####.exr")
        );
        assert_eq!(
            instance.data["families"],
            json!([FAMILY_IMGSEQ_TURNTABLE])
        );
    }

    #[test]
    fn member_closure_unions_mesh_parent_transforms() {
        let context = collect_single("batchrender", true);
        let instance = &context.instances()[0];

        // Dummy members from the placeholder, then the mesh parents. The
        // intermediate shape contributes nothing.
        assert_eq!(instance.members(), ["|ROOT", "|ROOT|char"]);
        assert_eq!(instance.data["renderLayerMember"], json!(["|ROOT"]));
    }
}
