//! Post-collection sanity checks on publish instances.

use serde_json::json;

use crate::collect::context::{CONTAINER_ID, PublishInstance};
use crate::foundation::error::PasslineResult;
use crate::layers::query::{find_by_attr, is_visible};
use crate::scene::graph::SceneGraph;
use crate::scene::model::TYPE_JOINT;

/// Render cameras must come from versioned, containerized assets.
///
/// A camera passes when its transform is a member of at least one
/// loaded-container set. Returns the offenders in `renderCam` order.
pub fn versioned_cameras(
    scene: &SceneGraph,
    instance: &PublishInstance,
) -> PasslineResult<Vec<String>> {
    let containers = find_by_attr(scene, "id", Some(&json!(CONTAINER_ID)), None)?;

    let render_cams: Vec<&str> = instance
        .data
        .get("renderCam")
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut offenders: Vec<String> = Vec::new();
    for cam in render_cams {
        let versioned = scene.parent_of(cam).is_some_and(|transform| {
            scene
                .sets_containing(&transform.path)
                .iter()
                .any(|set| containers.iter().any(|c| c == &set.path))
        });
        if !versioned && !offenders.iter().any(|o| o == cam) {
            offenders.push(cam.to_owned());
        }
    }
    Ok(offenders)
}

/// Joints must never show up in a render. Reports the joints among `nodes`
/// that are still visible, the display-layer test included.
pub fn joints_hidden(scene: &SceneGraph, nodes: &[String]) -> Vec<String> {
    nodes
        .iter()
        .filter(|node| scene.node_type(node) == Some(TYPE_JOINT))
        .filter(|node| is_visible(scene, node))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::context::PublishContext;
    use crate::scene::builder::{NodeSpec, SceneBuilder};
    use crate::scene::model::TYPE_OBJECT_SET;

    fn camera_scene() -> SceneGraph {
        SceneBuilder::new("shot")
            .node(NodeSpec::new("|rig", "transform"))
            .unwrap()
            .node(NodeSpec::new("|rig|cam", "transform"))
            .unwrap()
            .node(NodeSpec::new("|rig|cam|camShape", "camera"))
            .unwrap()
            .node(NodeSpec::new("|loose", "transform"))
            .unwrap()
            .node(NodeSpec::new("|loose|cam2", "transform"))
            .unwrap()
            .node(NodeSpec::new("|loose|cam2|cam2Shape", "camera"))
            .unwrap()
            .node(
                NodeSpec::new("camRigContainer", TYPE_OBJECT_SET)
                    .attr("id", "passline.container")
                    .members(["|rig|cam"]),
            )
            .unwrap()
            .graph()
            .unwrap()
    }

    #[test]
    fn cameras_outside_containers_are_reported() {
        let scene = camera_scene();
        let mut context = PublishContext::new();
        let instance = context.create_instance("layer1");
        instance.set(
            "renderCam",
            json!(["|rig|cam|camShape", "|loose|cam2|cam2Shape"]),
        );

        let offenders = versioned_cameras(&scene, &context.instances()[0]).unwrap();
        assert_eq!(offenders, vec!["|loose|cam2|cam2Shape".to_owned()]);
    }

    #[test]
    fn instances_without_cameras_pass_vacuously() {
        let scene = camera_scene();
        let mut context = PublishContext::new();
        context.create_instance("layer1");

        let offenders = versioned_cameras(&scene, &context.instances()[0]).unwrap();
        assert!(offenders.is_empty());
    }

    #[test]
    fn visible_joints_are_reported_hidden_ones_pass() {
        let scene = SceneBuilder::new("rig")
            .node(NodeSpec::new("|rig", "transform"))
            .unwrap()
            .node(NodeSpec::new("|rig|spine", TYPE_JOINT))
            .unwrap()
            .node(NodeSpec::new("|rig|tail", TYPE_JOINT).attr("visibility", false))
            .unwrap()
            .node(
                NodeSpec::new("|rig|arm", TYPE_JOINT)
                    .attr("overrideEnabled", true)
                    .attr("overrideVisibility", false),
            )
            .unwrap()
            .node(NodeSpec::new("|rig|geo", "transform"))
            .unwrap()
            .graph()
            .unwrap();

        let nodes: Vec<String> = scene.nodes().map(|n| n.path.clone()).collect();
        let visible = joints_hidden(&scene, &nodes);
        // The display-layer-hidden and visibility-off joints pass; the plain
        // one does not. Non-joints are never reported.
        assert_eq!(visible, vec!["|rig|spine".to_owned()]);
    }
}
