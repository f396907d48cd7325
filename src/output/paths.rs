use tracing::debug;

use crate::foundation::error::{PasslineError, PasslineResult};
use crate::layers::resolve::resolve_truthy;
use crate::output::filename::compose_filename;
use crate::scene::graph::SceneGraph;
use crate::scene::paths;
use crate::scene::value::AttrValue;

/// Renderer identifier for V-Ray.
pub const RENDERER_VRAY: &str = "vray";
/// Renderer identifier for Arnold.
pub const RENDERER_ARNOLD: &str = "arnold";

/// Host node type carrying V-Ray render elements.
pub const TYPE_VRAY_ELEMENT: &str = "VRayRenderElement";
/// Host node type carrying Arnold AOVs.
pub const TYPE_ARNOLD_AOV: &str = "aiAOV";

/// Extraction tag for a single-path output.
pub const EXTRACT_IMAGE_SEQUENCE: &str = "imageSequence";
/// Extraction tag for a multi-path output.
pub const EXTRACT_IMAGE_SEQUENCE_SET: &str = "imageSequenceSet";

/// Ordered channel-name -> output-path mapping. The empty key is the
/// primary (beauty) channel.
pub type OutputPaths = serde_json::Map<String, serde_json::Value>;

fn element_channels(
    scene: &SceneGraph,
    layer: &str,
    node_type: &str,
    name_attr: &str,
) -> PasslineResult<Vec<String>> {
    let mut names = Vec::new();
    for elem in scene.nodes_of_type(node_type) {
        if !scene.has_attr(&elem.path, "enabled")
            || !resolve_truthy(scene, &elem.path, "enabled", layer)?
        {
            continue;
        }
        if let Some(AttrValue::Text(name)) = scene.get_attr(&elem.path, name_attr) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

/// Auxiliary channel names a renderer contributes for a layer, in snapshot
/// order, primary channel excluded. Unknown renderers contribute none.
///
/// Per-element `enabled` flags resolve through the layer's overrides, so a
/// layer can switch channels on or off without being current.
pub fn channel_names(
    scene: &SceneGraph,
    layer: &str,
    renderer: &str,
) -> PasslineResult<Vec<String>> {
    match renderer {
        RENDERER_VRAY => element_channels(scene, layer, TYPE_VRAY_ELEMENT, "vray_name"),
        RENDERER_ARNOLD => element_channels(scene, layer, TYPE_ARNOLD_AOV, "name"),
        _ => Ok(Vec::new()),
    }
}

/// Compose the full output-path mapping for a layer.
///
/// Channel names come from [`channel_names`]; the primary channel is
/// appended last. (Beauty-last is long-standing observed ordering that
/// downstream extraction indexes on; keep it.) Every path is
/// `<output_dir>/<composed filename>`, forward slashes throughout.
pub fn compose_outputs(
    scene: &SceneGraph,
    output_dir: &str,
    layer: &str,
    renderer: &str,
) -> PasslineResult<OutputPaths> {
    let mut channels = channel_names(scene, layer, renderer)?;
    channels.push(String::new());

    let mut out = OutputPaths::new();
    for channel in channels {
        let name = compose_filename(scene, layer, &channel)?;
        let path = paths::slash_join(output_dir, &name);
        debug!(%channel, %path, "composed output path");
        out.insert(channel, serde_json::json!(path));
    }
    Ok(out)
}

/// Extraction tag for a composed mapping. An empty mapping means composition
/// never ran or produced nothing, which is a bug to surface, not tolerate.
pub fn extract_type(paths: &OutputPaths) -> PasslineResult<&'static str> {
    if paths.is_empty() {
        return Err(PasslineError::configuration(
            "no output paths composed; even the primary channel is missing",
        ));
    }
    Ok(if paths.len() > 1 {
        EXTRACT_IMAGE_SEQUENCE_SET
    } else {
        EXTRACT_IMAGE_SEQUENCE
    })
}
