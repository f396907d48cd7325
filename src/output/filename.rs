//! Render filename composition.
//!
//! The host stores a filename-prefix template on the render globals
//! (`imageFilePrefix`), resolvable per layer like any other globals
//! attribute. Composition substitutes the template tokens, appends the frame
//! padding as `#` marks, and closes with the image extension, yielding
//! sequence patterns such as `shot/masterLayer/shot_masterLayer.####.exr`.

use crate::foundation::error::PasslineResult;
use crate::layers::resolve::resolve;
use crate::scene::graph::SceneGraph;
use crate::scene::model::{DEFAULT_RENDER_LAYER, MASTER_LAYER_LABEL, RENDER_GLOBALS};

/// Prefix template used when the render globals carry none.
pub const DEFAULT_PREFIX_TEMPLATE: &str = "<Scene>/<RenderLayer>/<Scene>_<RenderLayer>";

const TOKEN_SCENE: &str = "<Scene>";
const TOKEN_RENDER_LAYER: &str = "<RenderLayer>";
const TOKEN_RENDERER: &str = "<Renderer>";
const TOKEN_RENDER_PASS: &str = "<RenderPass>";

/// The label a layer publishes and renders under: the default layer goes by
/// its fixed human label, everything else by its raw identifier.
pub fn layer_label(layer: &str) -> &str {
    if layer == DEFAULT_RENDER_LAYER {
        MASTER_LAYER_LABEL
    } else {
        layer
    }
}

fn globals_text(
    scene: &SceneGraph,
    attr: &str,
    layer: &str,
    missing: &str,
) -> PasslineResult<String> {
    if !scene.has_attr(RENDER_GLOBALS, attr) {
        return Ok(missing.to_owned());
    }
    Ok(resolve(scene, RENDER_GLOBALS, attr, layer)?.as_text())
}

/// The layer's filename stem for the primary channel: resolved prefix
/// template with all tokens substituted, no padding or extension.
pub fn filename_prefix(scene: &SceneGraph, layer: &str) -> PasslineResult<String> {
    substitute(scene, layer, "")
}

/// Image extension for the layer, dot included (`.exr`).
pub fn file_extension(scene: &SceneGraph, layer: &str) -> PasslineResult<String> {
    Ok(format!(
        ".{}",
        globals_text(scene, "imageFormat", layer, "exr")?
    ))
}

/// Full sequence filename for one output channel (empty channel = beauty):
/// `<stem>.<padding marks>.<ext>`.
pub fn compose_filename(scene: &SceneGraph, layer: &str, channel: &str) -> PasslineResult<String> {
    let stem = substitute(scene, layer, channel)?;
    let padding = frame_padding(scene, layer)?;
    let ext = globals_text(scene, "imageFormat", layer, "exr")?;
    Ok(format!("{stem}.{}.{ext}", "#".repeat(padding)))
}

fn substitute(scene: &SceneGraph, layer: &str, channel: &str) -> PasslineResult<String> {
    let mut template = globals_text(scene, "imageFilePrefix", layer, DEFAULT_PREFIX_TEMPLATE)?;
    if template.is_empty() {
        template = DEFAULT_PREFIX_TEMPLATE.to_owned();
    }

    let renderer = globals_text(scene, "currentRenderer", layer, "")?;
    let pass_name = if channel.is_empty() { "beauty" } else { channel };
    let had_pass_token = template.contains(TOKEN_RENDER_PASS);

    let mut stem = template
        .replace(TOKEN_SCENE, scene.name())
        .replace(TOKEN_RENDER_LAYER, layer_label(layer))
        .replace(TOKEN_RENDERER, &renderer)
        .replace(TOKEN_RENDER_PASS, pass_name);

    // Templates without a pass token still need channel-distinct names.
    if !had_pass_token && !channel.is_empty() {
        stem.push('_');
        stem.push_str(channel);
    }
    Ok(stem)
}

fn frame_padding(scene: &SceneGraph, layer: &str) -> PasslineResult<usize> {
    if !scene.has_attr(RENDER_GLOBALS, "extensionPadding") {
        return Ok(4);
    }
    let padding = resolve(scene, RENDER_GLOBALS, "extensionPadding", layer)?.as_f64()?;
    Ok((padding.max(1.0)) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::builder::{NodeSpec, SceneBuilder};
    use crate::scene::model::{LAYER_MANAGER, TYPE_RENDER_LAYER};

    fn scene_with_prefix(prefix: Option<&str>) -> SceneGraph {
        let mut globals = NodeSpec::new(RENDER_GLOBALS, "renderGlobals")
            .attr("currentRenderer", "arnold")
            .attr("imageFormat", "exr")
            .attr("extensionPadding", 4.0);
        if let Some(p) = prefix {
            globals = globals.attr("imageFilePrefix", p);
        }
        SceneBuilder::new("shot010")
            .node(NodeSpec::new(LAYER_MANAGER, "renderLayerManager"))
            .unwrap()
            .node(globals)
            .unwrap()
            .render_layer(
                NodeSpec::new(DEFAULT_RENDER_LAYER, TYPE_RENDER_LAYER).attr("renderable", true),
            )
            .unwrap()
            .render_layer(NodeSpec::new("chars", TYPE_RENDER_LAYER).attr("renderable", true))
            .unwrap()
            .graph()
            .unwrap()
    }

    #[test]
    fn default_template_substitutes_scene_and_layer_label() {
        let g = scene_with_prefix(None);
        assert_eq!(
            compose_filename(&g, DEFAULT_RENDER_LAYER, "").unwrap(),
            "shot010/masterLayer/shot010_masterLayer.####.exr"
        );
        assert_eq!(
            compose_filename(&g, "chars", "").unwrap(),
            "shot010/chars/shot010_chars.####.exr"
        );
    }

    #[test]
    fn channel_appends_when_template_has_no_pass_token() {
        let g = scene_with_prefix(None);
        assert_eq!(
            compose_filename(&g, "chars", "diffuse").unwrap(),
            "shot010/chars/shot010_chars_diffuse.####.exr"
        );
    }

    #[test]
    fn pass_token_takes_the_channel_name_and_beauty_for_primary() {
        let g = scene_with_prefix(Some("<Scene>/<RenderPass>/<Scene>_<RenderLayer>"));
        assert_eq!(
            compose_filename(&g, "chars", "specular").unwrap(),
            "shot010/specular/shot010_chars.####.exr"
        );
        assert_eq!(
            compose_filename(&g, "chars", "").unwrap(),
            "shot010/beauty/shot010_chars.####.exr"
        );
    }

    #[test]
    fn prefix_resolves_per_layer_through_adjustments() {
        let g = SceneBuilder::new("shot010")
            .current_layer("chars")
            .node(NodeSpec::new(LAYER_MANAGER, "renderLayerManager"))
            .unwrap()
            .node(
                NodeSpec::new(RENDER_GLOBALS, "renderGlobals")
                    .attr("currentRenderer", "arnold")
                    .attr("imageFormat", "exr")
                    .attr("extensionPadding", 4.0)
                    .attr("imageFilePrefix", "chars_special"),
            )
            .unwrap()
            .render_layer(
                NodeSpec::new(DEFAULT_RENDER_LAYER, TYPE_RENDER_LAYER)
                    .attr("renderable", true)
                    .adjustment("defaultRenderGlobals.imageFilePrefix", "<Scene>_generic"),
            )
            .unwrap()
            .render_layer(NodeSpec::new("chars", TYPE_RENDER_LAYER).attr("renderable", true))
            .unwrap()
            .connect(
                "defaultRenderGlobals.imageFilePrefix",
                "defaultRenderLayer.adjustments[0].plug",
            )
            .unwrap()
            .graph()
            .unwrap();

        // The current layer reads the override, other layers the origin.
        assert_eq!(filename_prefix(&g, "chars").unwrap(), "chars_special");
        assert_eq!(
            filename_prefix(&g, DEFAULT_RENDER_LAYER).unwrap(),
            "shot010_generic"
        );
        assert_eq!(file_extension(&g, "chars").unwrap(), ".exr");
    }
}
