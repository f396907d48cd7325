use crate::foundation::error::{PasslineError, PasslineResult};
use crate::scene::graph::SceneGraph;
use crate::scene::model::{DEFAULT_RENDER_LAYER, Plug, TYPE_RENDER_LAYER};
use crate::scene::value::AttrValue;

/// Effective value of `node.attr` under `layer`, without switching the
/// scene's current layer.
///
/// Render layers store their overrides as `adjustments[i]` slots wired to the
/// overridden plug. While another layer is current, the default layer's slot
/// holds the attribute's origin (master) value and the overriding layer's slot
/// holds the override; a plain read returns whatever the current layer shows.
/// This walks the adjustment wiring instead:
///
/// - `layer` is current: plain read.
/// - `layer` has an adjustment on the plug: that value wins, immediately.
/// - Otherwise a default-layer adjustment (override active elsewhere) yields
///   the origin value; failing that, the plain read stands.
///
/// Adjustment payloads are stored untyped and get re-typed against the
/// attribute's declared type; opaque declarations pass through raw.
pub fn resolve(
    scene: &SceneGraph,
    node: &str,
    attr: &str,
    layer: &str,
) -> PasslineResult<AttrValue> {
    if scene.node_type(layer) != Some(TYPE_RENDER_LAYER) {
        return Err(PasslineError::not_found(format!("render layer '{layer}'")));
    }

    let Some((stored, ty)) = scene.attr_entry(node, attr) else {
        return Err(PasslineError::not_found(format!("attribute '{node}.{attr}'")));
    };

    if layer == scene.current_layer() {
        return Ok(stored.clone());
    }

    let adjustment_value = |plug: Plug<'_>| -> Option<&AttrValue> {
        let slot = plug.index()?;
        Some(&scene.node(plug.node)?.adjustments.get(slot)?.value)
    };

    let mut origin: Option<&AttrValue> = None;
    for conn in scene.connections_from(node, attr) {
        let Some(dst) = Plug::parse(&conn.dst) else {
            continue;
        };
        if dst.root_attr() != "adjustments" {
            continue;
        }
        if dst.node == DEFAULT_RENDER_LAYER {
            origin = adjustment_value(dst);
            continue;
        }
        if dst.node == layer
            && let Some(raw) = adjustment_value(dst)
        {
            return raw.coerce(ty);
        }
    }

    if let Some(raw) = origin {
        return raw.coerce(ty);
    }

    Ok(stored.clone())
}

/// [`resolve`] reduced to host truthiness.
pub fn resolve_truthy(
    scene: &SceneGraph,
    node: &str,
    attr: &str,
    layer: &str,
) -> PasslineResult<bool> {
    Ok(resolve(scene, node, attr, layer)?.truthy())
}
