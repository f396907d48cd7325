//! Passline resolves render-layer overrides and turns DCC scene snapshots
//! into publish instances.
//!
//! The core reads a serialized scene graph (`SceneDef`) and emits one publish
//! instance per valid render layer, with every attribute resolved *for that
//! layer* through the layer-adjustment wiring instead of by switching the
//! host's global current layer.
//!
//! # Pipeline overview
//!
//! 1. **Load**: parse and index a scene snapshot ([`SceneGraph`])
//! 2. **Seed**: turn marked object sets into pending instances
//!    ([`seed_instances`])
//! 3. **Collect**: one instance per valid render layer
//!    ([`RenderLayerCollector`]), classified by render type
//! 4. **Compose**: per-channel output paths and extraction tags for
//!    image-sequence variants ([`compose_outputs`])
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Side-effect-free resolution**: reading an attribute under any layer
//!   ([`resolve`]) never mutates the snapshot or its current-layer marker.
//! - **Deterministic output**: layer ordering, member sets, and output-path
//!   maps are reproducible for a given snapshot.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod collect;
mod config;
mod foundation;
mod layers;
mod output;
mod scene;
mod validate;

pub use collect::context::{
    CONTAINER_ID, ContextData, DISPATCH_RENDER, DISPATCH_SCRIPT, FAMILY_IMGSEQ,
    FAMILY_IMGSEQ_BATCHRENDER, FAMILY_IMGSEQ_PLAYBLAST, FAMILY_IMGSEQ_TURNTABLE, INSTANCE_ID,
    PublishContext, PublishInstance, seed_instances,
};
pub use collect::renderlayers::RenderLayerCollector;
pub use config::{AssetOverrides, ProjectConfig, TimeUnit, WorkSession};
pub use foundation::core::{FrameRange, Resolution};
pub use foundation::error::{PasslineError, PasslineResult};
pub use layers::query::{
    VisibilityOptions, duplicated_names, filter_mesh_parenting, find_by_attr, highest_ancestors,
    is_visible, is_visible_with, node_type_check, renderable_cameras, startup_cameras,
};
pub use layers::resolve::{resolve, resolve_truthy};
pub use output::filename::{compose_filename, file_extension, filename_prefix, layer_label};
pub use output::paths::{
    EXTRACT_IMAGE_SEQUENCE, EXTRACT_IMAGE_SEQUENCE_SET, OutputPaths, RENDERER_ARNOLD,
    RENDERER_VRAY, TYPE_ARNOLD_AOV, TYPE_VRAY_ELEMENT, channel_names, compose_outputs,
    extract_type,
};
pub use scene::builder::{NodeSpec, SceneBuilder};
pub use scene::graph::SceneGraph;
pub use scene::model::{
    AdjustmentDef, AttrDef, ConnectionDef, DEFAULT_RENDER_LAYER, HostInfo, LAYER_MANAGER,
    MASTER_LAYER_LABEL, NodeDef, Plug, RENDER_GLOBALS, SceneDef, TYPE_CAMERA, TYPE_JOINT,
    TYPE_MESH, TYPE_OBJECT_SET, TYPE_RENDER_LAYER, TYPE_TRANSFORM,
};
pub use scene::value::{AttrType, AttrValue};
pub use validate::{joints_hidden, versioned_cameras};
