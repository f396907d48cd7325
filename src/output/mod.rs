//! Render-output composition: filename templating and per-channel path maps.

pub(crate) mod filename;
pub(crate) mod paths;
