//! Publish-context synthesis: placeholder seeding and per-layer collection.

pub(crate) mod context;
pub(crate) mod renderlayers;
