//! Render-layer aware queries: attribute override resolution, visibility, and
//! camera/hierarchy helpers.

pub(crate) mod query;
pub(crate) mod resolve;
