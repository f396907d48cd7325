//! Scene snapshots: boundary model, path helpers, indexed queries, and a
//! construction DSL.

pub(crate) mod builder;
pub(crate) mod graph;
pub(crate) mod model;
pub(crate) mod paths;
pub(crate) mod value;
