//! Command handlers grouped by concern.

pub(crate) mod definitions;
pub(crate) mod snapshot;
