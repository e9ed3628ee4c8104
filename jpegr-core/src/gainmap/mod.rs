//! Gain map computation and application.

pub mod apply;
pub mod compute;

pub use apply::apply_gainmap;
pub use compute::{compute_gainmap, GainMapConfig};
