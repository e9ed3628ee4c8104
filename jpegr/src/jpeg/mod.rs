//! JPEG container plumbing: segment scanning and assembly, ICC transport,
//! and the entropy codec seam.

pub mod codec;
pub mod icc;
pub mod markers;
