//! Color math: transfer functions, RGB ↔ YCbCr conversions, tone mapping.

pub mod convert;
pub mod tonemap;
pub mod transfer;

pub use convert::*;
pub use tonemap::*;
pub use transfer::*;
