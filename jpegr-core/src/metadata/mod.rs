//! Metadata transport: hdrgm XMP packets and Multi-Picture Format boxes.

pub mod mpf;
pub mod xmp;

/// File format version written into every XMP packet.
pub const VERSION: &str = "1.0";
