//! Disk layout synthesis for database VMs
//!
//! Everything here is pure and deterministic: the same sizes and datastore
//! plan always give the same disks, tags and device labels.

pub mod baseline;
pub mod descriptor;
pub mod device;
pub mod synthesizer;

pub use baseline::baseline;
pub use descriptor::*;
pub use device::device_label;
pub use synthesizer::{chunk, compose, compose_with, dump, resize, ChunkedGroup};
