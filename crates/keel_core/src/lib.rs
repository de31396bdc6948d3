//! Keel Core - foundational primitives shared by all engine crates.
//!
//! Currently this is the generational handle system: cheap, copyable,
//! type-safe references into arena storage with use-after-free detection.

pub mod handle;

pub use handle::{Arena, Handle};
