//! FFmpeg CLI wrapper for the VodPipe pipeline.
//!
//! Codec internals are out of scope for the pipeline core; this crate
//! exposes the three opaque operations it needs: audio extraction, frame
//! grabbing and probing.

pub mod error;
pub mod toolkit;

pub use error::{MediaError, MediaResult};
pub use toolkit::MediaToolkit;
