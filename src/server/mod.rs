/// Read-only HTTP file server over stored binary records.
///
/// This module provides the [`FileServer`] which maps request paths to keys
/// and returns the stored bytes with a guessed content type.
pub mod router;

pub use router::{content_type, file_key, FileServer};
