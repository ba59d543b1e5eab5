//! Request extractors with client-friendly rejections.
//!
//! - [`Json`] - JSON deserialization that rejects with the API error body

mod json;

pub use json::Json;
