//! Vision analysis: capability extraction and its short-TTL cache.

pub mod cache;
pub mod capabilities;

pub use cache::VisionCache;
pub use capabilities::extract_capabilities;
