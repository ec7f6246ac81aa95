//! The feat engine: slug-keyed rule overrides behind five fixed hooks.

pub mod handlers;
pub mod registry;

pub use registry::{FeatFacts, FeatHandler, FeatRegistry, Prerequisites, SpeedAdjustment};
