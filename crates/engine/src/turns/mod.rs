//! Turn lifecycle for the Sneaky feat family.

pub mod tracker;

pub use tracker::{
    DeferredCheck, DeferredResolution, SneakOutcomeRecord, TurnSneakTracker, TurnStamp,
};
