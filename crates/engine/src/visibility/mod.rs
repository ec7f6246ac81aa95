//! The auto-visibility calculator and its scene-facing analyzer.

pub mod analyzer;
pub mod calculator;

pub use analyzer::PairAnalyzer;
pub use calculator::{visibility, PairInput, VisibilityOutcome};
