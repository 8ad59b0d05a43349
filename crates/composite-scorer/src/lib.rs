//! C12 Composite Scorer (spec.md §4.8): combines indicator and pattern
//! outputs over a recent bar window into one symbol-level rating.

pub mod models;
pub mod scorer;
pub mod subscores;

pub use models::{CompositeConfig, CompositeScore, ExternalSignals, Rating, SubScores, Weights};
pub use scorer::score_symbol;
