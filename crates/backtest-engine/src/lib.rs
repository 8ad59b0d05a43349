pub mod benchmark;
pub mod engine;
pub mod metrics;
pub mod models;
pub mod strategies;
pub mod walk_forward;

pub use benchmark::compare_to_benchmark;
pub use engine::BacktestEngine;
pub use models::*;
pub use strategies::{MaCrossStrategy, VcpBreakoutStrategy};
pub use walk_forward::run_walk_forward;
