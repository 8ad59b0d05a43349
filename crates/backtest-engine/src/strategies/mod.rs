//! Shipped strategies (spec.md §4.6).

pub mod ma_cross;
pub mod vcp_breakout;

pub use ma_cross::MaCrossStrategy;
pub use vcp_breakout::VcpBreakoutStrategy;
