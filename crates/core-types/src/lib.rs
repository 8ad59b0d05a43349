pub mod error;
pub mod symbol;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use symbol::{Market, Symbol};
pub use types::*;
