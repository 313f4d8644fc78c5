mod aggregate;
mod error;
mod evaluation;
mod memory_store;
mod metrics;
mod ports;
mod scorer;
mod thresholds;
mod types;

pub use aggregate::*;
pub use error::*;
pub use evaluation::*;
pub use memory_store::*;
pub use metrics::*;
pub use ports::*;
pub use scorer::*;
pub use thresholds::*;
pub use types::*;
