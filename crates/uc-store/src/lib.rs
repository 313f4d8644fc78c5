pub mod export;
pub mod sqlite;

pub use export::*;
pub use sqlite::*;
