pub mod comparison;
pub mod config;
pub mod error;
pub mod export;

pub use comparison::*;
pub use config::*;
pub use error::*;
pub use export::*;
