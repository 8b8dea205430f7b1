pub mod db;
pub mod error;
pub mod format;
pub mod store;
pub mod types;

pub use error::TokenscanError;
pub use types::*;
