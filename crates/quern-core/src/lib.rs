pub mod config;
pub mod error;
pub mod types;

pub use config::QuernConfig;
pub use error::{QuernError, Result};
pub use types::InboundEvent;
