pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::ParlorConfig;
pub use error::{ParlorError, Result};
pub use events::ChatEvent;
pub use types::*;
