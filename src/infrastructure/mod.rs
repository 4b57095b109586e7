//! Infrastructure layer providing external service integrations.
//!
//! Draft persistence, the stage backend (HTTP and in-memory), attachment
//! previews, configuration and log setup.

pub mod backend;
pub mod config;
pub mod fake_backend;
pub mod logging;
pub mod persistence;
pub mod previews;

pub use backend::*;
pub use config::{ConfigError, WizardConfig};
pub use fake_backend::*;
pub use persistence::*;
pub use previews::*;
