//! Application layer managing wizard state and business workflows.
//!
//! This module coordinates between the domain layer and presentation layer:
//! the wizard controller, stage submission dispatch and the notification
//! port.

pub mod notify;
pub mod state;
pub mod submitter;

pub use notify::*;
pub use state::*;
pub use submitter::*;
