//! Admission Wizard Library
//!
//! An eight-stage membership admission wizard with durable local drafts,
//! per-stage validation and idempotent stage submission to a backend.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
