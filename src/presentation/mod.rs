//! Presentation layer handling terminal UI and user input.
//!
//! This module manages the terminal user interface using ratatui,
//! handles keyboard input, and renders the current wizard stage.

pub mod form;
pub mod input;
pub mod ui;

pub use form::*;
pub use input::*;
pub use ui::*;
