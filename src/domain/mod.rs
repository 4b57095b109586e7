pub mod models;
pub mod record;
pub mod validation;
pub mod merge;
pub mod errors;

pub use models::*;
pub use record::*;
pub use validation::*;
pub use merge::*;
pub use errors::*;
