//! Input/output helpers.
//!
//! - candidate-pair JSON read/write (`pairs`)
//! - per-pair evidence export (`export`)

pub mod export;
pub mod pairs;

pub use export::*;
pub use pairs::*;
