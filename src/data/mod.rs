//! Synthetic inputs for tests and the `simulate` subcommand.

pub mod sample;

pub use sample::*;
