//! Mathematical utilities: tangent-plane geometry and safe log-determinants.

pub mod basis;
pub mod linalg;

pub use basis::*;
pub use linalg::*;
