//! Per-star linear observation models.
//!
//! Each star becomes a small linear-Gaussian system in a latent Cartesian
//! velocity; the evidence code only relies on the `LinearModel` shape contract.

pub mod observation;

pub use observation::*;
