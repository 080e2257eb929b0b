//! `comove` library crate.
//!
//! Bayesian evidence that two stars with noisy astrometry share one 3D space
//! velocity (H1) rather than having independent velocities (H2), at given
//! trial distances. The binary (`comove`) is a thin driver around this library:
//!
//! - `math`: tangent-plane basis on the sky, safe log-determinants
//! - `models`: per-star linear observation model at a trial distance
//! - `evidence`: analytic velocity marginalization and the H1/H2 evaluator
//! - `data`, `io`, `app`, `cli`: synthetic pairs, JSON files, driver

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod evidence;
pub mod io;
pub mod math;
pub mod models;
