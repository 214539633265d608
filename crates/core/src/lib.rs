//! Pure domain logic for the mediarelay control plane.
//!
//! Nothing in this crate spawns processes or holds shared state. The
//! worker crate composes these pieces into running jobs.

pub mod alias;
pub mod artifact;
pub mod classifier;
pub mod error;
pub mod naming;
pub mod search;
pub mod tool;
pub mod types;
