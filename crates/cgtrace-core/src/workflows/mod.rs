//! # Workflows Module
//!
//! The highest-level, user-facing layer: complete procedures tying the `core`
//! data models and `engine` algorithms together.
//!
//! - **Trajectory Reconstruction** ([`rebuild`]) - Applies per-chain side-chain
//!   reconstruction across every frame of a trajectory, in parallel where the
//!   `parallel` feature is enabled

pub mod rebuild;
