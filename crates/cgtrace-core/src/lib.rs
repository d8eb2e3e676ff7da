//! # cgtrace Core Library
//!
//! A library for reconstructing side-chain geometry from reduced, alpha-carbon-only
//! representations of protein chains, and for robust rigid-body superposition of
//! corresponding 3D point sets.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (residue types,
//!   trajectories, side-chain offset templates) and the pure geometric primitives
//!   (local-frame construction, rotation decomposition).
//!
//! - **[`engine`]: The Logic Core.** Implements the numerical algorithms: per-chain
//!   side-chain reconstruction and the Kabsch superposition solver together with its
//!   iteratively reweighted, outlier-robust variant.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer. It ties
//!   `engine` and `core` together to process complete trajectories, parallelizing over
//!   independent frames where the `parallel` feature is enabled.

pub mod core;
pub mod engine;
pub mod workflows;
