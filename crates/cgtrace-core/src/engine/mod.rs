//! # Engine Module
//!
//! Numerical algorithms operating on the core data models:
//!
//! - **Side-Chain Reconstruction** ([`reconstruction`]) - Rebuilds one pseudo-atom
//!   per residue from an alpha-carbon trace by blending per-residue offset
//!   templates in a backbone-local frame
//! - **Structural Alignment** ([`alignment`]) - The Kabsch optimal-rotation solver,
//!   weighted RMSD, and the iteratively reweighted, outlier-robust superposition

pub mod alignment;
pub mod reconstruction;
