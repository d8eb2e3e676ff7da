use crate::core::models::residue::ResidueType;
use crate::core::templates::SidechainTemplates;
use crate::core::utils::geometry::{self, GeometryError};
use nalgebra::Point3;
use thiserror::Error;

// Span thresholds (in the input distance unit, ångströms in practice) bounding
// the compact-to-extended blend window.
const COMPACT_SPAN: f64 = 5.3;
const EXTENDED_SPAN: f64 = 6.4;
const SPAN_RANGE: f64 = 1.1;

// Residue identity used when reconstruction runs without a sequence; alanine
// offsets approximate a bare beta carbon.
const PLACEHOLDER_RESIDUE: ResidueType = ResidueType::Alanine;

#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("Backbone of {found} points is too short to build local frames; at least 3 are required")]
    ChainTooShort { found: usize },

    #[error("Residue sequence length {residues} does not match backbone length {backbone}")]
    SequenceMismatch { residues: usize, backbone: usize },

    #[error("No side-chain template for residue type {residue_type}")]
    MissingTemplate { residue_type: ResidueType },

    #[error("Frame {frame} has {chains} chains but {sequences} residue sequences were supplied")]
    ChainCountMismatch {
        frame: usize,
        chains: usize,
        sequences: usize,
    },

    #[error("Degenerate backbone geometry: {source}")]
    Geometry {
        #[from]
        source: GeometryError,
    },
}

/// Blend weight between the compact and extended offset templates as a function
/// of the c1-c3 span.
///
/// 1.0 below the compact threshold, 0.0 above the extended threshold, linear in
/// between. A continuous proxy for local secondary-structure compactness; no
/// explicit classification is performed.
pub fn scatter_coefficient(span: f64) -> f64 {
    if span <= COMPACT_SPAN {
        return 1.0;
    }
    if span >= EXTENDED_SPAN {
        return 0.0;
    }
    (span - COMPACT_SPAN) * (-1.0 / SPAN_RANGE) + 1.0
}

/// Rebuilds one side-chain pseudo-atom per residue of an alpha-carbon trace.
///
/// The trace is padded with a ghost anchor extrapolated past each terminus so
/// every real residue has a complete triplet. Per residue, the local rotation
/// and span select a blend of the residue's compact and extended offsets, which
/// is mapped into world coordinates relative to its own alpha carbon.
///
/// `residues` selects placement identity: `Some` uses the real sequence (one
/// type per backbone point), `None` places every residue with the placeholder
/// alanine template, yielding a beta-carbon trace.
pub fn reconstruct_chain(
    backbone: &[Point3<f64>],
    residues: Option<&[ResidueType]>,
    templates: &SidechainTemplates,
) -> Result<Vec<Point3<f64>>, ReconstructionError> {
    let n = backbone.len();
    if n < 3 {
        return Err(ReconstructionError::ChainTooShort { found: n });
    }
    if let Some(sequence) = residues {
        if sequence.len() != n {
            return Err(ReconstructionError::SequenceMismatch {
                residues: sequence.len(),
                backbone: n,
            });
        }
    }

    let ghost_start = backbone[0] - (backbone[2] - backbone[1]);
    let ghost_end = backbone[n - 1] + (backbone[n - 2] - backbone[n - 3]);

    let mut padded = Vec::with_capacity(n + 2);
    padded.push(ghost_start);
    padded.extend_from_slice(backbone);
    padded.push(ghost_end);

    let mut rebuilt = Vec::with_capacity(n);
    for i in 0..n {
        let (rotation, span) =
            geometry::build_rotation_matrix(&padded[i], &padded[i + 1], &padded[i + 2])?;
        let coefficient = scatter_coefficient(span);

        let residue = residues.map_or(PLACEHOLDER_RESIDUE, |sequence| sequence[i]);
        let offsets = templates
            .get(residue)
            .ok_or(ReconstructionError::MissingTemplate {
                residue_type: residue,
            })?;

        let local = offsets.compact * coefficient + offsets.extended * (1.0 - coefficient);
        rebuilt.push(padded[i + 1] + rotation.tr_mul(&local));
    }

    Ok(rebuilt)
}
