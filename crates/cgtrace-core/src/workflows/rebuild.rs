use crate::core::models::residue::ResidueType;
use crate::core::models::trajectory::{Frame, Trajectory};
use crate::core::templates::SidechainTemplates;
use crate::engine::reconstruction::{self, ReconstructionError};
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Rebuilds side-chain traces for every chain of every frame.
///
/// `sequences` supplies one residue sequence per chain, in chain order, shared
/// by all frames; `None` places every residue with the placeholder template
/// (see [`reconstruction::reconstruct_chain`]). The output trajectory has
/// identical frame and chain cardinality and ordering.
///
/// Frames are mutually independent; with the `parallel` feature they are
/// processed by a worker pool and reassembled in input order.
#[instrument(skip_all, name = "trajectory_rebuild", fields(frames = trajectory.frame_count()))]
pub fn reconstruct_trajectory(
    trajectory: &Trajectory,
    sequences: Option<&[Vec<ResidueType>]>,
    templates: &SidechainTemplates,
) -> Result<Trajectory, ReconstructionError> {
    #[cfg(feature = "parallel")]
    let frames = trajectory
        .frames
        .par_iter()
        .enumerate()
        .map(|(index, frame)| rebuild_frame(index, frame, sequences, templates))
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let frames = trajectory
        .frames
        .iter()
        .enumerate()
        .map(|(index, frame)| rebuild_frame(index, frame, sequences, templates))
        .collect::<Result<Vec<_>, _>>()?;

    info!(frames = frames.len(), "trajectory reconstruction finished");
    Ok(Trajectory::new(frames))
}

fn rebuild_frame(
    index: usize,
    frame: &Frame,
    sequences: Option<&[Vec<ResidueType>]>,
    templates: &SidechainTemplates,
) -> Result<Frame, ReconstructionError> {
    if let Some(seqs) = sequences {
        if seqs.len() != frame.chain_count() {
            return Err(ReconstructionError::ChainCountMismatch {
                frame: index,
                chains: frame.chain_count(),
                sequences: seqs.len(),
            });
        }
    }

    let chains = frame
        .chains
        .iter()
        .enumerate()
        .map(|(chain_index, backbone)| {
            let residues = sequences.map(|seqs| seqs[chain_index].as_slice());
            reconstruction::reconstruct_chain(backbone, residues, templates)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Frame::new(chains))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn helix_backbone(n: usize, shift: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let turn = (i as f64) * 100.0_f64.to_radians();
                Point3::new(2.3 * turn.cos() + shift, 2.3 * turn.sin(), 1.5 * i as f64)
            })
            .collect()
    }

    fn two_frame_trajectory() -> Trajectory {
        Trajectory::new(vec![
            Frame::new(vec![helix_backbone(5, 0.0), helix_backbone(4, 20.0)]),
            Frame::new(vec![helix_backbone(5, 1.0), helix_backbone(4, 21.0)]),
        ])
    }

    fn sequences() -> Vec<Vec<ResidueType>> {
        vec![
            vec![ResidueType::Lysine; 5],
            vec![ResidueType::Serine; 4],
        ]
    }

    #[test]
    fn preserves_frame_and_chain_cardinality_and_order() {
        let templates = SidechainTemplates::default();
        let trajectory = two_frame_trajectory();
        let sequences = sequences();

        let rebuilt =
            reconstruct_trajectory(&trajectory, Some(&sequences), &templates).unwrap();

        assert_eq!(rebuilt.frame_count(), 2);
        for frame in &rebuilt.frames {
            assert_eq!(frame.chain_count(), 2);
            assert_eq!(frame.chains[0].len(), 5);
            assert_eq!(frame.chains[1].len(), 4);
        }
    }

    #[test]
    fn matches_per_chain_reconstruction() {
        let templates = SidechainTemplates::default();
        let trajectory = two_frame_trajectory();
        let sequences = sequences();

        let rebuilt =
            reconstruct_trajectory(&trajectory, Some(&sequences), &templates).unwrap();

        for (frame, rebuilt_frame) in trajectory.frames.iter().zip(&rebuilt.frames) {
            for (chain_index, backbone) in frame.chains.iter().enumerate() {
                let expected = reconstruction::reconstruct_chain(
                    backbone,
                    Some(&sequences[chain_index]),
                    &templates,
                )
                .unwrap();
                assert_eq!(rebuilt_frame.chains[chain_index], expected);
            }
        }
    }

    #[test]
    fn runs_without_sequences_in_placeholder_mode() {
        let templates = SidechainTemplates::default();
        let trajectory = two_frame_trajectory();

        let rebuilt = reconstruct_trajectory(&trajectory, None, &templates).unwrap();

        assert_eq!(rebuilt.frame_count(), 2);
    }

    #[test]
    fn empty_trajectory_rebuilds_to_empty() {
        let templates = SidechainTemplates::default();

        let rebuilt =
            reconstruct_trajectory(&Trajectory::default(), None, &templates).unwrap();

        assert!(rebuilt.is_empty());
    }

    #[test]
    fn rejects_chain_count_mismatch() {
        let templates = SidechainTemplates::default();
        let trajectory = two_frame_trajectory();
        let one_sequence = vec![vec![ResidueType::Lysine; 5]];

        let result = reconstruct_trajectory(&trajectory, Some(&one_sequence), &templates);

        assert!(matches!(
            result,
            Err(ReconstructionError::ChainCountMismatch {
                chains: 2,
                sequences: 1,
                ..
            })
        ));
    }

    #[test]
    fn propagates_degenerate_chain_geometry() {
        let templates = SidechainTemplates::default();
        let point = Point3::new(0.0, 0.0, 0.0);
        let trajectory = Trajectory::new(vec![Frame::new(vec![vec![point, point, point]])]);

        let result = reconstruct_trajectory(&trajectory, None, &templates);

        assert!(matches!(
            result,
            Err(ReconstructionError::Geometry { .. })
        ));
    }
}
