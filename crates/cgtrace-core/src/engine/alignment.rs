use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;
use tracing::{debug, instrument, trace};

const MAX_ITERATIONS: usize = 100;

// Sentinel standing in for the previous RMSD before the first iteration.
const RMSD_SENTINEL: f64 = 1000.0;

// RMSD values at or below this floor read as exact agreement; the same value
// bounds the per-iteration RMSD change at convergence.
const RMSD_FLOOR: f64 = 0.001;

// Floor on the Gaussian reweighting denominator, preventing runaway sharpening
// once the fit becomes tight.
const MIN_SHARPNESS: f64 = 2.0;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Point sets have mismatched lengths: target {target}, query {query}")]
    LengthMismatch { target: usize, query: usize },

    #[error("Cannot align empty point sets")]
    EmptyPointSet,

    #[error("Weight count {weights} does not match point count {points}")]
    WeightsMismatch { weights: usize, points: usize },

    #[error("SVD of the cross-covariance matrix did not converge")]
    SvdFailed,

    #[error("Iterative reweighting did not converge after {iterations} iterations")]
    Convergence { iterations: usize },
}

/// Result of a robust superposition: the final weighted RMSD, the optimal
/// rotation in row-vector convention, the weighted centroids both point sets
/// were centered on, and the final per-point weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    pub rmsd: f64,
    pub rotation: Matrix3<f64>,
    pub target_centroid: Point3<f64>,
    pub query_centroid: Point3<f64>,
    pub weights: Vec<f64>,
}

fn validate(
    target: &[Point3<f64>],
    query: &[Point3<f64>],
    weights: Option<&[f64]>,
) -> Result<(), AlignmentError> {
    if target.is_empty() || query.is_empty() {
        return Err(AlignmentError::EmptyPointSet);
    }
    if target.len() != query.len() {
        return Err(AlignmentError::LengthMismatch {
            target: target.len(),
            query: query.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != target.len() {
            return Err(AlignmentError::WeightsMismatch {
                weights: w.len(),
                points: target.len(),
            });
        }
    }
    Ok(())
}

fn weighted_centroid(points: &[Point3<f64>], weights: Option<&[f64]>) -> Point3<f64> {
    match weights {
        Some(w) => {
            let total: f64 = w.iter().sum();
            let sum = points
                .iter()
                .zip(w)
                .fold(Vector3::zeros(), |acc, (p, &wi)| acc + p.coords * wi);
            Point3::from(sum / total)
        }
        None => {
            let sum = points
                .iter()
                .fold(Vector3::zeros(), |acc, p| acc + p.coords);
            Point3::from(sum / points.len() as f64)
        }
    }
}

/// Optimal least-squares rotation aligning `query` onto `target` (Kabsch).
///
/// Both sets are centered on their (optionally weighted) centroids unless
/// `concentric` states they already are. The returned matrix is a proper
/// rotation (determinant +1) in row-vector convention: `point · R` maps a
/// centered query point onto the target frame.
pub fn kabsch(
    target: &[Point3<f64>],
    query: &[Point3<f64>],
    weights: Option<&[f64]>,
    concentric: bool,
) -> Result<Matrix3<f64>, AlignmentError> {
    validate(target, query, weights)?;

    let (target_center, query_center) = if concentric {
        (Vector3::zeros(), Vector3::zeros())
    } else {
        (
            weighted_centroid(target, weights).coords,
            weighted_centroid(query, weights).coords,
        )
    };

    let mut covariance = Matrix3::zeros();
    for (i, (t, q)) in target.iter().zip(query).enumerate() {
        let weight = weights.map_or(1.0, |w| w[i]);
        let tv = t.coords - target_center;
        let qv = q.coords - query_center;
        covariance += weight * tv * qv.transpose();
    }

    let determinant = covariance.determinant();
    let svd = covariance
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or(AlignmentError::SvdFailed)?;
    let u = svd.u.ok_or(AlignmentError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(AlignmentError::SvdFailed)?;

    let mut correction = Matrix3::identity();
    if determinant < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    Ok(v_t.transpose() * correction * u.transpose())
}

/// Weighted root-mean-square displacement between corresponding points.
///
/// Values at or below the floor of 0.001 report as exactly 0, treating
/// sub-epsilon residue as exact agreement.
pub fn rmsd(
    target: &[Point3<f64>],
    query: &[Point3<f64>],
    weights: Option<&[f64]>,
) -> Result<f64, AlignmentError> {
    validate(target, query, weights)?;
    let displacements: Vec<Vector3<f64>> =
        query.iter().zip(target).map(|(q, t)| q - t).collect();
    Ok(displacement_rmsd(&displacements, weights))
}

fn displacement_rmsd(displacements: &[Vector3<f64>], weights: Option<&[f64]>) -> f64 {
    let (sum, total) = match weights {
        Some(w) => displacements
            .iter()
            .zip(w)
            .fold((0.0, 0.0), |(s, t), (d, &wi)| {
                (s + wi * d.norm_squared(), t + wi)
            }),
        None => (
            displacements.iter().map(|d| d.norm_squared()).sum(),
            displacements.len() as f64,
        ),
    };
    let value = (sum / total).sqrt();
    if value > RMSD_FLOOR { value } else { 0.0 }
}

/// Iteratively reweighted superposition, robust to a minority of outlier
/// point-pairs.
///
/// Repeats weighted centering and [`kabsch`], Gaussian-downweighting
/// high-residual pairs between iterations, until the weighted RMSD stabilizes.
/// On convergence the reported RMSD is the previous iteration's value while the
/// rotation, centroids, and weights come from the current one.
#[instrument(skip_all, fields(points = target.len()))]
pub fn dynamic_kabsch(
    target: &[Point3<f64>],
    query: &[Point3<f64>],
) -> Result<Superposition, AlignmentError> {
    reweighted_superposition(target, query, MAX_ITERATIONS)
}

fn reweighted_superposition(
    target: &[Point3<f64>],
    query: &[Point3<f64>],
    max_iterations: usize,
) -> Result<Superposition, AlignmentError> {
    validate(target, query, None)?;

    let mut weights = vec![1.0; target.len()];
    let mut previous = RMSD_SENTINEL;

    for iteration in 0..max_iterations {
        let target_centroid = weighted_centroid(target, Some(&weights));
        let query_centroid = weighted_centroid(query, Some(&weights));
        let centered_target: Vec<Point3<f64>> = target
            .iter()
            .map(|p| Point3::from(p - target_centroid))
            .collect();
        let centered_query: Vec<Point3<f64>> = query
            .iter()
            .map(|p| Point3::from(p - query_centroid))
            .collect();

        let rotation = kabsch(&centered_target, &centered_query, Some(&weights), true)?;

        let residuals: Vec<Vector3<f64>> = centered_query
            .iter()
            .zip(&centered_target)
            .map(|(q, t)| rotation.tr_mul(&q.coords) - t.coords)
            .collect();
        let current = displacement_rmsd(&residuals, Some(&weights));

        if (current - previous).abs() < RMSD_FLOOR {
            debug!(iteration, rmsd = previous, "reweighted superposition converged");
            return Ok(Superposition {
                rmsd: previous,
                rotation,
                target_centroid,
                query_centroid,
                weights,
            });
        }

        previous = current;
        let sharpness = previous.max(MIN_SHARPNESS);
        for (weight, residual) in weights.iter_mut().zip(&residuals) {
            *weight = (-residual.norm_squared() / sharpness).exp();
        }
        trace!(iteration, rmsd = current, "reweighted superposition step");
    }

    Err(AlignmentError::Convergence {
        iterations: max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn apply(rotation: &Matrix3<f64>, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(rotation.tr_mul(&point.coords))
    }

    fn random_cloud(n: usize, seed: u64) -> Vec<Point3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                )
            })
            .collect()
    }

    // Row-convention rotation matrices about the principal axes.
    fn rotation_about_z(angle: f64) -> Matrix3<f64> {
        Matrix3::new(
            angle.cos(),
            angle.sin(),
            0.0,
            -angle.sin(),
            angle.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    fn rotation_about_x(angle: f64) -> Matrix3<f64> {
        Matrix3::new(
            1.0,
            0.0,
            0.0,
            0.0,
            angle.cos(),
            angle.sin(),
            0.0,
            -angle.sin(),
            angle.cos(),
        )
    }

    #[test]
    fn kabsch_of_a_set_onto_itself_is_the_identity() {
        let points = random_cloud(12, 7);

        let rotation = kabsch(&points, &points, None, false).unwrap();

        assert!((rotation - Matrix3::identity()).norm() <= 1e-9);
        assert_eq!(rmsd(&points, &points, None).unwrap(), 0.0);
    }

    #[test]
    fn kabsch_recovers_a_known_rotation() {
        let query = random_cloud(15, 11);
        let expected = rotation_about_z(0.7) * rotation_about_x(-0.3);
        let target: Vec<Point3<f64>> = query.iter().map(|q| apply(&expected, q)).collect();

        let rotation = kabsch(&target, &query, None, false).unwrap();

        assert!((rotation - expected).norm() <= 1e-9);
        for (t, q) in target.iter().zip(&query) {
            assert!((apply(&rotation, q) - t).norm() <= 1e-9);
        }
    }

    #[test]
    fn kabsch_is_invariant_to_uniform_weight_rescaling() {
        let query = random_cloud(10, 3);
        let expected = rotation_about_x(1.1);
        let target: Vec<Point3<f64>> = query.iter().map(|q| apply(&expected, q)).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let weights: Vec<f64> = (0..query.len()).map(|_| rng.gen_range(0.1..1.0)).collect();
        let scaled: Vec<f64> = weights.iter().map(|w| w * 3.7).collect();

        let base = kabsch(&target, &query, Some(&weights), false).unwrap();
        let rescaled = kabsch(&target, &query, Some(&scaled), false).unwrap();

        assert!((base - rescaled).norm() <= 1e-12);
    }

    #[test]
    fn kabsch_never_returns_a_reflection() {
        let query = random_cloud(9, 23);
        // Mirroring one axis makes the naive SVD solution improper.
        let target: Vec<Point3<f64>> = query
            .iter()
            .map(|q| Point3::new(-q.x, q.y, q.z))
            .collect();

        let rotation = kabsch(&target, &query, None, false).unwrap();

        assert!((rotation.determinant() - 1.0).abs() <= 1e-9);
    }

    #[test]
    fn kabsch_rejects_invalid_input() {
        let points = random_cloud(4, 1);
        let shorter = random_cloud(3, 2);
        let weights = [1.0, 1.0];

        assert!(matches!(
            kabsch(&[], &[], None, false),
            Err(AlignmentError::EmptyPointSet)
        ));
        assert!(matches!(
            kabsch(&points, &shorter, None, false),
            Err(AlignmentError::LengthMismatch {
                target: 4,
                query: 3
            })
        ));
        assert!(matches!(
            kabsch(&points, &points, Some(&weights), false),
            Err(AlignmentError::WeightsMismatch {
                weights: 2,
                points: 4
            })
        ));
    }

    #[test]
    fn rmsd_matches_a_hand_computed_value() {
        let target = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let query = vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0)];

        let value = rmsd(&target, &query, None).unwrap();

        assert!((value - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn rmsd_weights_shift_the_average() {
        let target = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)];
        let query = vec![Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let weights = [3.0, 1.0];

        let value = rmsd(&target, &query, Some(&weights)).unwrap();

        // sqrt((3*1 + 1*4) / 4)
        assert!((value - (7.0f64 / 4.0).sqrt()).abs() <= 1e-12);
    }

    #[test]
    fn rmsd_below_the_floor_reports_exact_agreement() {
        let target = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let query = vec![
            Point3::new(1e-5, 0.0, 0.0),
            Point3::new(1.0, 1e-5, 0.0),
        ];

        assert_eq!(rmsd(&target, &query, None).unwrap(), 0.0);
    }

    #[test]
    fn dynamic_kabsch_on_identical_sets_converges_to_zero_and_identity() {
        let points = random_cloud(10, 5);

        let result = dynamic_kabsch(&points, &points).unwrap();

        assert_eq!(result.rmsd, 0.0);
        assert!((result.rotation - Matrix3::identity()).norm() <= 1e-9);
        assert!((result.target_centroid - result.query_centroid).norm() <= 1e-12);
        assert!(result.weights.iter().all(|&w| (w - 1.0).abs() <= 1e-12));
    }

    #[test]
    fn dynamic_kabsch_downweights_outliers() {
        let query = random_cloud(10, 17);
        let expected = rotation_about_z(0.45) * rotation_about_x(0.25);
        let mut target: Vec<Point3<f64>> = query.iter().map(|q| apply(&expected, q)).collect();
        // One pair far off the consensus motion.
        target[9] += Vector3::new(8.0, -6.0, 5.0);

        let plain = kabsch(&target, &query, None, false).unwrap();
        let robust = dynamic_kabsch(&target, &query).unwrap();

        let plain_error = (plain - expected).norm();
        let robust_error = (robust.rotation - expected).norm();
        assert!(
            robust_error < plain_error,
            "robust {robust_error} vs plain {plain_error}"
        );

        let outlier_weight = robust.weights[9];
        let consensus_floor = robust.weights[..9]
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);
        assert!(
            outlier_weight < consensus_floor,
            "outlier {outlier_weight} vs consensus floor {consensus_floor}"
        );
    }

    #[test]
    fn exhausting_the_iteration_budget_fails_with_convergence_error() {
        let query = random_cloud(8, 29);
        let target: Vec<Point3<f64>> = query
            .iter()
            .map(|q| apply(&rotation_about_z(1.2), q))
            .collect();

        // A budget of one iteration cannot satisfy the convergence check for
        // any input whose first RMSD differs from the sentinel.
        let result = reweighted_superposition(&target, &query, 1);

        assert!(matches!(
            result,
            Err(AlignmentError::Convergence { iterations: 1 })
        ));
    }
}
