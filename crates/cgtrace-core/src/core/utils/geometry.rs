use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Outer backbone anchors coincide: the c1-c3 span has zero length")]
    ZeroSpan,
    #[error("Backbone anchors are collinear: the bisector at c2 has zero length")]
    ZeroBisector,
}

/// Local coordinate basis anchored at the middle of three consecutive backbone
/// points, plus the c1-c3 span.
///
/// The span doubles as the conformational-state signal downstream: short spans
/// indicate compact (helix-like) backbone geometry, long spans extended
/// (strand-like) geometry.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    pub x: Vector3<f64>,
    pub y: Vector3<f64>,
    pub z: Vector3<f64>,
    pub span: f64,
}

/// Builds the local basis for `c2` from the consecutive backbone anchors
/// `c1`, `c2`, `c3`.
pub fn build_local_frame(
    c1: &Point3<f64>,
    c2: &Point3<f64>,
    c3: &Point3<f64>,
) -> Result<LocalFrame, GeometryError> {
    let span_vec = c3 - c1;
    let span = span_vec.norm();
    if span <= f64::EPSILON {
        return Err(GeometryError::ZeroSpan);
    }

    let bisector = (c3 - c2) + (c1 - c2);
    let bisector_norm = bisector.norm();
    if bisector_norm <= f64::EPSILON {
        return Err(GeometryError::ZeroBisector);
    }

    let z = -bisector / bisector_norm;
    let x = span_vec / span;
    let y = z.cross(&x);

    Ok(LocalFrame { x, y, z, span })
}

// Cosine and sine of the axis-oriented angle between two unit vectors.
fn axis_trig(a: &Vector3<f64>, b: &Vector3<f64>, axis: &Vector3<f64>) -> (f64, f64) {
    let cos = a.dot(b);
    let perp = a.cross(b);
    let orientation = perp.dot(axis);
    let sign = if orientation > 0.0 {
        1.0
    } else if orientation < 0.0 {
        -1.0
    } else {
        0.0
    };
    (cos, perp.norm() * sign)
}

/// Builds the rotation taking the canonical world frame into the local frame of
/// `c2`, decomposed through the z-x-z Euler angles about the line of nodes.
///
/// Returns the matrix in row-vector convention (`local · R` yields world
/// coordinates) together with the c1-c3 span.
pub fn build_rotation_matrix(
    c1: &Point3<f64>,
    c2: &Point3<f64>,
    c3: &Point3<f64>,
) -> Result<(Matrix3<f64>, f64), GeometryError> {
    let frame = build_local_frame(c1, c2, c3)?;
    let world_x = Vector3::x();
    let world_z = Vector3::z();

    // Line of nodes: the direction left unchanged when world z rotates onto
    // local z. When local z is parallel to world z the cross product vanishes
    // and any in-plane direction serves; local x keeps reconstruction running
    // through straight backbone stretches.
    let node_cross = world_z.cross(&frame.z);
    let node_norm = node_cross.norm();
    let nodes = if node_norm <= f64::EPSILON {
        frame.x
    } else {
        node_cross / node_norm
    };

    // phi: rotation around world z taking world x onto the line of nodes.
    let (cos_phi, sin_phi) = axis_trig(&world_x, &nodes, &world_z);
    // psi: rotation around local z taking the line of nodes onto local x.
    let (cos_psi, sin_psi) = axis_trig(&nodes, &frame.x, &frame.z);
    // theta: rotation around the line of nodes taking world z onto local z.
    let (cos_theta, sin_theta) = axis_trig(&world_z, &frame.z, &nodes);

    let rotation = Matrix3::new(
        cos_psi * cos_phi - sin_psi * sin_phi * cos_theta,
        sin_phi * cos_psi + sin_psi * cos_theta * cos_phi,
        sin_psi * sin_theta,
        -sin_psi * cos_phi - sin_phi * cos_psi * cos_theta,
        -sin_psi * sin_phi + cos_psi * cos_theta * cos_phi,
        cos_psi * sin_theta,
        sin_theta * sin_phi,
        -sin_theta * cos_phi,
        cos_theta,
    );

    Ok((rotation, frame.span))
}
