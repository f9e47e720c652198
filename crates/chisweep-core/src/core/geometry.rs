use nalgebra::{Matrix4, Point3, Vector3};

/// Threshold below which the local z-axis is considered parallel to the
/// global z-axis during Euler extraction (machine epsilon, 2⁻⁵²).
pub const GIMBAL_EPSILON: f64 = f64::EPSILON;

#[inline]
pub fn distance_squared(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm_squared()
}

#[inline]
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// Returns the angle at `b` formed by `a-b-c`, in radians within [0, π].
///
/// Callers must guarantee non-coincident atoms; zero-length bond vectors
/// yield NaN.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = (a - b).normalize();
    let bc = (c - b).normalize();
    ba.dot(&bc).clamp(-1.0, 1.0).acos()
}

/// Returns the torsion angle of the `a-b-c-d` chain about the `b-c` axis,
/// in radians within (−π, π].
///
/// The sign follows the IUPAC convention: positive for a right-handed
/// rotation of `d` about `b→c` when looking from `b` toward `c`.
pub fn dihedral_angle(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let m = n1.cross(&b2.normalize());

    let x = n1.dot(&n2);
    let y = m.dot(&n2);
    y.atan2(x)
}

/// A right-handed orthonormal basis attached to three reference points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefFrame {
    pub x: Vector3<f64>,
    pub y: Vector3<f64>,
    pub z: Vector3<f64>,
}

/// Builds the local frame with ẑ along `mid→up` and x̂ perpendicular to
/// the plane spanned by `mid→up` and `mid→side`.
pub fn create_ref_frame(
    mid: &Point3<f64>,
    up: &Point3<f64>,
    side: &Point3<f64>,
) -> RefFrame {
    let z = (up - mid).normalize();
    let w = side - mid;
    let x = z.cross(&w).normalize();
    let y = z.cross(&x);
    RefFrame { x, y, z }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Extracts the angles (α, β, γ) such that `Rz(γ)·Ry(β)·Rz(α)` rotates the
/// local frame onto the global frame.
///
/// When the projection of the local ẑ onto the global xy plane is below
/// [`GIMBAL_EPSILON`], the decomposition degenerates; the convention is then
/// α = 0, β ∈ {0, π} by the sign of ẑ_z, and γ = −atan2(x̂_y, x̂_x).
pub fn euler_angles(frame: &RefFrame) -> EulerAngles {
    let z_xy = frame.z.x.hypot(frame.z.y);

    if z_xy < GIMBAL_EPSILON {
        let beta = if frame.z.z > 0.0 { 0.0 } else { std::f64::consts::PI };
        return EulerAngles {
            alpha: 0.0,
            beta,
            gamma: -frame.x.y.atan2(frame.x.x),
        };
    }

    EulerAngles {
        alpha: frame.z.y.atan2(-frame.z.x),
        beta: frame.z.z.clamp(-1.0, 1.0).acos(),
        gamma: frame.y.z.atan2(frame.x.z),
    }
}

pub fn translate(t: &Vector3<f64>) -> Matrix4<f64> {
    Matrix4::new_translation(t)
}

#[rustfmt::skip]
pub fn rotate_x(theta: f64) -> Matrix4<f64> {
    let (s, c) = theta.sin_cos();
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0,   c,  -s, 0.0,
        0.0,   s,   c, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[rustfmt::skip]
pub fn rotate_y(theta: f64) -> Matrix4<f64> {
    let (s, c) = theta.sin_cos();
    Matrix4::new(
          c, 0.0,   s, 0.0,
        0.0, 1.0, 0.0, 0.0,
         -s, 0.0,   c, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[rustfmt::skip]
pub fn rotate_z(theta: f64) -> Matrix4<f64> {
    let (s, c) = theta.sin_cos();
    Matrix4::new(
          c,  -s, 0.0, 0.0,
          s,   c, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Left-to-right product of homogeneous transforms: `mult(&[a, b, c])`
/// applies `c` first when the result acts on a column vector.
pub fn mult(matrices: &[Matrix4<f64>]) -> Matrix4<f64> {
    matrices
        .iter()
        .fold(Matrix4::identity(), |acc, m| acc * m)
}

/// The rotation taking the frame's ẑ onto the global z-axis,
/// `Rz(γ)·Ry(β)·Rz(α)` for the extracted Euler angles.
pub fn frame_alignment(angles: &EulerAngles) -> Matrix4<f64> {
    mult(&[
        rotate_z(angles.gamma),
        rotate_y(angles.beta),
        rotate_z(angles.alpha),
    ])
}

/// Inverse of [`frame_alignment`], `Rz(−α)·Ry(−β)·Rz(−γ)`.
pub fn frame_alignment_inverse(angles: &EulerAngles) -> Matrix4<f64> {
    mult(&[
        rotate_z(-angles.alpha),
        rotate_y(-angles.beta),
        rotate_z(-angles.gamma),
    ])
}

pub fn transform_point(m: &Matrix4<f64>, p: &Point3<f64>) -> Point3<f64> {
    m.transform_point(p)
}
