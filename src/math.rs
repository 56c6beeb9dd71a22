//! Quaternion and vector helpers shared by every fusion algorithm

use nalgebra::{ComplexField, Quaternion, RealField, UnitQuaternion, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Norms below this are treated as zero
pub const NORM_EPSILON: f32 = 1e-6;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Unit vector in the same direction, or `None` when the vector is
    /// (near) zero or not finite
    fn try_unit(&self) -> Option<Vector3<f32>>;

    /// Normalize the vector, returning zero vector if magnitude is zero
    fn safe_normalize(&self) -> Vector3<f32>;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn try_unit(&self) -> Option<Vector3<f32>> {
        let norm = self.norm();
        if norm.is_finite() && norm > NORM_EPSILON {
            Some(*self / norm)
        } else {
            None
        }
    }

    fn safe_normalize(&self) -> Vector3<f32> {
        self.try_unit().unwrap_or_else(Vector3::zeros)
    }

    fn deg_to_rad(&self) -> Vector3<f32> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }
}

/// Extension trait for raw (not necessarily unit) quaternions
pub trait QuaternionExt {
    /// Unit quaternion, or `None` when the norm is (near) zero or not finite
    fn try_unit(&self) -> Option<UnitQuaternion<f32>>;

    /// Quaternion with the vector part negated
    fn conjugated(&self) -> Quaternion<f32>;
}

impl QuaternionExt for Quaternion<f32> {
    fn try_unit(&self) -> Option<UnitQuaternion<f32>> {
        let norm = self.norm();
        if norm.is_finite() && norm > NORM_EPSILON {
            Some(UnitQuaternion::new_unchecked(*self / norm))
        } else {
            None
        }
    }

    fn conjugated(&self) -> Quaternion<f32> {
        Quaternion::new(self.w, -self.i, -self.j, -self.k)
    }
}

/// Normalize a quaternion, falling back to identity when it cannot be
/// normalized.
///
/// # Example
/// ```
/// use nalgebra::{Quaternion, UnitQuaternion};
/// use multi_ahrs::normalize_quaternion;
///
/// let q = normalize_quaternion(Quaternion::new(2.0, 0.0, 0.0, 0.0));
/// assert_eq!(q, UnitQuaternion::identity());
///
/// let degenerate = normalize_quaternion(Quaternion::new(0.0, 0.0, 0.0, 0.0));
/// assert_eq!(degenerate, UnitQuaternion::identity());
/// ```
pub fn normalize_quaternion(q: Quaternion<f32>) -> UnitQuaternion<f32> {
    q.try_unit().unwrap_or_else(UnitQuaternion::identity)
}

/// Hamilton product `a ⊗ b`
pub fn hamilton_product(a: &Quaternion<f32>, b: &Quaternion<f32>) -> Quaternion<f32> {
    Quaternion::new(
        a.w * b.w - a.i * b.i - a.j * b.j - a.k * b.k,
        a.w * b.i + a.i * b.w + a.j * b.k - a.k * b.j,
        a.w * b.j - a.i * b.k + a.j * b.w + a.k * b.i,
        a.w * b.k + a.i * b.j - a.j * b.i + a.k * b.w,
    )
}

/// Rotate a vector by a quaternion: `q ⊗ (0, v) ⊗ q*`
///
/// With the body-to-earth quaternion kept by the engine this maps a
/// body-frame vector into the earth frame.
pub fn rotate_vector(q: &Quaternion<f32>, v: &Vector3<f32>) -> Vector3<f32> {
    let rotated = hamilton_product(
        &hamilton_product(q, &Quaternion::from_imag(*v)),
        &q.conjugated(),
    );
    rotated.imag()
}

/// Rotate a vector by the inverse of a quaternion: `q* ⊗ (0, v) ⊗ q`
pub fn inverse_rotate_vector(q: &Quaternion<f32>, v: &Vector3<f32>) -> Vector3<f32> {
    rotate_vector(&q.conjugated(), v)
}

/// Quaternion derivative `0.5 · q ⊗ (0, ω)` for a body rate in rad/s
pub fn quaternion_rate(q: &Quaternion<f32>, angular_rate: &Vector3<f32>) -> Quaternion<f32> {
    hamilton_product(q, &Quaternion::from_imag(*angular_rate)) * 0.5
}

/// Convert a quaternion to (roll, pitch, yaw) in radians, aerospace
/// Z-Y-X sequence.
///
/// The asin argument for pitch is clamped to `[-1, 1]` so round-off at
/// ±90° never produces NaN; roll and yaw use atan2 and stay finite when
/// both of their arguments vanish.
pub fn quaternion_to_euler(q: &UnitQuaternion<f32>) -> (f32, f32, f32) {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    let sin_pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = sin_pitch.asin();
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

    (roll, pitch, yaw)
}

/// Wrap an angle in degrees to `[0, 360)`
pub fn wrap_degrees_360(angle: f32) -> f32 {
    let wrapped = angle % 360.0;
    if wrapped < 0.0 {
        // -1e-6 % 360 + 360 rounds to 360.0
        let shifted = wrapped + 360.0;
        if shifted >= 360.0 { 0.0 } else { shifted }
    } else {
        wrapped
    }
}
