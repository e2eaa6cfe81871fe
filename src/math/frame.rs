//! Ground ↔ shower-aligned coordinate transforms.
//!
//! Conventions:
//!
//! - Angles are passed in and returned in degrees; radians only appear inside
//!   trigonometric calls (and in [`DeltaRotation`], whose offsets are radians
//!   by construction).
//! - Direction cosines of a direction with zenith `ze` and azimuth `az`:
//!   `cx = sin(ze)·sin(az−180°)`, `cy = sin(ze)·cos(az−180°)`, `cz = cos(ze)`.
//! - The shower frame has its z axis along that direction. Its x axis is
//!   horizontal; at zenith the frame coincides with the ground frame.
//! - Camera x/y coincide with the x/y axes of the shower frame built from the
//!   array pointing. A camera offset `(δx, δy)` therefore denotes the
//!   direction `(tan δx, tan δy, 1)` in that frame.

use nalgebra::{Matrix3, Vector3};

/// Ground points whose height leaves the plane by more than this after the
/// inverse transform are treated as numerical failures [m].
pub const MAX_OUT_OF_PLANE: f64 = 1000.0;

const AXIS_EPS: f64 = 1e-12;

/// Direction cosines `(cx, cy)` for a zenith/azimuth pair in degrees.
pub fn direction_cosines(zenith_deg: f64, azimuth_deg: f64) -> (f64, f64) {
    let ze = zenith_deg.to_radians();
    let phi = (azimuth_deg - 180.0).to_radians();
    (ze.sin() * phi.sin(), ze.sin() * phi.cos())
}

/// Zenith and azimuth [deg] of a ground-frame direction vector.
///
/// Azimuth is normalised to `[0, 360)`.
pub fn zenith_azimuth(axis: &Vector3<f64>) -> (f64, f64) {
    let a = axis.normalize();
    let zenith = a.z.clamp(-1.0, 1.0).acos().to_degrees();
    let azimuth = (a.x.atan2(a.y).to_degrees() + 180.0).rem_euclid(360.0);
    (zenith, azimuth)
}

/// A ground point recovered from the shower plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPoint {
    pub x: f64,
    pub y: f64,
    /// Height of the rotated point before it was slid onto `z = 0`.
    pub out_of_plane: f64,
}

impl GroundPoint {
    pub fn is_in_plane(&self) -> bool {
        self.out_of_plane.abs() <= MAX_OUT_OF_PLANE
    }
}

/// Rotation from ground coordinates into a shower-aligned frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowerFrame {
    /// Rows are the frame's x, y, z axes expressed in ground coordinates.
    rot: Matrix3<f64>,
}

impl ShowerFrame {
    pub fn from_direction_cosines(cx: f64, cy: f64) -> Self {
        let s2 = cx * cx + cy * cy;
        let sin_ze = s2.sqrt().min(1.0);
        let cos_ze = (1.0 - s2).max(0.0).sqrt();
        let (sin_phi, cos_phi) = if sin_ze > AXIS_EPS {
            (cx / sin_ze, cy / sin_ze)
        } else {
            (0.0, 1.0)
        };

        #[rustfmt::skip]
        let rot = Matrix3::new(
            cos_phi,          -sin_phi,         0.0,
            cos_ze * sin_phi, cos_ze * cos_phi, -sin_ze,
            cx,               cy,               cos_ze,
        );
        Self { rot }
    }

    pub fn from_zenith_azimuth(zenith_deg: f64, azimuth_deg: f64) -> Self {
        let (cx, cy) = direction_cosines(zenith_deg, azimuth_deg);
        Self::from_direction_cosines(cx, cy)
    }

    /// Shower direction in ground coordinates.
    pub fn axis(&self) -> Vector3<f64> {
        self.rot.row(2).transpose()
    }

    /// Forward transform: ground point into the shower frame.
    pub fn to_shower(&self, ground: &Vector3<f64>) -> Vector3<f64> {
        self.rot * ground
    }

    /// Rotate a shower-frame vector back into ground coordinates.
    pub fn to_ground(&self, shower: &Vector3<f64>) -> Vector3<f64> {
        self.rot.transpose() * shower
    }

    /// Inverse transform of a shower-plane point onto the ground plane.
    ///
    /// The point is rotated back and then slid along the shower axis to
    /// `z = 0`. Returns `None` for a horizontal axis.
    pub fn to_ground_plane(&self, x: f64, y: f64) -> Option<GroundPoint> {
        self.project_to_ground(&Vector3::new(x, y, 0.0), &self.axis())
    }

    /// Rotate `shower` back to ground and slide it along `axis` onto `z = 0`.
    pub fn project_to_ground(
        &self,
        shower: &Vector3<f64>,
        axis: &Vector3<f64>,
    ) -> Option<GroundPoint> {
        if axis.z.abs() < AXIS_EPS {
            return None;
        }
        let g = self.to_ground(shower);
        let t = g.z / axis.z;
        let p = g - axis * t;
        Some(GroundPoint {
            x: p.x,
            y: p.y,
            out_of_plane: g.z,
        })
    }
}

/// Small rotation that aligns a camera offset direction with the z axis.
///
/// Offsets are in radians. `R = Rx(a)·Ry(δx)` with `a = atan(tan δy·cos δx)`,
/// which maps `(tan δx, tan δy, 1)` exactly onto `+z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaRotation {
    rot: Matrix3<f64>,
}

impl DeltaRotation {
    pub fn new(delta_x: f64, delta_y: f64) -> Self {
        let b = delta_x;
        let a = (delta_y.tan() * delta_x.cos()).atan();
        let (sb, cb) = b.sin_cos();
        let (sa, ca) = a.sin_cos();

        #[rustfmt::skip]
        let ry = Matrix3::new(
            cb,  0.0, -sb,
            0.0, 1.0, 0.0,
            sb,  0.0, cb,
        );
        #[rustfmt::skip]
        let rx = Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, ca,  -sa,
            0.0, sa,  ca,
        );
        Self { rot: rx * ry }
    }

    /// From a camera offset in degrees.
    pub fn from_offset_deg(x_deg: f64, y_deg: f64) -> Self {
        Self::new(x_deg.to_radians(), y_deg.to_radians())
    }

    pub fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rot * p
    }

    pub fn invert(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rot.transpose() * p
    }
}

/// Rotate a set of shower-frame positions by a small offset `(δx, δy)` [rad].
pub fn rotate_by_delta(points: &[Vector3<f64>], delta_x: f64, delta_y: f64) -> Vec<Vector3<f64>> {
    let r = DeltaRotation::new(delta_x, delta_y);
    points.iter().map(|p| r.apply(p)).collect()
}

/// Unit direction (in the pointing frame) of a camera offset in degrees.
pub fn offset_direction(x_deg: f64, y_deg: f64) -> Vector3<f64> {
    Vector3::new(x_deg.to_radians().tan(), y_deg.to_radians().tan(), 1.0).normalize()
}
