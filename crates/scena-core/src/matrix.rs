//! Minimal column-major 4×4 matrix and general square inversion.
//!
//! Covers what the coordinate utilities need (compose, invert, map points,
//! emit CSS) without pulling in a linear-algebra crate. Element order matches
//! CSS `matrix3d()`: each group of four values is one column.

use crate::error::{Result, SceneError};
use kurbo::{Affine, Point, Vec2};
use std::ops::Mul;

/// Pivots smaller than this are treated as zero during inversion.
pub const SINGULAR_EPSILON: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix4 {
    /// Column-major: `m[col * 4 + row]`.
    pub m: [f64; 16],
}

impl Matrix4 {
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[must_use]
    pub const fn from_cols_array(m: [f64; 16]) -> Self {
        Self { m }
    }

    #[must_use]
    pub const fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::IDENTITY.m;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        Self { m }
    }

    #[must_use]
    pub fn translate_2d(v: Vec2) -> Self {
        Self::translation(v.x, v.y, 0.0)
    }

    #[must_use]
    pub const fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Self::IDENTITY.m;
        m[0] = sx;
        m[5] = sy;
        m[10] = sz;
        Self { m }
    }

    /// Rotation about the Z axis, clockwise on screen for positive degrees.
    #[must_use]
    pub fn rotation_z(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::from_2d([c, s, -s, c, 0.0, 0.0])
    }

    /// CSS `skew(ax, ay)`.
    #[must_use]
    pub fn skew(ax_degrees: f64, ay_degrees: f64) -> Self {
        Self::from_2d([
            1.0,
            ay_degrees.to_radians().tan(),
            ax_degrees.to_radians().tan(),
            1.0,
            0.0,
            0.0,
        ])
    }

    /// From CSS `matrix(a, b, c, d, e, f)` coefficients.
    #[must_use]
    pub const fn from_2d(c: [f64; 6]) -> Self {
        Self {
            m: [
                c[0], c[1], 0.0, 0.0, //
                c[2], c[3], 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                c[4], c[5], 0.0, 1.0,
            ],
        }
    }

    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        Self::from_2d(affine.as_coeffs())
    }

    /// True when the matrix only acts in the XY plane.
    pub fn is_2d(&self) -> bool {
        let m = &self.m;
        m[2] == 0.0
            && m[3] == 0.0
            && m[6] == 0.0
            && m[7] == 0.0
            && m[8] == 0.0
            && m[9] == 0.0
            && m[10] == 1.0
            && m[11] == 0.0
            && m[14] == 0.0
            && m[15] == 1.0
    }

    /// CSS `matrix()` coefficients, if the matrix is 2D.
    pub fn to_2d(&self) -> Option<[f64; 6]> {
        let m = &self.m;
        self.is_2d().then(|| [m[0], m[1], m[4], m[5], m[12], m[13]])
    }

    pub fn to_affine(&self) -> Option<Affine> {
        self.to_2d().map(Affine::new)
    }

    /// Map a point in the XY plane, dividing by `w` for projective matrices.
    pub fn transform_point(&self, p: Point) -> Point {
        let m = &self.m;
        let x = m[0] * p.x + m[4] * p.y + m[12];
        let y = m[1] * p.x + m[5] * p.y + m[13];
        let w = m[3] * p.x + m[7] * p.y + m[15];
        if w != 0.0 && w != 1.0 {
            Point::new(x / w, y / w)
        } else {
            Point::new(x, y)
        }
    }

    pub fn inverse(&self) -> Result<Self> {
        let inv = invert(&self.m, 4)?;
        let mut m = [0.0; 16];
        m.copy_from_slice(&inv);
        Ok(Self { m })
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    /// CSS text: `matrix(...)` when 2D, `matrix3d(...)` otherwise.
    pub fn to_css(&self) -> String {
        let values: Vec<String> = match self.to_2d() {
            Some(c) => c.iter().map(|v| format_number(*v)).collect(),
            None => self.m.iter().map(|v| format_number(*v)).collect(),
        };
        if values.len() == 6 {
            format!("matrix({})", values.join(", "))
        } else {
            format!("matrix3d({})", values.join(", "))
        }
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Matrix4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let a = &self.m;
        let b = &rhs.m;
        let mut out = [0.0_f64; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = a[row] * b[col * 4]
                    + a[4 + row] * b[col * 4 + 1]
                    + a[8 + row] * b[col * 4 + 2]
                    + a[12 + row] * b[col * 4 + 3];
            }
        }
        Self { m: out }
    }
}

/// Invert an `n × n` matrix stored as a flat slice (Gauss-Jordan with
/// partial pivoting). Works for either storage order; the result uses the
/// same order as the input.
///
/// Fails with [`SceneError::Singular`] when a pivot collapses below
/// [`SINGULAR_EPSILON`] or the slice is not `n * n` long.
pub fn invert(values: &[f64], n: usize) -> Result<Vec<f64>> {
    if n == 0 || values.len() != n * n {
        return Err(SceneError::Singular);
    }
    let mut a = values.to_vec();
    let mut inv = vec![0.0; n * n];
    for i in 0..n {
        inv[i * n + i] = 1.0;
    }

    for col in 0..n {
        // Largest magnitude in this column at or below the diagonal.
        let mut pivot_row = col;
        for row in col + 1..n {
            if a[row * n + col].abs() > a[pivot_row * n + col].abs() {
                pivot_row = row;
            }
        }
        let pivot = a[pivot_row * n + col];
        if !pivot.is_finite() || pivot.abs() < SINGULAR_EPSILON {
            return Err(SceneError::Singular);
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap(pivot_row * n + k, col * n + k);
                inv.swap(pivot_row * n + k, col * n + k);
            }
        }
        for k in 0..n {
            a[col * n + k] /= pivot;
            inv[col * n + k] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[row * n + k] -= factor * a[col * n + k];
                inv[row * n + k] -= factor * inv[col * n + k];
            }
        }
    }
    Ok(inv)
}

/// Format a number for CSS output: integral values lose the fraction and
/// float noise below 1e-9 is rounded away.
pub fn format_number(v: f64) -> String {
    let rounded = (v * 1e9).round() / 1e9;
    if rounded == 0.0 {
        // Avoid "-0".
        return "0".to_string();
    }
    format!("{rounded}")
}
