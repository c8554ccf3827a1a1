//! Vector and matrix value types.
//!
//! Matrices are 4×4, column-major: `data[col][row]`, with the translation in
//! `data[3]`. Products follow the same convention, so `a * b` applies `b`
//! first and `a` second when transforming points.

use std::ops::{Add, Index, Mul, Neg, Sub};

// ============================================================================
// Float3
// ============================================================================

/// Three-component float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Float3 {
    pub const ZERO: Float3 = Float3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn from_array(a: [f32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn dot(self, other: Float3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Float3) -> Float3 {
        Float3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Normalized vector and the original length.
    ///
    /// A zero vector yields the zero vector and length 0.
    pub fn normalize(self) -> (Float3, f32) {
        let len = self.length();
        if len > 0.0 {
            (self * (1.0 / len), len)
        } else {
            (Float3::ZERO, 0.0)
        }
    }

    /// Component-wise product.
    pub fn mul_elem(self, other: Float3) -> Float3 {
        Float3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn map(self, f: impl Fn(f32) -> f32) -> Float3 {
        Float3::new(f(self.x), f(self.y), f(self.z))
    }
}

impl Add for Float3 {
    type Output = Float3;
    fn add(self, rhs: Float3) -> Float3 {
        Float3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Float3 {
    type Output = Float3;
    fn sub(self, rhs: Float3) -> Float3 {
        Float3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Float3 {
    type Output = Float3;
    fn mul(self, rhs: f32) -> Float3 {
        Float3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Float3 {
    type Output = Float3;
    fn neg(self) -> Float3 {
        Float3::new(-self.x, -self.y, -self.z)
    }
}

impl Index<usize> for Float3 {
    type Output = f32;
    fn index(&self, index: usize) -> &f32 {
        match index {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Float3 index {index} out of range"),
        }
    }
}

// ============================================================================
// Float4
// ============================================================================

/// Four-component float vector, also used for RGBA colors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Float4 {
    pub const ZERO: Float4 = Float4::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_array(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn xyz(self) -> Float3 {
        Float3::new(self.x, self.y, self.z)
    }
}

impl Index<usize> for Float4 {
    type Output = f32;
    fn index(&self, index: usize) -> &f32 {
        match index {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            3 => &self.w,
            _ => panic!("Float4 index {index} out of range"),
        }
    }
}

// ============================================================================
// Matrix44
// ============================================================================

/// Column-major 4×4 matrix, `data[col][row]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix44 {
    pub data: [[f32; 4]; 4],
}

impl Default for Matrix44 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix44 {
    pub const IDENTITY: Matrix44 = Matrix44 {
        data: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const fn from_cols(data: [[f32; 4]; 4]) -> Self {
        Self { data }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_translation(loc: Float3) -> Self {
        let mut m = Self::IDENTITY;
        m.data[3][0] = loc.x;
        m.data[3][1] = loc.y;
        m.data[3][2] = loc.z;
        m
    }

    pub fn from_scale(scale: Float3) -> Self {
        let mut m = Self::IDENTITY;
        m.data[0][0] = scale.x;
        m.data[1][1] = scale.y;
        m.data[2][2] = scale.z;
        m
    }

    /// Rotation from XYZ euler angles.
    pub fn from_euler(eul: Float3) -> Self {
        let (si, ci) = eul.x.sin_cos();
        let (sj, cj) = eul.y.sin_cos();
        let (sh, ch) = eul.z.sin_cos();
        let cc = ci * ch;
        let cs = ci * sh;
        let sc = si * ch;
        let ss = si * sh;

        let mut m = Self::IDENTITY;
        m.data[0][0] = cj * ch;
        m.data[0][1] = cj * sh;
        m.data[0][2] = -sj;

        m.data[1][0] = sj * sc - cs;
        m.data[1][1] = sj * ss + cc;
        m.data[1][2] = cj * si;

        m.data[2][0] = sj * cc + ss;
        m.data[2][1] = sj * cs - sc;
        m.data[2][2] = cj * ci;
        m
    }

    /// Rotation around `axis` by `angle` radians. A zero axis yields the identity.
    pub fn from_axis_angle(axis: Float3, angle: f32) -> Self {
        let (a, len) = axis.normalize();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let n00 = a.x * a.x * t;
        let n01 = a.x * a.y * t;
        let n02 = a.x * a.z * t;
        let n11 = a.y * a.y * t;
        let n12 = a.y * a.z * t;
        let n22 = a.z * a.z * t;

        let mut m = Self::IDENTITY;
        m.data[0][0] = n00 + c;
        m.data[0][1] = n01 + s * a.z;
        m.data[0][2] = n02 - s * a.y;
        m.data[1][0] = n01 - s * a.z;
        m.data[1][1] = n11 + c;
        m.data[1][2] = n12 + s * a.x;
        m.data[2][0] = n02 + s * a.y;
        m.data[2][1] = n12 - s * a.x;
        m.data[2][2] = n22 + c;
        m
    }

    /// Translation part.
    pub fn loc(&self) -> Float3 {
        Float3::new(self.data[3][0], self.data[3][1], self.data[3][2])
    }

    /// Lengths of the three basis columns.
    pub fn scale(&self) -> Float3 {
        Float3::new(
            self.column3(0).length(),
            self.column3(1).length(),
            self.column3(2).length(),
        )
    }

    fn column3(&self, col: usize) -> Float3 {
        Float3::new(self.data[col][0], self.data[col][1], self.data[col][2])
    }

    /// 3×3 part with unit-length columns; zero columns stay zero.
    fn normalized_rotation(&self) -> [[f32; 3]; 3] {
        let mut m = [[0.0; 3]; 3];
        for (col, out) in m.iter_mut().enumerate() {
            let (n, _) = self.column3(col).normalize();
            *out = n.to_array();
        }
        m
    }

    /// XYZ euler angles of the rotation part.
    pub fn to_euler(&self) -> Float3 {
        let m = self.normalized_rotation();
        let cy = m[0][0].hypot(m[0][1]);
        if cy > 16.0 * f32::EPSILON {
            Float3::new(
                m[1][2].atan2(m[2][2]),
                (-m[0][2]).atan2(cy),
                m[0][1].atan2(m[0][0]),
            )
        } else {
            Float3::new((-m[2][1]).atan2(m[1][1]), (-m[0][2]).atan2(cy), 0.0)
        }
    }

    /// Axis and angle of the rotation part. A zero rotation reports the
    /// axis `(0, 1, 0)`.
    pub fn to_axis_angle(&self) -> (Float3, f32) {
        let m = self.normalized_rotation();
        let raw = Float3::new(
            m[1][2] - m[2][1],
            m[2][0] - m[0][2],
            m[0][1] - m[1][0],
        );
        let trace = m[0][0] + m[1][1] + m[2][2];
        let cos_angle = ((trace - 1.0) * 0.5).clamp(-1.0, 1.0);
        let (axis, len) = raw.normalize();
        if len > 1.0e-6 {
            let angle = (len * 0.5).atan2(cos_angle);
            return (axis, angle);
        }
        if cos_angle > 0.0 {
            return (Float3::new(0.0, 1.0, 0.0), 0.0);
        }

        // Half-turn: the axis comes from the symmetric part.
        let diag = |i: usize| ((m[i][i] + 1.0) * 0.5).max(0.0).sqrt();
        let mut axis = Float3::new(diag(0), diag(1), diag(2));
        if axis.x >= axis.y && axis.x >= axis.z {
            axis.y = axis.y.copysign(m[0][1] + m[1][0]);
            axis.z = axis.z.copysign(m[0][2] + m[2][0]);
        } else if axis.y >= axis.z {
            axis.x = axis.x.copysign(m[0][1] + m[1][0]);
            axis.z = axis.z.copysign(m[1][2] + m[2][1]);
        } else {
            axis.x = axis.x.copysign(m[0][2] + m[2][0]);
            axis.y = axis.y.copysign(m[1][2] + m[2][1]);
        }
        (axis.normalize().0, std::f32::consts::PI)
    }

    pub fn transpose(&self) -> Matrix44 {
        let mut r = [[0.0; 4]; 4];
        for (i, col) in r.iter_mut().enumerate() {
            for (j, v) in col.iter_mut().enumerate() {
                *v = self.data[j][i];
            }
        }
        Matrix44::from_cols(r)
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Matrix44 {
        let mut r = self.data;
        for v in r.iter_mut().flatten() {
            *v = f(*v);
        }
        Matrix44::from_cols(r)
    }

    pub fn zip(&self, other: &Matrix44, f: impl Fn(f32, f32) -> f32) -> Matrix44 {
        let mut r = self.data;
        for (col, ocol) in r.iter_mut().zip(other.data.iter()) {
            for (v, o) in col.iter_mut().zip(ocol.iter()) {
                *v = f(*v, *o);
            }
        }
        Matrix44::from_cols(r)
    }

    /// Cofactor of element `(col, row)`.
    fn cofactor(&self, col: usize, row: usize) -> f32 {
        let mut minor = [[0.0f32; 3]; 3];
        let mut mi = 0;
        for i in (0..4).filter(|&i| i != col) {
            let mut mj = 0;
            for j in (0..4).filter(|&j| j != row) {
                minor[mi][mj] = self.data[i][j];
                mj += 1;
            }
            mi += 1;
        }
        let det3 = minor[0][0] * (minor[1][1] * minor[2][2] - minor[1][2] * minor[2][1])
            - minor[0][1] * (minor[1][0] * minor[2][2] - minor[1][2] * minor[2][0])
            + minor[0][2] * (minor[1][0] * minor[2][1] - minor[1][1] * minor[2][0]);
        if (col + row) % 2 == 0 { det3 } else { -det3 }
    }

    pub fn determinant(&self) -> f32 {
        (0..4).map(|i| self.data[i][0] * self.cofactor(i, 0)).sum()
    }

    /// Classical adjoint (transposed cofactor matrix).
    pub fn adjoint(&self) -> Matrix44 {
        let mut r = [[0.0; 4]; 4];
        for (i, col) in r.iter_mut().enumerate() {
            for (j, v) in col.iter_mut().enumerate() {
                *v = self.cofactor(j, i);
            }
        }
        Matrix44::from_cols(r)
    }

    /// Inverse, or `None` for a singular matrix.
    pub fn invert(&self) -> Option<Matrix44> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = self.adjoint().map(|v| v / det);
        inv.data.iter().flatten().all(|v| v.is_finite()).then_some(inv)
    }

    /// Transform a point (translation applied).
    pub fn transform_point(&self, v: Float3) -> Float3 {
        let m = &self.data;
        let row = |j: usize| m[0][j] * v.x + m[1][j] * v.y + m[2][j] * v.z + m[3][j];
        Float3::new(row(0), row(1), row(2))
    }

    /// Transform a direction (translation ignored).
    pub fn transform_direction(&self, v: Float3) -> Float3 {
        let m = &self.data;
        let row = |j: usize| m[0][j] * v.x + m[1][j] * v.y + m[2][j] * v.z;
        Float3::new(row(0), row(1), row(2))
    }

    pub fn transform_float4(&self, v: Float4) -> Float4 {
        let m = &self.data;
        let row = |j: usize| m[0][j] * v.x + m[1][j] * v.y + m[2][j] * v.z + m[3][j] * v.w;
        Float4::new(row(0), row(1), row(2), row(3))
    }
}

impl Mul for Matrix44 {
    type Output = Matrix44;

    fn mul(self, rhs: Matrix44) -> Matrix44 {
        let mut r = [[0.0; 4]; 4];
        for (i, col) in r.iter_mut().enumerate() {
            for (j, v) in col.iter_mut().enumerate() {
                *v = (0..4).map(|k| rhs.data[i][k] * self.data[k][j]).sum();
            }
        }
        Matrix44::from_cols(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1.0e-5
    }

    fn approx3(a: Float3, b: Float3) -> bool {
        approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
    }

    fn approx_m(a: &Matrix44, b: &Matrix44) -> bool {
        a.data
            .iter()
            .flatten()
            .zip(b.data.iter().flatten())
            .all(|(x, y)| approx(*x, *y))
    }

    #[test]
    fn normalize_zero_vector() {
        assert_eq!(Float3::ZERO.normalize(), (Float3::ZERO, 0.0));
        let (n, len) = Float3::new(3.0, 0.0, 4.0).normalize();
        assert_eq!(len, 5.0);
        assert!(approx3(n, Float3::new(0.6, 0.0, 0.8)));
    }

    #[test]
    fn cross_product() {
        let x = Float3::new(1.0, 0.0, 0.0);
        let y = Float3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Float3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn translation_applies_to_points_only() {
        let m = Matrix44::from_translation(Float3::new(1.0, 2.0, 3.0));
        let p = Float3::new(1.0, 1.0, 1.0);
        assert_eq!(m.transform_point(p), Float3::new(2.0, 3.0, 4.0));
        assert_eq!(m.transform_direction(p), p);
        assert_eq!(m.loc(), Float3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn product_applies_right_operand_first() {
        let t = Matrix44::from_translation(Float3::new(1.0, 0.0, 0.0));
        let s = Matrix44::from_scale(Float3::splat(2.0));
        let p = Float3::new(1.0, 0.0, 0.0);
        // scale, then translate
        assert_eq!((t * s).transform_point(p), Float3::new(3.0, 0.0, 0.0));
        // translate, then scale
        assert_eq!((s * t).transform_point(p), Float3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn invert_round_trip() {
        let m = Matrix44::from_translation(Float3::new(1.0, -2.0, 0.5))
            * Matrix44::from_euler(Float3::new(0.3, -0.2, 1.1))
            * Matrix44::from_scale(Float3::new(2.0, 3.0, 0.5));
        let inv = m.invert().expect("matrix is regular");
        assert!(approx_m(&(m * inv), &Matrix44::IDENTITY));
    }

    #[test]
    fn invert_singular_is_none() {
        let m = Matrix44::from_scale(Float3::new(1.0, 0.0, 1.0));
        assert!(m.invert().is_none());
        assert_eq!(m.determinant(), 0.0);
    }

    #[test]
    fn determinant_of_scale() {
        let m = Matrix44::from_scale(Float3::new(2.0, 3.0, 4.0));
        assert!(approx(m.determinant(), 24.0));
    }

    #[test]
    fn euler_round_trip() {
        let eul = Float3::new(0.4, -0.7, 1.2);
        let m = Matrix44::from_euler(eul);
        assert!(approx3(m.to_euler(), eul));
    }

    #[test]
    fn axis_angle_round_trip() {
        let axis = Float3::new(1.0, 2.0, -0.5).normalize().0;
        let m = Matrix44::from_axis_angle(axis, 0.8);
        let (a, angle) = m.to_axis_angle();
        assert!(approx3(a, axis));
        assert!(approx(angle, 0.8));
    }

    #[test]
    fn axis_angle_of_identity() {
        let (axis, angle) = Matrix44::IDENTITY.to_axis_angle();
        assert_eq!(axis, Float3::new(0.0, 1.0, 0.0));
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn axis_angle_zero_axis_is_identity() {
        assert_eq!(
            Matrix44::from_axis_angle(Float3::ZERO, 1.0),
            Matrix44::IDENTITY
        );
    }

    #[test]
    fn euler_matches_axis_angle_about_z() {
        let a = Matrix44::from_euler(Float3::new(0.0, 0.0, 0.5));
        let b = Matrix44::from_axis_angle(Float3::new(0.0, 0.0, 1.0), 0.5);
        assert!(approx_m(&a, &b));
    }

    #[test]
    fn scale_is_column_lengths() {
        let m = Matrix44::from_euler(Float3::new(0.2, 0.3, 0.4))
            * Matrix44::from_scale(Float3::new(2.0, 3.0, 4.0));
        assert!(approx3(m.scale(), Float3::new(2.0, 3.0, 4.0)));
    }

    #[test]
    fn transpose_twice_is_identity_op() {
        let m = Matrix44::from_euler(Float3::new(0.2, 0.3, 0.4));
        assert_eq!(m.transpose().transpose(), m);
    }
}
