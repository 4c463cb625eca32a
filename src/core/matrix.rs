use ndarray::{Array1, Array2};
use num_traits::Float;
use std::ops::{Add, Mul, Neg, Sub};

/// 2-vector used for keypoint coordinates in the normalized frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[must_use]
    pub fn norm_sqr(self) -> f32 {
        self.dot(self)
    }

    #[must_use]
    pub fn norm(self) -> f32 {
        self.norm_sqr().sqrt()
    }

    /// Angle of the vector in [-pi, pi].
    #[must_use]
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }
}

/// 3-vector; doubles as a homogeneous 2-D point with `z = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Lift a 2-D point into homogeneous coordinates.
    #[must_use]
    pub fn from_point(p: Vec2) -> Self {
        Self::new(p.x, p.y, 1.0)
    }

    #[must_use]
    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[must_use]
    pub fn norm_sqr(self) -> f32 {
        self.dot(self)
    }

    #[must_use]
    pub fn norm(self) -> f32 {
        self.norm_sqr().sqrt()
    }

    /// Perspective divide back to 2-D.
    #[must_use]
    pub fn project(self) -> Vec2 {
        Vec2::new(self.x / self.z, self.y / self.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Row-major 3x3 matrix. Covers every transform in the pipeline: similarity
/// models, rotation/scale homographies and compositor placements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f32; 3]; 3],
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat3 {
    #[must_use]
    pub fn zero() -> Self {
        Self { m: [[0.0; 3]; 3] }
    }

    #[must_use]
    pub fn identity() -> Self {
        let mut m = Self::zero();
        m.m[0][0] = 1.0;
        m.m[1][1] = 1.0;
        m.m[2][2] = 1.0;
        m
    }

    #[must_use]
    pub fn translation(tx: f32, ty: f32) -> Self {
        let mut m = Self::identity();
        m.m[0][2] = tx;
        m.m[1][2] = ty;
        m
    }

    /// Uniform scaling of the x/y plane; the homogeneous row is untouched.
    #[must_use]
    pub fn scaling(s: f32) -> Self {
        let mut m = Self::identity();
        m.m[0][0] = s;
        m.m[1][1] = s;
        m
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut out = Self::zero();
        for r in 0..3 {
            for c in 0..3 {
                out.m[c][r] = self.m[r][c];
            }
        }
        out
    }

    #[must_use]
    pub fn determinant(&self) -> f32 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse by cofactor expansion; `None` when the matrix is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let m = &self.m;
        let mut out = Self::zero();
        out.m[0][0] = (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det;
        out.m[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
        out.m[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
        out.m[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
        out.m[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
        out.m[1][2] = (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det;
        out.m[2][0] = (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det;
        out.m[2][1] = (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det;
        out.m[2][2] = (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det;
        Some(out)
    }

    /// Apply the transform to a 2-D point (homogeneous lift + divide).
    #[must_use]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        (*self * Vec3::from_point(p)).project()
    }
}

impl Mul for Mat3 {
    type Output = Mat3;
    fn mul(self, rhs: Mat3) -> Mat3 {
        let mut out = Mat3::zero();
        for r in 0..3 {
            for c in 0..3 {
                for k in 0..3 {
                    out.m[r][c] += self.m[r][k] * rhs.m[k][c];
                }
            }
        }
        out
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }
}

impl Mul<f32> for Mat3 {
    type Output = Mat3;
    fn mul(self, s: f32) -> Mat3 {
        let mut out = self;
        for r in 0..3 {
            for c in 0..3 {
                out.m[r][c] *= s;
            }
        }
        out
    }
}

impl Add for Mat3 {
    type Output = Mat3;
    fn add(self, rhs: Mat3) -> Mat3 {
        let mut out = self;
        for r in 0..3 {
            for c in 0..3 {
                out.m[r][c] += rhs.m[r][c];
            }
        }
        out
    }
}

/// Solve the 3x3 system `a * x = b` by Gaussian elimination with partial
/// pivoting, swapping rows physically. `None` when a pivot vanishes.
#[must_use]
pub fn solve3(a: Mat3, b: Vec3) -> Option<Vec3> {
    let mut m = a.m;
    let mut v = [b.x, b.y, b.z];

    for col in 0..3 {
        let mut pivot = col;
        for row in col + 1..3 {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);

        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }

    let mut x = [0.0f32; 3];
    for col in (0..3).rev() {
        let mut acc = v[col];
        for k in col + 1..3 {
            acc -= m[col][k] * x[k];
        }
        x[col] = acc / m[col][col];
    }
    Some(Vec3::new(x[0], x[1], x[2]))
}

/// Solve the dense system `a * x = b` in place by Gaussian elimination with
/// partial pivoting through a row-permutation vector; rows are never moved in
/// memory. Used by the bundle adjuster where the system side grows with the
/// panorama. Returns `false` when the matrix is numerically singular.
pub fn solve_in_place<T: Float>(a: &mut Array2<T>, b: &mut Array1<T>) -> bool {
    let n = b.len();
    debug_assert_eq!(a.nrows(), n);
    debug_assert_eq!(a.ncols(), n);

    let mut perm: Vec<usize> = (0..n).collect();

    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[[perm[row], col]].abs() > a[[perm[pivot], col]].abs() {
                pivot = row;
            }
        }
        if a[[perm[pivot], col]].abs() < T::epsilon() {
            return false;
        }
        perm.swap(col, pivot);

        let prow = perm[col];
        for row in col + 1..n {
            let r = perm[row];
            let factor = a[[r, col]] / a[[prow, col]];
            for k in col..n {
                let v = a[[prow, k]];
                a[[r, k]] = a[[r, k]] - factor * v;
            }
            let v = b[prow];
            b[r] = b[r] - factor * v;
        }
    }

    let mut x = vec![T::zero(); n];
    for col in (0..n).rev() {
        let prow = perm[col];
        let mut acc = b[prow];
        for k in col + 1..n {
            acc = acc - a[[prow, k]] * x[k];
        }
        x[col] = acc / a[[prow, col]];
    }
    for (dst, v) in b.iter_mut().zip(x) {
        *dst = v;
    }
    true
}
