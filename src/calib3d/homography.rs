use crate::core::{Mat3, Vec3};

/// Per-image rotate-scale transform, parameterized for bundle adjustment by
/// an axis-angle rotation plus a uniform scale.
///
/// The axis-angle vector points along the rotation axis and its magnitude is
/// the rotation angle in radians; the matrix form is the exponential map
/// `R = I + sin(t)*[w]x + (1 - cos(t))*[w]x^2` with `t = |r|`, `w = r/t`.
/// The full transform is `H = S * R` with `S = diag(s, s, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Homography {
    axis: Vec3,
    scale: f32,
}

impl Default for Homography {
    fn default() -> Self {
        Self {
            axis: Vec3::new(0.0, 0.0, 0.0),
            scale: 1.0,
        }
    }
}

/// Skew-symmetric matrix of the cross product with `axis`.
fn hat(axis: Vec3) -> Mat3 {
    let mut m = Mat3::zero();
    m.m[1][0] = axis.z;
    m.m[2][0] = -axis.y;
    m.m[2][1] = axis.x;
    m.m[0][1] = -axis.z;
    m.m[0][2] = axis.y;
    m.m[1][2] = -axis.x;
    m
}

/// Skew basis matrix `E_k`: the derivative of [`hat`] w.r.t. component `k`.
fn skew_basis(param_index: usize) -> Mat3 {
    let mut m = Mat3::zero();
    match param_index {
        0 => {
            m.m[2][1] = 1.0;
            m.m[1][2] = -1.0;
        }
        1 => {
            m.m[0][2] = 1.0;
            m.m[2][0] = -1.0;
        }
        _ => {
            m.m[0][1] = -1.0;
            m.m[1][0] = 1.0;
        }
    }
    m
}

impl Homography {
    #[must_use]
    pub fn new(rx: f32, ry: f32, rz: f32, scale: f32) -> Self {
        Self {
            axis: Vec3::new(rx, ry, rz),
            scale,
        }
    }

    /// Parameter `k` of the layout `(rx, ry, rz, s)`.
    #[must_use]
    pub fn param(&self, param_index: usize) -> f32 {
        debug_assert!(param_index < 4);
        match param_index {
            0 => self.axis.x,
            1 => self.axis.y,
            2 => self.axis.z,
            _ => self.scale,
        }
    }

    fn scale_part(scale: f32) -> Mat3 {
        let mut m = Mat3::zero();
        m.m[0][0] = scale;
        m.m[1][1] = scale;
        m.m[2][2] = 1.0;
        m
    }

    fn rotation_part(&self) -> Mat3 {
        let angle = self.axis.norm();
        let unit = if angle == 0.0 {
            self.axis
        } else {
            self.axis * (1.0 / angle)
        };
        let h = hat(unit);
        Mat3::identity() + h * angle.sin() + h * h * (1.0 - angle.cos())
    }

    fn inverse_rotation_part(&self) -> Mat3 {
        self.rotation_part().transpose()
    }

    fn rotation_part_derivative(&self, param_index: usize) -> Mat3 {
        debug_assert!(param_index < 3);
        self.rotation_part() * skew_basis(param_index)
    }

    fn scale_part_derivative() -> Mat3 {
        let mut m = Self::scale_part(1.0);
        m.m[2][2] = 0.0;
        m
    }

    fn inverse_scale_part_derivative(&self) -> Mat3 {
        let mut m = Self::scale_part(-1.0 / (self.scale * self.scale));
        m.m[2][2] = 0.0;
        m
    }

    /// `H = S * R`.
    #[must_use]
    pub fn matrix(&self) -> Mat3 {
        Self::scale_part(self.scale) * self.rotation_part()
    }

    /// `H^-1 = R^T * S^-1`.
    #[must_use]
    pub fn inverse_matrix(&self) -> Mat3 {
        self.inverse_rotation_part() * Self::scale_part(1.0 / self.scale)
    }

    /// `dH / d(param k)` in closed form.
    #[must_use]
    pub fn matrix_derivative(&self, param_index: usize) -> Mat3 {
        debug_assert!(param_index < 4);
        if param_index < 3 {
            Self::scale_part(self.scale) * self.rotation_part_derivative(param_index)
        } else {
            Self::scale_part_derivative() * self.rotation_part()
        }
    }

    /// `dH^-1 / d(param k)` in closed form.
    #[must_use]
    pub fn inverse_matrix_derivative(&self, param_index: usize) -> Mat3 {
        debug_assert!(param_index < 4);
        if param_index < 3 {
            self.rotation_part_derivative(param_index).transpose()
                * Self::scale_part(1.0 / self.scale)
        } else {
            self.inverse_rotation_part() * self.inverse_scale_part_derivative()
        }
    }
}
