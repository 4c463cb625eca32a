use crate::calib3d::RansacModel;
use crate::core::{Mat3, Vec3};
use crate::features2d::Match;

/// Separations below this are treated as coincident points.
pub const EPS: f32 = 1.0e-6;

/// A rotate-scale-translate transform between two matched images, stored as
/// its 3x3 matrix:
///
/// ```text
/// [ s*cos  -s*sin  tx ]
/// [ s*sin   s*cos  ty ]
/// [   0       0     1 ]
/// ```
///
/// The transform maps slot-1 keypoint positions onto slot-0 positions.
#[derive(Debug, Clone, Copy)]
pub struct Similarity {
    trans: Mat3,
}

impl Similarity {
    #[must_use]
    pub fn matrix(&self) -> &Mat3 {
        &self.trans
    }
}

impl RansacModel for Similarity {
    type Point = Match;
    const MIN_POINTS_TO_FIT: usize = 2;

    /// Closed-form fit from exactly two matches: the displacement between
    /// the two anchor points in each image gives rotation angle and scale;
    /// translation then pins the first anchor.
    fn fit(matches: &[Match]) -> Option<Self> {
        if matches.len() < 2 {
            return None;
        }

        let d0 = matches[1].key(0).pos - matches[0].key(0).pos;
        let d1 = matches[1].key(1).pos - matches[0].key(1).pos;

        let s0 = d0.norm();
        let s1 = d1.norm();
        // Coincident anchors happen with joint matches like (A-B), (B-C);
        // no similarity is recoverable from them.
        if s0 < EPS || s1 < EPS {
            return None;
        }

        let angle = d0.angle() - d1.angle();
        let (sin_a, cos_a) = angle.sin_cos();
        let s = s0 / s1;

        let a0 = matches[0].key(0).pos;
        let a1 = matches[0].key(1).pos;

        let mut trans = Mat3::identity();
        trans.m[0][0] = s * cos_a;
        trans.m[0][1] = -s * sin_a;
        trans.m[0][2] = s * (cos_a * -a1.x - sin_a * -a1.y) + a0.x;
        trans.m[1][0] = s * sin_a;
        trans.m[1][1] = s * cos_a;
        trans.m[1][2] = s * (sin_a * -a1.x + cos_a * -a1.y) + a0.y;

        Some(Self { trans })
    }

    /// Squared distance between the slot-0 position and the transformed
    /// slot-1 position.
    fn fit_error(&self, m: &Match) -> f32 {
        let expected = self.trans * Vec3::from_point(m.key(1).pos);
        (Vec3::from_point(m.key(0).pos) - expected).norm_sqr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Vec2;
    use crate::features2d::MatchKey;

    fn make_match(p0: Vec2, p1: Vec2) -> Match {
        Match::new(
            MatchKey { pos: p0, tag: 2 },
            MatchKey { pos: p1, tag: 1 },
            0.0,
        )
    }

    /// Apply a known similarity to two points, fit from the pair, and check
    /// the anchors and a third point all map with negligible error.
    #[test]
    fn test_fit_recovers_known_transform() {
        let angle = 0.3f32;
        let s = 1.4f32;
        let (sin_a, cos_a) = angle.sin_cos();
        let apply = |p: Vec2| {
            Vec2::new(
                s * (cos_a * p.x - sin_a * p.y) + 0.2,
                s * (sin_a * p.x + cos_a * p.y) - 0.1,
            )
        };

        let p1a = Vec2::new(0.1, 0.2);
        let p1b = Vec2::new(-0.3, 0.15);
        let p1c = Vec2::new(0.25, -0.4);

        let matches = vec![make_match(apply(p1a), p1a), make_match(apply(p1b), p1b)];
        let model = Similarity::fit(&matches).unwrap();

        assert!(model.fit_error(&matches[0]) < 1e-9);
        assert!(model.fit_error(&matches[1]) < 1e-9);
        let third = make_match(apply(p1c), p1c);
        assert!(model.fit_error(&third) < 1e-9);
    }

    #[test]
    fn test_degenerate_fit_rejected() {
        // Both matches share the same position in each image.
        let p = Vec2::new(0.5, 0.5);
        let q = Vec2::new(0.1, 0.9);
        let matches = vec![make_match(p, q), make_match(p, q)];
        assert!(Similarity::fit(&matches).is_none());
    }

    #[test]
    fn test_fit_error_detects_outlier() {
        let matches = vec![
            make_match(Vec2::new(0.0, 0.0), Vec2::new(0.0, 0.0)),
            make_match(Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0)),
        ];
        let model = Similarity::fit(&matches).unwrap();
        // Identity fit: a displaced point scores its squared displacement.
        let outlier = make_match(Vec2::new(0.5, 0.7), Vec2::new(0.5, 0.5));
        assert!((model.fit_error(&outlier) - 0.04).abs() < 1e-6);
    }
}
