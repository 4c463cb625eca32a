use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashSet;

/// A model fittable by [`Ransac`] from a minimal point sample.
pub trait RansacModel: Sized {
    type Point: Clone;

    /// Smallest number of points the closed-form fit needs.
    const MIN_POINTS_TO_FIT: usize;

    /// Fit the model to a minimal sample; `None` when the sample is
    /// degenerate.
    fn fit(points: &[Self::Point]) -> Option<Self>;

    /// Fitting error of a single point against this model.
    fn fit_error(&self, point: &Self::Point) -> f32;
}

/// MSAC estimator: like RANSAC, but the cost of a hypothesis sums truncated
/// residuals `min(e, T)` instead of counting inliers, so among hypotheses
/// with equal support the tighter fit wins.
pub struct Ransac {
    min_points_to_accept: usize,
}

impl Ransac {
    /// `min_points_to_accept` is the smallest inlier set a model may be
    /// accepted with.
    #[must_use]
    pub fn new(min_points_to_accept: usize) -> Self {
        Self {
            min_points_to_accept,
        }
    }

    /// Find the model with the lowest MSAC cost over `points`.
    ///
    /// `inlier_fraction` is the prior guess of the fraction of good points;
    /// the iteration budget is re-estimated downward whenever a better
    /// hypothesis raises the observed fraction. Returns the model and its
    /// inlier set, or `None` when no acceptable model was found.
    pub fn fit<M: RansacModel>(
        &self,
        points: &[M::Point],
        inlier_fraction: f32,
        target_probability: f32,
        max_fit_error: f32,
        rng: &mut StdRng,
    ) -> Option<(M, Vec<M::Point>)> {
        if points.len() < M::MIN_POINTS_TO_FIT {
            return None;
        }

        let mut inlier_fraction = inlier_fraction;
        let mut required_iterations =
            estimate_iterations(target_probability, inlier_fraction, M::MIN_POINTS_TO_FIT);

        let mut best: Option<(M, Vec<M::Point>)> = None;
        let mut best_cost = f32::INFINITY;

        let mut iteration = 0;
        while iteration < required_iterations {
            iteration += 1;

            // Draw a minimal sample of distinct points.
            let mut sample = Vec::with_capacity(M::MIN_POINTS_TO_FIT);
            let mut used = HashSet::new();
            while sample.len() < M::MIN_POINTS_TO_FIT {
                let index = rng.gen_range(0..points.len());
                if used.insert(index) {
                    sample.push(points[index].clone());
                }
            }

            let Some(model) = M::fit(&sample) else {
                continue;
            };

            let mut cost = 0.0f32;
            let mut inliers = Vec::new();
            for point in points {
                let fit_error = model.fit_error(point);
                if fit_error < max_fit_error {
                    inliers.push(point.clone());
                    cost += fit_error;
                } else {
                    cost += max_fit_error;
                }
            }

            if inliers.len() < self.min_points_to_accept {
                continue;
            }

            if cost < best_cost {
                best_cost = cost;
                let current_fraction = inliers.len() as f32 / points.len() as f32;
                best = Some((model, inliers));

                if current_fraction > inlier_fraction && current_fraction < 1.0 {
                    inlier_fraction = current_fraction;
                    required_iterations = estimate_iterations(
                        target_probability,
                        inlier_fraction,
                        M::MIN_POINTS_TO_FIT,
                    );
                }
            }
        }

        best
    }
}

/// Expected number of iterations to draw at least one all-inlier sample with
/// probability `target_probability`, given the inlier fraction and sample
/// size, plus one standard deviation of the underlying geometric
/// distribution for confidence.
#[must_use]
pub fn estimate_iterations(
    target_probability: f32,
    inlier_fraction: f32,
    min_points_to_fit: usize,
) -> usize {
    debug_assert!(target_probability > 0.0 && target_probability < 1.0);
    debug_assert!(inlier_fraction > 0.0 && inlier_fraction < 1.0);

    let success = inlier_fraction.powi(min_points_to_fit as i32);
    let expected = (1.0 - target_probability).ln() / (1.0 - success).ln();
    let sd = (1.0 - success).sqrt() / success;
    (expected + sd) as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// 1-D line y = a*x + b, fit from two points.
    struct Line {
        a: f32,
        b: f32,
    }

    impl RansacModel for Line {
        type Point = (f32, f32);
        const MIN_POINTS_TO_FIT: usize = 2;

        fn fit(points: &[(f32, f32)]) -> Option<Self> {
            let (x0, y0) = points[0];
            let (x1, y1) = points[1];
            if (x1 - x0).abs() < 1e-9 {
                return None;
            }
            let a = (y1 - y0) / (x1 - x0);
            Some(Self { a, b: y0 - a * x0 })
        }

        fn fit_error(&self, &(x, y): &(f32, f32)) -> f32 {
            let d = y - (self.a * x + self.b);
            d * d
        }
    }

    #[test]
    fn test_line_with_outliers() {
        let mut points: Vec<(f32, f32)> = (0..40)
            .map(|i| {
                let x = i as f32;
                (x, 2.0 * x + 1.0)
            })
            .collect();
        // A few gross outliers.
        points.push((3.0, 90.0));
        points.push((10.0, -55.0));
        points.push((20.0, 7.0));

        let mut rng = StdRng::seed_from_u64(7);
        let ransac = Ransac::new(8);
        let (model, inliers) = ransac
            .fit::<Line>(&points, 0.5, 0.95, 1e-2, &mut rng)
            .unwrap();

        assert!((model.a - 2.0).abs() < 1e-3);
        assert!((model.b - 1.0).abs() < 1e-2);
        assert_eq!(inliers.len(), 40);
    }

    #[test]
    fn test_all_degenerate_samples_fail() {
        // Every pair shares the same x, so no sample ever fits.
        let points: Vec<(f32, f32)> = (0..10).map(|i| (1.0, i as f32)).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let ransac = Ransac::new(3);
        assert!(ransac
            .fit::<Line>(&points, 0.5, 0.95, 1e-2, &mut rng)
            .is_none());
    }

    #[test]
    fn test_too_few_points() {
        let points = vec![(0.0, 0.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let ransac = Ransac::new(2);
        assert!(ransac
            .fit::<Line>(&points, 0.5, 0.95, 1e-2, &mut rng)
            .is_none());
    }

    #[test]
    fn test_iteration_estimate_monotonic() {
        // Cleaner data needs fewer iterations.
        let dirty = estimate_iterations(0.95, 0.3, 2);
        let clean = estimate_iterations(0.95, 0.9, 2);
        assert!(clean < dirty);
        assert!(clean >= 1);
    }
}
