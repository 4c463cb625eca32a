use crate::core::solve_in_place;
use ndarray::{Array1, Array2};

/// A nonlinear least-squares problem fittable by [`LevMar`].
pub trait LevMarModel {
    fn param_count(&self) -> usize;

    fn residual_count(&self) -> usize;

    /// Total squared residual error at `p`. May be called several times per
    /// iteration while the damping term is being adjusted.
    fn residual_error(&self, p: &Array1<f32>) -> f32;

    /// Fill the Jacobian and residual vector at `p`. Called once at the
    /// start of each outer iteration.
    fn next_iteration(&self, p: &Array1<f32>, jacobian: &mut Array2<f32>, residuals: &mut Array1<f32>);
}

/// Levenberg-Marquardt minimizer: damped Gauss-Newton with multiplicative
/// damping adaptation.
pub struct LevMar {
    pub gradient_threshold_sqr: f32,
    pub step_threshold_sqr: f32,
    pub error_threshold: f32,
    pub max_iterations: usize,
}

impl Default for LevMar {
    fn default() -> Self {
        Self {
            gradient_threshold_sqr: 1e-7,
            step_threshold_sqr: 1e-7,
            error_threshold: 1e-7,
            max_iterations: 100,
        }
    }
}

impl LevMar {
    /// Minimize the model's residual error starting from `p`; `p` always
    /// holds the best parameters seen. Returns `false` when the iteration
    /// cap was hit before any convergence threshold.
    pub fn fit<M: LevMarModel>(&self, model: &M, p: &mut Array1<f32>) -> bool {
        let param_n = model.param_count();
        let resid_n = model.residual_count();
        if param_n == 0 || resid_n == 0 {
            return true;
        }

        let mut jacobian = Array2::<f32>::zeros((resid_n, param_n));
        let mut residuals = Array1::<f32>::zeros(resid_n);

        let mut damping = 1.0f32;
        let mut iteration_n = 0usize;

        model.next_iteration(p, &mut jacobian, &mut residuals);
        let mut error = model.residual_error(p);

        loop {
            let gradient = jacobian.t().dot(&residuals.mapv(|v| -v));
            if gradient.dot(&gradient) < self.gradient_threshold_sqr {
                return true;
            }

            // Inner loop: grow damping until a step reduces the error.
            let mut step = gradient.clone();
            loop {
                iteration_n += 1;

                let mut normal = jacobian.t().dot(&jacobian);
                for i in 0..param_n {
                    normal[[i, i]] += damping;
                }
                step.assign(&gradient);
                if !solve_in_place(&mut normal, &mut step) {
                    damping *= 10.0;
                    if iteration_n > self.max_iterations {
                        break;
                    }
                    continue;
                }

                let candidate = &*p + &step;
                let new_error = model.residual_error(&candidate);
                if new_error < error {
                    error = new_error;
                    p.assign(&candidate);
                    damping /= 10.0;
                    break;
                }
                damping *= 10.0;

                if iteration_n > self.max_iterations {
                    break;
                }
            }

            if iteration_n > self.max_iterations {
                return false;
            }
            if step.dot(&step) < self.step_threshold_sqr {
                return true;
            }
            if error < self.error_threshold {
                return true;
            }

            model.next_iteration(p, &mut jacobian, &mut residuals);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fit `y = exp(a * x)` samples; one parameter, nonlinear residuals.
    struct ExpFit {
        samples: Vec<(f32, f32)>,
    }

    impl LevMarModel for ExpFit {
        fn param_count(&self) -> usize {
            1
        }

        fn residual_count(&self) -> usize {
            self.samples.len()
        }

        fn residual_error(&self, p: &Array1<f32>) -> f32 {
            self.samples
                .iter()
                .map(|&(x, y)| {
                    let r = y - (p[0] * x).exp();
                    r * r
                })
                .sum()
        }

        fn next_iteration(
            &self,
            p: &Array1<f32>,
            jacobian: &mut Array2<f32>,
            residuals: &mut Array1<f32>,
        ) {
            for (i, &(x, y)) in self.samples.iter().enumerate() {
                let e = (p[0] * x).exp();
                residuals[i] = y - e;
                // d(residual)/da = -x * exp(a * x)
                jacobian[[i, 0]] = -x * e;
            }
        }
    }

    #[test]
    fn test_exp_fit_converges() {
        let truth = 0.7f32;
        let samples: Vec<(f32, f32)> = (0..20)
            .map(|i| {
                let x = i as f32 * 0.1;
                (x, (truth * x).exp())
            })
            .collect();

        let model = ExpFit { samples };
        let mut p = Array1::from_vec(vec![0.0f32]);
        let converged = LevMar::default().fit(&model, &mut p);

        assert!(converged);
        assert!((p[0] - truth).abs() < 1e-3, "estimated {}", p[0]);
    }

    #[test]
    fn test_zero_residuals_is_noop() {
        let model = ExpFit {
            samples: Vec::new(),
        };
        let mut p = Array1::from_vec(vec![0.3f32]);
        assert!(LevMar::default().fit(&model, &mut p));
        assert_eq!(p[0], 0.3);
    }
}
