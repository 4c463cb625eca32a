pub mod bundle;
pub mod homography;
pub mod levmar;
pub mod ransac;
pub mod similarity;

pub use bundle::BundleAdjuster;
pub use homography::Homography;
pub use levmar::{LevMar, LevMarModel};
pub use ransac::{estimate_iterations, Ransac, RansacModel};
pub use similarity::{Similarity, EPS};
