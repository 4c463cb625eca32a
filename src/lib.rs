//! # prec
//!
//! A panorama recognizer: given an unordered collection of photographs,
//! discovers which subsets belong to the same panoramic scene, estimates a
//! rotate-scale transform per image, and composites each scene into a
//! stitched output.
//!
//! The pipeline runs in stages: scale-space keypoint extraction per image,
//! approximate nearest-neighbor matching over a global kd-tree, MSAC
//! similarity verification per image pair, connected-component grouping,
//! Levenberg-Marquardt bundle adjustment per panorama, and compositing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use prec::pipeline::{Pipeline, PipelineConfig};
//! use prec::imgcodecs::imwrite;
//! use std::path::PathBuf;
//!
//! # fn main() -> prec::error::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let inputs: Vec<PathBuf> = vec!["a.jpg".into(), "b.jpg".into()];
//! for (i, composite) in pipeline.run(&inputs)?.iter().enumerate() {
//!     imwrite(format!("result_{i}.jpg"), composite)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod calib3d;
pub mod core;
pub mod error;
pub mod features2d;
pub mod flann;
pub mod imgcodecs;
pub mod imgproc;
pub mod pipeline;
pub mod stitching;

pub mod prelude {
    //! Convenience module that re-exports commonly used items
    pub use crate::calib3d::{BundleAdjuster, Homography, Similarity};
    pub use crate::core::{GrayImage, Mat3, RgbImage, Vec2, Vec3};
    pub use crate::error::{Error, Result};
    pub use crate::features2d::{KeyPoint, Matcher, MatcherParams, SiftExtractor, SiftParams};
    pub use crate::pipeline::{Pipeline, PipelineConfig};
    pub use crate::stitching::{PanoImage, Panorama, Stitcher};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn test_basic_types_compose() {
        let t = Mat3::translation(2.0, 3.0) * Mat3::scaling(2.0);
        let p = t.transform_point(Vec2::new(1.0, 1.0));
        assert!((p.x - 4.0).abs() < 1e-6);
        assert!((p.y - 5.0).abs() < 1e-6);

        let pipeline = Pipeline::new(PipelineConfig::default());
        assert_eq!(pipeline.config().matcher.minimum_matches, 8);
        assert_eq!(pipeline.config().matcher.maximum_matches, 20);
        assert!((pipeline.config().sift.init_sigma - 1.6).abs() < 1e-6);
    }
}
