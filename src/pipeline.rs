use crate::calib3d::BundleAdjuster;
use crate::core::RgbImage;
use crate::error::Result;
use crate::features2d::{KeyPoint, Matcher, MatcherParams, SiftExtractor, SiftParams};
use crate::imgcodecs::imread;
use crate::stitching::{group_panoramas, PanoImage, Panorama, Stitcher};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Everything tunable about a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sift: SiftParams,
    pub matcher: MatcherParams,
    /// Bound on the working copy keypoints are extracted from; larger
    /// inputs are shrunk to fit.
    pub working_width: usize,
    pub working_height: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sift: SiftParams::default(),
            matcher: MatcherParams::default(),
            working_width: 800,
            working_height: 600,
        }
    }
}

/// Top-level pipeline context. Owns the image-id allocator, so ids stay
/// unique even when extraction fans out over a thread pool.
pub struct Pipeline {
    config: PipelineConfig,
    next_id: AtomicI32,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            next_id: AtomicI32::new(1),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Allocate a fresh image id; monotonically increasing, thread-safe.
    pub fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register an already-decoded image: allocates an id and extracts its
    /// keypoints.
    pub fn register(&self, name: String, image: RgbImage) -> Result<PanoImage> {
        let extractor = SiftExtractor::new(self.config.sift.clone());
        PanoImage::new(
            name,
            image,
            self.next_id(),
            &extractor,
            self.config.working_width,
            self.config.working_height,
        )
    }

    /// Decode one image file and register it.
    pub fn load_image(&self, path: &Path) -> Result<PanoImage> {
        let image = imread(path)?;
        self.register(path.display().to_string(), image)
    }

    /// Decode and register every input. Per-image extraction is independent
    /// and runs on the rayon pool when the feature is on.
    pub fn load_images(&self, paths: &[PathBuf]) -> Result<Vec<PanoImage>> {
        #[cfg(feature = "rayon")]
        let images = paths
            .par_iter()
            .map(|p| self.load_image(p))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "rayon"))]
        let images = paths
            .iter()
            .map(|p| self.load_image(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(images)
    }

    /// Match all images against each other and partition them into
    /// panoramas.
    #[must_use]
    pub fn discover(&self, images: Vec<PanoImage>) -> Vec<Panorama> {
        let pool: Vec<KeyPoint> = images
            .iter()
            .flat_map(|img| img.keypoints().iter().cloned())
            .collect();
        info!(
            "matching {} keypoints across {} images",
            pool.len(),
            images.len()
        );

        let matcher = Matcher::new(self.config.matcher.clone());
        let matches = matcher.match_keypoints(&pool);
        info!("{} image pairs survived verification", matches.len());

        group_panoramas(images, matches)
    }

    /// The whole run: load, match, group, refine, composite. Returns one
    /// stitched image per discovered panorama, in discovery order.
    pub fn run(&self, paths: &[PathBuf]) -> Result<Vec<RgbImage>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let images = self.load_images(paths)?;
        let mut panoramas = self.discover(images);
        info!("{} panoramas discovered", panoramas.len());

        let adjuster = BundleAdjuster::new();
        let stitcher = Stitcher::new();

        let mut composites = Vec::with_capacity(panoramas.len());
        for panorama in &mut panoramas {
            adjuster.optimize(panorama);
            composites.push(stitcher.stitch(panorama).normalized());
        }
        Ok(composites)
    }
}
