use crate::calib3d::Homography;
use crate::core::{RgbImage, Vec2};
use crate::error::Result;
use crate::features2d::{ImageMatch, KeyPoint, SiftExtractor};
use crate::imgproc::resize_bilinear;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A single input image of a panorama: the original pixels, its extracted
/// keypoints in the size-invariant frame, and the homography estimated for
/// it by bundle adjustment.
#[derive(Debug, Clone)]
pub struct PanoImage {
    file_name: String,
    original: RgbImage,
    id: i32,
    /// Factor the working copy was shrunk by before extraction; 1 when the
    /// input already fit the working bound.
    downscale_factor: f32,
    /// `1 / sqrt(W * H)` of the original: keypoint coordinates are divided
    /// by it so matching is invariant to image size.
    key_point_scale_factor: f32,
    keypoints: Vec<KeyPoint>,
    homography: Homography,
}

impl PanoImage {
    /// Build a panorama image: extract keypoints from a working copy no
    /// larger than `down_width` x `down_height`, then tag them with `id` and
    /// remap them into the centered, size-normalized frame.
    pub fn new(
        file_name: String,
        original: RgbImage,
        id: i32,
        extractor: &SiftExtractor,
        down_width: usize,
        down_height: usize,
    ) -> Result<Self> {
        let width = original.width() as f32;
        let height = original.height() as f32;

        let downscale_factor = 1.0f32
            .min(down_width as f32 / width)
            .min(down_height as f32 / height);

        let gray = original.to_gray();
        let working = if downscale_factor < 1.0 {
            resize_bilinear(
                &gray,
                (width * downscale_factor).round().max(1.0) as usize,
                (height * downscale_factor).round().max(1.0) as usize,
            )
        } else {
            gray
        };

        let mut keypoints = extractor.extract(&working)?;

        let key_point_scale_factor = 1.0 / (width * height).sqrt();
        let relative_scale = key_point_scale_factor / downscale_factor;
        let slide = Vec2::new(
            -0.5 * working.width() as f32,
            -0.5 * working.height() as f32,
        );
        for key in &mut keypoints {
            key.tag = id;
            key.set_xy((key.xy() + slide) * relative_scale);
        }

        debug!(
            "{file_name}: {} keypoints (working copy {}x{})",
            keypoints.len(),
            working.width(),
            working.height()
        );

        Ok(Self {
            file_name,
            original,
            id,
            downscale_factor,
            key_point_scale_factor,
            keypoints,
            homography: Homography::default(),
        })
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn original(&self) -> &RgbImage {
        &self.original
    }

    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    #[must_use]
    pub fn downscale_factor(&self) -> f32 {
        self.downscale_factor
    }

    #[must_use]
    pub fn key_point_scale_factor(&self) -> f32 {
        self.key_point_scale_factor
    }

    #[must_use]
    pub fn keypoints(&self) -> &[KeyPoint] {
        &self.keypoints
    }

    #[must_use]
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    pub fn set_homography(&mut self, homography: Homography) {
        self.homography = homography;
    }
}

/// A discovered panoramic scene: a connected set of images plus the
/// verified matches between them.
#[derive(Debug, Clone)]
pub struct Panorama {
    pub images: Vec<PanoImage>,
    pub matches: Vec<ImageMatch>,
}

/// Partition images into panoramas: nodes are image ids, edges are the
/// surviving image matches, and every connected component with at least two
/// images becomes one panorama. Unmatched images are discarded.
#[must_use]
pub fn group_panoramas(images: Vec<PanoImage>, matches: Vec<ImageMatch>) -> Vec<Panorama> {
    let mut adjacency: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    let image_order: Vec<i32> = images.iter().map(PanoImage::id).collect();
    for id in &image_order {
        adjacency.entry(*id).or_default();
    }
    for m in &matches {
        adjacency.entry(m.id(0)).or_default().push(m.id(1));
        adjacency.entry(m.id(1)).or_default().push(m.id(0));
    }

    let mut image_map: HashMap<i32, PanoImage> =
        images.into_iter().map(|img| (img.id(), img)).collect();
    let mut match_map: BTreeMap<(i32, i32), ImageMatch> =
        matches.into_iter().map(|m| ((m.id(0), m.id(1)), m)).collect();

    let mut visited: HashSet<i32> = HashSet::new();
    let mut result = Vec::new();

    // Depth-first enumeration, rooted in input order so component order (and
    // with it output lettering) is stable.
    for root in image_order {
        if visited.contains(&root) {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![root];
        visited.insert(root);
        while let Some(id) = stack.pop() {
            component.push(id);
            if let Some(neighbors) = adjacency.get(&id) {
                for &next in neighbors {
                    if visited.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }

        if component.len() < 2 {
            debug!("image {root} matches nothing; not part of any panorama");
            continue;
        }

        let node_set: HashSet<i32> = component.iter().copied().collect();
        let component_matches: Vec<ImageMatch> = {
            let keys: Vec<(i32, i32)> = match_map
                .keys()
                .filter(|(a, _)| node_set.contains(a))
                .copied()
                .collect();
            keys.into_iter()
                .filter_map(|k| match_map.remove(&k))
                .collect()
        };

        let panorama_images: Vec<PanoImage> = component
            .iter()
            .filter_map(|id| image_map.remove(id))
            .collect();

        result.push(Panorama {
            images: panorama_images,
            matches: component_matches,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features2d::ImageMatch;

    fn bare_image(id: i32) -> PanoImage {
        PanoImage {
            file_name: format!("img{id}"),
            original: RgbImage::new(4, 4),
            id,
            downscale_factor: 1.0,
            key_point_scale_factor: 0.25,
            keypoints: Vec::new(),
            homography: Homography::default(),
        }
    }

    #[test]
    fn test_two_components() {
        let images = vec![bare_image(1), bare_image(2), bare_image(3), bare_image(4)];
        let matches = vec![
            ImageMatch::new(1, 2, Vec::new()),
            ImageMatch::new(3, 4, Vec::new()),
        ];

        let panoramas = group_panoramas(images, matches);
        assert_eq!(panoramas.len(), 2);
        assert_eq!(panoramas[0].images.len(), 2);
        assert_eq!(panoramas[1].images.len(), 2);
        assert_eq!(panoramas[0].matches.len(), 1);
        assert_eq!(panoramas[1].matches.len(), 1);

        // Partition: no image or match appears twice.
        let mut seen = HashSet::new();
        for p in &panoramas {
            for img in &p.images {
                assert!(seen.insert(img.id()));
            }
        }
    }

    #[test]
    fn test_singleton_dropped() {
        let images = vec![bare_image(1), bare_image(2), bare_image(3)];
        let matches = vec![ImageMatch::new(1, 2, Vec::new())];

        let panoramas = group_panoramas(images, matches);
        assert_eq!(panoramas.len(), 1);
        assert_eq!(panoramas[0].images.len(), 2);
    }

    #[test]
    fn test_chain_is_one_component() {
        let images = vec![bare_image(1), bare_image(2), bare_image(3)];
        let matches = vec![
            ImageMatch::new(1, 2, Vec::new()),
            ImageMatch::new(2, 3, Vec::new()),
        ];

        let panoramas = group_panoramas(images, matches);
        assert_eq!(panoramas.len(), 1);
        assert_eq!(panoramas[0].images.len(), 3);
        assert_eq!(panoramas[0].matches.len(), 2);
    }

    #[test]
    fn test_no_matches_no_panoramas() {
        let images = vec![bare_image(1), bare_image(2)];
        assert!(group_panoramas(images, Vec::new()).is_empty());
    }
}
