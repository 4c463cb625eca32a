use crate::calib3d::{Ransac, Similarity};
use crate::features2d::KeyPoint;
use crate::flann::KdTree;
use crate::core::Vec2;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};

/// The slice of a keypoint that outlives the matching stage: its normalized
/// position and the id of the image that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchKey {
    pub pos: Vec2,
    pub tag: i32,
}

impl MatchKey {
    #[must_use]
    pub fn of(key: &KeyPoint) -> Self {
        Self {
            pos: key.xy(),
            tag: key.tag,
        }
    }
}

/// A correspondence between keypoints of two different images.
///
/// Slot 0 always holds the key with the numerically larger tag, so repeated
/// lookups against the same image pair never flip sides.
#[derive(Debug, Clone)]
pub struct Match {
    keys: [MatchKey; 2],
    dist_sqr: f32,
}

impl Match {
    #[must_use]
    pub fn new(key0: MatchKey, key1: MatchKey, dist_sqr: f32) -> Self {
        let keys = if key0.tag > key1.tag {
            [key0, key1]
        } else {
            [key1, key0]
        };
        Self { keys, dist_sqr }
    }

    #[must_use]
    pub fn key(&self, slot: usize) -> &MatchKey {
        &self.keys[slot]
    }

    #[must_use]
    pub fn dist_sqr(&self) -> f32 {
        self.dist_sqr
    }
}

/// All surviving correspondences between one pair of images, together with
/// the similarity model geometric verification settled on.
#[derive(Debug, Clone)]
pub struct ImageMatch {
    ids: (i32, i32),
    pub matches: Vec<Match>,
    pub model: Option<Similarity>,
}

impl ImageMatch {
    #[must_use]
    pub fn new(id0: i32, id1: i32, matches: Vec<Match>) -> Self {
        let ids = if id0 > id1 { (id0, id1) } else { (id1, id0) };
        Self {
            ids,
            matches,
            model: None,
        }
    }

    /// Image id in the given slot; slot 0 is the larger id.
    #[must_use]
    pub fn id(&self, slot: usize) -> i32 {
        match slot {
            0 => self.ids.0,
            _ => self.ids.1,
        }
    }
}

/// Matching-stage knobs, exposed as configuration.
#[derive(Debug, Clone)]
pub struct MatcherParams {
    /// Pairs with fewer surviving matches than this are dropped.
    pub minimum_matches: usize,
    /// Keep at most this many best matches per pair; 0 keeps all.
    pub maximum_matches: usize,
    /// Geometrically verify pairs with MSAC.
    pub use_ransac: bool,
    /// RANSAC seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            minimum_matches: 8,
            maximum_matches: 20,
            use_ransac: true,
            seed: None,
        }
    }
}

/// Lowe ratio: the best squared distance must be below `0.8^2` of the
/// second best for a match to count as distinctive.
const DISTINCTIVENESS_RATIO_SQR: f32 = 0.8 * 0.8;

/// RANSAC configuration used for pair verification.
const INLIER_FRACTION_PRIOR: f32 = 0.5;
const TARGET_PROBABILITY: f32 = 0.95;
const MAX_FIT_ERROR: f32 = 0.01 * 0.01;

/// Builds the pairwise match graph: pools every descriptor into one kd-tree,
/// queries each keypoint against it, and buckets the distinctive survivors
/// per image pair before geometric verification prunes the buckets.
pub struct Matcher {
    params: MatcherParams,
}

impl Matcher {
    #[must_use]
    pub fn new(params: MatcherParams) -> Self {
        Self { params }
    }

    /// Match every keypoint of the pool against every other image and return
    /// the geometrically verified edges of the image-match graph, ordered by
    /// image-id pair.
    #[must_use]
    pub fn match_keypoints(&self, pool: &[KeyPoint]) -> Vec<ImageMatch> {
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let descriptors: Vec<[u8; crate::features2d::DESC_LEN]> =
            pool.iter().map(|k| k.desc).collect();

        // Too small a pool cannot produce a pair that survives filtering.
        if descriptors.len() < self.params.maximum_matches * 2 {
            return Vec::new();
        }
        let Ok(tree) = KdTree::build(&descriptors) else {
            return Vec::new();
        };
        let search_depth = tree.good_search_depth();

        let mut buckets: BTreeMap<(i32, i32), Vec<Match>> = BTreeMap::new();
        let mut used_pairs: HashSet<(usize, usize)> = HashSet::new();

        for (i, key) in pool.iter().enumerate() {
            let neighbors = tree.knn_bbf(&descriptors[i], 3, search_depth);
            if neighbors.len() < 3 {
                continue;
            }

            // The closest hit is usually the query itself.
            let (best, second) = if neighbors[0].0 == i {
                (neighbors[1], neighbors[2])
            } else {
                (neighbors[0], neighbors[1])
            };

            // Distinctiveness: reject when the runner-up is nearly as close.
            if best.1 / second.1 > DISTINCTIVENESS_RATIO_SQR {
                continue;
            }

            let other = &pool[best.0];
            if other.tag == key.tag {
                continue;
            }

            // A and B matching each other produce the same pair twice.
            let pair = (i.min(best.0), i.max(best.0));
            if !used_pairs.insert(pair) {
                continue;
            }

            let m = Match::new(MatchKey::of(key), MatchKey::of(other), best.1);
            let bucket_key = (m.key(0).tag, m.key(1).tag);
            buckets.entry(bucket_key).or_default().push(m);
        }

        let mut result = Vec::new();
        for ((id0, id1), mut matches) in buckets {
            if matches.len() < self.params.minimum_matches {
                continue;
            }

            let mut model = None;
            // RANSAC needs one match pair to fit plus one to verify.
            if self.params.use_ransac && matches.len() >= 3 {
                let ransac = Ransac::new(self.params.minimum_matches);
                let Some((fitted, inliers)) = ransac.fit::<Similarity>(
                    &matches,
                    INLIER_FRACTION_PRIOR,
                    TARGET_PROBABILITY,
                    MAX_FIT_ERROR,
                    &mut rng,
                ) else {
                    debug!("pair ({id0}, {id1}) dropped: no acceptable similarity model");
                    continue;
                };
                matches = inliers;
                model = Some(fitted);
            }

            if self.params.maximum_matches != 0 && matches.len() > self.params.maximum_matches {
                let cut = self.params.maximum_matches - 1;
                matches.select_nth_unstable_by(cut, |a, b| a.dist_sqr.total_cmp(&b.dist_sqr));
                matches.truncate(self.params.maximum_matches);
            }

            let mut image_match = ImageMatch::new(id0, id1, matches);
            image_match.model = model;
            result.push(image_match);
        }

        result
    }
}
