use crate::error::{Error, Result};
use crate::features2d::{descriptor_dist_sqr, DESC_LEN};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Kd-tree over pooled 128-byte descriptors with Best-Bin-First search.
///
/// The tree borrows the descriptor pool; it never outlives it. Internal nodes
/// split the current subset at the median of the dimension with maximum
/// spread, leaves reference a single descriptor.
pub struct KdTree<'a> {
    descriptors: &'a [[u8; DESC_LEN]],
    root: Node,
}

enum Node {
    Leaf(usize),
    Split {
        dim: usize,
        value: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Min-heap entry for an unexplored branch; keyed by a lower bound on the
/// squared distance from the query to the branch's region.
struct Branch<'t> {
    bound: f32,
    node: &'t Node,
}

impl PartialEq for Branch<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bound == other.bound
    }
}

impl Eq for Branch<'_> {}

impl PartialOrd for Branch<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bound.total_cmp(&other.bound)
    }
}

/// Max-heap entry of the k-best result set.
#[derive(PartialEq)]
struct Candidate {
    dist_sqr: f32,
    index: usize,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist_sqr.total_cmp(&other.dist_sqr)
    }
}

impl<'a> KdTree<'a> {
    /// Build a tree over the whole descriptor pool.
    pub fn build(descriptors: &'a [[u8; DESC_LEN]]) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(Error::InvalidParameter(
                "Cannot build kd-tree over an empty descriptor pool".to_string(),
            ));
        }
        let mut indices: Vec<usize> = (0..descriptors.len()).collect();
        let root = Self::build_node(descriptors, &mut indices);
        Ok(Self { descriptors, root })
    }

    fn build_node(descriptors: &[[u8; DESC_LEN]], indices: &mut [usize]) -> Node {
        if indices.len() == 1 {
            return Node::Leaf(indices[0]);
        }

        // Pick the dimension with maximum spread over this subset.
        let mut best_dim = 0;
        let mut best_spread = -1i32;
        for dim in 0..DESC_LEN {
            let mut min = u8::MAX;
            let mut max = u8::MIN;
            for &i in indices.iter() {
                let v = descriptors[i][dim];
                min = min.min(v);
                max = max.max(v);
            }
            let spread = i32::from(max) - i32::from(min);
            if spread > best_spread {
                best_spread = spread;
                best_dim = dim;
            }
        }

        indices.sort_unstable_by_key(|&i| descriptors[i][best_dim]);
        let mid = indices.len() / 2;
        let low = f32::from(descriptors[indices[mid - 1]][best_dim]);
        let high = f32::from(descriptors[indices[mid]][best_dim]);
        let value = 0.5 * (low + high);

        let (left_indices, right_indices) = indices.split_at_mut(mid);
        let left = Box::new(Self::build_node(descriptors, left_indices));
        let right = Box::new(Self::build_node(descriptors, right_indices));

        Node::Split {
            dim: best_dim,
            value,
            left,
            right,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Best-Bin-First search depth that trades a small accuracy loss for a
    /// large speedup; grows with the log of the pool, about 200 for large
    /// trees.
    #[must_use]
    pub fn good_search_depth(&self) -> usize {
        let n = self.len().max(2) as f32;
        (n.log2() * 12.0).round() as usize
    }

    /// Approximate k nearest neighbors by Best-Bin-First: branches are
    /// explored in order of their lower-bound distance to the query, and the
    /// search stops after `max_leaf_visits` leaves. With a budget of at least
    /// the leaf count the result is exact. Returns `(pool index, squared
    /// distance)` in ascending distance order.
    #[must_use]
    pub fn knn_bbf(
        &self,
        query: &[u8; DESC_LEN],
        k: usize,
        max_leaf_visits: usize,
    ) -> Vec<(usize, f32)> {
        let mut best: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        let mut queue: BinaryHeap<Reverse<Branch>> = BinaryHeap::new();
        queue.push(Reverse(Branch {
            bound: 0.0,
            node: &self.root,
        }));

        let mut visits = 0usize;
        while let Some(Reverse(branch)) = queue.pop() {
            if best.len() == k && branch.bound >= best.peek().map_or(f32::INFINITY, |c| c.dist_sqr)
            {
                break;
            }

            // Greedy descent to a leaf; siblings go on the queue keyed by
            // their distance to the splitting plane.
            let mut node = branch.node;
            loop {
                match node {
                    Node::Leaf(index) => {
                        let dist_sqr = descriptor_dist_sqr(query, &self.descriptors[*index]);
                        best.push(Candidate {
                            dist_sqr,
                            index: *index,
                        });
                        if best.len() > k {
                            best.pop();
                        }
                        visits += 1;
                        break;
                    }
                    Node::Split {
                        dim,
                        value,
                        left,
                        right,
                    } => {
                        let diff = f32::from(query[*dim]) - value;
                        let (near, far) = if diff <= 0.0 {
                            (left, right)
                        } else {
                            (right, left)
                        };
                        queue.push(Reverse(Branch {
                            bound: diff * diff,
                            node: far,
                        }));
                        node = near;
                    }
                }
            }

            if visits >= max_leaf_visits {
                break;
            }
        }

        let mut result: Vec<(usize, f32)> =
            best.into_iter().map(|c| (c.index, c.dist_sqr)).collect();
        result.sort_by(|a, b| a.1.total_cmp(&b.1));
        result
    }
}
