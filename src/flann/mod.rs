pub mod kdtree;

pub use kdtree::KdTree;
