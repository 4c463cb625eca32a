pub mod compositor;
pub mod panorama;

pub use compositor::Stitcher;
pub use panorama::{group_panoramas, PanoImage, Panorama};
