pub mod keypoints;
pub mod matching;
pub mod octave;
pub mod sift;

pub use keypoints::*;
pub use matching::*;
pub use octave::Octave;
pub use sift::*;
