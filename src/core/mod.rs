pub mod image;
pub mod matrix;

pub use self::image::*;
pub use self::matrix::*;
