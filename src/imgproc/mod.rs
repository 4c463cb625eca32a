pub mod drawing;
pub mod filter;
pub mod geometric;
pub mod gradient;

pub use drawing::*;
pub use filter::*;
pub use geometric::*;
pub use gradient::*;
