pub mod health;
pub mod index;
pub mod ocr;

pub use health::*;
pub use index::*;
pub use ocr::*;
