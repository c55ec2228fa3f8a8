mod error;
mod grid;
mod rng;

pub use error::Error;
pub use grid::Grid;
pub use rng::StarRng;
