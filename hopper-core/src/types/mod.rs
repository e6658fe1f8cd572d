mod candidate;
mod reservation;

pub use candidate::*;
pub use reservation::*;
