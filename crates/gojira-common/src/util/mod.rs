mod bitarray;
mod bitmatrix;
mod bounded_index;

pub use bitarray::*;
pub use bitmatrix::*;
pub use bounded_index::*;
