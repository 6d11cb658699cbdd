mod gate;

pub use gate::*;
