mod adaptive_batcher;

pub use adaptive_batcher::*;
