mod ort_engine;

pub use ort_engine::*;
