mod architecture;
mod checkpoint;
mod native_engine;
pub mod open_clip;

pub use architecture::*;
pub use checkpoint::*;
pub use native_engine::*;
