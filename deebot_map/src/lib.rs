//! The map pipeline: reassembles the compressed raster into floor and wall
//! pixel sets, projects rooms and entities into the fixed pixel grid with
//! the center-origin transform, and composes the layered map model handed
//! to the orchestration layer.

mod builder;
mod model;
mod polygon;
mod raster;
mod transform;

pub use builder::*;
pub use model::*;
pub use polygon::*;
pub use raster::*;
pub use transform::*;
