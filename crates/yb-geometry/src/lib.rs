pub mod gds;
pub mod polygon;
pub mod raster;
pub mod spline;
pub mod ybranch;

pub use gds::{encode_gds, write_gds, LayoutOptions, MAX_BOUNDARY_VERTICES};
pub use polygon::*;
pub use raster::*;
pub use spline::*;
pub use ybranch::*;
