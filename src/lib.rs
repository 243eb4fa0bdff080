// Library exports for testing and reuse

pub mod cli;
pub mod config;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod idw;
pub mod import;
pub mod io;
pub mod kdtree;
pub mod meteohub;
pub mod normalize;
pub mod pipeline;
pub mod sampler;
pub mod smooth;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use config::SurfaceConfig;
pub use error::{Result, SurfaceError};
pub use geometry::{ObservationPoint, QueryGrid, RasterGeometry, SurfaceGrid};
pub use io::{read_reference_geometry, write_surface, PixelType, WriteOptions};
pub use normalize::DegeneratePolicy;
pub use pipeline::SurfacePipeline;
