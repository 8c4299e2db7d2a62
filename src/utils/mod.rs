mod plotting;
pub mod triangulation;
pub mod viewer;

pub use plotting::*;
pub use triangulation::{build_mesh, triangulate_grid, triangulate_samples, Triangle};
