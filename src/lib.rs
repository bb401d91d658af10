//! Nesting engine for irregular 2D shapes cut from sticker images.
//!
//! Shapes are packed into fixed-size rectangular bins by a greedy
//! bottom-left-fill placer driven by no-fit and inner-fit polygons,
//! while a genetic algorithm searches over orderings and rotations to
//! minimize bin count and wasted area.
//!
//! The usual entry points are [`run_nest`] for pre-extracted outline
//! polygons and [`run_nest_images`] for raw sticker images. The result
//! is a [`Layout`]: per-bin placements, each an affine transform from
//! source pixel coordinates into bin coordinates. Rendering layouts and
//! writing files stay outside this crate; [`export::layout_svg`] helps
//! with the former.

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod fit_poly;
pub mod ga;
pub mod geometry;
pub mod minkowski;
pub mod nest;
pub mod raster;
pub mod session;

pub use config::{BinSpec, NestConfig};
pub use error::NestError;
pub use ga::{FitterGa, Solution};
pub use session::{
    ImageRequest, Layout, NestShape, Placement, Progress, Stage, run_nest, run_nest_images,
};
