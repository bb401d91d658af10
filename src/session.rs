use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use geo_types::Polygon;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{BinSpec, NestConfig};
use crate::error::NestError;
use crate::ga::FitterGa;
use crate::raster;

/// Phase of a run, reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadImages,
    Generations,
}

/// Progress notification: `index` of `total` steps of `stage` done.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub stage: Stage,
    pub index: usize,
    pub total: usize,
}

/// One shape to pack, already extracted to an outline polygon.
#[derive(Debug, Clone)]
pub struct NestShape {
    /// Caller-assigned id, unique and nonzero; copies share it.
    pub shape_id: u32,
    /// Source image, carried through to the layout for exporting.
    pub path: Option<PathBuf>,
    pub polygon: Polygon<f64>,
    pub count: usize,
}

/// One sticker image to extract and pack.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub path: PathBuf,
    pub count: usize,
}

/// Final position of one shape copy inside a bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub shape_id: u32,
    pub path: Option<PathBuf>,
    /// Row-major affine mapping source pixel coordinates to bin
    /// coordinates.
    pub transform: [[f64; 3]; 3],
}

/// Result of a run: placements grouped per bin, in bin order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub fitness: f64,
    pub bins: Vec<Vec<Placement>>,
    pub unplaced: usize,
}

impl Layout {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn validate_shapes(shapes: &[NestShape]) -> Result<(), NestError> {
    if shapes.is_empty() {
        return Err(NestError::InvalidInput("at least one shape is required".into()));
    }
    let mut seen = HashSet::new();
    for shape in shapes {
        if shape.shape_id == 0 {
            return Err(NestError::InvalidInput(
                "shape_id 0 is reserved for the bin".into(),
            ));
        }
        if !seen.insert(shape.shape_id) {
            return Err(NestError::InvalidInput(format!(
                "duplicate shape_id {}",
                shape.shape_id
            )));
        }
        if shape.count == 0 {
            return Err(NestError::InvalidInput(format!(
                "shape {} has count 0",
                shape.shape_id
            )));
        }
        let ring = &shape.polygon.exterior().0;
        if ring.len() < 4 {
            return Err(NestError::InvalidInput(format!(
                "shape {} needs at least 3 vertices",
                shape.shape_id
            )));
        }
        if ring.iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
            return Err(NestError::InvalidInput(format!(
                "shape {} has non-finite coordinates",
                shape.shape_id
            )));
        }
    }
    Ok(())
}

/// Pack the given shapes into bins and return the best layout found.
///
/// The worker pool lives for the duration of the call; the NFP cache is
/// discarded with it.
pub fn run_nest(
    shapes: &[NestShape],
    bin: BinSpec,
    config: &NestConfig,
    progress: Option<&dyn Fn(Progress)>,
) -> Result<Layout, NestError> {
    validate_shapes(shapes)?;

    let mut ga = FitterGa::new(bin, *config)?;
    let inputs: Vec<(u32, Polygon<f64>, usize)> = shapes
        .iter()
        .map(|s| (s.shape_id, s.polygon.clone(), s.count))
        .collect();
    ga.set_shapes(&inputs);

    let best = ga.calculate_fit(progress)?;

    let paths: HashMap<u32, PathBuf> = shapes
        .iter()
        .filter_map(|s| s.path.clone().map(|p| (s.shape_id, p)))
        .collect();

    let bins = best
        .fitted
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|bin| {
            bin.iter()
                .map(|&i| {
                    let poly = &best.polys[i];
                    Placement {
                        shape_id: poly.shape_id,
                        path: paths.get(&poly.shape_id).cloned(),
                        transform: poly.transform.matrix(),
                    }
                })
                .collect()
        })
        .collect();

    Ok(Layout {
        fitness: best.fitness.unwrap_or(f64::INFINITY),
        bins,
        unplaced: best.polys.iter().filter(|p| !p.placed).count(),
    })
}

/// Extract outlines from sticker images and pack them.
///
/// Shapes are assigned ids `1..` in input order. `outset` grows each
/// outline before packing, in pixels; fold margins and padding into it.
pub fn run_nest_images(
    images: &[ImageRequest],
    outset: f64,
    bin: BinSpec,
    config: &NestConfig,
    progress: Option<&dyn Fn(Progress)>,
) -> Result<Layout, NestError> {
    if images.is_empty() {
        return Err(NestError::InvalidInput("at least one image is required".into()));
    }
    config.validate()?;

    if let Some(cb) = progress {
        cb(Progress {
            stage: Stage::LoadImages,
            index: 0,
            total: images.len(),
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_workers)
        .build()?;
    let outlines: Vec<Result<Polygon<f64>, NestError>> = pool.install(|| {
        images
            .par_iter()
            .map(|request| raster::load_outline(&request.path, outset))
            .collect()
    });

    let mut shapes = Vec::with_capacity(images.len());
    for (i, (request, outline)) in images.iter().zip(outlines).enumerate() {
        shapes.push(NestShape {
            shape_id: (i + 1) as u32,
            path: Some(request.path.clone()),
            polygon: outline?,
            count: request.count,
        });
    }

    if let Some(cb) = progress {
        cb(Progress {
            stage: Stage::LoadImages,
            index: images.len(),
            total: images.len(),
        });
    }

    run_nest(&shapes, bin, config, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::LineString;

    fn square(size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]),
            vec![],
        )
    }

    fn shape(id: u32, count: usize) -> NestShape {
        NestShape {
            shape_id: id,
            path: None,
            polygon: square(10.0),
            count,
        }
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            validate_shapes(&[]),
            Err(NestError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_reserved_and_duplicate_ids() {
        assert!(validate_shapes(&[shape(0, 1)]).is_err());
        assert!(validate_shapes(&[shape(1, 1), shape(1, 1)]).is_err());
        assert!(validate_shapes(&[shape(1, 1), shape(2, 1)]).is_ok());
    }

    #[test]
    fn rejects_degenerate_polygons() {
        let mut bad = shape(1, 1);
        bad.polygon = Polygon::new(LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]), vec![]);
        assert!(validate_shapes(&[bad]).is_err());

        let mut nan = shape(1, 1);
        nan.polygon = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (f64::NAN, 1.0)]),
            vec![],
        );
        assert!(validate_shapes(&[nan]).is_err());

        assert!(validate_shapes(&[shape(1, 0)]).is_err());
    }
}
