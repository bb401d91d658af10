use std::cmp::Ordering;
use std::path::Path;

use geo::{Area, ConcaveHull, Simplify};
use geo_clipper::{Clipper, EndType, JoinType};
use geo_types::{MultiPoint, Point, Polygon};
use image::RgbaImage;

use crate::error::NestError;
use crate::geometry::{CLIPPER_SCALE, TOL};

/// Concavity used when joining boundary pixels into an outline.
const HULL_CONCAVITY: f64 = 2.0;

/// Simplification tolerance applied to the traced outline, in pixels.
const SIMPLIFY_EPSILON: f64 = 2.0;

/// Load a sticker image and trace the outline of its opaque area,
/// grown by `outset` pixels.
pub fn load_outline(path: &Path, outset: f64) -> Result<Polygon<f64>, NestError> {
    let img = image::open(path).map_err(|source| NestError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    outline_from_rgba(&img.to_rgba8(), outset).ok_or_else(|| NestError::EmptyOutline {
        path: path.to_path_buf(),
    })
}

/// Outline of the non-transparent area of an image, or `None` when the
/// image holds no usable opaque region.
///
/// Rows are flipped so the outline lives in y-up bin coordinates; the
/// exporter flips back.
pub fn outline_from_rgba(img: &RgbaImage, outset: f64) -> Option<Polygon<f64>> {
    let (w, h) = img.dimensions();
    let opaque = |x: u32, y: u32| img.get_pixel(x, y).0[3] != 0;

    // Pixels on the rim of the opaque region carry all the outline
    // information the hull needs.
    let mut boundary = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if !opaque(x, y) {
                continue;
            }
            let edge = x == 0
                || y == 0
                || x == w - 1
                || y == h - 1
                || !opaque(x - 1, y)
                || !opaque(x + 1, y)
                || !opaque(x, y - 1)
                || !opaque(x, y + 1);
            if edge {
                boundary.push(Point::new(f64::from(x), f64::from(h - 1 - y)));
            }
        }
    }
    if boundary.len() < 3 {
        return None;
    }

    let hull = Simplify::simplify(
        &MultiPoint::new(boundary).concave_hull(HULL_CONCAVITY),
        &SIMPLIFY_EPSILON,
    );
    if hull.unsigned_area() < TOL {
        return None;
    }
    if outset == 0.0 {
        return Some(hull);
    }

    // Buffer outward through Clipper and keep the largest ring.
    hull.offset(outset, JoinType::Miter(2.0), EndType::ClosedPolygon, CLIPPER_SCALE)
        .0
        .into_iter()
        .max_by(|a, b| {
            a.unsigned_area()
                .partial_cmp(&b.unsigned_area())
                .unwrap_or(Ordering::Equal)
        })
}
