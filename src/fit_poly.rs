use geo::{Centroid, Translate};
use geo_types::{Coord, Polygon};

use crate::geometry::{Transform, transform_polygon};

/// Placement state of one shape instance.
///
/// `polygon` is always `transform` applied to `original`; rotation and
/// translation update both together. `rotation` accumulates degrees
/// without wrapping so the transform reflects the full history; cache
/// keys canonicalize it on construction.
#[derive(Debug, Clone)]
pub struct FitPoly {
    pub shape_id: u32,
    pub instance_id: u64,
    pub original: Polygon<f64>,
    pub polygon: Polygon<f64>,
    pub rotation: f64,
    pub transform: Transform,
    pub bin_index: usize,
    pub placed: bool,
}

impl FitPoly {
    pub fn new(shape_id: u32, instance_id: u64, polygon: Polygon<f64>) -> Self {
        Self {
            shape_id,
            instance_id,
            original: polygon.clone(),
            polygon,
            rotation: 0.0,
            transform: Transform::identity(),
            bin_index: 0,
            placed: false,
        }
    }

    /// First vertex of the exterior ring; NFPs and IFPs are expressed
    /// against this handle.
    pub fn ref_point(&self) -> Coord<f64> {
        self.polygon.exterior().0[0]
    }

    /// Rotate in place about the centroid of the current exterior ring.
    pub fn rotate(&mut self, angle_deg: f64) {
        if angle_deg == 0.0 {
            return;
        }
        self.rotation += angle_deg;

        let center = self
            .polygon
            .exterior()
            .centroid()
            .map(|p| p.0)
            .unwrap_or_else(|| self.ref_point());
        let rotation = Transform::rotation(angle_deg, center);

        self.transform = rotation.multiply(&self.transform);
        self.polygon = transform_polygon(&self.polygon, &rotation);
    }

    /// Translate in place.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.transform = Transform::translation(dx, dy).multiply(&self.transform);
        self.polygon = self.polygon.translate(dx, dy);
    }
}
