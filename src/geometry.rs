use geo::{BoundingRect, MapCoords, coord};
use geo_types::{Coord, Polygon, Rect};

/// Tolerance for near-equality of coordinates and scores.
pub const TOL: f64 = 1e-9;

/// Scale factor used when interfacing with Clipper.
pub const CLIPPER_SCALE: f64 = 10_000_000.0;

pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < TOL
}

/// 2D affine transformation stored as `[a, b, c, d, e, f]` with
/// `x' = a*x + c*y + e` and `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(pub [f64; 6]);

impl Transform {
    pub fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, dx, dy])
    }

    /// Rotation by `angle_deg` degrees about `center`.
    pub fn rotation(angle_deg: f64, center: Coord<f64>) -> Self {
        let rad = angle_deg.to_radians();
        let (sin, cos) = rad.sin_cos();
        let x_off = center.x - center.x * cos + center.y * sin;
        let y_off = center.y - center.x * sin - center.y * cos;
        Self([cos, sin, -sin, cos, x_off, y_off])
    }

    /// Compose two transforms; `other` is applied first.
    pub fn multiply(&self, other: &Self) -> Self {
        let m1 = self.0;
        let m2 = other.0;
        Self([
            m1[0] * m2[0] + m1[2] * m2[1],
            m1[1] * m2[0] + m1[3] * m2[1],
            m1[0] * m2[2] + m1[2] * m2[3],
            m1[1] * m2[2] + m1[3] * m2[3],
            m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
            m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = self.0;
        (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
    }

    /// Row-major 3x3 matrix, `(x', y', 1) = M * (x, y, 1)`.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        let m = self.0;
        [[m[0], m[2], m[4]], [m[1], m[3], m[5]], [0.0, 0.0, 1.0]]
    }

    pub fn from_matrix(m: &[[f64; 3]; 3]) -> Self {
        Self([m[0][0], m[1][0], m[0][1], m[1][1], m[0][2], m[1][2]])
    }
}

/// Apply a transform to every coordinate of a polygon.
pub fn transform_polygon(poly: &Polygon<f64>, t: &Transform) -> Polygon<f64> {
    poly.map_coords(|c| {
        let (x, y) = t.apply(c.x, c.y);
        coord! { x: x, y: y }
    })
}

/// Axis-aligned rectangle `[0, width] x [0, height]` as a polygon,
/// with the same vertex order the fitter assumes for the bin.
pub fn rect_polygon(width: f64, height: f64) -> Polygon<f64> {
    Polygon::new(
        vec![(0.0, 0.0), (0.0, height), (width, height), (width, 0.0)].into(),
        vec![],
    )
}

/// Smallest rectangle covering both arguments.
pub fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}

/// Bounding rectangle of a set of polygons.
pub fn polygons_bounds<'a, I>(polys: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = &'a Polygon<f64>>,
{
    polys
        .into_iter()
        .filter_map(|p| p.bounding_rect())
        .reduce(merge_rects)
}
