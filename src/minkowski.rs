use geo::{BoundingRect, ConvexHull, MapCoords, coord};
use geo_types::{LineString, MultiPoint, Point, Polygon};

/// No-fit polygon of `b` against `a`, both taken at their current
/// orientation with `a` anchored at its original pose.
///
/// Built as the convex hull of all pairwise sums of `-a` and `b`
/// exterior vertices, reflected and shifted so the boundary traces the
/// positions of `b`'s reference vertex where the shapes touch without
/// overlap. Exact for convex inputs; an over-restricting hull otherwise.
pub fn minkowski_diff_nfp(a: &Polygon<f64>, b: &Polygon<f64>) -> Polygon<f64> {
    let a_ext = &a.exterior().0;
    let b_ext = &b.exterior().0;

    let mut sums = Vec::with_capacity(a_ext.len() * b_ext.len());
    for ca in a_ext {
        for cb in b_ext {
            sums.push(Point::new(-ca.x + cb.x, -ca.y + cb.y));
        }
    }

    let hull = MultiPoint::new(sums).convex_hull();

    let rp = b_ext[0];
    hull.map_coords(|c| coord! { x: -c.x + rp.x, y: -c.y + rp.y })
}

/// Inner-fit polygon of `poly` inside the axis-aligned `rect`: the
/// rectangle of positions of `poly`'s reference vertex keeping it fully
/// inside. `None` when the shape cannot fit at this orientation.
pub fn rectangle_ifp(rect: &Polygon<f64>, poly: &Polygon<f64>) -> Option<Polygon<f64>> {
    let rb = rect.bounding_rect()?;
    let pb = poly.bounding_rect()?;

    if pb.width() > rb.width() || pb.height() > rb.height() {
        return None;
    }

    let rp = poly.exterior().0[0];
    let min_x = rb.min().x + (rp.x - pb.min().x);
    let min_y = rb.min().y + (rp.y - pb.min().y);
    let max_x = rb.max().x - (pb.max().x - rp.x);
    let max_y = rb.max().y - (pb.max().y - rp.y);

    Some(Polygon::new(
        LineString::from(vec![
            (min_x, min_y),
            (min_x, max_y),
            (max_x, max_y),
            (max_x, min_y),
        ]),
        vec![],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{almost_equal, rect_polygon};
    use geo::Area;

    fn square(size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]),
            vec![],
        )
    }

    #[test]
    fn nfp_of_two_squares() {
        let a = square(2.0);
        let b = square(1.0);
        let nfp = minkowski_diff_nfp(&a, &b);
        let r = nfp.bounding_rect().unwrap();
        assert!(almost_equal(r.min().x, -1.0));
        assert!(almost_equal(r.min().y, -1.0));
        assert!(almost_equal(r.max().x, 2.0));
        assert!(almost_equal(r.max().y, 2.0));
        assert!(almost_equal(nfp.unsigned_area(), 9.0));
    }

    #[test]
    fn nfp_reference_vertex_offset() {
        // shifting b does not change the locus
        let a = square(2.0);
        let b = square(1.0);
        let shifted = crate::geometry::transform_polygon(
            &b,
            &crate::geometry::Transform::translation(10.0, -4.0),
        );
        let nfp = minkowski_diff_nfp(&a, &b);
        let nfp_shifted = minkowski_diff_nfp(&a, &shifted);
        let r = nfp.bounding_rect().unwrap();
        let s = nfp_shifted.bounding_rect().unwrap();
        assert!(almost_equal(r.min().x, s.min().x));
        assert!(almost_equal(r.max().y, s.max().y));
    }

    #[test]
    fn ifp_inside_larger_rect() {
        let bin = rect_polygon(10.0, 10.0);
        let part = square(2.0);
        let ifp = rectangle_ifp(&bin, &part).unwrap();
        assert!(almost_equal(ifp.unsigned_area(), 64.0));
        let r = ifp.bounding_rect().unwrap();
        assert!(almost_equal(r.min().x, 0.0));
        assert!(almost_equal(r.max().x, 8.0));
    }

    #[test]
    fn ifp_rejects_oversized_part() {
        let bin = rect_polygon(3.0, 3.0);
        let part = square(5.0);
        assert!(rectangle_ifp(&bin, &part).is_none());
    }
}
