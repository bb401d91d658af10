use std::collections::HashMap;

use geo_types::Polygon;

use crate::config::BinSpec;
use crate::geometry::{Transform, transform_polygon};
use crate::session::Layout;

/// Render a layout to one SVG document per bin.
///
/// Outlines are looked up by shape id and moved to their fitted
/// positions. The layout is computed with y pointing up, so the content
/// is wrapped in a flip group to render top-down. Pure strings; writing
/// files is the caller's business.
pub fn layout_svg(
    layout: &Layout,
    outlines: &HashMap<u32, Polygon<f64>>,
    bin: BinSpec,
) -> Vec<String> {
    layout
        .bins
        .iter()
        .map(|placements| {
            let mut body = String::new();
            for placement in placements {
                let Some(outline) = outlines.get(&placement.shape_id) else {
                    continue;
                };
                let moved =
                    transform_polygon(outline, &Transform::from_matrix(&placement.transform));
                let points: Vec<String> = moved
                    .exterior()
                    .0
                    .iter()
                    .map(|c| format!("{},{}", c.x, c.y))
                    .collect();
                body.push_str(&format!(
                    "<polygon points=\"{}\" fill=\"none\" stroke=\"black\"/>\n",
                    points.join(" ")
                ));
            }
            format!(
                concat!(
                    "<svg xmlns=\"http://www.w3.org/2000/svg\" ",
                    "width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
                    "<g transform=\"translate(0,{h})\"><g transform=\"scale(1,-1)\">\n",
                    "{body}",
                    "<rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" ",
                    "fill=\"none\" stroke=\"blue\"/>\n",
                    "</g></g></svg>"
                ),
                w = bin.width,
                h = bin.height,
                body = body,
            )
        })
        .collect()
}
