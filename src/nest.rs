use std::collections::HashMap;

use geo::{Area, BooleanOps, BoundingRect, Rotate, coord};
use geo_types::{MultiLineString, MultiPolygon, Polygon, Rect};

use crate::cache::{NfpCache, NfpKey};
use crate::error::NestError;
use crate::fit_poly::FitPoly;
use crate::geometry::{almost_equal, merge_rects, polygons_bounds, transform_polygon};
use crate::minkowski::{minkowski_diff_nfp, rectangle_ifp};

/// One deferred fit-polygon computation.
#[derive(Debug, Clone)]
pub enum NfpTask {
    InnerFit {
        bin: Polygon<f64>,
        part: Polygon<f64>,
    },
    NoFit {
        stationary: Polygon<f64>,
        stationary_rotation: f64,
        moving: Polygon<f64>,
    },
}

impl NfpTask {
    /// Runs entirely on worker threads; the result is folded back into
    /// the shared cache by the coordinator.
    pub fn compute(&self) -> Option<Polygon<f64>> {
        match self {
            NfpTask::InnerFit { bin, part } => rectangle_ifp(bin, part),
            NfpTask::NoFit {
                stationary,
                stationary_rotation,
                moving,
            } => {
                // The NFP is cached with the stationary shape at its
                // original orientation, so undo its rotation on the
                // moving shape. Translation cancels out of the sums.
                let relative = moving.rotate_around_center(-stationary_rotation);
                Some(minkowski_diff_nfp(stationary, &relative))
            }
        }
    }
}

/// Collect every fit polygon the given orderings will need that is not
/// cached yet, deduplicated by key.
pub fn missing_nfp_tasks<'a, I>(
    solutions: I,
    bin: &FitPoly,
    cache: &NfpCache,
) -> Vec<(NfpKey, NfpTask)>
where
    I: IntoIterator<Item = &'a [FitPoly]>,
{
    let mut tasks: HashMap<NfpKey, NfpTask> = HashMap::new();

    for polys in solutions {
        for (i, moving) in polys.iter().enumerate() {
            // Every shape needs an inner fit with the bin.
            let bin_key = NfpKey::inner_fit(moving.shape_id, moving.rotation);
            if !cache.contains(&bin_key) && !tasks.contains_key(&bin_key) {
                tasks.insert(
                    bin_key,
                    NfpTask::InnerFit {
                        bin: bin.polygon.clone(),
                        part: moving.polygon.clone(),
                    },
                );
            }

            // And an NFP with every shape placed before it.
            for stationary in &polys[..i] {
                let key = NfpKey::pair(
                    stationary.shape_id,
                    moving.shape_id,
                    moving.rotation - stationary.rotation,
                );
                if !cache.contains(&key) && !tasks.contains_key(&key) {
                    tasks.insert(
                        key,
                        NfpTask::NoFit {
                            stationary: stationary.original.clone(),
                            stationary_rotation: stationary.rotation,
                            moving: moving.polygon.clone(),
                        },
                    );
                }
            }
        }
    }

    tasks.into_iter().collect()
}

/// Greedy bottom-left-fill packer. Places `polys` in order, opening new
/// bins when a shape no longer fits, and returns the fitness score plus
/// the per-bin indices of placed shapes.
///
/// Every inner-fit and pairwise NFP entry for the current rotations must
/// already be cached; a miss aborts the whole pack.
pub fn nest(
    bin: &FitPoly,
    polys: &mut [FitPoly],
    cache: &NfpCache,
) -> Result<(f64, Vec<Vec<usize>>), NestError> {
    for p in polys.iter_mut() {
        p.placed = false;
    }

    let bin_area = bin.polygon.unsigned_area();
    let mut fitness = 0.0;
    let mut to_place: Vec<usize> = (0..polys.len()).collect();
    let mut bins: Vec<Vec<usize>> = Vec::new();

    while !to_place.is_empty() {
        // Seed the bin: skip shapes that can never fit it.
        let mut seed_ifp: Option<Polygon<f64>> = None;
        while let Some(&head) = to_place.first() {
            let key = NfpKey::inner_fit(polys[head].shape_id, polys[head].rotation);
            match cache.get(&key) {
                None => return Err(NestError::CacheMiss(key)),
                Some(None) => {
                    to_place.remove(0);
                }
                Some(Some(ifp)) => {
                    seed_ifp = Some(ifp.clone());
                    break;
                }
            }
        }
        let Some(ifp0) = seed_ifp else { break };
        let head = to_place[0];

        // First placement: the inner-fit vertex with the smallest x
        // offset from the reference point.
        let rp = polys[head].ref_point();
        let ring = &ifp0.exterior().0;
        let mut first_shift: Option<(f64, f64)> = None;
        for c in &ring[..ring.len().saturating_sub(1)] {
            if first_shift.is_none_or(|s| c.x - rp.x < s.0) {
                first_shift = Some((c.x - rp.x, c.y - rp.y));
            }
        }
        let Some((dx, dy)) = first_shift else {
            to_place.remove(0);
            continue;
        };
        polys[head].translate(dx, dy);
        polys[head].placed = true;
        polys[head].bin_index = bins.len();
        let mut placed: Vec<usize> = vec![head];

        for &idx in &to_place[1..] {
            let inner_key = NfpKey::inner_fit(polys[idx].shape_id, polys[idx].rotation);
            let ifp = match cache.get(&inner_key) {
                None => return Err(NestError::CacheMiss(inner_key)),
                Some(None) => continue,
                Some(Some(ifp)) => ifp,
            };

            // Union of cached NFPs against everything already placed,
            // each mapped through the stationary shape's current pose.
            let mut full_nfp: Option<MultiPolygon<f64>> = None;
            for &p in &placed {
                let key = NfpKey::pair(
                    polys[p].shape_id,
                    polys[idx].shape_id,
                    polys[idx].rotation - polys[p].rotation,
                );
                let nfp = match cache.get(&key) {
                    None => return Err(NestError::CacheMiss(key)),
                    Some(None) => continue,
                    Some(Some(nfp)) => transform_polygon(nfp, &polys[p].transform),
                };
                let nfp = MultiPolygon::new(vec![nfp]);
                full_nfp = Some(match full_nfp {
                    None => nfp,
                    Some(acc) => acc.union(&nfp),
                });
            }
            let Some(full_nfp) = full_nfp else { continue };

            // Valid positions lie on the NFP boundary, inside the IFP.
            let boundary = MultiLineString::new(
                full_nfp.0.iter().map(|p| p.exterior().clone()).collect(),
            );
            let valid = ifp.clip(&boundary, false);

            let placed_rect =
                match polygons_bounds(placed.iter().map(|&p| &polys[p].polygon)) {
                    Some(r) => r,
                    None => continue,
                };
            if let Some((dx, dy)) = place_poly(&valid, placed_rect, &polys[idx]) {
                polys[idx].translate(dx, dy);
                polys[idx].placed = true;
                polys[idx].bin_index = bins.len();
                placed.push(idx);
            }
        }

        to_place.retain(|i| !placed.contains(i));

        if !placed.is_empty() {
            if let Some(r) = polygons_bounds(placed.iter().map(|&p| &polys[p].polygon)) {
                // Small penalty on used width rewards tighter packings.
                fitness += r.width() / bin_area;
            }
            bins.push(placed);
        }
    }

    let unplaced = polys.iter().filter(|p| !p.placed).count();
    fitness += 2.0 * unplaced as f64 + bins.len() as f64;

    Ok((fitness, bins))
}

/// Score every candidate position and return the translation giving the
/// smallest combined bounding box, width counted twice to compress the
/// layout along one axis. Ties within tolerance prefer the smaller x.
fn place_poly(
    valid: &MultiLineString<f64>,
    placed_rect: Rect<f64>,
    candidate: &FitPoly,
) -> Option<(f64, f64)> {
    let cand_rect = candidate.polygon.bounding_rect()?;
    let rp = candidate.ref_point();

    let mut best: Option<(f64, (f64, f64))> = None;
    for line in &valid.0 {
        for c in &line.0 {
            let shift = (c.x - rp.x, c.y - rp.y);
            let shifted = Rect::new(
                coord! { x: cand_rect.min().x + shift.0, y: cand_rect.min().y + shift.1 },
                coord! { x: cand_rect.max().x + shift.0, y: cand_rect.max().y + shift.1 },
            );
            let merged = merge_rects(placed_rect, shifted);
            let score = 2.0 * merged.width() + merged.height();
            let better = match best {
                None => true,
                Some((best_score, best_shift)) => {
                    score < best_score
                        || (almost_equal(score, best_score) && shift.0 < best_shift.0)
                }
            };
            if better {
                best = Some((score, shift));
            }
        }
    }
    best.map(|(_, shift)| shift)
}
