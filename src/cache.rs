use std::collections::HashMap;
use std::fmt;

use geo_types::Polygon;

/// Shape id reserved for the bin.
pub const BIN_ID: u32 = 0;

const MICRODEG_PER_TURN: i64 = 360_000_000;

/// Accumulated rotation reduced to `[0, 360)` degrees.
pub fn canonical_rotation(rotation_deg: f64) -> f64 {
    rotation_deg.rem_euclid(360.0)
}

/// Canonical rotation quantized to integer micro-degrees for hashing.
fn rotation_microdeg(rotation_deg: f64) -> i64 {
    let udeg = (canonical_rotation(rotation_deg) * 1e6).round() as i64;
    udeg.rem_euclid(MICRODEG_PER_TURN)
}

/// Identity of one fit polygon: the pair of shapes and their relative
/// rotation. Bin entries use `BIN_ID` as the stationary shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NfpKey {
    pub stationary: u32,
    pub moving: u32,
    rotation_udeg: i64,
}

impl NfpKey {
    /// Key for the NFP of `moving` around `stationary` at the given
    /// relative rotation `rot_moving - rot_stationary` in degrees.
    pub fn pair(stationary: u32, moving: u32, relative_rotation: f64) -> Self {
        Self {
            stationary,
            moving,
            rotation_udeg: rotation_microdeg(relative_rotation),
        }
    }

    /// Key for the IFP of `moving` inside the bin. The bin never
    /// rotates, so only the moving shape's rotation matters.
    pub fn inner_fit(moving: u32, rotation: f64) -> Self {
        Self::pair(BIN_ID, moving, rotation)
    }
}

impl fmt::Display for NfpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}) at {}deg",
            self.stationary,
            self.moving,
            self.rotation_udeg as f64 / 1e6
        )
    }
}

/// Memo of fit polygons shared by every solution of one run.
///
/// `None` values record that the shape cannot fit the bin at that
/// rotation. Filled in bulk between generations; read-only while
/// placements run.
#[derive(Debug, Default)]
pub struct NfpCache {
    entries: HashMap<NfpKey, Option<Polygon<f64>>>,
}

impl NfpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &NfpKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &NfpKey) -> Option<&Option<Polygon<f64>>> {
        self.entries.get(key)
    }

    /// Merge a batch of computed entries.
    pub fn extend<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = (NfpKey, Option<Polygon<f64>>)>,
    {
        self.entries.extend(results);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
