//! Experience required to advance past each level.

use super::model::MAX_LEVEL;

const EARLY_LEVELS: [u32; 30] = [
    15, 34, 57, 92, 135, 372, 560, 840, 1144, 1242, 1573, 2144, 2800, 3640, 4700, 5893, 7360,
    9144, 11120, 13477, 16268, 19531, 23326, 27715, 32767, 38558, 45170, 52690, 61219, 70866,
];

// Past level 30 each level costs 6.3% more than the previous one.
const GROWTH_NUMERATOR: u64 = 1063;
const GROWTH_DENOMINATOR: u64 = 1000;

/// Experience needed to go from `level` to `level + 1`. Level zero and the
/// level cap need nothing more (`u32::MAX` at the cap so no further level is
/// ever granted).
pub fn experience_for_level(level: u8) -> u32 {
    if level == 0 {
        return EARLY_LEVELS[0];
    }
    if level >= MAX_LEVEL {
        return u32::MAX;
    }
    let index = usize::from(level) - 1;
    if let Some(value) = EARLY_LEVELS.get(index) {
        return *value;
    }

    let mut required = u64::from(EARLY_LEVELS[EARLY_LEVELS.len() - 1]);
    for _ in EARLY_LEVELS.len()..=index {
        required = required * GROWTH_NUMERATOR / GROWTH_DENOMINATOR;
    }
    u32::try_from(required).unwrap_or(u32::MAX)
}
