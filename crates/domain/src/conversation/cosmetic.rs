//! Hair and face option generation for beauty-salon style conversations.
//!
//! Hair ids are `style * 10 + color`. Face ids are
//! `20000 (male) | 21000 (female) + color * 100 + style`.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub const ONETIME_LENS_FIRST_ITEM: u32 = 5_152_100;
pub const ONETIME_LENS_COUNT: u32 = 8;

const MALE_FACE_BASE: u32 = 20_000;
const FEMALE_FACE_BASE: u32 = 21_000;

/// Default hair colors offered when a script does not list any.
pub const DEFAULT_HAIR_COLORS: &str = "0,1,2,3,4,5,6,7";
/// Default lens color offsets (colors 1, 3, 4 and 7).
pub const DEFAULT_FACE_COLOR_OFFSETS: &str = "100,300,400,700";

/// The appearance fields the generators read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub gender: u8,
    pub hair: u32,
    pub face: u32,
    pub skin_color: u8,
}

impl Appearance {
    pub fn hair_base(&self) -> u32 {
        self.hair / 10
    }

    pub fn hair_color(&self) -> u32 {
        self.hair % 10
    }

    pub fn face_base(&self) -> u32 {
        self.face % 100
    }

    pub fn is_female(&self) -> bool {
        self.gender == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CosmeticKind {
    Hair,
    Face,
    Skin,
}

impl CosmeticKind {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "hair" => Ok(CosmeticKind::Hair),
            "face" => Ok(CosmeticKind::Face),
            "skin" => Ok(CosmeticKind::Skin),
            other => Err(DomainError::validation(format!(
                "invalid cosmeticType: {other} (must be 'hair', 'face', or 'skin')"
            ))),
        }
    }

    /// Whether `id` falls in the range the game data can contain.
    pub fn may_exist(&self, id: u32) -> bool {
        match self {
            CosmeticKind::Hair => (30_000..=49_999).contains(&id),
            CosmeticKind::Face => (20_000..=29_999).contains(&id),
            CosmeticKind::Skin => id <= 13,
        }
    }

    /// Range check applied before an appearance change is requested.
    pub fn ensure_applicable(&self, id: u32) -> Result<(), DomainError> {
        let ok = match self {
            CosmeticKind::Hair => (30_000..=35_000).contains(&id),
            CosmeticKind::Face => (20_000..=25_000).contains(&id),
            CosmeticKind::Skin => id <= 9,
        };
        if ok {
            return Ok(());
        }
        Err(DomainError::validation(match self {
            CosmeticKind::Hair => format!("invalid hair ID: {id} (must be 30000-35000)"),
            CosmeticKind::Face => format!("invalid face ID: {id} (must be 20000-25000)"),
            CosmeticKind::Skin => format!("invalid skin color: {id} (must be 0-9)"),
        }))
    }
}

/// Hair styles from `base_styles`, optionally restricted to the character's
/// gender, recolored to the current color or normalized to color 0.
pub fn hair_styles(
    appearance: &Appearance,
    base_styles: &[u32],
    gender_filter: bool,
    preserve_color: bool,
) -> Vec<u32> {
    base_styles
        .iter()
        .copied()
        .filter(|style| !gender_filter || hair_matches_gender(*style, appearance.gender))
        .map(|style| {
            let color = if preserve_color {
                appearance.hair_color()
            } else {
                0
            };
            style / 10 * 10 + color
        })
        .collect()
}

fn hair_matches_gender(style: u32, gender: u8) -> bool {
    let base = style / 10;
    match gender {
        0 => (3000..3100).contains(&base),
        1 => base >= 3100,
        _ => false,
    }
}

/// Every color of the current hair style.
pub fn hair_colors(appearance: &Appearance, colors: &[u8]) -> Vec<u32> {
    let base = appearance.hair_base() * 10;
    colors.iter().map(|c| base + u32::from(*c)).collect()
}

pub fn face_styles(appearance: &Appearance, base_styles: &[u32], gender_filter: bool) -> Vec<u32> {
    base_styles
        .iter()
        .copied()
        .filter(|style| {
            !gender_filter
                || match appearance.gender {
                    0 => (20_000..21_000).contains(style),
                    1 => (21_000..22_000).contains(style),
                    _ => false,
                }
        })
        .collect()
}

/// The current face style in each lens color offset.
pub fn face_colors(appearance: &Appearance, color_offsets: &[u32]) -> Vec<u32> {
    let gender_base = if appearance.is_female() {
        FEMALE_FACE_BASE
    } else {
        MALE_FACE_BASE
    };
    let base = gender_base + appearance.face_base();
    color_offsets.iter().map(|offset| base + offset).collect()
}

/// One-time lens item ids, in color order.
pub fn onetime_lens_items() -> impl Iterator<Item = u32> {
    (0..ONETIME_LENS_COUNT).map(|i| ONETIME_LENS_FIRST_ITEM + i)
}

/// Color offset unlocked by a one-time lens item.
pub fn onetime_lens_offset(item_id: u32) -> Option<u32> {
    item_id
        .checked_sub(ONETIME_LENS_FIRST_ITEM)
        .filter(|i| *i < ONETIME_LENS_COUNT)
        .map(|i| i * 100)
}

/// Lens coupon item that produces the color of `face`.
pub fn lens_coupon_for_face(face: u32) -> u32 {
    ONETIME_LENS_FIRST_ITEM + (face / 100) % 10
}

/// Drops the style the character already wears.
pub fn exclude_current(styles: Vec<u32>, current: u32) -> Vec<u32> {
    styles.into_iter().filter(|s| *s != current).collect()
}

/// Comma-joined decimal list; the form style lists take in context variables.
pub fn encode_u32_list(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`encode_u32_list`]. Blank entries are skipped.
pub fn decode_u32_list(value: &str) -> Result<Vec<u32>, DomainError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|e| DomainError::parse(format!("invalid number '{part}': {e}")))
        })
        .collect()
}

/// Like [`decode_u32_list`] but for byte-sized values such as hair colors.
pub fn decode_u8_list(value: &str) -> Result<Vec<u8>, DomainError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u8>()
                .map_err(|e| DomainError::parse(format!("invalid byte value '{part}': {e}")))
        })
        .collect()
}
