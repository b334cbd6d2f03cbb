//! Stat growth tables for level ups, job advancements and AP spending.
//!
//! Everything here is pure. Randomness is injected as a `roll(lower, upper)`
//! closure returning a value on the closed range, and skill effects are
//! resolved by the caller and passed in as plain numbers.

use super::job::{
    JobId, ARAN_FAMILY, BOWMAN_THIEF_FAMILY, GM_FAMILY, MAGICIAN_FAMILY, PIRATE_FAMILY,
    WARRIOR_FAMILY,
};
use super::model::{MAX_HP_MP, MAX_HP_MP_USED};
use super::skill;
use crate::error::DomainError;

/// Closed range `[lower, upper]` for a uniform roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollRange {
    pub lower: u16,
    pub upper: u16,
}

impl RollRange {
    pub const fn new(lower: u16, upper: u16) -> Self {
        Self { lower, upper }
    }

    pub const fn fixed(value: u16) -> Self {
        Self::new(value, value)
    }

    pub const ZERO: RollRange = RollRange::fixed(0);

    pub fn roll(&self, roll: &mut dyn FnMut(u16, u16) -> u16) -> u16 {
        if self.lower == self.upper {
            return self.lower;
        }
        roll(self.lower, self.upper).clamp(self.lower, self.upper)
    }
}

// =============================================================================
// Level up
// =============================================================================

/// Which rows of the level-up table apply to a job, before skill effects are
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpProfile {
    pub hp: RollRange,
    pub mp: RollRange,
    pub hp_skill: Option<u32>,
    pub mp_skill: Option<u32>,
}

impl LevelUpProfile {
    pub fn for_job(job: JobId) -> Self {
        let none = Self {
            hp: RollRange::ZERO,
            mp: RollRange::ZERO,
            hp_skill: None,
            mp_skill: None,
        };

        if job.is_beginner() {
            return Self {
                hp: RollRange::new(12, 16),
                mp: RollRange::new(10, 12),
                ..none
            };
        }
        if job.is_a(WARRIOR_FAMILY) {
            return Self {
                hp: RollRange::new(24, 28),
                mp: RollRange::new(4, 6),
                hp_skill: Some(improved_max_hp_skill_for_warrior(job)),
                mp_skill: mp_recovery_skill_for_warrior(job),
            };
        }
        if job.is_a(MAGICIAN_FAMILY) {
            return Self {
                hp: RollRange::new(10, 14),
                mp: RollRange::new(22, 24),
                mp_skill: Some(improved_max_mp_skill_for_magician(job)),
                ..none
            };
        }
        if job.is_a(BOWMAN_THIEF_FAMILY) {
            return Self {
                hp: RollRange::new(20, 24),
                mp: RollRange::new(14, 16),
                ..none
            };
        }
        if job.is_a(GM_FAMILY) {
            return Self {
                hp: RollRange::fixed(MAX_HP_MP),
                mp: RollRange::fixed(MAX_HP_MP),
                ..none
            };
        }
        if job.is_a(PIRATE_FAMILY) {
            return Self {
                hp: RollRange::new(22, 28),
                mp: RollRange::new(18, 23),
                hp_skill: Some(improved_max_hp_skill_for_pirate(job)),
                ..none
            };
        }
        if job.is_a(ARAN_FAMILY) {
            return Self {
                hp: RollRange::new(44, 48),
                mp: RollRange::new(4, 8),
                ..none
            };
        }
        none
    }

    /// Attaches resolved skill bonuses. Call once per level-up computation.
    pub fn with_bonuses(self, hp_bonus: i16, mp_bonus: i16) -> HpMpGain {
        HpMpGain {
            hp: self.hp,
            mp: self.mp,
            hp_bonus,
            mp_bonus,
        }
    }
}

/// Level-up HP/MP gain with skill bonuses already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpMpGain {
    pub hp: RollRange,
    pub mp: RollRange,
    pub hp_bonus: i16,
    pub mp_bonus: i16,
}

impl HpMpGain {
    /// Rolls one level's worth of HP and MP.
    pub fn roll(&self, roll: &mut dyn FnMut(u16, u16) -> u16) -> (u16, u16) {
        let hp = add_signed(self.hp.roll(roll), self.hp_bonus);
        let mp = add_signed(self.mp.roll(roll), self.mp_bonus);
        (hp, mp)
    }
}

/// AP granted for reaching `level`. Cygnus knights get a bonus early on.
pub fn ap_for_level(job: JobId, level: u8) -> u16 {
    let mut gain = 5;
    if job.is_cygnus() && level > 10 {
        if level <= 17 {
            gain += 2;
        } else if level < 77 {
            gain += 1;
        }
    }
    gain
}

pub fn sp_for_level(job: JobId) -> u32 {
    if job.is_beginner() {
        0
    } else {
        3
    }
}

/// Stats a beginner receives instead of AP on versions that auto-assign them.
/// Returns `None` once the character is past the auto-assign window.
pub fn beginner_auto_stats(job: JobId, level: u8) -> Option<(u16, u16)> {
    if !job.is_beginner() || level >= 11 {
        return None;
    }
    if level < 6 {
        Some((5, 0))
    } else {
        Some((4, 1))
    }
}

// =============================================================================
// Job advancement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobChangeGain {
    pub ap: u16,
    pub sp: u32,
    pub hp: RollRange,
    pub mp: RollRange,
}

impl JobChangeGain {
    pub fn for_job(job: JobId) -> Self {
        let mut ap = if job.is_cygnus() { 7 } else { 0 };
        let mut sp = 1;
        if job.is_evan() {
            ap += 2;
        } else if job.is_fourth_job() {
            sp += 2;
        }

        let (hp, mp) = if job.is_a(&[JobId::WARRIOR, JobId::DAWN_WARRIOR_1, JobId::ARAN_1]) {
            (RollRange::new(200, 250), RollRange::ZERO)
        } else if job.is_a(&[JobId::MAGICIAN, JobId::BLAZE_WIZARD_1, JobId::EVAN_1]) {
            (RollRange::ZERO, RollRange::new(100, 150))
        } else if job.is_a(&[
            JobId::BOWMAN,
            JobId::ROGUE,
            JobId::PIRATE,
            JobId::WIND_ARCHER_1,
            JobId::NIGHT_WALKER_1,
            JobId::THUNDER_BREAKER_1,
        ]) {
            (RollRange::new(100, 150), RollRange::new(25, 50))
        } else if job.is_a(WARRIOR_FAMILY) || job.is_a(ARAN_FAMILY) {
            (RollRange::new(300, 350), RollRange::ZERO)
        } else if job.is_a(MAGICIAN_FAMILY) || (JobId::EVAN_2..=JobId::EVAN_10).contains(&job) {
            (RollRange::ZERO, RollRange::new(450, 500))
        } else if !job.is_beginner() {
            (RollRange::new(300, 350), RollRange::new(150, 200))
        } else {
            (RollRange::ZERO, RollRange::ZERO)
        };

        Self { ap, sp, hp, mp }
    }
}

// =============================================================================
// AP spent on HP/MP
// =============================================================================

/// Per-point gain when AP is spent on max HP or max MP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApGrowth {
    pub base: u16,
    pub skill: Option<u32>,
}

pub fn ap_hp_growth(job: JobId) -> ApGrowth {
    if job.is_a(WARRIOR_FAMILY) || job.is_a(ARAN_FAMILY) {
        ApGrowth {
            base: 20,
            skill: Some(improved_max_hp_skill_for_warrior(job)),
        }
    } else if job.is_a(MAGICIAN_FAMILY) {
        ApGrowth {
            base: 6,
            skill: None,
        }
    } else if job.is_a(BOWMAN_THIEF_FAMILY) {
        ApGrowth {
            base: 16,
            skill: None,
        }
    } else if job.is_a(PIRATE_FAMILY) {
        ApGrowth {
            base: 18,
            skill: Some(improved_max_hp_skill_for_pirate(job)),
        }
    } else {
        ApGrowth {
            base: 8,
            skill: None,
        }
    }
}

pub fn ap_mp_growth(job: JobId) -> ApGrowth {
    if job.is_a(WARRIOR_FAMILY) || job.is_a(ARAN_FAMILY) {
        ApGrowth {
            base: 2,
            skill: mp_recovery_skill_for_warrior(job),
        }
    } else if job.is_a(MAGICIAN_FAMILY) {
        ApGrowth {
            base: 18,
            skill: Some(improved_max_mp_skill_for_magician(job)),
        }
    } else if job.is_a(BOWMAN_THIEF_FAMILY) {
        ApGrowth {
            base: 10,
            skill: None,
        }
    } else if job.is_a(PIRATE_FAMILY) {
        ApGrowth {
            base: 14,
            skill: None,
        }
    } else {
        ApGrowth {
            base: 6,
            skill: None,
        }
    }
}

/// Fails when the character can no longer convert AP into HP/MP.
pub fn ensure_ap_growth_allowed(current_max: u16, hp_mp_used: u16) -> Result<(), DomainError> {
    if current_max >= MAX_HP_MP || hp_mp_used > MAX_HP_MP_USED {
        return Err(DomainError::constraint("max ap to hp/mp reached"));
    }
    Ok(())
}

/// Per-point MP gain also scales with intelligence.
pub fn intelligence_mp_bonus(intelligence: u16) -> u16 {
    intelligence.div_ceil(10)
}

/// `current + change` clamped to `[lower, upper]`.
pub fn enforce_bounds(change: i16, current: u16, upper: u16, lower: u16) -> u16 {
    let adjusted = i32::from(current) + i32::from(change);
    adjusted.clamp(i32::from(lower), i32::from(upper)) as u16
}

/// `value + delta`, saturating within `u16`.
pub fn add_signed(value: u16, delta: i16) -> u16 {
    let sum = i32::from(value) + i32::from(delta);
    sum.clamp(0, i32::from(u16::MAX)) as u16
}

// =============================================================================
// Skill selection
// =============================================================================

fn improved_max_hp_skill_for_warrior(job: JobId) -> u32 {
    if job.is_cygnus() {
        skill::DAWN_WARRIOR_1_IMPROVED_MAX_HP_INCREASE
    } else {
        skill::WARRIOR_IMPROVED_MAX_HP_INCREASE
    }
}

fn mp_recovery_skill_for_warrior(job: JobId) -> Option<u32> {
    if job.is_a(&[JobId::CRUSADER, JobId::WHITE_KNIGHT]) {
        Some(skill::WHITE_KNIGHT_IMPROVING_MP_RECOVERY)
    } else if job.is_a(&[JobId::DAWN_WARRIOR_3, JobId::DAWN_WARRIOR_4]) {
        Some(skill::DAWN_WARRIOR_3_IMPROVED_MP_RECOVERY)
    } else {
        None
    }
}

fn improved_max_mp_skill_for_magician(job: JobId) -> u32 {
    if job.is_cygnus() {
        skill::BLAZE_WIZARD_1_IMPROVED_MAX_MP_INCREASE
    } else {
        skill::MAGICIAN_IMPROVED_MAX_MP_INCREASE
    }
}

fn improved_max_hp_skill_for_pirate(job: JobId) -> u32 {
    if job.is_cygnus() {
        skill::THUNDER_BREAKER_2_IMPROVED_MAX_HP_INCREASE
    } else {
        skill::BRAWLER_IMPROVE_MAX_HP
    }
}
