//! Job identifiers and job-family classification.
//!
//! Job ids follow the game's numbering: the thousands digit selects the
//! branch (adventurer, Cygnus, hero), the hundreds digit the class, and the
//! last two digits the advancement.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u16);

impl JobId {
    // Adventurers
    pub const BEGINNER: JobId = JobId(0);
    pub const WARRIOR: JobId = JobId(100);
    pub const FIGHTER: JobId = JobId(110);
    pub const CRUSADER: JobId = JobId(111);
    pub const HERO: JobId = JobId(112);
    pub const PAGE: JobId = JobId(120);
    pub const WHITE_KNIGHT: JobId = JobId(121);
    pub const PALADIN: JobId = JobId(122);
    pub const SPEARMAN: JobId = JobId(130);
    pub const DRAGON_KNIGHT: JobId = JobId(131);
    pub const DARK_KNIGHT: JobId = JobId(132);
    pub const MAGICIAN: JobId = JobId(200);
    pub const FIRE_POISON_WIZARD: JobId = JobId(210);
    pub const FIRE_POISON_MAGICIAN: JobId = JobId(211);
    pub const FIRE_POISON_ARCH_MAGICIAN: JobId = JobId(212);
    pub const ICE_LIGHTNING_WIZARD: JobId = JobId(220);
    pub const ICE_LIGHTNING_MAGICIAN: JobId = JobId(221);
    pub const ICE_LIGHTNING_ARCH_MAGICIAN: JobId = JobId(222);
    pub const CLERIC: JobId = JobId(230);
    pub const PRIEST: JobId = JobId(231);
    pub const BISHOP: JobId = JobId(232);
    pub const BOWMAN: JobId = JobId(300);
    pub const HUNTER: JobId = JobId(310);
    pub const RANGER: JobId = JobId(311);
    pub const BOWMASTER: JobId = JobId(312);
    pub const CROSSBOWMAN: JobId = JobId(320);
    pub const SNIPER: JobId = JobId(321);
    pub const MARKSMAN: JobId = JobId(322);
    pub const ROGUE: JobId = JobId(400);
    pub const ASSASSIN: JobId = JobId(410);
    pub const HERMIT: JobId = JobId(411);
    pub const NIGHT_LORD: JobId = JobId(412);
    pub const BANDIT: JobId = JobId(420);
    pub const CHIEF_BANDIT: JobId = JobId(421);
    pub const SHADOWER: JobId = JobId(422);
    pub const PIRATE: JobId = JobId(500);
    pub const BRAWLER: JobId = JobId(510);
    pub const MARAUDER: JobId = JobId(511);
    pub const BUCCANEER: JobId = JobId(512);
    pub const GUNSLINGER: JobId = JobId(520);
    pub const OUTLAW: JobId = JobId(521);
    pub const CORSAIR: JobId = JobId(522);
    pub const GM: JobId = JobId(900);
    pub const SUPER_GM: JobId = JobId(910);

    // Cygnus knights
    pub const NOBLESSE: JobId = JobId(1000);
    pub const DAWN_WARRIOR_1: JobId = JobId(1100);
    pub const DAWN_WARRIOR_2: JobId = JobId(1110);
    pub const DAWN_WARRIOR_3: JobId = JobId(1111);
    pub const DAWN_WARRIOR_4: JobId = JobId(1112);
    pub const BLAZE_WIZARD_1: JobId = JobId(1200);
    pub const BLAZE_WIZARD_2: JobId = JobId(1210);
    pub const BLAZE_WIZARD_3: JobId = JobId(1211);
    pub const BLAZE_WIZARD_4: JobId = JobId(1212);
    pub const WIND_ARCHER_1: JobId = JobId(1300);
    pub const WIND_ARCHER_2: JobId = JobId(1310);
    pub const WIND_ARCHER_3: JobId = JobId(1311);
    pub const WIND_ARCHER_4: JobId = JobId(1312);
    pub const NIGHT_WALKER_1: JobId = JobId(1400);
    pub const NIGHT_WALKER_2: JobId = JobId(1410);
    pub const NIGHT_WALKER_3: JobId = JobId(1411);
    pub const NIGHT_WALKER_4: JobId = JobId(1412);
    pub const THUNDER_BREAKER_1: JobId = JobId(1500);
    pub const THUNDER_BREAKER_2: JobId = JobId(1510);
    pub const THUNDER_BREAKER_3: JobId = JobId(1511);
    pub const THUNDER_BREAKER_4: JobId = JobId(1512);

    // Heroes
    pub const LEGEND: JobId = JobId(2000);
    pub const EVAN: JobId = JobId(2001);
    pub const ARAN_1: JobId = JobId(2100);
    pub const ARAN_2: JobId = JobId(2110);
    pub const ARAN_3: JobId = JobId(2111);
    pub const ARAN_4: JobId = JobId(2112);
    pub const EVAN_1: JobId = JobId(2200);
    pub const EVAN_2: JobId = JobId(2210);
    pub const EVAN_3: JobId = JobId(2211);
    pub const EVAN_4: JobId = JobId(2212);
    pub const EVAN_5: JobId = JobId(2213);
    pub const EVAN_6: JobId = JobId(2214);
    pub const EVAN_7: JobId = JobId(2215);
    pub const EVAN_8: JobId = JobId(2216);
    pub const EVAN_9: JobId = JobId(2217);
    pub const EVAN_10: JobId = JobId(2218);

    pub const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// The job a skill belongs to. Skill ids embed the job id in their
    /// upper digits (`skill_id / 10000`).
    pub fn from_skill_id(skill_id: u32) -> Option<Self> {
        u16::try_from(skill_id / 10000).ok().map(Self)
    }

    pub fn is_a(self, jobs: &[JobId]) -> bool {
        jobs.contains(&self)
    }

    pub fn is_beginner(self) -> bool {
        self.is_a(&[Self::BEGINNER, Self::NOBLESSE, Self::LEGEND, Self::EVAN])
    }

    pub fn is_cygnus(self) -> bool {
        (1000..2000).contains(&self.0)
    }

    pub fn is_evan(self) -> bool {
        self == Self::EVAN || (Self::EVAN_1.0..=Self::EVAN_10.0).contains(&self.0)
    }

    pub fn is_fourth_job(self) -> bool {
        !self.is_evan() && self.0 % 10 == 2 && (self.0 / 10) % 10 != 0
    }

    /// Highest level a character of this job may reach.
    pub fn max_level(self) -> u8 {
        if self.is_cygnus() {
            120
        } else {
            200
        }
    }

    /// Index into the comma-joined SP string. Evan stages 2 through 10 keep
    /// one book each; every other job uses book zero.
    pub fn skill_book(self) -> usize {
        if self >= Self::EVAN_2 && self <= Self::EVAN_10 {
            usize::from(self.0 - 2209)
        } else {
            0
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for JobId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<JobId> for u16 {
    fn from(value: JobId) -> Self {
        value.0
    }
}

// =============================================================================
// Job families
// =============================================================================

// CRUSADER is listed twice in the warrior family; membership checks tolerate
// the repetition.
pub(crate) const WARRIOR_FAMILY: &[JobId] = &[
    JobId::WARRIOR,
    JobId::FIGHTER,
    JobId::CRUSADER,
    JobId::HERO,
    JobId::PAGE,
    JobId::CRUSADER,
    JobId::WHITE_KNIGHT,
    JobId::SPEARMAN,
    JobId::DRAGON_KNIGHT,
    JobId::DARK_KNIGHT,
    JobId::DAWN_WARRIOR_1,
    JobId::DAWN_WARRIOR_2,
    JobId::DAWN_WARRIOR_3,
    JobId::DAWN_WARRIOR_4,
];

pub(crate) const ARAN_FAMILY: &[JobId] = &[
    JobId::ARAN_1,
    JobId::ARAN_2,
    JobId::ARAN_3,
    JobId::ARAN_4,
];

pub(crate) const MAGICIAN_FAMILY: &[JobId] = &[
    JobId::MAGICIAN,
    JobId::FIRE_POISON_WIZARD,
    JobId::FIRE_POISON_MAGICIAN,
    JobId::FIRE_POISON_ARCH_MAGICIAN,
    JobId::ICE_LIGHTNING_WIZARD,
    JobId::ICE_LIGHTNING_MAGICIAN,
    JobId::ICE_LIGHTNING_ARCH_MAGICIAN,
    JobId::CLERIC,
    JobId::PRIEST,
    JobId::BISHOP,
    JobId::BLAZE_WIZARD_1,
    JobId::BLAZE_WIZARD_2,
    JobId::BLAZE_WIZARD_3,
    JobId::BLAZE_WIZARD_4,
];

pub(crate) const BOWMAN_THIEF_FAMILY: &[JobId] = &[
    JobId::BOWMAN,
    JobId::HUNTER,
    JobId::RANGER,
    JobId::BOWMASTER,
    JobId::CROSSBOWMAN,
    JobId::SNIPER,
    JobId::MARKSMAN,
    JobId::WIND_ARCHER_1,
    JobId::WIND_ARCHER_2,
    JobId::WIND_ARCHER_3,
    JobId::WIND_ARCHER_4,
    JobId::ROGUE,
    JobId::ASSASSIN,
    JobId::HERMIT,
    JobId::NIGHT_LORD,
    JobId::BANDIT,
    JobId::CHIEF_BANDIT,
    JobId::SHADOWER,
    JobId::NIGHT_WALKER_1,
    JobId::NIGHT_WALKER_2,
    JobId::NIGHT_WALKER_3,
    JobId::NIGHT_WALKER_4,
];

pub(crate) const PIRATE_FAMILY: &[JobId] = &[
    JobId::PIRATE,
    JobId::BRAWLER,
    JobId::MARAUDER,
    JobId::BUCCANEER,
    JobId::GUNSLINGER,
    JobId::OUTLAW,
    JobId::CORSAIR,
    JobId::THUNDER_BREAKER_1,
    JobId::THUNDER_BREAKER_2,
    JobId::THUNDER_BREAKER_3,
    JobId::THUNDER_BREAKER_4,
];

pub(crate) const GM_FAMILY: &[JobId] = &[JobId::GM, JobId::SUPER_GM];
