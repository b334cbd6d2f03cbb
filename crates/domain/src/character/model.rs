//! Character aggregate.
//!
//! # Invariants
//!
//! - `hp <= max_hp` and `mp <= max_mp` after every applied change set
//! - `max_hp` and `max_mp` never exceed [`MAX_HP_MP`]
//! - `hp_mp_used` never exceeds [`MAX_HP_MP_USED`]
//! - `meso` is unsigned; callers reject changes that would underflow or overflow
//!
//! Mutation goes through [`Modifier`] change sets (see [`Character::apply`]) so
//! that a store can persist exactly the columns a change touched.

use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::modifier::{Column, Modifier};
use super::skill::Skill;
use crate::ids::{AccountId, CharacterId, MapId, WorldId};

pub const MAX_HP_MP: u16 = 30000;
pub const MAX_HP_MP_USED: u16 = 9999;
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 200;

const SKILL_BOOK_COUNT: usize = 10;

// =============================================================================
// Skill points
// =============================================================================

/// Per-book skill points, persisted as a comma-joined string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillPoints(Vec<u32>);

impl SkillPoints {
    /// Parses the persisted form. Entries are trimmed; parsing stops at the
    /// first entry that is not a number.
    pub fn parse(raw: &str) -> Self {
        let books = raw
            .split(',')
            .map(str::trim)
            .map_while(|part| part.parse::<u32>().ok())
            .collect();
        Self(books)
    }

    pub fn get(&self, book: usize) -> u32 {
        self.0.get(book).copied().unwrap_or(0)
    }

    pub fn set(&mut self, book: usize, amount: u32) {
        if self.0.len() <= book {
            self.0.resize(book + 1, 0);
        }
        self.0[book] = amount;
    }

    pub fn books(&self) -> &[u32] {
        &self.0
    }
}

impl Default for SkillPoints {
    fn default() -> Self {
        Self(vec![0; SKILL_BOOK_COUNT])
    }
}

impl std::fmt::Display for SkillPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl Serialize for SkillPoints {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SkillPoints {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// =============================================================================
// Aggregate
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    // Identity
    id: CharacterId,
    account_id: AccountId,
    world_id: WorldId,
    name: String,

    // Progression
    level: u8,
    experience: u32,
    gachapon_experience: u32,
    job_id: JobId,
    ap: u16,
    sp: SkillPoints,

    // Stats
    strength: u16,
    dexterity: u16,
    intelligence: u16,
    luck: u16,
    hp: u16,
    max_hp: u16,
    mp: u16,
    max_mp: u16,
    hp_mp_used: u16,

    // Wealth and standing
    meso: u32,
    fame: i16,
    gm: i32,

    // Appearance
    skin_color: u8,
    gender: u8,
    hair: u32,
    face: u32,

    // Location
    map_id: MapId,
    spawn_point: u32,

    skills: Vec<Skill>,
}

impl Character {
    /// A level 1 character with no stats. Use the `with_*` methods to fill in
    /// the rest before persisting.
    pub fn new(account_id: AccountId, world_id: WorldId, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::default(),
            account_id,
            world_id,
            name: name.into(),
            level: MIN_LEVEL,
            experience: 0,
            gachapon_experience: 0,
            job_id: JobId::BEGINNER,
            ap: 0,
            sp: SkillPoints::default(),
            strength: 0,
            dexterity: 0,
            intelligence: 0,
            luck: 0,
            hp: 0,
            max_hp: 0,
            mp: 0,
            max_mp: 0,
            hp_mp_used: 0,
            meso: 0,
            fame: 0,
            gm: 0,
            skin_color: 0,
            gender: 0,
            hair: 0,
            face: 0,
            map_id: MapId::default(),
            spawn_point: 0,
            skills: Vec::new(),
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    pub fn with_id(mut self, id: CharacterId) -> Self {
        self.id = id;
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_experience(mut self, experience: u32) -> Self {
        self.experience = experience;
        self
    }

    pub fn with_gachapon_experience(mut self, experience: u32) -> Self {
        self.gachapon_experience = experience;
        self
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn with_ap(mut self, ap: u16) -> Self {
        self.ap = ap;
        self
    }

    pub fn with_sp(mut self, sp: SkillPoints) -> Self {
        self.sp = sp;
        self
    }

    pub fn with_stats(mut self, strength: u16, dexterity: u16, intelligence: u16, luck: u16) -> Self {
        self.strength = strength;
        self.dexterity = dexterity;
        self.intelligence = intelligence;
        self.luck = luck;
        self
    }

    /// Sets current and maximum HP/MP. Current values are clamped to the maxima.
    pub fn with_hp_mp(mut self, hp: u16, max_hp: u16, mp: u16, max_mp: u16) -> Self {
        self.max_hp = max_hp.min(MAX_HP_MP);
        self.max_mp = max_mp.min(MAX_HP_MP);
        self.hp = hp.min(self.max_hp);
        self.mp = mp.min(self.max_mp);
        self
    }

    pub fn with_hp_mp_used(mut self, used: u16) -> Self {
        self.hp_mp_used = used.min(MAX_HP_MP_USED);
        self
    }

    pub fn with_meso(mut self, meso: u32) -> Self {
        self.meso = meso;
        self
    }

    pub fn with_fame(mut self, fame: i16) -> Self {
        self.fame = fame;
        self
    }

    pub fn with_gm(mut self, gm: i32) -> Self {
        self.gm = gm;
        self
    }

    pub fn with_appearance(mut self, gender: u8, skin_color: u8, hair: u32, face: u32) -> Self {
        self.gender = gender;
        self.skin_color = skin_color;
        self.hair = hair;
        self.face = face;
        self
    }

    pub fn with_map(mut self, map_id: MapId, spawn_point: u32) -> Self {
        self.map_id = map_id;
        self.spawn_point = spawn_point;
        self
    }

    pub fn with_skills(mut self, skills: Vec<Skill>) -> Self {
        self.skills = skills;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> CharacterId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn experience(&self) -> u32 {
        self.experience
    }

    pub fn gachapon_experience(&self) -> u32 {
        self.gachapon_experience
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn ap(&self) -> u16 {
        self.ap
    }

    pub fn sp(&self) -> &SkillPoints {
        &self.sp
    }

    /// Skill points in the book the current job draws from.
    pub fn current_sp(&self) -> u32 {
        self.sp.get(self.job_id.skill_book())
    }

    pub fn strength(&self) -> u16 {
        self.strength
    }

    pub fn dexterity(&self) -> u16 {
        self.dexterity
    }

    pub fn intelligence(&self) -> u16 {
        self.intelligence
    }

    pub fn luck(&self) -> u16 {
        self.luck
    }

    pub fn hp(&self) -> u16 {
        self.hp
    }

    pub fn max_hp(&self) -> u16 {
        self.max_hp
    }

    pub fn mp(&self) -> u16 {
        self.mp
    }

    pub fn max_mp(&self) -> u16 {
        self.max_mp
    }

    pub fn hp_mp_used(&self) -> u16 {
        self.hp_mp_used
    }

    pub fn meso(&self) -> u32 {
        self.meso
    }

    pub fn fame(&self) -> i16 {
        self.fame
    }

    pub fn gm(&self) -> i32 {
        self.gm
    }

    pub fn is_gm(&self) -> bool {
        self.gm > 0
    }

    pub fn skin_color(&self) -> u8 {
        self.skin_color
    }

    pub fn gender(&self) -> u8 {
        self.gender
    }

    pub fn hair(&self) -> u32 {
        self.hair
    }

    pub fn face(&self) -> u32 {
        self.face
    }

    pub fn map_id(&self) -> MapId {
        self.map_id
    }

    pub fn spawn_point(&self) -> u32 {
        self.spawn_point
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn skill(&self, skill_id: u32) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == skill_id)
    }

    /// Learned level of a skill, zero when the skill is unknown.
    pub fn skill_level(&self, skill_id: u32) -> u8 {
        self.skill(skill_id).map_or(0, |s| s.level)
    }

    pub fn max_class_level(&self) -> u8 {
        self.job_id.max_level()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Applies a change set and returns the columns it touched, in order and
    /// without duplicates. An empty change set leaves the character untouched.
    pub fn apply(&mut self, modifiers: &[Modifier]) -> Vec<Column> {
        let mut columns: Vec<Column> = Vec::new();
        for modifier in modifiers {
            self.apply_one(modifier);
            let column = modifier.column();
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        if !modifiers.is_empty() {
            self.hp = self.hp.min(self.max_hp);
            self.mp = self.mp.min(self.max_mp);
        }
        columns
    }

    fn apply_one(&mut self, modifier: &Modifier) {
        match modifier {
            Modifier::Name(name) => self.name = name.clone(),
            Modifier::Level(level) => self.level = *level,
            Modifier::Experience(exp) => self.experience = *exp,
            Modifier::GachaponExperience(exp) => self.gachapon_experience = *exp,
            Modifier::Job(job) => self.job_id = *job,
            Modifier::Ap(ap) => self.ap = *ap,
            Modifier::Sp { book, amount } => self.sp.set(*book, *amount),
            Modifier::Strength(v) => self.strength = *v,
            Modifier::Dexterity(v) => self.dexterity = *v,
            Modifier::Intelligence(v) => self.intelligence = *v,
            Modifier::Luck(v) => self.luck = *v,
            Modifier::Hp(v) => self.hp = *v,
            Modifier::MaxHp(v) => self.max_hp = (*v).min(MAX_HP_MP),
            Modifier::Mp(v) => self.mp = *v,
            Modifier::MaxMp(v) => self.max_mp = (*v).min(MAX_HP_MP),
            Modifier::HpMpUsed(v) => self.hp_mp_used = (*v).min(MAX_HP_MP_USED),
            Modifier::Meso(v) => self.meso = *v,
            Modifier::Fame(v) => self.fame = *v,
            Modifier::Gm(v) => self.gm = *v,
            Modifier::SkinColor(v) => self.skin_color = *v,
            Modifier::Gender(v) => self.gender = *v,
            Modifier::Hair(v) => self.hair = *v,
            Modifier::Face(v) => self.face = *v,
            Modifier::Map(v) => self.map_id = *v,
            Modifier::SpawnPoint(v) => self.spawn_point = *v,
            Modifier::Skill(skill) => match self.skills.iter_mut().find(|s| s.id == skill.id) {
                Some(existing) => *existing = skill.clone(),
                None => self.skills.push(skill.clone()),
            },
        }
    }
}
