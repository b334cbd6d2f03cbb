//! Character aggregate, job classification and growth tables.

mod experience;
pub mod growth;
mod job;
mod model;
mod modifier;
pub mod skill;
mod stat;

pub use experience::experience_for_level;
pub use job::JobId;
pub use model::{
    Character, SkillPoints, MAX_HP_MP, MAX_HP_MP_USED, MAX_LEVEL, MIN_LEVEL,
};
pub use modifier::{Column, Modifier};
pub use skill::{Skill, SkillEffect};
pub use stat::Stat;
