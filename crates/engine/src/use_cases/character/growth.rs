//! Stat growth: level-up and job-advancement gains, AP and SP spending.

use std::sync::Arc;

use atlas_domain::character::growth::{
    add_signed, ap_for_level, ap_hp_growth, ap_mp_growth, beginner_auto_stats,
    ensure_ap_growth_allowed, intelligence_mp_bonus, sp_for_level, JobChangeGain, LevelUpProfile,
};
use atlas_domain::{
    ChannelId, Character, CharacterId, JobId, Modifier, Skill, Stat, Tenant, MAX_HP_MP,
};
use atlas_shared::character::ApDistribution;
use uuid::Uuid;

use super::{stage_stats, CharacterError};
use crate::infrastructure::message_buffer::MessageBuffer;
use crate::infrastructure::ports::{CharacterRepo, ProducerPort, RandomPort, SkillDataPort};

/// Ability names accepted by AP distribution.
pub mod ability {
    pub const STRENGTH: &str = "STRENGTH";
    pub const DEXTERITY: &str = "DEXTERITY";
    pub const INTELLIGENCE: &str = "INTELLIGENCE";
    pub const LUCK: &str = "LUCK";
    pub const HP: &str = "HP";
    pub const MP: &str = "MP";
}

const POOL_STATS: [Stat; 6] = [
    Stat::AvailableAp,
    Stat::AvailableSp,
    Stat::Hp,
    Stat::MaxHp,
    Stat::Mp,
    Stat::MaxMp,
];

pub struct CharacterGrowth {
    characters: Arc<dyn CharacterRepo>,
    skills: Arc<dyn SkillDataPort>,
    random: Arc<dyn RandomPort>,
    producer: Arc<dyn ProducerPort>,
}

impl CharacterGrowth {
    pub fn new(
        characters: Arc<dyn CharacterRepo>,
        skills: Arc<dyn SkillDataPort>,
        random: Arc<dyn RandomPort>,
        producer: Arc<dyn ProducerPort>,
    ) -> Self {
        Self {
            characters,
            skills,
            random,
            producer,
        }
    }

    async fn load(&self, tenant: &Tenant, id: CharacterId) -> Result<Character, CharacterError> {
        self.characters
            .get(tenant, id)
            .await?
            .ok_or(CharacterError::NotFound(id))
    }

    fn roll(&self, lower: u16, upper: u16) -> u16 {
        let value = self.random.gen_range(i32::from(lower), i32::from(upper));
        u16::try_from(value).unwrap_or(lower)
    }

    /// `x` of a learned skill's current effect. Unlearned skills and lookup
    /// failures contribute nothing.
    async fn skill_x(&self, tenant: &Tenant, character: &Character, skill_id: Option<u32>) -> i16 {
        self.skill_effect(tenant, character, skill_id).await.0
    }

    async fn skill_effect(
        &self,
        tenant: &Tenant,
        character: &Character,
        skill_id: Option<u32>,
    ) -> (i16, i16) {
        let Some(skill_id) = skill_id else {
            return (0, 0);
        };
        let level = character.skill_level(skill_id);
        if level == 0 {
            return (0, 0);
        }
        match self.skills.effect(tenant, skill_id, level).await {
            Ok(effect) => (effect.x, effect.y),
            Err(e) => {
                tracing::warn!(skill_id, level, error = %e, "Unable to resolve skill effect, assuming none");
                (0, 0)
            }
        }
    }

    /// Grants AP, SP, HP and MP for `amount` levels just gained. Runs when a
    /// `LEVEL_CHANGED` event is consumed. HP and MP are refilled to the new
    /// maximums.
    pub async fn process_level_change(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        amount: u8,
    ) -> Result<(), CharacterError> {
        if amount == 0 {
            return Ok(());
        }
        let character = self.load(tenant, id).await?;
        let job = character.job_id();

        // 1. Resolve skill bonuses once for the whole batch
        let profile = LevelUpProfile::for_job(job);
        let hp_bonus = self.skill_x(tenant, &character, profile.hp_skill).await;
        let mp_bonus = self.skill_x(tenant, &character, profile.mp_skill).await;
        let gain = profile.with_bonuses(hp_bonus, mp_bonus);

        // 2. Accumulate per-level gains
        let first = character.level().saturating_sub(amount).saturating_add(1);
        let auto_assign = tenant.auto_assigns_beginner_stats();
        let mut ap: u16 = 0;
        let mut sp: u32 = 0;
        let mut strength: u16 = 0;
        let mut dexterity: u16 = 0;
        let mut hp: u16 = 0;
        let mut mp: u16 = 0;
        for level in first..=character.level() {
            match beginner_auto_stats(job, level).filter(|_| auto_assign) {
                Some((s, d)) => {
                    strength = strength.saturating_add(s);
                    dexterity = dexterity.saturating_add(d);
                }
                None => ap = ap.saturating_add(ap_for_level(job, level)),
            }
            sp = sp.saturating_add(sp_for_level(job));
            let (h, m) = gain.roll(&mut |lower, upper| self.roll(lower, upper));
            hp = hp.saturating_add(h);
            mp = mp.saturating_add(m);
        }
        tracing::debug!(
            character_id = %id,
            amount,
            ap,
            sp,
            hp,
            mp,
            "Applying level-up gains"
        );

        // 3. Persist
        let book = job.skill_book();
        let max_hp = character.max_hp().saturating_add(hp).min(MAX_HP_MP);
        let max_mp = character.max_mp().saturating_add(mp).min(MAX_HP_MP);
        let mut modifiers = vec![
            Modifier::Ap(character.ap().saturating_add(ap)),
            Modifier::Sp {
                book,
                amount: character.sp().get(book).saturating_add(sp),
            },
            Modifier::MaxHp(max_hp),
            Modifier::Hp(max_hp),
            Modifier::MaxMp(max_mp),
            Modifier::Mp(max_mp),
        ];
        let mut stats = POOL_STATS.to_vec();
        if strength > 0 || dexterity > 0 {
            modifiers.push(Modifier::Strength(character.strength().saturating_add(strength)));
            modifiers.push(Modifier::Dexterity(character.dexterity().saturating_add(dexterity)));
            stats.extend([Stat::Strength, Stat::Dexterity]);
        }
        let updated = self.characters.update(tenant, id, modifiers).await?;

        // 4. Announce
        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), stats)?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Grants the one-off advancement bonus for `job`. Runs when a
    /// `JOB_CHANGED` event is consumed. HP and MP are refilled.
    pub async fn process_job_change(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        channel_id: ChannelId,
        job: JobId,
    ) -> Result<(), CharacterError> {
        let character = self.load(tenant, id).await?;
        let gain = JobChangeGain::for_job(job);
        let mut roll = |lower: u16, upper: u16| self.roll(lower, upper);
        let hp = gain.hp.roll(&mut roll);
        let mp = gain.mp.roll(&mut roll);
        tracing::debug!(
            character_id = %id,
            job_id = %job,
            ap = gain.ap,
            sp = gain.sp,
            hp,
            mp,
            "Applying job advancement gains"
        );

        let book = job.skill_book();
        let max_hp = character.max_hp().saturating_add(hp).min(MAX_HP_MP);
        let max_mp = character.max_mp().saturating_add(mp).min(MAX_HP_MP);
        let modifiers = vec![
            Modifier::Ap(character.ap().saturating_add(gain.ap)),
            Modifier::Sp {
                book,
                amount: character.sp().get(book).saturating_add(gain.sp),
            },
            Modifier::MaxHp(max_hp),
            Modifier::Hp(max_hp),
            Modifier::MaxMp(max_mp),
            Modifier::Mp(max_mp),
        ];
        let updated = self.characters.update(tenant, id, modifiers).await?;

        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, channel_id.value(), POOL_STATS.to_vec())?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Spends AP across abilities. Non-positive amounts and unknown abilities
    /// are ignored; repeated abilities are spent as one.
    pub async fn distribute_ap(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        distributions: Vec<ApDistribution>,
    ) -> Result<(), CharacterError> {
        let character = self.load(tenant, id).await?;
        let totals = ap_totals(id, distributions);
        if totals.is_empty() {
            return Err(CharacterError::InvalidAbility);
        }

        // 1. Validate the budget
        let spent = totals.iter().fold(0u32, |sum, (_, a)| sum.saturating_add(u32::from(*a)));
        let spent = u16::try_from(spent)
            .ok()
            .filter(|spent| *spent <= character.ap())
            .ok_or_else(|| {
                tracing::debug!(character_id = %id, ap = character.ap(), spent, "Not enough AP to distribute");
                CharacterError::NotEnoughAp
            })?;

        // 2. Build the change set
        let job = character.job_id();
        let mut modifiers = Vec::new();
        let mut stats = Vec::new();
        let mut hp_mp_used = character.hp_mp_used();
        for (name, amount) in totals {
            match name {
                ability::STRENGTH => {
                    modifiers.push(Modifier::Strength(character.strength().saturating_add(amount)));
                    stats.push(Stat::Strength);
                }
                ability::DEXTERITY => {
                    modifiers.push(Modifier::Dexterity(character.dexterity().saturating_add(amount)));
                    stats.push(Stat::Dexterity);
                }
                ability::INTELLIGENCE => {
                    modifiers.push(Modifier::Intelligence(
                        character.intelligence().saturating_add(amount),
                    ));
                    stats.push(Stat::Intelligence);
                }
                ability::LUCK => {
                    modifiers.push(Modifier::Luck(character.luck().saturating_add(amount)));
                    stats.push(Stat::Luck);
                }
                ability::HP => {
                    ensure_ap_growth_allowed(character.max_hp(), hp_mp_used)?;
                    let growth = ap_hp_growth(job);
                    let (_, y) = self.skill_effect(tenant, &character, growth.skill).await;
                    let per_point = add_signed(growth.base, y);
                    let max_hp = character
                        .max_hp()
                        .saturating_add(per_point.saturating_mul(amount))
                        .min(MAX_HP_MP);
                    hp_mp_used = hp_mp_used.saturating_add(amount);
                    modifiers.push(Modifier::MaxHp(max_hp));
                    modifiers.push(Modifier::HpMpUsed(hp_mp_used));
                    stats.push(Stat::MaxHp);
                }
                ability::MP => {
                    ensure_ap_growth_allowed(character.max_mp(), hp_mp_used)?;
                    let growth = ap_mp_growth(job);
                    let x = self.skill_x(tenant, &character, growth.skill).await;
                    let base = growth
                        .base
                        .saturating_add(intelligence_mp_bonus(character.intelligence()));
                    let per_point = add_signed(base, x);
                    let max_mp = character
                        .max_mp()
                        .saturating_add(per_point.saturating_mul(amount))
                        .min(MAX_HP_MP);
                    hp_mp_used = hp_mp_used.saturating_add(amount);
                    modifiers.push(Modifier::MaxMp(max_mp));
                    modifiers.push(Modifier::HpMpUsed(hp_mp_used));
                    stats.push(Stat::MaxMp);
                }
                _ => {}
            }
        }
        modifiers.push(Modifier::Ap(character.ap() - spent));
        stats.push(Stat::AvailableAp);

        // 3. Persist and announce
        let updated = self.characters.update(tenant, id, modifiers).await?;
        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, 0, stats)?;
        buffer.flush(tenant, self.producer.as_ref()).await?;
        Ok(())
    }

    /// Spends SP from the book the skill's job draws on. A skill not yet
    /// learned is created at `amount`.
    pub async fn distribute_sp(
        &self,
        tenant: &Tenant,
        transaction_id: Uuid,
        id: CharacterId,
        skill_id: u32,
        amount: i8,
    ) -> Result<(), CharacterError> {
        let character = self.load(tenant, id).await?;
        let job = JobId::from_skill_id(skill_id).ok_or(CharacterError::UnknownSkillJob(skill_id))?;
        let amount = u8::try_from(amount).map_err(|_| CharacterError::NotEnoughSp)?;

        let book = job.skill_book();
        let available = character.sp().get(book);
        if available < u32::from(amount) {
            tracing::debug!(character_id = %id, skill_id, available, amount, "Not enough SP");
            return Err(CharacterError::NotEnoughSp);
        }

        let skill = match character.skill(skill_id) {
            Some(existing) => Skill {
                level: existing.level.saturating_add(amount),
                ..existing.clone()
            },
            None => Skill::new(skill_id, amount),
        };
        let level = skill.level;
        let modifiers = vec![
            Modifier::Sp {
                book,
                amount: available - u32::from(amount),
            },
            Modifier::Skill(skill),
        ];
        let updated = self.characters.update(tenant, id, modifiers).await?;

        let mut buffer = MessageBuffer::new();
        stage_stats(&mut buffer, transaction_id, &updated, 0, vec![Stat::AvailableSp])?;
        buffer.flush(tenant, self.producer.as_ref()).await?;

        tracing::info!(character_id = %id, skill_id, level, "Skill points distributed");
        Ok(())
    }
}

/// Sums the requested amount per known ability, keeping first-request order.
/// Each total saturates at `u16::MAX`.
fn ap_totals(id: CharacterId, distributions: Vec<ApDistribution>) -> Vec<(&'static str, u16)> {
    const ABILITIES: [&str; 6] = [
        ability::STRENGTH,
        ability::DEXTERITY,
        ability::INTELLIGENCE,
        ability::LUCK,
        ability::HP,
        ability::MP,
    ];

    let mut totals: Vec<(&'static str, u16)> = Vec::new();
    for d in distributions {
        let Some(name) = ABILITIES.into_iter().find(|a| *a == d.ability) else {
            tracing::debug!(character_id = %id, ability = %d.ability, "Ignoring unknown ability");
            continue;
        };
        let Some(amount) = u16::try_from(d.amount).ok().filter(|a| *a > 0) else {
            continue;
        };
        match totals.iter_mut().find(|(n, _)| *n == name) {
            Some((_, total)) => *total = total.saturating_add(amount),
            None => totals.push((name, amount)),
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use atlas_domain::character::skill::WARRIOR_IMPROVED_MAX_HP_INCREASE;
    use atlas_domain::{AccountId, MapId, SkillEffect, SkillPoints, TenantId, WorldId};
    use atlas_shared::character::StatChangedBody;
    use atlas_shared::StatusEventBody;

    use super::*;
    use crate::infrastructure::clock::{AlternatingRandom, FixedRandom};
    use crate::infrastructure::memory::MemoryCharacterRepo;
    use crate::infrastructure::ports::{MockSkillDataPort, PeerError};
    use crate::use_cases::character::fixtures::{recording_producer, statuses, tenant, Sent};

    struct Harness {
        tenant: Tenant,
        growth: CharacterGrowth,
        repo: Arc<MemoryCharacterRepo>,
        sent: Sent,
    }

    fn harness(skills: MockSkillDataPort, random: Arc<dyn RandomPort>) -> Harness {
        let repo = Arc::new(MemoryCharacterRepo::new());
        let (producer, sent) = recording_producer();
        let growth = CharacterGrowth::new(repo.clone(), Arc::new(skills), random, Arc::new(producer));
        Harness {
            tenant: tenant(),
            growth,
            repo,
            sent,
        }
    }

    fn no_skills() -> MockSkillDataPort {
        let mut skills = MockSkillDataPort::new();
        skills.expect_effect().never();
        skills
    }

    fn character(job: JobId, level: u8) -> Character {
        Character::new(AccountId::from_raw(1000), WorldId::from_raw(0), "Grower")
            .with_job(job)
            .with_level(level)
            .with_hp_mp(100, 100, 50, 50)
            .with_stats(4, 4, 4, 4)
            .with_map(MapId::from_raw(100_000_000), 0)
    }

    async fn seed(h: &Harness, character: Character) -> Character {
        h.repo.create(&h.tenant, character).await.expect("seed")
    }

    async fn reload(h: &Harness, id: CharacterId) -> Character {
        h.repo.get(&h.tenant, id).await.expect("get").expect("exists")
    }

    fn last_stats(sent: &Sent) -> Vec<Stat> {
        match statuses(sent).pop().map(|e| e.body) {
            Some(StatusEventBody::StatChanged(StatChangedBody { updates, .. })) => updates,
            other => panic!("expected STAT_CHANGED, got {other:?}"),
        }
    }

    fn channel() -> ChannelId {
        ChannelId::from_raw(1)
    }

    #[tokio::test]
    async fn warrior_level_up_includes_skill_bonus() {
        let mut skills = MockSkillDataPort::new();
        skills
            .expect_effect()
            .withf(|_, skill_id, level| *skill_id == WARRIOR_IMPROVED_MAX_HP_INCREASE && *level == 5)
            .times(1)
            .returning(|_, _, _| Ok(SkillEffect { x: 10, y: 0 }));
        let h = harness(skills, Arc::new(FixedRandom(0)));
        let seeded = seed(
            &h,
            character(JobId::WARRIOR, 25)
                .with_skills(vec![Skill::new(WARRIOR_IMPROVED_MAX_HP_INCREASE, 5)]),
        )
        .await;

        h.growth
            .process_level_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 1)
            .await
            .expect("level change");

        let stored = reload(&h, seeded.id()).await;
        // Low roll: 24 + 10 HP, 4 MP.
        assert_eq!(stored.max_hp(), 134);
        assert_eq!(stored.hp(), 134);
        assert_eq!(stored.max_mp(), 54);
        assert_eq!(stored.mp(), 54);
        assert_eq!(stored.ap(), 5);
        assert_eq!(stored.current_sp(), 3);
        assert_eq!(last_stats(&h.sent), POOL_STATS.to_vec());
    }

    #[tokio::test]
    async fn level_up_refills_depleted_pools() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::BOWMAN, 25).with_hp_mp(3, 100, 1, 50)).await;

        h.growth
            .process_level_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 1)
            .await
            .expect("level change");

        let stored = reload(&h, seeded.id()).await;
        assert!(stored.max_hp() > 100);
        assert_eq!(stored.hp(), stored.max_hp());
        assert!(stored.max_mp() > 50);
        assert_eq!(stored.mp(), stored.max_mp());
    }

    #[tokio::test]
    async fn level_up_rolls_stay_in_range() {
        let mut skills = MockSkillDataPort::new();
        skills
            .expect_effect()
            .times(1)
            .returning(|_, _, _| Ok(SkillEffect { x: 10, y: 0 }));
        let h = harness(skills, Arc::new(AlternatingRandom::default()));
        let seeded = seed(
            &h,
            character(JobId::WARRIOR, 25)
                .with_skills(vec![Skill::new(WARRIOR_IMPROVED_MAX_HP_INCREASE, 5)]),
        )
        .await;

        h.growth
            .process_level_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 1)
            .await
            .expect("level change");

        let stored = reload(&h, seeded.id()).await;
        let hp_gain = stored.max_hp() - 100;
        let mp_gain = stored.max_mp() - 50;
        assert!((34..=38).contains(&hp_gain), "hp gain {hp_gain}");
        assert!((4..=6).contains(&mp_gain), "mp gain {mp_gain}");
    }

    #[tokio::test]
    async fn lookup_failure_means_no_bonus() {
        let mut skills = MockSkillDataPort::new();
        skills
            .expect_effect()
            .returning(|_, _, _| Err(PeerError::NotFound("skill".into())));
        let h = harness(skills, Arc::new(FixedRandom(0)));
        let seeded = seed(
            &h,
            character(JobId::WARRIOR, 25)
                .with_skills(vec![Skill::new(WARRIOR_IMPROVED_MAX_HP_INCREASE, 5)]),
        )
        .await;

        h.growth
            .process_level_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 1)
            .await
            .expect("level change");
        assert_eq!(reload(&h, seeded.id()).await.max_hp(), 124);
    }

    #[tokio::test]
    async fn beginner_on_auto_assign_tenant_gets_stats_instead_of_ap() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::BEGINNER, 7)).await;

        h.growth
            .process_level_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 2)
            .await
            .expect("level change");

        // Level 6 and 7 each grant 4 STR and 1 DEX.
        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.ap(), 0);
        assert_eq!(stored.strength(), 12);
        assert_eq!(stored.dexterity(), 6);
        assert_eq!(stored.current_sp(), 0);
        assert_eq!(stored.max_hp(), 124);

        let stats = last_stats(&h.sent);
        assert!(stats.contains(&Stat::Strength));
        assert!(stats.contains(&Stat::Dexterity));
    }

    #[tokio::test]
    async fn beginner_elsewhere_gets_ap() {
        let mut h = harness(no_skills(), Arc::new(FixedRandom(0)));
        h.tenant = Tenant::new(TenantId::new(), "GMS", 95, 1);
        let seeded = seed(&h, character(JobId::BEGINNER, 7)).await;

        h.growth
            .process_level_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), 2)
            .await
            .expect("level change");

        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.ap(), 10);
        assert_eq!(stored.strength(), 4);
    }

    #[tokio::test]
    async fn job_change_grants_advancement_bonus() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::WARRIOR, 10).with_hp_mp(20, 100, 5, 50)).await;

        h.growth
            .process_job_change(&h.tenant, Uuid::new_v4(), seeded.id(), channel(), JobId::WARRIOR)
            .await
            .expect("job change");

        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.max_hp(), 300);
        assert_eq!(stored.hp(), 300);
        assert_eq!(stored.mp(), 50);
        assert_eq!(stored.current_sp(), 1);
        assert_eq!(last_stats(&h.sent), POOL_STATS.to_vec());
    }

    fn spend(ability: &str, amount: i8) -> ApDistribution {
        ApDistribution {
            ability: ability.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn distribute_ap_to_primary_stats() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::WARRIOR, 10).with_ap(5)).await;

        h.growth
            .distribute_ap(
                &h.tenant,
                Uuid::new_v4(),
                seeded.id(),
                vec![spend(ability::STRENGTH, 3), spend(ability::LUCK, 1), spend(ability::DEXTERITY, 0)],
            )
            .await
            .expect("distribute");

        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.strength(), 7);
        assert_eq!(stored.luck(), 5);
        assert_eq!(stored.dexterity(), 4);
        assert_eq!(stored.ap(), 1);
        assert_eq!(
            last_stats(&h.sent),
            vec![Stat::Strength, Stat::Luck, Stat::AvailableAp]
        );
    }

    #[tokio::test]
    async fn distribute_ap_checks_total_amount() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::WARRIOR, 10).with_ap(2)).await;

        let err = h
            .growth
            .distribute_ap(&h.tenant, Uuid::new_v4(), seeded.id(), vec![spend(ability::STRENGTH, 3)])
            .await
            .expect_err("over budget");
        assert_eq!(err.to_string(), "not enough ap");

        let err = h
            .growth
            .distribute_ap(&h.tenant, Uuid::new_v4(), seeded.id(), vec![spend("CHARISMA", 1)])
            .await
            .expect_err("unknown ability");
        assert_eq!(err.to_string(), "invalid ability");
        assert_eq!(reload(&h, seeded.id()).await.ap(), 2);
        assert!(h.sent.lock().expect("sent").is_empty());
    }

    #[tokio::test]
    async fn distribute_ap_merges_repeated_abilities() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::WARRIOR, 10).with_ap(5)).await;

        h.growth
            .distribute_ap(
                &h.tenant,
                Uuid::new_v4(),
                seeded.id(),
                vec![spend(ability::STRENGTH, 3), spend(ability::STRENGTH, 2)],
            )
            .await
            .expect("distribute");

        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.strength(), 9);
        assert_eq!(stored.ap(), 0);
        assert_eq!(last_stats(&h.sent), vec![Stat::Strength, Stat::AvailableAp]);
    }

    #[tokio::test]
    async fn oversized_distribution_is_rejected_without_spending() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(&h, character(JobId::WARRIOR, 10).with_ap(5)).await;
        let request: Vec<ApDistribution> = (0..517).map(|_| spend(ability::STRENGTH, 127)).collect();

        let err = h
            .growth
            .distribute_ap(&h.tenant, Uuid::new_v4(), seeded.id(), request)
            .await
            .expect_err("over budget");

        assert!(matches!(err, CharacterError::NotEnoughAp));
        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.ap(), 5);
        assert_eq!(stored.strength(), 4);
        assert!(h.sent.lock().expect("sent").is_empty());
    }

    #[tokio::test]
    async fn distribute_ap_to_hp_scales_with_amount() {
        let mut skills = MockSkillDataPort::new();
        skills
            .expect_effect()
            .returning(|_, _, _| Ok(SkillEffect { x: 10, y: 2 }));
        let h = harness(skills, Arc::new(FixedRandom(0)));
        let seeded = seed(
            &h,
            character(JobId::WARRIOR, 30)
                .with_ap(5)
                .with_skills(vec![Skill::new(WARRIOR_IMPROVED_MAX_HP_INCREASE, 3)]),
        )
        .await;

        h.growth
            .distribute_ap(&h.tenant, Uuid::new_v4(), seeded.id(), vec![spend(ability::HP, 2)])
            .await
            .expect("distribute");

        // (20 + 2) per point.
        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.max_hp(), 144);
        assert_eq!(stored.hp_mp_used(), 2);
        assert_eq!(stored.ap(), 3);
        assert_eq!(last_stats(&h.sent), vec![Stat::MaxHp, Stat::AvailableAp]);
    }

    #[tokio::test]
    async fn distribute_ap_to_mp_uses_intelligence() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(
            &h,
            character(JobId::BOWMAN, 30).with_ap(1).with_stats(4, 25, 21, 4),
        )
        .await;

        h.growth
            .distribute_ap(&h.tenant, Uuid::new_v4(), seeded.id(), vec![spend(ability::MP, 1)])
            .await
            .expect("distribute");

        // 10 base + ceil(21 / 10).
        assert_eq!(reload(&h, seeded.id()).await.max_mp(), 63);
    }

    #[tokio::test]
    async fn distribute_sp_learns_and_raises_skills() {
        let h = harness(no_skills(), Arc::new(FixedRandom(0)));
        let seeded = seed(
            &h,
            character(JobId::WARRIOR, 15).with_sp(SkillPoints::parse("3,0,0,0,0,0,0,0,0,0")),
        )
        .await;

        h.growth
            .distribute_sp(&h.tenant, Uuid::new_v4(), seeded.id(), WARRIOR_IMPROVED_MAX_HP_INCREASE, 1)
            .await
            .expect("learn");
        h.growth
            .distribute_sp(&h.tenant, Uuid::new_v4(), seeded.id(), WARRIOR_IMPROVED_MAX_HP_INCREASE, 2)
            .await
            .expect("raise");

        let stored = reload(&h, seeded.id()).await;
        assert_eq!(stored.skill_level(WARRIOR_IMPROVED_MAX_HP_INCREASE), 3);
        assert_eq!(stored.current_sp(), 0);
        assert_eq!(last_stats(&h.sent), vec![Stat::AvailableSp]);

        let err = h
            .growth
            .distribute_sp(&h.tenant, Uuid::new_v4(), seeded.id(), WARRIOR_IMPROVED_MAX_HP_INCREASE, 1)
            .await
            .expect_err("empty book");
        assert_eq!(err.to_string(), "not enough sp");
    }
}
