//! Operation execution for generic action states.
//!
//! Operations typed `local:*` run in-process and may write context variables.
//! Every other operation becomes one step of a saga. When a state lists
//! several operations the locals run first, in order, and all remote ones
//! share a single saga.

use std::fmt::Display;
use std::sync::Arc;

use atlas_domain::conversation::cosmetic::{
    self, decode_u32_list, decode_u8_list, encode_u32_list, CosmeticKind,
    DEFAULT_FACE_COLOR_OFFSETS, DEFAULT_HAIR_COLORS,
};
use atlas_domain::saga::{
    ApplyConsumableEffectPayload, AwardExperiencePayload, AwardFamePayload, AwardItemPayload,
    AwardLevelPayload, AwardMesosPayload, ChangeJobPayload, ChangeStylePayload,
    CompleteQuestPayload, DestroyAssetPayload, ExperienceDistribution, GainClosenessPayload,
    IncreaseBuddyCapacityPayload, ItemPayload, SendMessagePayload, ShowStoragePayload,
    SkillPayload, SpawnMonsterPayload, StartQuestPayload, WarpToPortalPayload,
    WarpToRandomPortalPayload,
};
use atlas_domain::{
    Action, ContextMap, ConversationContext, DomainError, Field, MapId, Operation, SagaBuilder,
    SagaType, StepStatus, Tenant, TransactionId,
};
use futures_util::future::join_all;

use super::placeholder::{replace_placeholders, resolve, resolve_int, PlaceholderError};
use crate::infrastructure::ports::{
    AppearancePort, ClockPort, InventoryPort, MapPort, PeerError, PetPort, RandomPort,
    SagaError, SagaPort,
};

const LOCAL_PREFIX: &str = "local:";
const BATCH_INITIATOR: &str = "npc-conversation-batch";
const ACTOR_TYPE_NPC: &str = "NPC";
const DEFAULT_EXPERIENCE_TYPE: &str = "WHITE";
const SKILL_EXPIRATION_DAYS: i64 = 365;
const MESSAGE_TYPES: [&str; 4] = ["NOTICE", "POP_UP", "PINK_TEXT", "BLUE_TEXT"];

const DEFAULT_STYLES_KEY: &str = "generatedStyles";
const DEFAULT_COLORS_KEY: &str = "generatedColors";
const DEFAULT_FACES_KEY: &str = "generatedFaces";
const DEFAULT_SELECTED_STYLE_KEY: &str = "selectedStyle";
const DEFAULT_SELECTED_ITEM_KEY: &str = "selectedItem";
const DEFAULT_SELECTED_FACE_KEY: &str = "selectedFace";
const DEFAULT_LENS_COUPON_KEY: &str = "lensCoupon";
const PLAYER_COUNT_PREFIX: &str = "playerCount_";

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("missing {param} parameter for {operation} operation")]
    MissingParameter { param: String, operation: String },
    #[error("invalid {param} value '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },
    #[error("unknown local operation type: {0}")]
    UnknownLocal(String),
    #[error("unknown operation type: {0}")]
    Unknown(String),
    #[error("{0}")]
    Generation(String),
    #[error("failed to resolve pet at slot {slot}: {source}")]
    Pet { slot: i8, source: PeerError },
    #[error("saga orchestrator communication failed: {0}")]
    Saga(#[from] SagaError),
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl OperationError {
    pub fn invalid(param: &str, value: impl Display, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Typed access to an operation's parameters, resolved against the context.
struct Params<'a> {
    operation: &'a Operation,
    variables: &'a ContextMap,
}

impl<'a> Params<'a> {
    fn new(operation: &'a Operation, variables: &'a ContextMap) -> Self {
        Self {
            operation,
            variables,
        }
    }

    fn name(&self) -> &str {
        self.operation
            .op_type
            .strip_prefix(LOCAL_PREFIX)
            .unwrap_or(&self.operation.op_type)
    }

    fn missing(&self, param: &str) -> OperationError {
        OperationError::MissingParameter {
            param: param.to_string(),
            operation: self.name().to_string(),
        }
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.operation.param(key)
    }

    fn required(&self, key: &str) -> Result<&'a str, OperationError> {
        self.raw(key).ok_or_else(|| self.missing(key))
    }

    fn string(&self, key: &str) -> Result<String, OperationError> {
        Ok(resolve(self.required(key)?, self.variables)?)
    }

    fn string_or(&self, key: &str, default: &str) -> Result<String, OperationError> {
        match self.raw(key) {
            Some(raw) => Ok(resolve(raw, self.variables)?),
            None => Ok(default.to_string()),
        }
    }

    fn int<T: TryFrom<i64>>(&self, key: &str) -> Result<T, OperationError> {
        let value = resolve_int(self.required(key)?, self.variables)?;
        T::try_from(value).map_err(|_| OperationError::invalid(key, value, "out of range"))
    }

    fn int_or<T: TryFrom<i64>>(&self, key: &str, default: T) -> Result<T, OperationError> {
        match self.raw(key) {
            Some(_) => self.int(key),
            None => Ok(default),
        }
    }

    /// Falls back to a context variable of the same name.
    fn int_or_context<T: TryFrom<i64>>(&self, key: &str) -> Result<T, OperationError> {
        if self.raw(key).is_some() {
            return self.int(key);
        }
        let value = self
            .variables
            .get(key)
            .ok_or_else(|| self.missing(key))?;
        let value: i64 = value
            .parse()
            .map_err(|_| OperationError::invalid(key, value, "not a valid integer"))?;
        T::try_from(value).map_err(|_| OperationError::invalid(key, value, "out of range"))
    }

    fn flag(&self, key: &str) -> bool {
        self.raw(key) == Some("true")
    }

    fn output_key(&self, default: &str) -> String {
        self.raw("outputContextKey")
            .filter(|k| !k.is_empty())
            .unwrap_or(default)
            .to_string()
    }
}

/// Picks one of `items` with probability proportional to its weight.
pub fn pick_weighted<'a>(
    items: &'a [String],
    weights: &[u32],
    random: &dyn RandomPort,
) -> Result<&'a str, OperationError> {
    if items.len() != weights.len() {
        return Err(OperationError::Generation(format!(
            "items and weights must have the same length ({} vs {})",
            items.len(),
            weights.len()
        )));
    }
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    let total = i32::try_from(total)
        .map_err(|_| OperationError::invalid("weights", total, "total too large"))?;
    if total <= 0 {
        return Err(OperationError::Generation(
            "total weight must be greater than zero".into(),
        ));
    }

    let roll = i64::from(random.gen_range(0, total - 1));
    let mut cumulative = 0i64;
    for (item, weight) in items.iter().zip(weights) {
        cumulative += i64::from(*weight);
        if roll < cumulative {
            return Ok(item);
        }
    }
    Err(OperationError::Generation("weighted selection fell through".into()))
}

/// Applies the shared generator filters and refuses an empty result.
fn filter_styles(
    params: &Params<'_>,
    kind: CosmeticKind,
    current: u32,
    styles: Vec<u32>,
    what: &str,
) -> Result<Vec<u32>, OperationError> {
    let mut styles = styles;
    if params.flag("validateExists") {
        styles.retain(|s| kind.may_exist(*s));
    }
    if params.flag("excludeEquipped") {
        styles = cosmetic::exclude_current(styles, current);
    }
    if styles.is_empty() {
        return Err(OperationError::Generation(format!(
            "no valid {what} available after filtering"
        )));
    }
    Ok(styles)
}

fn base_styles(params: &Params<'_>) -> Result<Vec<u32>, OperationError> {
    let raw = params.raw("baseStyles").unwrap_or_default();
    let styles = decode_u32_list(raw)
        .map_err(|e| OperationError::invalid("baseStyles", raw, e.to_string()))?;
    if styles.is_empty() {
        return Err(OperationError::Generation("baseStyles parameter is empty".into()));
    }
    Ok(styles)
}

pub struct OperationExecutor {
    saga: Arc<dyn SagaPort>,
    appearance: Arc<dyn AppearancePort>,
    inventory: Arc<dyn InventoryPort>,
    pets: Arc<dyn PetPort>,
    maps: Arc<dyn MapPort>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl OperationExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        saga: Arc<dyn SagaPort>,
        appearance: Arc<dyn AppearancePort>,
        inventory: Arc<dyn InventoryPort>,
        pets: Arc<dyn PetPort>,
        maps: Arc<dyn MapPort>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            saga,
            appearance,
            inventory,
            pets,
            maps,
            clock,
            random,
        }
    }

    /// Runs `operations` for the context's character. Returns the id of the
    /// saga carrying the remote operations, if there were any.
    pub async fn execute_all(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        operations: &[Operation],
    ) -> Result<Option<TransactionId>, OperationError> {
        let (locals, remotes): (Vec<&Operation>, Vec<&Operation>) =
            operations.iter().partition(|op| op.is_local());

        for operation in locals {
            self.execute_local(tenant, context, operation).await?;
        }

        let initiated_by = match remotes.as_slice() {
            [] => return Ok(None),
            [single] => format!("npc-conversation-{}", single.op_type),
            _ => BATCH_INITIATOR.to_string(),
        };

        let mut builder = SagaBuilder::new(SagaType::InventoryTransaction, initiated_by);
        for operation in &remotes {
            let action = self.remote_action(tenant, context, operation).await?;
            let step_id = format!("{}-{}", operation.op_type, context.character_id());
            builder.push_step(step_id, StepStatus::Pending, action);
        }

        let saga = builder.build(self.clock.now());
        let transaction_id = saga.transaction_id;
        tracing::debug!(
            transaction_id = %transaction_id,
            character_id = %context.character_id(),
            steps = saga.steps.len(),
            "Submitting operation saga"
        );
        self.saga.submit(tenant, saga).await?;
        Ok(Some(transaction_id))
    }

    async fn execute_local(
        &self,
        tenant: &Tenant,
        context: &mut ConversationContext,
        operation: &Operation,
    ) -> Result<(), OperationError> {
        let character_id = context.character_id();
        let variables = context.variables().clone();
        let params = Params::new(operation, &variables);

        match params.name() {
            "log" => {
                let message = params.string("message")?;
                tracing::info!(character_id = %character_id, "NPC log: {message}");
            }
            "debug" => {
                let message = params.string("message")?;
                tracing::debug!(character_id = %character_id, "NPC debug: {message}");
            }
            "generate_hair_styles" => {
                let appearance = self.appearance.appearance(tenant, character_id).await?;
                let styles = cosmetic::hair_styles(
                    &appearance,
                    &base_styles(&params)?,
                    params.flag("genderFilter"),
                    params.flag("preserveColor"),
                );
                let styles = filter_styles(&params, CosmeticKind::Hair, appearance.hair, styles, "hair styles")?;
                store_list(context, params.output_key(DEFAULT_STYLES_KEY), &styles);
            }
            "generate_hair_colors" => {
                let appearance = self.appearance.appearance(tenant, character_id).await?;
                let raw = params
                    .raw("colors")
                    .filter(|c| !c.is_empty())
                    .unwrap_or(DEFAULT_HAIR_COLORS);
                let colors = decode_u8_list(raw)
                    .map_err(|e| OperationError::invalid("colors", raw, e.to_string()))?;
                let styles = cosmetic::hair_colors(&appearance, &colors);
                let styles = filter_styles(&params, CosmeticKind::Hair, appearance.hair, styles, "hair color variants")?;
                store_list(context, params.output_key(DEFAULT_COLORS_KEY), &styles);
            }
            "generate_face_styles" => {
                let appearance = self.appearance.appearance(tenant, character_id).await?;
                let styles = cosmetic::face_styles(
                    &appearance,
                    &base_styles(&params)?,
                    params.flag("genderFilter"),
                );
                let styles = filter_styles(&params, CosmeticKind::Face, appearance.face, styles, "face styles")?;
                store_list(context, params.output_key(DEFAULT_FACES_KEY), &styles);
            }
            "generate_face_colors" => {
                let appearance = self.appearance.appearance(tenant, character_id).await?;
                let raw = params
                    .raw("colorOffsets")
                    .filter(|c| !c.is_empty())
                    .unwrap_or(DEFAULT_FACE_COLOR_OFFSETS);
                let offsets = decode_u32_list(raw)
                    .map_err(|e| OperationError::invalid("colorOffsets", raw, e.to_string()))?;
                let styles = cosmetic::face_colors(&appearance, &offsets);
                let styles = filter_styles(&params, CosmeticKind::Face, appearance.face, styles, "face color variants")?;
                store_list(context, params.output_key(DEFAULT_COLORS_KEY), &styles);
            }
            "generate_face_colors_for_onetime_lens" => {
                let appearance = self.appearance.appearance(tenant, character_id).await?;
                let offsets = self.owned_lens_offsets(tenant, context).await;
                if offsets.is_empty() {
                    return Err(OperationError::Generation("no one-time lens items found".into()));
                }
                let styles = cosmetic::face_colors(&appearance, &offsets);
                let styles = filter_styles(&params, CosmeticKind::Face, appearance.face, styles, "face color variants")?;
                store_list(context, params.output_key(DEFAULT_COLORS_KEY), &styles);
            }
            "apply_cosmetic" => {
                let kind = CosmeticKind::parse(params.required("cosmeticType")?)?;
                let style_id: u32 = params.int("styleId")?;
                kind.ensure_applicable(style_id)?;
                self.appearance
                    .change_appearance(tenant, character_id, context.field(), kind, style_id)
                    .await?;
                tracing::info!(character_id = %character_id, ?kind, style_id, "Applied cosmetic");
            }
            "select_random_cosmetic" => {
                let key = params.required("stylesContextKey")?;
                let raw = variables.get(key).ok_or_else(|| {
                    OperationError::Generation(format!("styles not found in context key '{key}'"))
                })?;
                let styles = decode_u32_list(raw)?;
                if styles.is_empty() {
                    return Err(OperationError::Generation(
                        "styles array is empty, cannot select random cosmetic".into(),
                    ));
                }
                let last = i32::try_from(styles.len() - 1)
                    .map_err(|_| OperationError::invalid(key, styles.len(), "too many styles"))?;
                let index = usize::try_from(self.random.gen_range(0, last)).unwrap_or(0);
                let selected = styles.get(index).copied().unwrap_or(styles[0]);
                context.set_variable(params.output_key(DEFAULT_SELECTED_STYLE_KEY), selected.to_string());
            }
            "select_random_weighted" => {
                let items: Vec<String> = params
                    .string("items")?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                let raw_weights = params.string("weights")?;
                let weights = decode_u32_list(&raw_weights)
                    .map_err(|e| OperationError::invalid("weights", &raw_weights, e.to_string()))?;
                let selected = pick_weighted(&items, &weights, self.random.as_ref())?.to_string();
                context.set_variable(params.output_key(DEFAULT_SELECTED_ITEM_KEY), selected);
            }
            "calculate_lens_coupon" => {
                let key = params
                    .raw("selectedFaceKey")
                    .unwrap_or(DEFAULT_SELECTED_FACE_KEY);
                let raw = variables.get(key).ok_or_else(|| missing_variable(key))?;
                let face: u32 = raw
                    .parse()
                    .map_err(|_| OperationError::invalid(key, raw, "not a face id"))?;
                let coupon = cosmetic::lens_coupon_for_face(face);
                context.set_variable(params.output_key(DEFAULT_LENS_COUPON_KEY), coupon.to_string());
            }
            "fetch_map_player_counts" => {
                let raw = params.string("mapIds")?;
                let map_ids = decode_u32_list(&raw)
                    .map_err(|e| OperationError::invalid("mapIds", &raw, e.to_string()))?;
                for (map_id, count) in self.player_counts(tenant, context.field(), &map_ids).await {
                    context.set_variable(format!("{PLAYER_COUNT_PREFIX}{map_id}"), count.to_string());
                }
            }
            other => return Err(OperationError::UnknownLocal(other.to_string())),
        }
        Ok(())
    }

    async fn owned_lens_offsets(&self, tenant: &Tenant, context: &ConversationContext) -> Vec<u32> {
        let mut offsets = Vec::new();
        for item_id in cosmetic::onetime_lens_items() {
            match self
                .inventory
                .has_item(tenant, context.character_id(), item_id)
                .await
            {
                Ok(true) => offsets.extend(cosmetic::onetime_lens_offset(item_id)),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        character_id = %context.character_id(),
                        item_id,
                        error = %e,
                        "Inventory check failed, skipping lens item"
                    );
                }
            }
        }
        offsets
    }

    /// Player count per map. Lookups run concurrently; failures count as 0.
    async fn player_counts(&self, tenant: &Tenant, field: Field, map_ids: &[u32]) -> Vec<(u32, u32)> {
        let lookups = map_ids.iter().map(|map_id| {
            let target = Field::new(field.world_id, field.channel_id, MapId::from_raw(*map_id));
            async move {
                let count = match self.maps.player_count(tenant, target).await {
                    Ok(count) => count,
                    Err(e) => {
                        tracing::warn!(map_id, error = %e, "Player count lookup failed, using 0");
                        0
                    }
                };
                (*map_id, count)
            }
        });
        join_all(lookups).await
    }

    async fn remote_action(
        &self,
        tenant: &Tenant,
        context: &ConversationContext,
        operation: &Operation,
    ) -> Result<Action, OperationError> {
        let p = Params::new(operation, context.variables());
        let character_id = context.character_id();
        let field = context.field();
        let (world_id, channel_id) = (field.world_id, field.channel_id);
        let style = |p: &Params<'_>| -> Result<ChangeStylePayload, OperationError> {
            Ok(ChangeStylePayload {
                character_id,
                world_id,
                channel_id,
                style_id: p.int("styleId")?,
            })
        };
        let skill = |p: &Params<'_>| -> Result<SkillPayload, OperationError> {
            Ok(SkillPayload {
                character_id,
                skill_id: p.int("skillId")?,
                level: p.int_or("level", 1)?,
                master_level: p.int_or("masterLevel", 1)?,
                expiration: self.clock.now() + chrono::Duration::days(SKILL_EXPIRATION_DAYS),
            })
        };

        let action = match operation.op_type.as_str() {
            "award_item" => Action::AwardInventory(AwardItemPayload {
                character_id,
                item: ItemPayload {
                    template_id: p.int("itemId")?,
                    quantity: p.int("quantity")?,
                },
            }),
            "award_mesos" => Action::AwardMesos(AwardMesosPayload {
                character_id,
                world_id,
                channel_id,
                actor_id: p.int_or("actorId", 0)?,
                actor_type: p.string_or("actorType", ACTOR_TYPE_NPC)?,
                amount: p.int("amount")?,
            }),
            "award_exp" => Action::AwardExperience(AwardExperiencePayload {
                character_id,
                world_id,
                channel_id,
                distributions: vec![ExperienceDistribution {
                    experience_type: p.string_or("type", DEFAULT_EXPERIENCE_TYPE)?,
                    amount: p.int("amount")?,
                    attr1: p.int_or("attr1", 0)?,
                }],
            }),
            "award_level" => Action::AwardLevel(AwardLevelPayload {
                character_id,
                world_id,
                channel_id,
                amount: p.int("amount")?,
            }),
            "award_fame" => Action::AwardFame(AwardFamePayload {
                character_id,
                world_id,
                channel_id,
                amount: p.int("amount")?,
            }),
            "warp_to_map" => Action::WarpToPortal(WarpToPortalPayload {
                character_id,
                world_id,
                channel_id,
                field_id: MapId::from_raw(p.int_or("mapId", 0)?),
                portal_id: p.int_or("portalId", 0)?,
                portal_name: String::new(),
            }),
            "warp_to_random_portal" => Action::WarpToRandomPortal(WarpToRandomPortalPayload {
                character_id,
                world_id,
                channel_id,
                field_id: MapId::from_raw(p.int_or("mapId", 0)?),
            }),
            "change_job" => Action::ChangeJob(ChangeJobPayload {
                character_id,
                world_id,
                channel_id,
                job_id: p.int("jobId")?,
            }),
            "change_hair" => Action::ChangeHair(style(&p)?),
            "change_face" => Action::ChangeFace(style(&p)?),
            "change_skin" => Action::ChangeSkin(style(&p)?),
            "create_skill" => Action::CreateSkill(skill(&p)?),
            "update_skill" => Action::UpdateSkill(skill(&p)?),
            "destroy_item" => {
                let remove_all = p.flag("removeAll");
                let quantity = if remove_all {
                    p.int_or("quantity", 0)?
                } else {
                    p.int("quantity")?
                };
                Action::DestroyAsset(DestroyAssetPayload {
                    character_id,
                    template_id: p.int("itemId")?,
                    quantity,
                    remove_all,
                })
            }
            "gain_closeness" => {
                let pet_id = if p.raw("petId").is_some() {
                    p.int("petId")?
                } else if p.raw("petIndex").is_some() {
                    let slot: i8 = p.int("petIndex")?;
                    self.pets
                        .pet_id_by_slot(tenant, character_id, slot)
                        .await
                        .map_err(|source| OperationError::Pet { slot, source })?
                } else {
                    return Err(p.missing("petId or petIndex"));
                };
                Action::GainCloseness(GainClosenessPayload {
                    pet_id,
                    amount: p.int("amount")?,
                })
            }
            "spawn_monster" => Action::SpawnMonster(SpawnMonsterPayload {
                character_id,
                world_id,
                channel_id,
                map_id: MapId::from_raw(p.int_or("mapId", field.map_id.value())?),
                monster_id: p.int("monsterId")?,
                x: p.int_or("x", 0)?,
                y: p.int_or("y", 0)?,
                team: p.int_or("team", 0)?,
                count: p.int_or("count", 1)?,
            }),
            "complete_quest" => Action::CompleteQuest(CompleteQuestPayload {
                character_id,
                world_id,
                quest_id: p.int_or_context("questId")?,
                npc_id: p.int_or("npcId", context.npc_id().value())?,
                force: p.flag("force"),
            }),
            "start_quest" => Action::StartQuest(StartQuestPayload {
                character_id,
                world_id,
                quest_id: p.int_or_context("questId")?,
                npc_id: p.int_or("npcId", context.npc_id().value())?,
            }),
            "apply_consumable_effect" => Action::ApplyConsumableEffect(ApplyConsumableEffectPayload {
                character_id,
                world_id,
                channel_id,
                item_id: p.int("itemId")?,
            }),
            "send_message" => {
                let message_type = p.string("messageType")?;
                if !MESSAGE_TYPES.contains(&message_type.as_str()) {
                    return Err(OperationError::invalid(
                        "messageType",
                        &message_type,
                        "must be NOTICE, POP_UP, PINK_TEXT or BLUE_TEXT",
                    ));
                }
                Action::SendMessage(SendMessagePayload {
                    character_id,
                    world_id,
                    channel_id,
                    message_type,
                    message: replace_placeholders(p.required("message")?, context.variables()),
                })
            }
            "open_storage" => Action::ShowStorage(ShowStoragePayload {
                character_id,
                world_id,
                channel_id,
                npc_id: p.int_or("npcId", context.npc_id().value())?,
            }),
            "increase_buddy_capacity" => Action::IncreaseBuddyCapacity(IncreaseBuddyCapacityPayload {
                character_id,
                world_id,
                channel_id,
                amount: p.int("amount")?,
            }),
            other => return Err(OperationError::Unknown(other.to_string())),
        };
        Ok(action)
    }
}

fn missing_variable(key: &str) -> OperationError {
    OperationError::Generation(format!("context key '{key}' not found"))
}

fn store_list(context: &mut ConversationContext, key: String, values: &[u32]) {
    tracing::debug!(
        character_id = %context.character_id(),
        key = %key,
        count = values.len(),
        "Storing generated styles"
    );
    context.set_variable(key, encode_u32_list(values));
}
