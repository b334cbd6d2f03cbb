//! Conversation graphs: states, choices, operations and branch conditions.
//!
//! A conversation is a directed graph of [`State`]s keyed by string id. An
//! empty `nextState` anywhere in the graph means "end the conversation".
//!
//! On the wire a state is `{ "id", "type", "<type>": { ... } }` with exactly
//! one populated sub-object. In memory it is the [`StateKind`] sum type; the
//! conversion lives in [`StateRepr`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::NpcId;

/// Context variables, always string-valued.
pub type ContextMap = BTreeMap<String, String>;

/// Choice text the client renders as the close button of a menu.
pub const EXIT_CHOICE_TEXT: &str = "Exit";

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    npc_id: NpcId,
    start_state: String,
    states: Vec<State>,
    /// Variables every context of this conversation starts with.
    #[serde(default, skip_serializing_if = "ContextMap::is_empty")]
    variables: ContextMap,
}

impl Conversation {
    pub fn new(npc_id: NpcId, start_state: impl Into<String>, states: Vec<State>) -> Self {
        Self {
            npc_id,
            start_state: start_state.into(),
            states,
            variables: ContextMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn variables(&self) -> &ContextMap {
        &self.variables
    }

    pub fn npc_id(&self) -> NpcId {
        self.npc_id
    }

    pub fn start_state(&self) -> &str {
        &self.start_state
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Looks a state up by id. States are few, a scan is fine.
    pub fn find_state(&self, id: &str) -> Result<&State, DomainError> {
        self.states
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| DomainError::not_found("ConversationState", id))
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StateRepr", into = "StateRepr")]
pub struct State {
    id: String,
    kind: StateKind,
}

impl State {
    pub fn new(id: impl Into<String>, kind: StateKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    Dialogue(Dialogue),
    GenericAction(GenericAction),
    CraftAction(CraftAction),
    TransportAction(TransportAction),
    PartyQuestAction(PartyQuestAction),
    PartyQuestBonusAction(PartyQuestBonusAction),
    GachaponAction(GachaponAction),
    ListSelection(ListSelection),
    AskNumber(AskNumber),
    AskStyle(AskStyle),
    AskSlideMenu(AskSlideMenu),
}

impl StateKind {
    /// The wire discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            StateKind::Dialogue(_) => "dialogue",
            StateKind::GenericAction(_) => "genericAction",
            StateKind::CraftAction(_) => "craftAction",
            StateKind::TransportAction(_) => "transportAction",
            StateKind::PartyQuestAction(_) => "partyQuestAction",
            StateKind::PartyQuestBonusAction(_) => "partyQuestBonusAction",
            StateKind::GachaponAction(_) => "gachaponAction",
            StateKind::ListSelection(_) => "listSelection",
            StateKind::AskNumber(_) => "askNumber",
            StateKind::AskStyle(_) => "askStyle",
            StateKind::AskSlideMenu(_) => "askSlideMenu",
        }
    }

    /// Every state id this state can transition to, empty strings included.
    pub fn transitions(&self) -> Vec<&str> {
        match self {
            StateKind::Dialogue(d) => d.choices.iter().map(|c| c.next_state.as_str()).collect(),
            StateKind::ListSelection(l) => {
                l.choices.iter().map(|c| c.next_state.as_str()).collect()
            }
            StateKind::AskSlideMenu(m) => {
                m.choices.iter().map(|c| c.next_state.as_str()).collect()
            }
            StateKind::GenericAction(a) => {
                a.outcomes.iter().map(|o| o.next_state.as_str()).collect()
            }
            StateKind::CraftAction(a) => vec![
                a.success_state.as_str(),
                a.failure_state.as_str(),
                a.missing_materials_state.as_str(),
            ],
            StateKind::TransportAction(a) => vec![
                a.failure_state.as_str(),
                a.capacity_full_state.as_str(),
                a.already_in_transit_state.as_str(),
                a.route_not_found_state.as_str(),
                a.service_error_state.as_str(),
            ],
            StateKind::PartyQuestAction(a) => vec![
                a.failure_state.as_str(),
                a.not_in_party_state.as_str(),
                a.not_leader_state.as_str(),
            ],
            StateKind::PartyQuestBonusAction(a) => vec![a.failure_state.as_str()],
            StateKind::GachaponAction(a) => vec![a.failure_state.as_str()],
            StateKind::AskNumber(a) => vec![a.next_state.as_str()],
            StateKind::AskStyle(a) => vec![a.next_state.as_str()],
        }
    }

    /// Whether the state stops the drive loop to wait for client input.
    pub fn awaits_input(&self) -> bool {
        matches!(
            self,
            StateKind::Dialogue(_)
                | StateKind::ListSelection(_)
                | StateKind::AskNumber(_)
                | StateKind::AskStyle(_)
                | StateKind::AskSlideMenu(_)
        )
    }
}

/// Wire form of [`State`]: a discriminator plus one optional sub-object per
/// state type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRepr {
    pub id: String,
    #[serde(rename = "type")]
    pub state_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<Dialogue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_action: Option<GenericAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub craft_action: Option<CraftAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_action: Option<TransportAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_quest_action: Option<PartyQuestAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_quest_bonus_action: Option<PartyQuestBonusAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gachapon_action: Option<GachaponAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_selection: Option<ListSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_number: Option<AskNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_style: Option<AskStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_slide_menu: Option<AskSlideMenu>,
}

fn required<T>(value: Option<T>, state_type: &str) -> Result<T, DomainError> {
    value.ok_or_else(|| {
        DomainError::parse(format!(
            "{state_type} is required for {state_type} state"
        ))
    })
}

impl TryFrom<StateRepr> for State {
    type Error = DomainError;

    fn try_from(repr: StateRepr) -> Result<Self, Self::Error> {
        let t = repr.state_type.as_str();
        let kind = match t {
            "dialogue" => StateKind::Dialogue(required(repr.dialogue, t)?),
            "genericAction" => StateKind::GenericAction(required(repr.generic_action, t)?),
            "craftAction" => StateKind::CraftAction(required(repr.craft_action, t)?),
            "transportAction" => StateKind::TransportAction(required(repr.transport_action, t)?),
            "partyQuestAction" => {
                StateKind::PartyQuestAction(required(repr.party_quest_action, t)?)
            }
            "partyQuestBonusAction" => {
                StateKind::PartyQuestBonusAction(required(repr.party_quest_bonus_action, t)?)
            }
            "gachaponAction" => StateKind::GachaponAction(required(repr.gachapon_action, t)?),
            "listSelection" => StateKind::ListSelection(required(repr.list_selection, t)?),
            "askNumber" => StateKind::AskNumber(required(repr.ask_number, t)?),
            "askStyle" => StateKind::AskStyle(required(repr.ask_style, t)?),
            "askSlideMenu" => StateKind::AskSlideMenu(required(repr.ask_slide_menu, t)?),
            other => {
                return Err(DomainError::parse(format!("Invalid state type: {other}")));
            }
        };
        Ok(State { id: repr.id, kind })
    }
}

impl From<State> for StateRepr {
    fn from(state: State) -> Self {
        let mut repr = StateRepr {
            id: state.id,
            state_type: state.kind.type_name().to_string(),
            ..StateRepr::default()
        };
        match state.kind {
            StateKind::Dialogue(v) => repr.dialogue = Some(v),
            StateKind::GenericAction(v) => repr.generic_action = Some(v),
            StateKind::CraftAction(v) => repr.craft_action = Some(v),
            StateKind::TransportAction(v) => repr.transport_action = Some(v),
            StateKind::PartyQuestAction(v) => repr.party_quest_action = Some(v),
            StateKind::PartyQuestBonusAction(v) => repr.party_quest_bonus_action = Some(v),
            StateKind::GachaponAction(v) => repr.gachapon_action = Some(v),
            StateKind::ListSelection(v) => repr.list_selection = Some(v),
            StateKind::AskNumber(v) => repr.ask_number = Some(v),
            StateKind::AskStyle(v) => repr.ask_style = Some(v),
            StateKind::AskSlideMenu(v) => repr.ask_slide_menu = Some(v),
        }
        repr
    }
}

// ============================================================================
// Dialogue and menus
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogueType {
    SendOk,
    SendNext,
    SendPrev,
    SendNextPrev,
    SendYesNo,
    SendAcceptDecline,
}

impl DialogueType {
    /// Choices a well-formed dialogue of this type declares, when fixed.
    pub fn expected_choices(&self) -> Option<usize> {
        match self {
            DialogueType::SendOk | DialogueType::SendNext | DialogueType::SendPrev => Some(2),
            DialogueType::SendYesNo | DialogueType::SendNextPrev => Some(3),
            DialogueType::SendAcceptDecline => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Speaker {
    #[default]
    Npc,
    Character,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    pub dialogue_type: DialogueType,
    pub text: String,
    #[serde(default)]
    pub speaker: Speaker,
    #[serde(default = "default_true")]
    pub end_chat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_npc_id: Option<u32>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl Dialogue {
    /// Maps a client action onto a declared choice.
    ///
    /// Action 1 always means the primary button (first choice). Action 0 is
    /// the secondary button on two-way dialogues and the close button
    /// elsewhere. Anything else is the close button, which is declared last.
    pub fn choice_from_action(&self, action: i8) -> Option<&Choice> {
        let two_way = matches!(
            self.dialogue_type,
            DialogueType::SendNextPrev | DialogueType::SendYesNo | DialogueType::SendAcceptDecline
        );
        match action {
            1 => self.choices.first(),
            0 if self.dialogue_type == DialogueType::SendPrev => self.choices.first(),
            0 if two_way => self.choices.get(1),
            _ => self.choices.last(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub text: String,
    #[serde(default)]
    pub next_state: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: ContextMap,
}

impl Choice {
    pub fn new(text: impl Into<String>, next_state: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next_state: next_state.into(),
            context: ContextMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Exit entries close the menu and are never rendered as items.
    pub fn is_exit(&self) -> bool {
        self.next_state.is_empty() || self.text == EXIT_CHOICE_TEXT
    }
}

/// Menu pick: action 0 closes, otherwise `selection` indexes the declared
/// choice list (exit entries keep their slot).
fn menu_choice(choices: &[Choice], action: i8, selection: i32) -> Option<&Choice> {
    if action == 0 {
        return choices.iter().find(|c| c.is_exit());
    }
    usize::try_from(selection)
        .ok()
        .and_then(|index| choices.get(index))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSelection {
    pub title: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ListSelection {
    pub fn choice_from_selection(&self, action: i8, selection: i32) -> Option<&Choice> {
        menu_choice(&self.choices, action, selection)
    }
}

fn default_slide_menu_key() -> String {
    "selectedOption".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskSlideMenu {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub menu_type: u32,
    #[serde(default = "default_slide_menu_key")]
    pub context_key: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl AskSlideMenu {
    pub fn choice_from_selection(&self, action: i8, selection: i32) -> Option<&Choice> {
        menu_choice(&self.choices, action, selection)
    }
}

fn default_number_key() -> String {
    "quantity".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskNumber {
    pub text: String,
    #[serde(rename = "default", default)]
    pub default_value: u32,
    #[serde(rename = "min", default)]
    pub min_value: u32,
    #[serde(rename = "max", default)]
    pub max_value: u32,
    #[serde(default = "default_number_key")]
    pub context_key: String,
    #[serde(default)]
    pub next_state: String,
}

fn default_style_key() -> String {
    "selectedStyle".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskStyle {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub styles_context_key: String,
    #[serde(default = "default_style_key")]
    pub context_key: String,
    #[serde(default)]
    pub next_state: String,
}

// ============================================================================
// Actions
// ============================================================================

/// A single step of a generic action. `local:` types run in-process, every
/// other type becomes a saga step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub params: ContextMap,
}

impl Operation {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            params: ContextMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn is_local(&self) -> bool {
        self.op_type.starts_with("local:")
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub operator: String,
    /// Raw value; may be a literal, a context reference or `A op B`.
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub world_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel_id: String,
    #[serde(default)]
    pub include_equipped: bool,
}

impl Condition {
    pub fn new(
        condition_type: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            operator: operator.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = reference_id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub next_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericAction {
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftAction {
    /// Literal id or a `{context.x}` reference.
    pub item_id: String,
    pub materials: Vec<u32>,
    pub quantities: Vec<u32>,
    #[serde(default)]
    pub meso_cost: u32,
    pub success_state: String,
    pub failure_state: String,
    pub missing_materials_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportAction {
    pub route_name: String,
    pub failure_state: String,
    #[serde(default)]
    pub capacity_full_state: String,
    #[serde(default)]
    pub already_in_transit_state: String,
    #[serde(default)]
    pub route_not_found_state: String,
    #[serde(default)]
    pub service_error_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyQuestAction {
    pub quest_id: String,
    pub failure_state: String,
    #[serde(default)]
    pub not_in_party_state: String,
    #[serde(default)]
    pub not_leader_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyQuestBonusAction {
    #[serde(default)]
    pub failure_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GachaponAction {
    pub gachapon_id: String,
    pub ticket_item_id: u32,
    pub failure_state: String,
}
