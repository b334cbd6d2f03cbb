//! Static checks over a conversation graph.
//!
//! Collects every problem rather than stopping at the first one, so an
//! authoring tool can show them all at once.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::model::{
    AskNumber, AskSlideMenu, AskStyle, Choice, Conversation, CraftAction, Dialogue,
    GachaponAction, GenericAction, ListSelection, PartyQuestAction, PartyQuestBonusAction, State,
    StateKind, TransportAction,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub state_id: String,
    pub field: String,
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Required,
    Duplicate,
    InvalidReference,
    InvalidCount,
    Invalid,
    Unreachable,
    InfiniteLoop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    fn push(&mut self, state_id: &str, field: impl Into<String>, kind: IssueKind, message: String) {
        self.issues.push(ValidationIssue {
            state_id: state_id.to_string(),
            field: field.into(),
            kind,
            message,
        });
    }
}

/// Validates `conversation` and returns every issue found.
pub fn validate(conversation: &Conversation) -> ValidationReport {
    let mut report = ValidationReport::default();

    if conversation.npc_id().value() == 0 {
        report.push("", "npcId", IssueKind::Required, "NPC ID is required".into());
    }
    if conversation.start_state().is_empty() {
        report.push("", "startState", IssueKind::Required, "Start state is required".into());
    }
    if conversation.states().is_empty() {
        report.push(
            "",
            "states",
            IssueKind::Required,
            "At least one state is required".into(),
        );
        return report;
    }

    let mut ids: HashSet<&str> = HashSet::new();
    for state in conversation.states() {
        if state.id().is_empty() {
            report.push("", "id", IssueKind::Required, "State ID is required".into());
        } else if !ids.insert(state.id()) {
            report.push(
                state.id(),
                "id",
                IssueKind::Duplicate,
                format!("Duplicate state ID: {}", state.id()),
            );
        }
    }

    let start = conversation.start_state();
    if !start.is_empty() && !ids.contains(start) {
        report.push(
            "",
            "startState",
            IssueKind::InvalidReference,
            format!("Start state '{start}' does not exist"),
        );
    }

    let checker = ShapeChecker { ids: &ids };
    for state in conversation.states() {
        checker.check(state, &mut report);
    }

    let graph: HashMap<&str, Vec<&str>> = conversation
        .states()
        .iter()
        .map(|s| (s.id(), s.kind().transitions()))
        .collect();

    let reachable = reachable_from(start, &graph);
    let mut unreachable: Vec<&str> = ids
        .iter()
        .copied()
        .filter(|id| *id != start && !reachable.contains(id))
        .collect();
    unreachable.sort_unstable();
    for id in unreachable {
        report.push(
            id,
            "reachability",
            IssueKind::Unreachable,
            format!("State '{id}' is unreachable"),
        );
    }

    detect_closed_cycles(start, &graph, &mut report);
    report
}

fn reachable_from<'a>(start: &'a str, graph: &HashMap<&'a str, Vec<&'a str>>) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if id.is_empty() || !seen.insert(id) {
            continue;
        }
        if let Some(next) = graph.get(id) {
            stack.extend(next.iter().copied());
        }
    }
    seen
}

/// Depth-first search from the start state. A back edge closes a cycle; the
/// cycle is reported only when none of its members can leave it.
fn detect_closed_cycles(start: &str, graph: &HashMap<&str, Vec<&str>>, report: &mut ValidationReport) {
    struct Walk<'g, 'a> {
        graph: &'g HashMap<&'a str, Vec<&'a str>>,
        visited: HashSet<&'a str>,
        path: Vec<&'a str>,
    }

    impl<'g, 'a> Walk<'g, 'a> {
        fn visit(&mut self, id: &'a str, report: &mut ValidationReport) -> bool {
            self.visited.insert(id);
            self.path.push(id);

            let graph = self.graph;
            for &next in graph.get(id).map(Vec::as_slice).unwrap_or_default() {
                if next.is_empty() {
                    continue;
                }
                if let Some(pos) = self.path.iter().position(|s| *s == next) {
                    let mut cycle: Vec<&str> = self.path[pos..].to_vec();
                    if cycle_is_closed(&cycle, graph) {
                        cycle.push(next);
                        report.push(
                            next,
                            "circular_reference",
                            IssueKind::InfiniteLoop,
                            format!("Infinite loop detected: {}", cycle.join(" -> ")),
                        );
                    }
                    return true;
                }
                if !self.visited.contains(next) && self.visit(next, report) {
                    return true;
                }
            }

            self.path.pop();
            false
        }
    }

    if start.is_empty() || !graph.contains_key(start) {
        return;
    }
    let mut walk = Walk {
        graph,
        visited: HashSet::new(),
        path: Vec::new(),
    };
    walk.visit(start, report);
}

fn cycle_is_closed(cycle: &[&str], graph: &HashMap<&str, Vec<&str>>) -> bool {
    let members: HashSet<&str> = cycle.iter().copied().collect();
    cycle.iter().all(|id| {
        graph
            .get(id)
            .map(|next| next.iter().all(|n| !n.is_empty() && members.contains(n)))
            .unwrap_or(true)
    })
}

struct ShapeChecker<'a> {
    ids: &'a HashSet<&'a str>,
}

impl ShapeChecker<'_> {
    fn check(&self, state: &State, report: &mut ValidationReport) {
        let id = state.id();
        match state.kind() {
            StateKind::Dialogue(d) => self.dialogue(id, d, report),
            StateKind::GenericAction(a) => self.generic_action(id, a, report),
            StateKind::CraftAction(a) => self.craft_action(id, a, report),
            StateKind::TransportAction(a) => self.transport_action(id, a, report),
            StateKind::PartyQuestAction(a) => self.party_quest_action(id, a, report),
            StateKind::PartyQuestBonusAction(a) => self.party_quest_bonus_action(id, a, report),
            StateKind::GachaponAction(a) => self.gachapon_action(id, a, report),
            StateKind::ListSelection(l) => self.list_selection(id, l, report),
            StateKind::AskNumber(a) => self.ask_number(id, a, report),
            StateKind::AskStyle(a) => self.ask_style(id, a, report),
            StateKind::AskSlideMenu(m) => self.ask_slide_menu(id, m, report),
        }
    }

    /// Empty references are allowed; they end the conversation.
    fn optional_ref(&self, id: &str, field: &str, label: &str, target: &str, report: &mut ValidationReport) {
        if !target.is_empty() && !self.ids.contains(target) {
            report.push(
                id,
                field,
                IssueKind::InvalidReference,
                format!("{label} '{target}' does not exist"),
            );
        }
    }

    fn required_ref(&self, id: &str, field: &str, label: &str, target: &str, report: &mut ValidationReport) {
        if target.is_empty() {
            report.push(id, field, IssueKind::Required, format!("{label} is required"));
        } else {
            self.optional_ref(id, field, label, target, report);
        }
    }

    fn choices(&self, id: &str, prefix: &str, choices: &[Choice], report: &mut ValidationReport) {
        if choices.is_empty() {
            report.push(
                id,
                format!("{prefix}.choices"),
                IssueKind::Required,
                "At least one choice is required".into(),
            );
        }
        for (i, choice) in choices.iter().enumerate() {
            if choice.text.is_empty() {
                report.push(
                    id,
                    format!("{prefix}.choices[{i}].text"),
                    IssueKind::Required,
                    "Choice text is required".into(),
                );
            }
            self.optional_ref(
                id,
                &format!("{prefix}.choices[{i}].nextState"),
                "Next state",
                &choice.next_state,
                report,
            );
        }
    }

    fn dialogue(&self, id: &str, d: &Dialogue, report: &mut ValidationReport) {
        if d.text.is_empty() {
            report.push(id, "dialogue.text", IssueKind::Required, "Dialogue text is required".into());
        }
        self.choices(id, "dialogue", &d.choices, report);
        if let Some(expected) = d.dialogue_type.expected_choices() {
            if d.choices.len() != expected {
                report.push(
                    id,
                    "dialogue.choices",
                    IssueKind::InvalidCount,
                    format!("{:?} requires exactly {expected} choices", d.dialogue_type),
                );
            }
        }
    }

    fn generic_action(&self, id: &str, a: &GenericAction, report: &mut ValidationReport) {
        if a.operations.is_empty() && a.outcomes.is_empty() {
            report.push(
                id,
                "genericAction",
                IssueKind::Required,
                "At least one operation or outcome is required".into(),
            );
        }
        for (i, op) in a.operations.iter().enumerate() {
            if op.op_type.is_empty() {
                report.push(
                    id,
                    format!("genericAction.operations[{i}].type"),
                    IssueKind::Required,
                    "Operation type is required".into(),
                );
            }
        }
        for (i, outcome) in a.outcomes.iter().enumerate() {
            self.required_ref(
                id,
                &format!("genericAction.outcomes[{i}].nextState"),
                "Next state",
                &outcome.next_state,
                report,
            );
            for (j, cond) in outcome.conditions.iter().enumerate() {
                let base = format!("genericAction.outcomes[{i}].conditions[{j}]");
                for (field, value, label) in [
                    ("type", &cond.condition_type, "Condition type"),
                    ("operator", &cond.operator, "Condition operator"),
                    ("value", &cond.value, "Condition value"),
                ] {
                    if value.is_empty() {
                        report.push(
                            id,
                            format!("{base}.{field}"),
                            IssueKind::Required,
                            format!("{label} is required"),
                        );
                    }
                }
            }
        }
    }

    fn craft_action(&self, id: &str, a: &CraftAction, report: &mut ValidationReport) {
        if a.item_id.is_empty() {
            report.push(id, "craftAction.itemId", IssueKind::Required, "Item ID is required".into());
        }
        if a.materials.is_empty() {
            report.push(
                id,
                "craftAction.materials",
                IssueKind::Required,
                "At least one material is required".into(),
            );
        }
        if a.materials.len() != a.quantities.len() {
            report.push(
                id,
                "craftAction.quantities",
                IssueKind::Invalid,
                "Quantities must match materials count".into(),
            );
        }
        self.required_ref(id, "craftAction.successState", "Success state", &a.success_state, report);
        self.required_ref(id, "craftAction.failureState", "Failure state", &a.failure_state, report);
        self.required_ref(
            id,
            "craftAction.missingMaterialsState",
            "Missing materials state",
            &a.missing_materials_state,
            report,
        );
    }

    fn transport_action(&self, id: &str, a: &TransportAction, report: &mut ValidationReport) {
        if a.route_name.is_empty() {
            report.push(
                id,
                "transportAction.routeName",
                IssueKind::Required,
                "Route name is required".into(),
            );
        }
        self.required_ref(id, "transportAction.failureState", "Failure state", &a.failure_state, report);
        self.optional_ref(
            id,
            "transportAction.capacityFullState",
            "Capacity full state",
            &a.capacity_full_state,
            report,
        );
        self.optional_ref(
            id,
            "transportAction.alreadyInTransitState",
            "Already in transit state",
            &a.already_in_transit_state,
            report,
        );
        self.optional_ref(
            id,
            "transportAction.routeNotFoundState",
            "Route not found state",
            &a.route_not_found_state,
            report,
        );
        self.optional_ref(
            id,
            "transportAction.serviceErrorState",
            "Service error state",
            &a.service_error_state,
            report,
        );
    }

    fn party_quest_action(&self, id: &str, a: &PartyQuestAction, report: &mut ValidationReport) {
        if a.quest_id.is_empty() {
            report.push(
                id,
                "partyQuestAction.questId",
                IssueKind::Required,
                "Quest ID is required".into(),
            );
        }
        self.required_ref(id, "partyQuestAction.failureState", "Failure state", &a.failure_state, report);
        self.optional_ref(
            id,
            "partyQuestAction.notInPartyState",
            "Not in party state",
            &a.not_in_party_state,
            report,
        );
        self.optional_ref(
            id,
            "partyQuestAction.notLeaderState",
            "Not leader state",
            &a.not_leader_state,
            report,
        );
    }

    fn party_quest_bonus_action(&self, id: &str, a: &PartyQuestBonusAction, report: &mut ValidationReport) {
        self.optional_ref(
            id,
            "partyQuestBonusAction.failureState",
            "Failure state",
            &a.failure_state,
            report,
        );
    }

    fn gachapon_action(&self, id: &str, a: &GachaponAction, report: &mut ValidationReport) {
        if a.gachapon_id.is_empty() {
            report.push(
                id,
                "gachaponAction.gachaponId",
                IssueKind::Required,
                "Gachapon ID is required".into(),
            );
        }
        if a.ticket_item_id == 0 {
            report.push(
                id,
                "gachaponAction.ticketItemId",
                IssueKind::Required,
                "Ticket item ID is required".into(),
            );
        }
        self.required_ref(id, "gachaponAction.failureState", "Failure state", &a.failure_state, report);
    }

    fn list_selection(&self, id: &str, l: &ListSelection, report: &mut ValidationReport) {
        if l.title.is_empty() {
            report.push(
                id,
                "listSelection.title",
                IssueKind::Required,
                "List selection title is required".into(),
            );
        }
        self.choices(id, "listSelection", &l.choices, report);
    }

    fn ask_number(&self, id: &str, a: &AskNumber, report: &mut ValidationReport) {
        if a.text.is_empty() {
            report.push(id, "askNumber.text", IssueKind::Required, "Ask number text is required".into());
        }
        if a.max_value == 0 {
            report.push(
                id,
                "askNumber.max",
                IssueKind::Required,
                "Max value must be greater than 0".into(),
            );
        }
        if a.min_value > a.default_value {
            report.push(
                id,
                "askNumber.default",
                IssueKind::Invalid,
                "Default value must be >= min value".into(),
            );
        }
        if a.default_value > a.max_value {
            report.push(
                id,
                "askNumber.default",
                IssueKind::Invalid,
                "Default value must be <= max value".into(),
            );
        }
        self.optional_ref(id, "askNumber.nextState", "Next state", &a.next_state, report);
    }

    fn ask_style(&self, id: &str, a: &AskStyle, report: &mut ValidationReport) {
        if a.text.is_empty() {
            report.push(id, "askStyle.text", IssueKind::Required, "Ask style text is required".into());
        }
        if a.styles.is_empty() && a.styles_context_key.is_empty() {
            report.push(
                id,
                "askStyle",
                IssueKind::Required,
                "Either styles or stylesContextKey is required".into(),
            );
        }
        self.optional_ref(id, "askStyle.nextState", "Next state", &a.next_state, report);
    }

    fn ask_slide_menu(&self, id: &str, m: &AskSlideMenu, report: &mut ValidationReport) {
        self.choices(id, "askSlideMenu", &m.choices, report);
    }
}
