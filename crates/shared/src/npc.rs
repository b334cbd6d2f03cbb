//! NPC talk commands sent to the channel service.
//!
//! The channel service turns these into client packets; this crate only
//! fixes the abstract shape.

use serde::{Deserialize, Serialize};

pub const SPEAKER_NPC: &str = "NPC";
pub const SPEAKER_CHARACTER: &str = "CHARACTER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcTalkCommand {
    pub world_id: u8,
    pub channel_id: u8,
    pub character_id: u32,
    pub npc_id: u32,
    pub speaker: String,
    #[serde(default)]
    pub end_chat: bool,
    #[serde(default)]
    pub secondary_npc_id: u32,
    pub message: String,
    #[serde(flatten)]
    pub body: TalkBody,
}

impl NpcTalkCommand {
    pub fn new(
        world_id: u8,
        channel_id: u8,
        character_id: u32,
        npc_id: u32,
        message: impl Into<String>,
        body: TalkBody,
    ) -> Self {
        Self {
            world_id,
            channel_id,
            character_id,
            npc_id,
            speaker: SPEAKER_NPC.to_string(),
            end_chat: false,
            secondary_npc_id: 0,
            message: message.into(),
            body,
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self
    }

    pub fn with_end_chat(mut self, end_chat: bool) -> Self {
        self.end_chat = end_chat;
        self
    }

    pub fn with_secondary_npc(mut self, npc_id: u32) -> Self {
        self.secondary_npc_id = npc_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TalkBody {
    Simple,
    Next,
    NextPrevious,
    Previous,
    Ok,
    YesNo,
    AcceptDecline,
    Num(NumBody),
    Style(StyleBody),
    SlideMenu(SlideMenuBody),
}

impl TalkBody {
    pub fn type_name(&self) -> &'static str {
        match self {
            TalkBody::Simple => "SIMPLE",
            TalkBody::Next => "NEXT",
            TalkBody::NextPrevious => "NEXT_PREVIOUS",
            TalkBody::Previous => "PREVIOUS",
            TalkBody::Ok => "OK",
            TalkBody::YesNo => "YES_NO",
            TalkBody::AcceptDecline => "ACCEPT_DECLINE",
            TalkBody::Num(_) => "NUM",
            TalkBody::Style(_) => "STYLE",
            TalkBody::SlideMenu(_) => "SLIDE_MENU",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumBody {
    pub default_value: u32,
    pub min_value: u32,
    pub max_value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleBody {
    pub styles: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideMenuBody {
    pub menu_type: u32,
}

/// Client input routed to the conversation engine by the channel service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCommand {
    pub world_id: u8,
    pub channel_id: u8,
    #[serde(default)]
    pub map_id: u32,
    pub character_id: u32,
    pub npc_id: u32,
    #[serde(flatten)]
    pub body: ConversationCommandBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationCommandBody {
    Start(StartConversationBody),
    Continue(ContinueConversationBody),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartConversationBody {
    pub account_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueConversationBody {
    pub action: i8,
    pub last_message_type: u8,
    #[serde(default)]
    pub selection: i32,
}
