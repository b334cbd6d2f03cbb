//! World/channel/map coordinates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{ChannelId, MapId, WorldId};

/// A channel within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub world_id: WorldId,
    pub channel_id: ChannelId,
}

impl Channel {
    pub fn new(world_id: WorldId, channel_id: ChannelId) -> Self {
        Self {
            world_id,
            channel_id,
        }
    }
}

/// A map instance on a channel. `instance` is nil for the shared map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub world_id: WorldId,
    pub channel_id: ChannelId,
    pub map_id: MapId,
    #[serde(default)]
    pub instance: Uuid,
}

impl Field {
    pub fn new(world_id: WorldId, channel_id: ChannelId, map_id: MapId) -> Self {
        Self {
            world_id,
            channel_id,
            map_id,
            instance: Uuid::nil(),
        }
    }

    pub fn with_instance(mut self, instance: Uuid) -> Self {
        self.instance = instance;
        self
    }

    pub fn channel(&self) -> Channel {
        Channel::new(self.world_id, self.channel_id)
    }
}
