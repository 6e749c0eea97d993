use serde::{Deserialize, Serialize};

use crate::game::craft::{Craft, CraftId};

/// Relay messages.
///
/// Encoded as JSON text with a `type` discriminator. `craftRegistration` and
/// `craftUpdate` travel in both directions; the rest are server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Session opened
    Welcome { message: String },
    /// Create/announce a craft
    CraftRegistration {
        #[serde(rename = "craftData")]
        craft_data: Craft,
    },
    /// Replace one craft's state
    CraftUpdate {
        #[serde(rename = "craftData")]
        craft_data: Craft,
    },
    /// Full reconciliation snapshot
    CraftUpdateAll {
        #[serde(rename = "craftData")]
        craft_data: Vec<Craft>,
    },
    /// Craft departed
    CraftRemoval {
        #[serde(rename = "craftId")]
        craft_id: CraftId,
    },
}

impl Message {
    pub fn welcome(text: impl Into<String>) -> Self {
        Self::Welcome { message: text.into() }
    }

    pub fn registration(craft: Craft) -> Self {
        Self::CraftRegistration { craft_data: craft }
    }

    pub fn update(craft: Craft) -> Self {
        Self::CraftUpdate { craft_data: craft }
    }

    pub fn update_all(crafts: Vec<Craft>) -> Self {
        Self::CraftUpdateAll { craft_data: crafts }
    }

    pub fn removal(craft_id: impl Into<CraftId>) -> Self {
        Self::CraftRemoval { craft_id: craft_id.into() }
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::CraftRegistration { .. } => "craftRegistration",
            Self::CraftUpdate { .. } => "craftUpdate",
            Self::CraftUpdateAll { .. } => "craftUpdateAll",
            Self::CraftRemoval { .. } => "craftRemoval",
        }
    }

    /// Messages only the relay may originate
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            Self::Welcome { .. } | Self::CraftUpdateAll { .. } | Self::CraftRemoval { .. }
        )
    }
}

/// Encode a message as JSON text
pub fn encode(message: &Message) -> Result<String, EncodeError> {
    serde_json::to_string(message).map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message from JSON text
pub fn decode(text: &str) -> Result<Message, DecodeError> {
    serde_json::from_str(text).map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
