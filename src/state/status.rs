//! Conversation status of a user.
//!
//! ```text
//! FREE --open--> INPUT_CODE --valid code--> INPUT_USERNAME --unique username--> PARTICIPANT
//! PARTICIPANT --exit / room deactivated--> FREE
//! FREE --new_admin--> INPUT_NEW_ADMIN --target id--> FREE
//! FREE --new_room--> INPUT_NEW_ROOM(code) --> (title) --> (description) --> FREE
//! FREE --disactivate_room--> DISACTIVATE_ROOM --room id--> FREE
//! ```
//!
//! The status is a single slot per user held in the cache. On a miss it is
//! derived from the participant row with [`derive_status`].

use crate::db::Participant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Step of the admin room-creation dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewRoomStage {
    Code,
    Title,
    Description,
}

/// Which handler processes the user's next input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    Free,
    InputCode,
    InputUsername {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    Participant {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    InputNewAdmin,
    InputNewRoom { stage: NewRoomStage },
    DisactivateRoom,
}

impl ConversationStatus {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::InputCode => "INPUT_CODE",
            Self::InputUsername { .. } => "INPUT_USERNAME",
            Self::Participant { .. } => "PARTICIPANT",
            Self::InputNewAdmin => "INPUT_NEW_ADMIN",
            Self::InputNewRoom { .. } => "INPUT_NEW_ROOM",
            Self::DisactivateRoom => "DISACTIVATE_ROOM",
        }
    }

    /// Room the status refers to, if any.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::InputUsername { room_id } | Self::Participant { room_id } => Some(room_id),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputNewRoom { stage } => write!(f, "{}({stage:?})", self.kind()),
            _ => match self.room_id() {
                Some(room_id) => write!(f, "{}({room_id})", self.kind()),
                None => f.write_str(self.kind()),
            },
        }
    }
}

/// Status implied by a participant row.
///
/// - active with a username: `PARTICIPANT`
/// - inactive with a username: `FREE`
/// - no username yet: `INPUT_USERNAME`
pub fn derive_status(participant: &Participant) -> ConversationStatus {
    match (&participant.username, participant.is_active) {
        (None, _) => ConversationStatus::InputUsername {
            room_id: participant.room_id.clone(),
        },
        (Some(_), true) => ConversationStatus::Participant {
            room_id: participant.room_id.clone(),
        },
        (Some(_), false) => ConversationStatus::Free,
    }
}
