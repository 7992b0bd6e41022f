//! Sync Event DTOs - Data Transfer Objects per eventi real-time
//!
//! Tagged union per gli eventi push verso i client connessi.
//! Serde serializza questo come:
//! { "type": "EntityUpdated", "data": { ... } }
//! oppure
//! { "type": "VoteChanged", "data": { ... } }
//! etc.

use serde::{Deserialize, Serialize};

use crate::dtos::{ConnectionDTO, EnrichedInvitationDTO};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum SyncEventDTO {
    /// Mutazione generica: il client ricarica o riconcilia su `version`
    EntityUpdated { id: String, version: u64 },
    EntityDeleted { id: String },
    /// Distinto dall'update generico: la UI lo tratta in modo speciale
    OwnershipTransferred { id: String, new_owner_id: String },
    MemberJoined { id: String, user_id: String },
    MemberLeft { id: String, user_id: String },
    InvitationCreated(EnrichedInvitationDTO),
    InvitationAccepted { id: String },
    InvitationDeclined { id: String },
    VoteChanged {
        event_id: String,
        track_id: String,
        vote_count: usize,
    },
    ConnectionRequested(ConnectionDTO),
    ConnectionAnswered(ConnectionDTO),
    Error { code: u16, message: String },
}

/// Comandi che il client può inviare sul WebSocket per gestire le proprie
/// sottoscrizioni (le entità di cui è partecipante sono sottoscritte
/// automaticamente alla connessione)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommandDTO {
    Watch { entity_id: String },
    Unwatch { entity_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_as_tagged_union() {
        let ev = SyncEventDTO::VoteChanged {
            event_id: "e1".to_string(),
            track_id: "t1".to_string(),
            vote_count: 3,
        };
        let json = serde_json::to_value(&ev).expect("serializes");
        assert_eq!(json["type"], "VoteChanged");
        assert_eq!(json["data"]["vote_count"], 3);
    }

    #[test]
    fn client_commands_parse_snake_case() {
        let cmd: ClientCommandDTO =
            serde_json::from_str(r#"{"type":"watch","entity_id":"abc"}"#).expect("parses");
        assert!(matches!(cmd, ClientCommandDTO::Watch { entity_id } if entity_id == "abc"));
    }
}
