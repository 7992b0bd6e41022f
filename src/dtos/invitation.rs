//! Invitation DTOs - Data Transfer Objects per inviti

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{EntityKind, Invitation, InvitationStatus};

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvitationDTO {
    pub invite_id: Uuid,
    pub entity_id: Uuid,
    pub entity_kind: EntityKind,
    pub inviter_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitee_email: Option<String>,
    pub state: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationDTO {
    fn from(value: Invitation) -> Self {
        Self {
            invite_id: value.invite_id,
            entity_id: value.entity_id,
            entity_kind: value.entity_kind,
            inviter_id: value.inviter_id,
            invitee_id: value.invitee_id,
            invitee_email: value.invitee_email,
            state: value.state,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// DTO per creare un nuovo invito: esattamente uno tra `invitee_id` e
/// `invitee_email` (il controllo incrociato è fatto nel service)
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateInvitationDTO {
    #[validate(length(min = 1, max = 128))]
    pub invitee_id: Option<String>,
    #[validate(email)]
    pub invitee_email: Option<String>,
}

/// Dati interni per la creazione di un invito, composti dal service dopo
/// le validazioni (il DTO wire contiene solo il destinatario)
#[derive(Debug, Clone)]
pub struct NewInvitationDTO {
    pub entity_id: Uuid,
    pub entity_kind: EntityKind,
    pub inviter_id: String,
    pub invitee_id: Option<String>,
    pub invitee_email: Option<String>,
}

/// DTO arricchito per la inbox: include il nome dell'entità per la resa
/// lato client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnrichedInvitationDTO {
    pub invite_id: Uuid,
    pub entity_id: Uuid,
    pub entity_kind: EntityKind,
    pub inviter_id: String,
    pub state: InvitationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
}
