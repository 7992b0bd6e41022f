//! Invitation entity - Entità invito
//!
//! Un invito nasce `Pending` e transita esattamente una volta verso
//! `Accepted` o `Declined`; gli stati terminali sono immutabili. Per una
//! coppia (entità, invitato) può esistere al più un invito pending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EntityKind, InvitationStatus};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Invitation {
    pub invite_id: Uuid,
    pub entity_id: Uuid,
    pub entity_kind: EntityKind,
    pub inviter_id: String,
    /// Esattamente uno tra `invitee_id` e `invitee_email` è presente
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitee_email: Option<String>,
    pub state: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn new(
        entity_id: Uuid,
        entity_kind: EntityKind,
        inviter_id: &str,
        invitee_id: Option<String>,
        invitee_email: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Invitation {
            invite_id: Uuid::new_v4(),
            entity_id,
            entity_kind,
            inviter_id: inviter_id.to_string(),
            invitee_id,
            invitee_email,
            state: InvitationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// L'invito è indirizzato all'attore? Per gli inviti via email il match
    /// avviene al momento della risposta, case-insensitive.
    pub fn is_for(&self, user_id: &str, email: Option<&str>) -> bool {
        match (&self.invitee_id, &self.invitee_email) {
            (Some(invitee), _) => invitee == user_id,
            (None, Some(invitee_email)) => {
                email.is_some_and(|e| e.eq_ignore_ascii_case(invitee_email))
            }
            (None, None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_invite_matches_only_that_user() {
        let inv = Invitation::new(
            Uuid::new_v4(),
            EntityKind::Playlist,
            "inviter",
            Some("u2".to_string()),
            None,
            Utc::now(),
        );
        assert!(inv.is_for("u2", None));
        assert!(!inv.is_for("u3", Some("u2@example.com")));
    }

    #[test]
    fn email_invite_matches_case_insensitive_at_response_time() {
        let inv = Invitation::new(
            Uuid::new_v4(),
            EntityKind::Event,
            "inviter",
            None,
            Some("Guest@Example.com".to_string()),
            Utc::now(),
        );
        assert!(inv.is_for("whoever", Some("guest@example.com")));
        assert!(!inv.is_for("whoever", Some("other@example.com")));
        assert!(!inv.is_for("whoever", None));
    }
}
