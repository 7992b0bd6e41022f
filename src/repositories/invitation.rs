//! InvitationRepository - Repository per la gestione degli inviti

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::traits::{Create, Delete, Read};
use crate::dtos::NewInvitationDTO;
use crate::entities::{Invitation, InvitationStatus};
use crate::store::{Collection, Commit, StoreError};

// INVITATION REPOSITORY
pub struct InvitationRepository {
    collection: Arc<Collection<Invitation>>,
}

impl InvitationRepository {
    pub fn new(collection: Arc<Collection<Invitation>>) -> Self {
        Self { collection }
    }

    /// Tutti gli inviti pending indirizzati all'utente, per id oppure per
    /// email (match case-insensitive)
    pub async fn find_pending_for_user(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<Vec<Invitation>, StoreError> {
        Ok(self.collection.find(|inv| {
            inv.state == InvitationStatus::Pending && inv.is_for(user_id, email)
        }))
    }

    /// Invito pending già esistente per la coppia (entità, destinatario)
    pub async fn find_pending_for_entity(
        &self,
        entity_id: &Uuid,
        invitee_id: Option<&str>,
        invitee_email: Option<&str>,
    ) -> Result<Option<Invitation>, StoreError> {
        let matches = self.collection.find(|inv| {
            if inv.state != InvitationStatus::Pending || inv.entity_id != *entity_id {
                return false;
            }
            match (invitee_id, invitee_email) {
                (Some(user_id), _) => inv.invitee_id.as_deref() == Some(user_id),
                (None, Some(email)) => inv
                    .invitee_email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email)),
                (None, None) => false,
            }
        });
        Ok(matches.into_iter().next())
    }

    /// Garbage collection degli inviti di un'entità cancellata
    pub async fn delete_for_entity(&self, entity_id: &Uuid) -> Result<usize, StoreError> {
        let doomed = self.collection.find(|inv| inv.entity_id == *entity_id);
        let count = doomed.len();
        for invitation in doomed {
            self.collection.delete(&invitation.invite_id.to_string());
        }
        Ok(count)
    }

    /// Mutazione atomica read-modify-write sul documento dell'invito
    /// (le transizioni di stato pending -> accepted/declined passano da qui)
    pub fn mutate<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut Invitation) -> Result<Commit<R>, E>,
    ) -> Result<(R, u64), E>
    where
        E: From<StoreError>,
    {
        self.collection.mutate(&id.to_string(), f)
    }
}

impl Create<Invitation, NewInvitationDTO> for InvitationRepository {
    async fn create(&self, data: &NewInvitationDTO) -> Result<Invitation, StoreError> {
        let invitation = Invitation::new(
            data.entity_id,
            data.entity_kind,
            &data.inviter_id,
            data.invitee_id.clone(),
            data.invitee_email.clone(),
            Utc::now(),
        );
        self.collection
            .insert(&invitation.invite_id.to_string(), invitation.clone());
        Ok(invitation)
    }
}

impl Read<Invitation, Uuid> for InvitationRepository {
    async fn read(&self, id: &Uuid) -> Result<Option<Invitation>, StoreError> {
        Ok(self.collection.get(&id.to_string()))
    }
}

impl Delete<Uuid> for InvitationRepository {
    async fn delete(&self, id: &Uuid) -> Result<(), StoreError> {
        self.collection.delete(&id.to_string());
        Ok(())
    }
}
