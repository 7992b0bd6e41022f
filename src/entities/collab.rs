//! Collaborative core - Nucleo condiviso di playlist ed eventi
//!
//! Proprietà, partecipanti e ordine di ingresso vivono qui; l'algoritmo di
//! uscita con trasferimento di ownership opera su questi dati e viene sempre
//! eseguito dentro una mutazione atomica del documento.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Visibility;

/// Partecipante con timestamp di ingresso (l'ordine di join decide il
/// successore quando l'owner esce)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Campi condivisi da ogni entità collaborativa
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CollabCore {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: String,
    pub participants: Vec<Participant>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Esito della rimozione di un partecipante
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// L'utente non era un partecipante: nessuna modifica
    NotMember,
    /// Era l'ultimo partecipante: l'entità va cancellata
    Deleted,
    /// Rimosso; se era l'owner, `new_owner_id` è il successore
    Removed { new_owner_id: Option<String> },
}

impl CollabCore {
    /// Crea il nucleo con il creatore come owner e unico partecipante
    pub fn new(
        name: String,
        description: Option<String>,
        owner_id: &str,
        visibility: Visibility,
        now: DateTime<Utc>,
    ) -> Self {
        CollabCore {
            name,
            description,
            owner_id: owner_id.to_string(),
            participants: vec![Participant {
                user_id: owner_id.to_string(),
                joined_at: now,
            }],
            visibility,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Aggiunge un partecipante; idempotente, ritorna false se già presente
    pub fn add_participant(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        if self.is_participant(user_id) {
            return false;
        }
        self.participants.push(Participant {
            user_id: user_id.to_string(),
            joined_at: now,
        });
        true
    }

    /// Rimuove un partecipante applicando la regola di successione.
    ///
    /// Se esce l'owner, il nuovo owner è il partecipante rimasto con il
    /// `joined_at` più vecchio; a parità di timestamp vince lo user id
    /// lessicograficamente minore. Se esce l'ultimo partecipante l'entità
    /// va cancellata dal chiamante.
    pub fn remove_participant(&mut self, user_id: &str) -> Removal {
        let Some(position) = self.participants.iter().position(|p| p.user_id == user_id) else {
            return Removal::NotMember;
        };
        self.participants.remove(position);

        if self.participants.is_empty() {
            return Removal::Deleted;
        }

        let mut new_owner_id = None;
        if self.owner_id == user_id {
            let successor = self
                .participants
                .iter()
                .min_by(|a, b| {
                    a.joined_at
                        .cmp(&b.joined_at)
                        .then_with(|| a.user_id.cmp(&b.user_id))
                })
                .map(|p| p.user_id.clone());
            if let Some(successor_id) = successor {
                self.owner_id = successor_id.clone();
                new_owner_id = Some(successor_id);
            }
        }

        Removal::Removed { new_owner_id }
    }

    /// Aggiorna il timestamp di modifica (da chiamare ad ogni mutazione)
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
