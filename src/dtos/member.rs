//! Member DTOs - Data Transfer Objects per i partecipanti

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vista client di un partecipante con ruoli
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MemberDTO {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub is_owner: bool,
    /// Sempre false per le playlist (solo gli eventi hanno host)
    pub is_host: bool,
}

/// Esito di leave/rimozione: l'entità è stata cancellata (ultimo
/// partecipante) oppure, se usciva l'owner, chi è il successore
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RemovalDTO {
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_owner_id: Option<String>,
}
