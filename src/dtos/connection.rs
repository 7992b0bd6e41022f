//! Connection DTOs - Data Transfer Objects per le amicizie

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Connection, ConnectionStatus};

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionDTO {
    pub connection_id: String,
    pub user_a: String,
    pub user_b: String,
    pub status: ConnectionStatus,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Connection> for ConnectionDTO {
    fn from(value: Connection) -> Self {
        Self {
            connection_id: value.connection_id,
            user_a: value.user_a,
            user_b: value.user_b,
            status: value.status,
            requested_by: value.requested_by,
            responded_by: value.responded_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
