//! Connection entity - Relazione di amicizia simmetrica
//!
//! Una coppia di utenti ha al più un record, con chiave canonica ordinata:
//! `pair_key(a, b) == pair_key(b, a)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ConnectionStatus;

/// Chiave canonica della coppia: lo user id lessicograficamente minore
/// viene sempre per primo
pub fn pair_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{}:{}", user_a, user_b)
    } else {
        format!("{}:{}", user_b, user_a)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Connection {
    pub connection_id: String,
    /// Lato lessicograficamente minore della coppia
    pub user_a: String,
    pub user_b: String,
    pub status: ConnectionStatus,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(requester: &str, target: &str, now: DateTime<Utc>) -> Self {
        let (user_a, user_b) = if requester <= target {
            (requester.to_string(), target.to_string())
        } else {
            (target.to_string(), requester.to_string())
        };
        Connection {
            connection_id: pair_key(requester, target),
            user_a,
            user_b,
            status: ConnectionStatus::Pending,
            requested_by: requester.to_string(),
            responded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// L'altro membro della coppia rispetto a `user_id`
    pub fn other(&self, user_id: &str) -> &str {
        if self.user_a == user_id {
            &self.user_b
        } else {
            &self.user_a
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_canonical_for_both_orders() {
        assert_eq!(pair_key("alice", "bob"), "alice:bob");
        assert_eq!(pair_key("bob", "alice"), "alice:bob");
        assert_eq!(pair_key("alice", "bob"), pair_key("bob", "alice"));
    }

    #[test]
    fn new_connection_orders_pair_and_tracks_requester() {
        let conn = Connection::new("zed", "amy", Utc::now());
        assert_eq!(conn.connection_id, "amy:zed");
        assert_eq!(conn.user_a, "amy");
        assert_eq!(conn.user_b, "zed");
        assert_eq!(conn.requested_by, "zed");
        assert_eq!(conn.status, ConnectionStatus::Pending);
        assert_eq!(conn.other("zed"), "amy");
        assert!(conn.involves("amy") && conn.involves("zed"));
    }
}
