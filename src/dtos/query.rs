//! Query DTOs - Parametri di query string

use serde::Deserialize;

use crate::entities::ConnectionStatus;

/// Posizione riportata dal client per il controllo di ammissione.
/// Parametri assenti modellano una posizione non disponibile.
#[derive(Deserialize, Debug, Clone)]
pub struct AccessQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Filtro opzionale sullo stato delle connessioni
#[derive(Deserialize, Debug, Clone)]
pub struct ConnectionsQuery {
    pub status: Option<ConnectionStatus>,
}
