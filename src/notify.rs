//! Push notification sender - Collaboratore esterno best-effort
//!
//! L'invio è fire-and-forget dal punto di vista del core: un fallimento
//! viene loggato e non fa mai fallire l'operazione primaria.

use tracing::{info, warn};

/// Payload minimale di una push notification
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Entità a cui la notifica si riferisce, se presente
    pub entity_id: Option<String>,
}

#[derive(Debug)]
pub struct NotifyError(pub &'static str);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification send failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Interfaccia verso il trasporto push (implementazioni fuori scope)
pub trait NotificationSender: Send + Sync {
    fn send(&self, target_user_id: &str, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Implementazione di default: logga soltanto
pub struct LogNotifier;

impl NotificationSender for LogNotifier {
    fn send(&self, target_user_id: &str, payload: &NotificationPayload) -> Result<(), NotifyError> {
        info!(
            target_user_id,
            title = %payload.title,
            "Push notification dispatched"
        );
        Ok(())
    }
}

/// Invio best-effort: l'esito negativo viene loggato e scartato
pub fn notify_best_effort(
    notifier: &dyn NotificationSender,
    target_user_id: &str,
    payload: NotificationPayload,
) {
    if let Err(e) = notifier.send(target_user_id, &payload) {
        warn!(target_user_id, "Failed to send push notification: {}", e);
    }
}
