//! User-facing notification (toast) abstraction.

use serde::{Deserialize, Serialize};

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Fire-and-forget notification emitter.
///
/// The host renders these as toasts or snackbars. There is no return value and
/// no acknowledgement; implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: NotificationSeverity);
}
