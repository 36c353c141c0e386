//! Notifier that forwards user-facing messages to `tracing`.

use bridge_traits::notification::{NotificationSeverity, Notifier};
use tracing::{error, info, warn};

/// Desktop notifier without a native toast surface.
///
/// Hosts with a real UI provide their own [`Notifier`]; this one keeps the
/// messages visible in logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: NotificationSeverity) {
        match severity {
            NotificationSeverity::Info | NotificationSeverity::Success => {
                info!(target: "notification", ?severity, "{}", message)
            }
            NotificationSeverity::Warning => {
                warn!(target: "notification", ?severity, "{}", message)
            }
            NotificationSeverity::Error => {
                error!(target: "notification", ?severity, "{}", message)
            }
        }
    }
}
