//! User-facing notifications emitted by the orchestrator.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The placement gate stopped processing; the listed files need a manual position.
    PlacementRequired { files: Vec<String> },
    /// A second-factor challenge must be shown to the user.
    ChallengeOpened { file_name: String, url: String },
    Signed { file_name: String },
    Failed { file_name: String, description: String },
    /// Processing was stopped and any in-flight document went back into the queue.
    Cancelled { requeued: Option<String> },
}

/// Sink for notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::PlacementRequired { files } => {
                tracing::warn!(files = ?files, "Manual signature placement required")
            }
            Notification::ChallengeOpened { file_name, url } => {
                tracing::info!(file_name = %file_name, url = %url, "Second-factor challenge opened")
            }
            Notification::Signed { file_name } => {
                tracing::info!(file_name = %file_name, "Document signed")
            }
            Notification::Failed {
                file_name,
                description,
            } => tracing::warn!(
                file_name = %file_name,
                description = %description,
                "Document signing failed"
            ),
            Notification::Cancelled { requeued } => {
                tracing::info!(requeued = ?requeued, "Processing cancelled")
            }
        }
    }
}

/// Forwards notifications to a channel, e.g. to a host that renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Notification::Signed {
            file_name: "a.pdf".to_string(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::Signed {
                file_name: "a.pdf".to_string()
            }
        );
    }

    #[test]
    fn dropped_receiver_is_not_an_error() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notification::Cancelled { requeued: None });
    }
}
