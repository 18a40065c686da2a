use crate::{Error, Timestamp};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiving ends of the three notification streams of an elector.
///
/// Each stream is bounded. When one is full the elector waits for the owner
/// to drain it rather than dropping events, so the owner should keep
/// receiving for as long as the elector runs. Streams are not closed by
/// [`Elector::stop`](crate::Elector::stop).
#[derive(Debug)]
pub struct Events {
    /// Instants at which this elector became leader.
    pub promoted: mpsc::Receiver<Timestamp>,
    /// Instants at which this elector stopped being leader.
    pub demoted: mpsc::Receiver<Timestamp>,
    /// Store failures seen by the background loop.
    pub errors: mpsc::Receiver<Error>,
}

#[derive(Debug, Clone)]
pub(crate) struct EventSender {
    promoted: mpsc::Sender<Timestamp>,
    demoted: mpsc::Sender<Timestamp>,
    errors: mpsc::Sender<Error>,
}

pub(crate) fn channel(capacity: usize) -> (EventSender, Events) {
    let (promoted_tx, promoted) = mpsc::channel(capacity);
    let (demoted_tx, demoted) = mpsc::channel(capacity);
    let (errors_tx, errors) = mpsc::channel(capacity);

    (
        EventSender {
            promoted: promoted_tx,
            demoted: demoted_tx,
            errors: errors_tx,
        },
        Events {
            promoted,
            demoted,
            errors,
        },
    )
}

impl EventSender {
    pub(crate) async fn promoted(&self) {
        if self.promoted.send(Utc::now()).await.is_err() {
            debug!("promotion receiver dropped");
        }
    }

    pub(crate) async fn demoted(&self) {
        if self.demoted.send(Utc::now()).await.is_err() {
            debug!("demotion receiver dropped");
        }
    }

    pub(crate) async fn error(&self, error: Error) {
        if self.errors.send(error).await.is_err() {
            debug!("error receiver dropped");
        }
    }
}
