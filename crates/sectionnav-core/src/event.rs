use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::host::HistoryMode;
use crate::section::SectionId;

/// Events emitted to the rendering layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NavigationEvent {
    /// The current section changed
    SectionChanged {
        current: SectionId,
        previous: Option<SectionId>,
    },
    /// A fragment was written to the URL
    HistoryWritten { fragment: String, mode: HistoryMode },
    /// A programmatic scroll has settled
    ProgrammaticScrollEnded,
}

/// Optional sender for [`NavigationEvent`]s
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<NavigationEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<NavigationEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Send an event to listeners (if an event channel is configured)
    pub fn emit(&self, event: NavigationEvent) {
        if let Some(ref tx) = self.tx {
            if tx.send(event).is_err() {
                warn!("Failed to send navigation event: receiver dropped");
            }
        }
    }
}
