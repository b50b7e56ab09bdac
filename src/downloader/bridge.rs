// Event bridge between the pipeline and the presentation layer
//
// Fire-and-forget publish/subscribe: a broadcast channel for in-process
// subscribers plus any number of attached sinks. Nothing is buffered for
// subscribers that attach later.

use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use super::models::{Platform, RequestId};
use super::traits::EventSink;

const BROADCAST_CAPACITY: usize = 256;

/// Outbound notifications
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DownloadEvent {
    /// An item took the download slot
    #[serde(rename_all = "camelCase")]
    Started {
        id: RequestId,
        url: String,
        platform: Platform,
        position: usize,
        total: usize,
    },
    /// Never lower than a previous `Progress` for the same id
    #[serde(rename_all = "camelCase")]
    Progress {
        id: RequestId,
        percent: f32,
        status: Option<String>,
    },
    /// Exactly once per item that ran
    #[serde(rename_all = "camelCase")]
    Complete {
        id: RequestId,
        success: bool,
        error: Option<String>,
    },
    /// The slot went back to idle
    #[serde(rename_all = "camelCase")]
    BatchFinished {
        succeeded: usize,
        failed: usize,
        aborted: usize,
    },
}

impl DownloadEvent {
    /// Channel name used by webview listeners
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Started { .. } => "download-started",
            Self::Progress { .. } => "download-progress",
            Self::Complete { .. } => "download-complete",
            Self::BatchFinished { .. } => "batch-finished",
        }
    }
}

pub struct EventBridge {
    tx: broadcast::Sender<DownloadEvent>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventBridge {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }

    pub fn attach(&self, sink: Arc<dyn EventSink>) {
        self.sinks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sink);
    }

    pub fn publish(&self, event: DownloadEvent) {
        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for sink in sinks {
            sink.emit(&event);
        }
        // Err only means there is no subscriber right now
        let _ = self.tx.send(event);
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    impl EventSink for Recorder {
        fn emit(&self, event: &DownloadEvent) {
            self.0.lock().unwrap().push(event.channel());
        }
    }

    fn finished() -> DownloadEvent {
        DownloadEvent::BatchFinished {
            succeeded: 1,
            failed: 0,
            aborted: 0,
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bridge = EventBridge::new();
        bridge.publish(finished());

        let mut rx = bridge.subscribe();
        assert!(rx.try_recv().is_err());

        bridge.publish(finished());
        assert_eq!(rx.recv().await.unwrap(), finished());
    }

    #[test]
    fn test_sinks_receive_every_event() {
        let bridge = EventBridge::new();
        let recorder = Arc::new(Recorder::default());
        bridge.attach(recorder.clone());

        bridge.publish(finished());
        bridge.publish(DownloadEvent::BatchFinished {
            succeeded: 0,
            failed: 2,
            aborted: 1,
        });
        assert_eq!(*recorder.0.lock().unwrap(), vec!["batch-finished", "batch-finished"]);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(finished()).unwrap();
        assert_eq!(json["type"], "batchFinished");
        assert_eq!(json["succeeded"], 1);
    }
}
