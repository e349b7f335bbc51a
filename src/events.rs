// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Status events and observer dispatch.
//!
//! A session pushes events into an unbounded channel and never waits on the
//! observer. One receiver task drains the channel, so the observer sees each
//! event once and in the order it was reported.

use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bluetooth::PairedDevice;
use crate::error::SessionError;
use crate::session::SessionState;

/// Sending half handed to a session.
pub type StatusSender = mpsc::UnboundedSender<StatusEvent>;

/// Receiving half for front-ends that drain events themselves.
pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

/// How loudly an event should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Swallowed cleanup problems and other notes.
    Diagnostic,
    Info,
    Error,
}

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Session moved to a new state.
    StateChanged(SessionState),
    /// Connection established.
    Connected(PairedDevice),
    /// Connection attempt abandoned by the caller.
    ConnectCancelled,
    /// Connection closed.
    Disconnected,
    /// Disconnect requested with no open connection.
    AlreadyDisconnected,
    /// Payload written and flushed.
    Sent { bytes: usize },
    /// Operation failed.
    Failed(SessionError),
    /// Low-severity note, e.g. a swallowed close error.
    Diagnostic(String),
}

impl StatusEvent {
    pub fn severity(&self) -> Severity {
        match self {
            StatusEvent::Failed(_) => Severity::Error,
            StatusEvent::Diagnostic(_) => Severity::Diagnostic,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::StateChanged(state) => write!(f, "Status: {}", state),
            StatusEvent::Connected(device) => write!(f, "Connected to {}", device),
            StatusEvent::ConnectCancelled => f.write_str("Connection attempt cancelled"),
            StatusEvent::Disconnected => f.write_str("Disconnected"),
            StatusEvent::AlreadyDisconnected => f.write_str("Already disconnected"),
            StatusEvent::Sent { bytes } => write!(f, "Sent {} bytes", bytes),
            StatusEvent::Failed(err) => write!(f, "Error: {}", err),
            StatusEvent::Diagnostic(note) => write!(f, "Note: {}", note),
        }
    }
}

/// Session side of the status channel.
#[derive(Debug, Clone)]
pub(crate) struct StatusReporter {
    tx: StatusSender,
}

impl StatusReporter {
    pub(crate) fn new(tx: StatusSender) -> Self {
        Self { tx }
    }

    /// Log and deliver an event. A gone observer is not an error.
    pub(crate) fn report(&self, event: StatusEvent) {
        match event.severity() {
            Severity::Error => error!("{}", event),
            Severity::Diagnostic => warn!("{}", event),
            Severity::Info => info!("{}", event),
        }
        if self.tx.send(event).is_err() {
            debug!("Status observer gone, event dropped");
        }
    }
}

/// Create a status channel.
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    mpsc::unbounded_channel()
}

/// Run `observer` for every event on a dedicated task.
///
/// The task ends once every sender is dropped. Must be called inside a
/// Tokio runtime.
pub fn spawn_observer<F>(observer: F) -> (StatusSender, JoinHandle<()>)
where
    F: Fn(StatusEvent) + Send + 'static,
{
    let (tx, mut rx) = status_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            observer(event);
        }
        debug!("Status observer stopped");
    });
    (tx, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_status_text() {
        assert_eq!(
            StatusEvent::StateChanged(SessionState::Connecting).to_string(),
            "Status: Connecting..."
        );
        assert_eq!(StatusEvent::Sent { bytes: 5 }.to_string(), "Sent 5 bytes");
        assert_eq!(
            StatusEvent::Failed(SessionError::NotConnected).to_string(),
            "Error: Not connected"
        );
        assert_eq!(
            StatusEvent::AlreadyDisconnected.to_string(),
            "Already disconnected"
        );
    }

    #[test]
    fn test_severity() {
        assert_eq!(
            StatusEvent::Failed(SessionError::NotConnected).severity(),
            Severity::Error
        );
        assert_eq!(
            StatusEvent::Diagnostic("close failed".into()).severity(),
            Severity::Diagnostic
        );
        assert_eq!(StatusEvent::Disconnected.severity(), Severity::Info);
    }

    #[tokio::test]
    async fn test_observer_sees_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (tx, task) = spawn_observer(move |event| sink.lock().push(event.to_string()));

        let reporter = StatusReporter::new(tx);
        reporter.report(StatusEvent::StateChanged(SessionState::Discovering));
        reporter.report(StatusEvent::Sent { bytes: 5 });
        reporter.report(StatusEvent::Disconnected);
        drop(reporter);

        task.await.unwrap();
        assert_eq!(
            *seen.lock(),
            vec!["Status: Discovering...", "Sent 5 bytes", "Disconnected"]
        );
    }

    #[test]
    fn test_report_without_observer() {
        let (tx, rx) = status_channel();
        drop(rx);
        StatusReporter::new(tx).report(StatusEvent::Disconnected);
    }
}
