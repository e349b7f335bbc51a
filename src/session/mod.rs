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

//! Serial device session.
//!
//! Owns the lifecycle of one connection to a paired SPP peripheral. Every
//! operation returns immediately and reports its outcome through the status
//! channel. Sends also hand their outcome back through the join handle so a
//! one-shot caller can act on it.
//!
//! The state snapshot sits behind a `RwLock` so front-ends can read it from
//! any thread. The open stream sits behind an async mutex and is only set,
//! used and cleared while that mutex is held, and state changes that go with
//! it happen under the same guard. Every await made while holding it is
//! bounded by the send timeout, so a peer that stops reading cannot block a
//! disconnect.

mod state;

use bluer::Address;
use futures::future::{AbortHandle, Abortable, Aborted};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bluetooth::{
    DeviceMatch, EnumerationOrder, NamePattern, PairedDevice, RadioAdapter, SPP_UUID,
};
use crate::error::SessionError;
use crate::events::{StatusEvent, StatusReporter, StatusSender};

pub use state::SessionState;

/// Reference payload: "PING" plus newline.
pub const PING_PAYLOAD: &[u8] = b"PING\n";

/// Default bound on the blocking connect step.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on one write + flush, and on closing the stream.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Session behaviour knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Which paired device to bind to.
    pub pattern: NamePattern,
    /// Visiting order when several devices match.
    pub order: EnumerationOrder,
    /// Upper bound for the connect step.
    pub connect_timeout: Duration,
    /// Upper bound for a write + flush, and for closing the stream.
    pub send_timeout: Duration,
    /// Drop the link when a write fails instead of staying connected.
    pub disconnect_on_send_failure: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            pattern: NamePattern::default(),
            order: EnumerationOrder::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            disconnect_on_send_failure: false,
        }
    }
}

/// Bound device and its open stream. They only exist together.
struct Link<S> {
    device: PairedDevice,
    stream: S,
}

struct Inner<A: RadioAdapter> {
    adapter: A,
    options: SessionOptions,
    state: RwLock<SessionState>,
    link: AsyncMutex<Option<Link<A::Stream>>>,
    /// Abort handle of the in-flight connect, tagged with its attempt number.
    pending: Mutex<Option<(u64, AbortHandle)>>,
    attempts: AtomicU64,
    status: StatusReporter,
}

/// Session with one serial peripheral. Clones share the session.
pub struct SerialDeviceSession<A: RadioAdapter> {
    inner: Arc<Inner<A>>,
}

impl<A: RadioAdapter> Clone for SerialDeviceSession<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: RadioAdapter> SerialDeviceSession<A> {
    /// Create a disconnected session reporting to `status`.
    pub fn new(adapter: A, options: SessionOptions, status: StatusSender) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter,
                options,
                state: RwLock::new(SessionState::Disconnected),
                link: AsyncMutex::new(None),
                pending: Mutex::new(None),
                attempts: AtomicU64::new(0),
                status: StatusReporter::new(status),
            }),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.inner.adapter
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.read().is_connected()
    }

    /// Bound device, present only while connected.
    pub fn device(&self) -> Option<PairedDevice> {
        self.inner.state.read().device().cloned()
    }

    pub fn device_name(&self) -> Option<String> {
        self.inner.state.read().device().map(|d| d.name.clone())
    }

    pub fn device_address(&self) -> Option<Address> {
        self.inner.state.read().device().map(|d| d.address)
    }

    /// Ask the platform for radio access without waiting for the answer.
    pub fn request_permissions(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            match inner.adapter.request_permissions().await {
                Ok(()) => debug!("Radio access in place"),
                Err(err) => inner.status.report(StatusEvent::Diagnostic(format!(
                    "Permission request failed: {:#}",
                    err
                ))),
            }
        });
    }

    /// List bonded devices.
    pub async fn paired_devices(&self) -> Result<Vec<PairedDevice>, SessionError> {
        self.inner
            .adapter
            .paired_devices()
            .await
            .map_err(|err| SessionError::adapter_unavailable(&err))
    }

    /// Find the paired device `pattern` selects. Does not touch the state.
    pub async fn discover_paired_device(
        &self,
        pattern: &NamePattern,
    ) -> Result<PairedDevice, SessionError> {
        self.inner.discover(pattern).await
    }

    /// Start a connection attempt in the background.
    ///
    /// Returns `None`, after reporting [`SessionError::Busy`], when an
    /// attempt is already running or the session is connected.
    pub fn connect(&self) -> Option<ConnectHandle> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write();
            if !state.can_connect() {
                let err = SessionError::Busy {
                    state: state.as_str(),
                };
                drop(state);
                inner.status.report(StatusEvent::Failed(err));
                return None;
            }
            inner.set_state(&mut state, SessionState::Discovering);
        }

        let attempt = inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let (abort, registration) = AbortHandle::new_pair();
        *inner.pending.lock() = Some((attempt, abort.clone()));

        let task_inner = inner.clone();
        let task = tokio::spawn(async move {
            let establish = Abortable::new(task_inner.establish(), registration);
            if let Err(Aborted) = establish.await {
                task_inner.abandon();
            }
            task_inner.clear_pending(attempt);
        });

        Some(ConnectHandle { abort, task })
    }

    /// Abandon the in-flight connection attempt, if any.
    ///
    /// Returns `false` when no attempt is still discovering or connecting;
    /// an attempt that already reached `Connected` or `Failed` is left as is.
    pub fn cancel_connect(&self) -> bool {
        let pending = self.inner.pending.lock();
        let Some((_, abort)) = pending.as_ref() else {
            return false;
        };
        let state = self.inner.state.read();
        if !matches!(*state, SessionState::Discovering | SessionState::Connecting) {
            return false;
        }
        abort.abort();
        true
    }

    /// Move a failed session back to `Disconnected`.
    pub fn acknowledge_failure(&self) -> bool {
        let mut state = self.inner.state.write();
        if matches!(*state, SessionState::Failed(_)) {
            self.inner.set_state(&mut state, SessionState::Disconnected);
            true
        } else {
            false
        }
    }

    /// Close the link. Reports "already disconnected" when there is none.
    pub fn disconnect(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.teardown().await })
    }

    /// Write and flush `payload` on the open link.
    ///
    /// The outcome is reported to the observer and also returned through the
    /// handle: the byte count, or the error that was reported.
    pub fn send(&self, payload: impl Into<Vec<u8>>) -> JoinHandle<Result<usize, SessionError>> {
        let payload = payload.into();
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.transmit(payload).await })
    }

    /// Send [`PING_PAYLOAD`].
    pub fn ping(&self) -> JoinHandle<Result<usize, SessionError>> {
        self.send(PING_PAYLOAD)
    }

    /// Cancel any attempt and close any link. For application teardown.
    pub async fn shutdown(&self) {
        self.cancel_connect();
        let mut slot = self.inner.link.lock().await;
        if let Some(link) = slot.take() {
            self.inner.release(link).await;
        }
    }
}

impl<A: RadioAdapter> Inner<A> {
    fn set_state(&self, slot: &mut SessionState, next: SessionState) {
        debug!("Session {} -> {}", slot.as_str(), next.as_str());
        *slot = next.clone();
        self.status.report(StatusEvent::StateChanged(next));
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.state.write();
        self.set_state(&mut state, next);
    }

    fn fail(&self, err: SessionError) {
        self.transition(SessionState::Failed(err.clone()));
        self.status.report(StatusEvent::Failed(err));
    }

    fn clear_pending(&self, attempt: u64) {
        let mut pending = self.pending.lock();
        if matches!(*pending, Some((id, _)) if id == attempt) {
            *pending = None;
        }
    }

    async fn discover(&self, pattern: &NamePattern) -> Result<PairedDevice, SessionError> {
        let devices = self
            .adapter
            .paired_devices()
            .await
            .map_err(|err| SessionError::adapter_unavailable(&err))?;

        match pattern.find(&devices, self.options.order) {
            DeviceMatch::Found(device) => Ok(device),
            DeviceMatch::NotFound => Err(SessionError::NotFound {
                pattern: pattern.target().to_string(),
            }),
        }
    }

    async fn establish(&self) {
        let device = match self.discover(&self.options.pattern).await {
            Ok(device) => device,
            Err(err) => return self.fail(err),
        };

        self.transition(SessionState::Connecting);
        info!("Connecting to {} ({})", device.name, device.address);

        let channel = match self.adapter.open_channel(&device, SPP_UUID).await {
            Ok(channel) => channel,
            Err(err) => return self.fail(SessionError::connect_failed(&err)),
        };

        // Inquiry scans starve connection setup on most controllers.
        if let Err(err) = self.adapter.cancel_discovery().await {
            self.status.report(StatusEvent::Diagnostic(format!(
                "Could not cancel discovery: {:#}",
                err
            )));
        }

        let timeout = self.options.connect_timeout;
        let stream = match tokio::time::timeout(timeout, self.adapter.connect(channel)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return self.fail(SessionError::connect_failed(&err)),
            Err(_) => {
                return self.fail(SessionError::ConnectFailed(format!(
                    "timed out after {:?}",
                    timeout
                )))
            }
        };

        let mut slot = self.link.lock().await;
        *slot = Some(Link {
            device: device.clone(),
            stream,
        });
        self.transition(SessionState::Connected(device.clone()));
        self.status.report(StatusEvent::Connected(device));
    }

    fn abandon(&self) {
        info!("Connection attempt cancelled");
        self.transition(SessionState::Disconnected);
        self.status.report(StatusEvent::ConnectCancelled);
    }

    async fn teardown(&self) {
        let mut slot = self.link.lock().await;
        match slot.take() {
            Some(link) => self.release(link).await,
            None => self.status.report(StatusEvent::AlreadyDisconnected),
        }
    }

    /// Close a link taken out of the slot. Close errors become diagnostics.
    async fn release(&self, link: Link<A::Stream>) {
        let Link { device, mut stream } = link;
        self.transition(SessionState::Disconnecting);

        let timeout = self.options.send_timeout;
        let closed = match tokio::time::timeout(timeout, stream.shutdown()).await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(_) => Err(format!("timed out after {:?}", timeout)),
        };
        if let Err(detail) = closed {
            let err = SessionError::DisconnectFailed(detail);
            self.status.report(StatusEvent::Diagnostic(err.to_string()));
        }
        drop(stream);

        info!("Link to {} closed", device);
        self.transition(SessionState::Disconnected);
        self.status.report(StatusEvent::Disconnected);
    }

    async fn transmit(&self, payload: Vec<u8>) -> Result<usize, SessionError> {
        let mut slot = self.link.lock().await;
        let connected = self.state.read().is_connected();
        let link = match slot.as_mut() {
            Some(link) if connected => link,
            _ => {
                self.status
                    .report(StatusEvent::Failed(SessionError::NotConnected));
                return Err(SessionError::NotConnected);
            }
        };

        let timeout = self.options.send_timeout;
        let write = async {
            link.stream.write_all(&payload).await?;
            link.stream.flush().await
        };
        let result = match tokio::time::timeout(timeout, write).await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(_) => Err(format!("timed out after {:?}", timeout)),
        };

        match result {
            Ok(()) => {
                debug!("Wrote {} bytes to {}", payload.len(), link.device.name);
                self.status.report(StatusEvent::Sent {
                    bytes: payload.len(),
                });
                Ok(payload.len())
            }
            Err(detail) => {
                let err = SessionError::SendFailed(detail);
                self.status.report(StatusEvent::Failed(err.clone()));
                if self.options.disconnect_on_send_failure {
                    warn!("Dropping link after failed send");
                    if let Some(link) = slot.take() {
                        self.release(link).await;
                    }
                }
                Err(err)
            }
        }
    }
}

/// Handle to a running connection attempt.
#[derive(Debug)]
pub struct ConnectHandle {
    abort: AbortHandle,
    task: JoinHandle<()>,
}

impl ConnectHandle {
    /// Abandon the attempt if it is still discovering or connecting; the
    /// session then returns to `Disconnected`. Once the attempt has finished
    /// this does nothing.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the attempt has reached a terminal state.
    pub async fn finished(self) {
        if let Err(err) = self.task.await {
            warn!("Connect task ended abnormally: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::fake::{ConnectScript, FakeAdapter};
    use crate::events::{status_channel, StatusReceiver};

    fn hc06() -> PairedDevice {
        PairedDevice::new("HC-06", Address::new([0x98, 0xD3, 0x31, 0xF5, 0x12, 0x07]))
    }

    fn session_with(
        adapter: FakeAdapter,
        options: SessionOptions,
    ) -> (SerialDeviceSession<FakeAdapter>, StatusReceiver) {
        let (tx, rx) = status_channel();
        (SerialDeviceSession::new(adapter, options, tx), rx)
    }

    fn drain(rx: &mut StatusReceiver) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_connect_reports_every_transition() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let (session, mut rx) = session_with(adapter.clone(), SessionOptions::default());

        session.connect().unwrap().finished().await;

        assert_eq!(
            drain(&mut rx),
            vec![
                StatusEvent::StateChanged(SessionState::Discovering),
                StatusEvent::StateChanged(SessionState::Connecting),
                StatusEvent::StateChanged(SessionState::Connected(hc06())),
                StatusEvent::Connected(hc06()),
            ]
        );
        assert_eq!(adapter.opened_channels(), vec![(hc06(), SPP_UUID)]);
    }

    #[tokio::test]
    async fn test_not_found_fails_session() {
        let adapter = FakeAdapter::new(vec![PairedDevice::new(
            "Keyboard",
            Address::new([1, 1, 1, 1, 1, 1]),
        )]);
        let (session, mut rx) = session_with(adapter, SessionOptions::default());

        session.connect().unwrap().finished().await;

        let err = SessionError::NotFound {
            pattern: "HC-06".to_string(),
        };
        assert_eq!(session.state(), SessionState::Failed(err.clone()));
        assert_eq!(drain(&mut rx).last(), Some(&StatusEvent::Failed(err)));

        assert!(session.acknowledge_failure());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.acknowledge_failure());
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        adapter.script_connect(ConnectScript::Hang);
        let options = SessionOptions {
            connect_timeout: Duration::from_millis(20),
            ..SessionOptions::default()
        };
        let (session, _rx) = session_with(adapter, options);

        session.connect().unwrap().finished().await;

        match session.state() {
            SessionState::Failed(SessionError::ConnectFailed(detail)) => {
                assert!(detail.contains("timed out"), "{}", detail)
            }
            other => panic!("Expected connect failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_discovery_failure_is_diagnostic() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        adapter.fail_cancel_discovery(true);
        let (session, mut rx) = session_with(adapter, SessionOptions::default());

        session.connect().unwrap().finished().await;

        assert!(session.is_connected());
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, StatusEvent::Diagnostic(note) if note.contains("discovery"))));
    }

    #[tokio::test]
    async fn test_cancel_after_connect_leaves_session_connected() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let (session, mut rx) = session_with(adapter, SessionOptions::default());

        let attempt = session.connect().unwrap();
        while !session.is_connected() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(!session.cancel_connect());
        attempt.cancel();
        attempt.finished().await;

        assert_eq!(session.state(), SessionState::Connected(hc06()));
        assert!(!drain(&mut rx).contains(&StatusEvent::ConnectCancelled));
    }

    #[tokio::test]
    async fn test_shutdown_closes_link() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let (session, _rx) = session_with(adapter.clone(), SessionOptions::default());

        session.connect().unwrap().finished().await;
        session.shutdown().await;

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(adapter.transport().shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_request_permissions() {
        let adapter = FakeAdapter::new(vec![]);
        let (session, _rx) = session_with(adapter.clone(), SessionOptions::default());

        session.request_permissions();
        session.request_permissions();
        for _ in 0..50 {
            if adapter.permission_requests() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(adapter.permission_requests(), 2);
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
