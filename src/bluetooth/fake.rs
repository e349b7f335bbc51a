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

//! Scripted radio adapter used in tests and demos.

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use uuid::Uuid;

use super::{PairedDevice, RadioAdapter};

/// How the fake answers a connect call.
#[derive(Debug, Clone)]
pub enum ConnectScript {
    /// Connect immediately.
    Accept,
    /// Connect after a delay.
    AcceptAfter(Duration),
    /// Fail with the given message.
    Refuse(String),
    /// Never return.
    Hang,
}

#[derive(Debug)]
struct AdapterState {
    devices: Vec<PairedDevice>,
    unavailable: bool,
    connect: ConnectScript,
    cancel_discovery_fails: bool,
    permission_requests: usize,
    opened: Vec<(PairedDevice, Uuid)>,
}

/// Minimal fake adapter; clones share state.
#[derive(Debug, Clone)]
pub struct FakeAdapter {
    state: Arc<Mutex<AdapterState>>,
    transport: FakeTransport,
}

impl FakeAdapter {
    pub fn new(devices: Vec<PairedDevice>) -> Self {
        Self {
            state: Arc::new(Mutex::new(AdapterState {
                devices,
                unavailable: false,
                connect: ConnectScript::Accept,
                cancel_discovery_fails: false,
                permission_requests: 0,
                opened: Vec::new(),
            })),
            transport: FakeTransport::default(),
        }
    }

    /// Make every adapter query fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn set_devices(&self, devices: Vec<PairedDevice>) {
        self.state.lock().devices = devices;
    }

    pub fn script_connect(&self, script: ConnectScript) {
        self.state.lock().connect = script;
    }

    pub fn fail_cancel_discovery(&self, fail: bool) {
        self.state.lock().cancel_discovery_fails = fail;
    }

    /// Transport shared by every stream this adapter hands out.
    pub fn transport(&self) -> FakeTransport {
        self.transport.clone()
    }

    pub fn permission_requests(&self) -> usize {
        self.state.lock().permission_requests
    }

    /// Channels opened so far, with the service they were opened for.
    pub fn opened_channels(&self) -> Vec<(PairedDevice, Uuid)> {
        self.state.lock().opened.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.state.lock().unavailable {
            bail!("no Bluetooth adapter");
        }
        Ok(())
    }
}

impl RadioAdapter for FakeAdapter {
    type Channel = PairedDevice;
    type Stream = FakeStream;

    async fn request_permissions(&self) -> Result<()> {
        self.check_available()?;
        self.state.lock().permission_requests += 1;
        Ok(())
    }

    async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        self.check_available()?;
        Ok(self.state.lock().devices.clone())
    }

    async fn cancel_discovery(&self) -> Result<()> {
        if self.state.lock().cancel_discovery_fails {
            bail!("discovery cancel refused");
        }
        Ok(())
    }

    async fn open_channel(&self, device: &PairedDevice, service: Uuid) -> Result<PairedDevice> {
        self.check_available()?;
        self.state.lock().opened.push((device.clone(), service));
        Ok(device.clone())
    }

    async fn connect(&self, channel: PairedDevice) -> Result<FakeStream> {
        let script = self.state.lock().connect.clone();
        match script {
            ConnectScript::Accept => {}
            ConnectScript::AcceptAfter(delay) => tokio::time::sleep(delay).await,
            ConnectScript::Refuse(reason) => {
                return Err(anyhow!(reason).context(format!("connecting {}", channel.address)))
            }
            ConnectScript::Hang => std::future::pending::<()>().await,
        }
        {
            let mut transport = self.transport.state.lock();
            transport.opened += 1;
            transport.closed = false;
        }
        Ok(FakeStream {
            transport: self.transport.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct TransportState {
    written: Vec<u8>,
    write_calls: usize,
    flushes: usize,
    opened: usize,
    shutdowns: usize,
    closed: bool,
    late_writes: usize,
    fail_writes: bool,
    stall_writes: bool,
    fail_shutdown: bool,
}

/// Recording end of the fake streams.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    /// All bytes written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    /// Number of streams handed out.
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().shutdowns
    }

    /// Writes attempted on a stream after it was shut down.
    pub fn late_writes(&self) -> usize {
        self.state.lock().late_writes
    }

    /// Make writes pend forever, like a peer that stopped reading.
    pub fn stall_writes(&self, stall: bool) {
        self.state.lock().stall_writes = stall;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn fail_shutdown(&self, fail: bool) {
        self.state.lock().fail_shutdown = fail;
    }
}

/// Stream handed out by [`FakeAdapter`].
#[derive(Debug)]
pub struct FakeStream {
    transport: FakeTransport,
}

impl AsyncWrite for FakeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.transport.state.lock();
        state.write_calls += 1;
        if state.closed {
            state.late_writes += 1;
        }
        if state.stall_writes {
            return Poll::Pending;
        }
        if state.fail_writes {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection reset by peer",
            )));
        }
        state.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.transport.state.lock().flushes += 1;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.transport.state.lock();
        state.shutdowns += 1;
        state.closed = true;
        if state.fail_shutdown {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket already closed",
            )));
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluer::Address;
    use tokio::io::AsyncWriteExt;

    fn hc06() -> PairedDevice {
        PairedDevice::new("HC-06", Address::new([0x98, 0xD3, 0x31, 0xF5, 0x12, 0x07]))
    }

    #[tokio::test]
    async fn fake_adapter_records_writes() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let channel = adapter
            .open_channel(&hc06(), super::super::SPP_UUID)
            .await
            .unwrap();
        let mut stream = adapter.connect(channel).await.unwrap();

        stream.write_all(b"PING\n").await.unwrap();
        stream.flush().await.unwrap();

        let transport = adapter.transport();
        assert_eq!(transport.written(), b"PING\n");
        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.flushes(), 1);
        assert_eq!(adapter.opened_channels().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_adapter_fails_queries() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        adapter.set_unavailable(true);
        assert!(adapter.paired_devices().await.is_err());
        assert!(adapter.request_permissions().await.is_err());
        assert_eq!(adapter.permission_requests(), 0);
    }

    #[tokio::test]
    async fn refused_connect_reports_reason() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        adapter.script_connect(ConnectScript::Refuse("host is down".into()));
        let err = adapter.connect(hc06()).await.unwrap_err();
        assert!(format!("{err:#}").contains("host is down"));
        assert_eq!(adapter.transport().opened(), 0);
    }

    #[tokio::test]
    async fn failing_writes() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let mut stream = adapter.connect(hc06()).await.unwrap();
        adapter.transport().fail_writes(true);
        assert!(stream.write_all(b"x").await.is_err());
        assert!(adapter.transport().written().is_empty());
    }

    #[tokio::test]
    async fn stalled_writes_never_complete() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let mut stream = adapter.connect(hc06()).await.unwrap();
        adapter.transport().stall_writes(true);

        let write = tokio::time::timeout(Duration::from_millis(20), stream.write_all(b"x"));
        assert!(write.await.is_err());
        assert!(adapter.transport().written().is_empty());
    }

    #[tokio::test]
    async fn writes_after_shutdown_are_counted() {
        let adapter = FakeAdapter::new(vec![hc06()]);
        let mut stream = adapter.connect(hc06()).await.unwrap();
        stream.shutdown().await.unwrap();
        stream.write_all(b"x").await.unwrap();
        assert_eq!(adapter.transport().late_writes(), 1);

        adapter.connect(hc06()).await.unwrap();
        assert_eq!(adapter.transport().shutdowns(), 1);
    }
}
