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

//! BlueZ radio adapter.
//!
//! RFCOMM client connections go through the BlueZ profile API: a client
//! profile is registered for the service UUID, the device is asked to connect
//! that profile and BlueZ hands the resulting socket to the profile handle.
//! This resolves the RFCOMM channel through SDP instead of hardcoding it.

use anyhow::{anyhow, Context, Result};
use bluer::rfcomm::{Profile, ProfileHandle, Role, Stream};
use bluer::{Adapter, Address, Device, Session};
use futures::StreamExt;
use pin_project_lite::pin_project;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PairedDevice, RadioAdapter};

/// Radio adapter backed by a BlueZ controller.
pub struct BluezAdapter {
    session: Session,
    adapter: Adapter,
}

impl BluezAdapter {
    /// Connect to BlueZ and pick an adapter.
    ///
    /// Uses the default adapter unless `name` (e.g. "hci1") is given.
    pub async fn new(name: Option<&str>) -> Result<Self> {
        let session = Session::new().await.context("connecting to BlueZ")?;
        debug!("BlueZ session created");

        let adapter = match name {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self { session, adapter })
    }

    /// Adapter name, e.g. "hci0".
    pub fn name(&self) -> &str {
        self.adapter.name()
    }
}

impl RadioAdapter for BluezAdapter {
    type Channel = BluezChannel;
    type Stream = BluezStream;

    async fn request_permissions(&self) -> Result<()> {
        // On Linux the only capability we need is a powered controller.
        if !self.adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            self.adapter.set_powered(true).await?;
        }
        Ok(())
    }

    async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let Some(device) = readable(addr, self.adapter.device(addr)) else {
                continue;
            };
            if readable(addr, device.is_paired().await) == Some(true) {
                let name = match device.name().await {
                    Ok(Some(name)) => name,
                    _ => device.alias().await.unwrap_or_else(|_| addr.to_string()),
                };
                devices.push(PairedDevice::new(name, addr));
            }
        }

        debug!("{} paired devices on {}", devices.len(), self.adapter.name());
        Ok(devices)
    }

    async fn cancel_discovery(&self) -> Result<()> {
        // BlueZ ties discovery to the session that started it and stops it
        // when that session drops its stream; we never start one.
        if self.adapter.is_discovering().await? {
            warn!(
                "Adapter {} is discovering for another client; connection may be slow",
                self.adapter.name()
            );
        }
        Ok(())
    }

    async fn open_channel(&self, device: &PairedDevice, service: Uuid) -> Result<BluezChannel> {
        let profile = Profile {
            uuid: service,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let handle = self
            .session
            .register_profile(profile)
            .await
            .with_context(|| format!("registering client profile {}", service))?;
        debug!("Client profile {} registered", service);

        Ok(BluezChannel {
            device: self.adapter.device(device.address)?,
            service,
            profile: handle,
        })
    }

    async fn connect(&self, channel: BluezChannel) -> Result<BluezStream> {
        let BluezChannel {
            device,
            service,
            mut profile,
        } = channel;
        let address = device.address();

        let connect = device.connect_profile(&service);
        tokio::pin!(connect);
        let mut profile_connected = false;

        loop {
            tokio::select! {
                res = &mut connect, if !profile_connected => {
                    res.with_context(|| format!("connecting profile {} on {}", service, address))?;
                    profile_connected = true;
                    debug!("Profile connected on {}, waiting for socket", address);
                }
                req = profile.next() => {
                    let req = req.ok_or_else(|| anyhow!("profile registration closed"))?;
                    if req.device() != address {
                        warn!("Ignoring connection request from {}", req.device());
                        continue;
                    }
                    let stream = req.accept()?;
                    info!("RFCOMM stream open to {}", address);
                    return Ok(BluezStream {
                        stream,
                        _profile: profile,
                    });
                }
            }
        }
    }
}

/// Value of a per-device query, or `None` after logging why the device is
/// skipped. One unreadable device must not hide the others.
fn readable<T, E: fmt::Display>(addr: Address, result: std::result::Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping device {}: {}", addr, e);
            None
        }
    }
}

/// Registered client profile waiting to be connected.
pub struct BluezChannel {
    device: Device,
    service: Uuid,
    profile: ProfileHandle,
}

pin_project! {
    /// RFCOMM stream that keeps its profile registered while open.
    pub struct BluezStream {
        #[pin]
        stream: Stream,
        _profile: ProfileHandle,
    }
}

impl AsyncWrite for BluezStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().stream.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_device_is_skipped() {
        let addr = Address::new([0x98, 0xD3, 0x31, 0xF5, 0x12, 0x07]);

        assert_eq!(readable(addr, Ok::<_, anyhow::Error>(true)), Some(true));
        assert_eq!(
            readable::<bool, _>(addr, Err(anyhow!("org.bluez.Error.Failed"))),
            None
        );
    }
}
