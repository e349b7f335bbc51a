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

//! Radio adapter abstraction.

use anyhow::Result;
use std::future::Future;
use tokio::io::AsyncWrite;
use uuid::Uuid;

use super::PairedDevice;

/// Platform radio stack as seen by a serial device session.
///
/// Connecting is split the way a classic Bluetooth socket is: a channel is
/// opened for a device and service first, then connected, which may block
/// for a long time.
pub trait RadioAdapter: Send + Sync + 'static {
    /// Prepared but not yet connected channel.
    type Channel: Send + 'static;

    /// Outbound byte stream of a connected channel.
    type Stream: AsyncWrite + Unpin + Send + 'static;

    /// Make sure the radio may be used. Must be idempotent.
    fn request_permissions(&self) -> impl Future<Output = Result<()>> + Send;

    /// List bonded devices in platform order.
    fn paired_devices(&self) -> impl Future<Output = Result<Vec<PairedDevice>>> + Send;

    /// Stop any running inquiry scan.
    fn cancel_discovery(&self) -> impl Future<Output = Result<()>> + Send;

    /// Prepare a channel to `service` on `device`.
    fn open_channel(
        &self,
        device: &PairedDevice,
        service: Uuid,
    ) -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Connect a prepared channel and hand out its stream.
    fn connect(&self, channel: Self::Channel)
        -> impl Future<Output = Result<Self::Stream>> + Send;
}
