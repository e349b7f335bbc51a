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

//! Session error taxonomy.
//!
//! None of these are returned to the caller of a session operation. They are
//! recovered locally and delivered as [`crate::StatusEvent::Failed`] or as
//! diagnostics.

use thiserror::Error;

/// Failure kinds of a serial device session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The platform radio stack cannot be reached.
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// No paired device matches the name pattern.
    #[error("No paired device matching '{pattern}'")]
    NotFound { pattern: String },

    /// Opening or connecting the serial channel failed.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// An operation needed a live connection and there is none.
    #[error("Not connected")]
    NotConnected,

    /// Writing to the outbound stream failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Closing the stream failed. Disconnect still completes.
    #[error("Disconnect error: {0}")]
    DisconnectFailed(String),

    /// A lifecycle operation is already running or the link is already up.
    #[error("Session busy ({state})")]
    Busy { state: &'static str },
}

impl SessionError {
    /// Wrap an adapter error, keeping the whole cause chain.
    pub fn adapter_unavailable(err: &anyhow::Error) -> Self {
        Self::AdapterUnavailable(format!("{err:#}"))
    }

    /// Wrap a connect error, keeping the whole cause chain.
    pub fn connect_failed(err: &anyhow::Error) -> Self {
        Self::ConnectFailed(format!("{err:#}"))
    }
}
