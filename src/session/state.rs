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

//! Session state.

use std::fmt;

use crate::bluetooth::PairedDevice;
use crate::error::SessionError;

/// Lifecycle state of a serial device session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Discovering,
    Connecting,
    /// Bound to a device; the session holds an open stream.
    Connected(PairedDevice),
    Disconnecting,
    Failed(SessionError),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Discovering => "Discovering...",
            SessionState::Connecting => "Connecting...",
            SessionState::Connected(_) => "Connected",
            SessionState::Disconnecting => "Disconnecting...",
            SessionState::Failed(_) => "Failed",
        }
    }

    /// A new connection attempt may start from here.
    pub fn can_connect(&self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Failed(_))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    pub fn device(&self) -> Option<&PairedDevice> {
        match self {
            SessionState::Connected(device) => Some(device),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connected(device) => write!(f, "Connected to {}", device),
            SessionState::Failed(err) => write!(f, "Failed: {}", err),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluer::Address;

    #[test]
    fn test_can_connect() {
        assert!(SessionState::Disconnected.can_connect());
        assert!(SessionState::Failed(SessionError::NotConnected).can_connect());
        assert!(!SessionState::Discovering.can_connect());
        assert!(!SessionState::Connecting.can_connect());
        assert!(!SessionState::Disconnecting.can_connect());
    }

    #[test]
    fn test_device_only_when_connected() {
        let device = PairedDevice::new("HC-06", Address::new([1, 2, 3, 4, 5, 6]));
        let state = SessionState::Connected(device.clone());
        assert_eq!(state.device(), Some(&device));
        assert!(state.is_connected());
        assert!(!state.can_connect());
        assert_eq!(SessionState::Connecting.device(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            SessionState::Failed(SessionError::ConnectFailed("timed out".into())).to_string(),
            "Failed: Connection failed: timed out"
        );
    }
}
