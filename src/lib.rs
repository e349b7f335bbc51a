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

//! Session manager for a single paired serial-over-Bluetooth peripheral.
//!
//! The crate finds a bonded device by name (an HC-06 module by default),
//! opens an RFCOMM stream to it through the Serial Port Profile, sends raw
//! payloads and reports every step to an observer as a [`StatusEvent`].

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod session;

pub use bluetooth::{
    DeviceMatch, EnumerationOrder, NamePattern, PairedDevice, RadioAdapter, SPP_UUID,
};
pub use config::Config;
pub use error::SessionError;
pub use events::{spawn_observer, Severity, StatusEvent, StatusSender};
pub use session::{ConnectHandle, SerialDeviceSession, SessionOptions, SessionState, PING_PAYLOAD};
