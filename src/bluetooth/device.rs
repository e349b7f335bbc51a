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

use bluer::Address;
use std::fmt;

/// A paired Bluetooth device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairedDevice {
    pub address: Address,
    pub name: String,
}

impl PairedDevice {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }
}

impl fmt::Display for PairedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
