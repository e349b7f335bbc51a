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

use clap::Parser;
use spp_link::{Config, EnumerationOrder};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spp-link")]
#[command(about = "Connect to a paired Bluetooth serial module and send it data")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: <config dir>/spp-link/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Name of the paired module, e.g. HC-06
    #[arg(short, long, value_name = "NAME")]
    pub device: Option<String>,

    /// Prefix used by the loose name match
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Pick the lowest address when several devices match
    #[arg(long)]
    pub sort_by_address: bool,

    /// Connect timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Bluetooth controller, e.g. hci0
    #[arg(long, value_name = "HCI")]
    pub adapter: Option<String>,

    /// Close the connection when a send fails
    #[arg(long)]
    pub disconnect_on_send_failure: bool,

    /// Connect, send one PING, disconnect and exit
    #[arg(long)]
    pub send_once: bool,
}

impl Cli {
    /// Overlay command-line flags on the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.bluetooth.device_pattern = device.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.bluetooth.match_prefix = Some(prefix.clone());
        }
        if self.sort_by_address {
            config.bluetooth.enumeration_order = EnumerationOrder::ByAddress;
        }
        if let Some(adapter) = &self.adapter {
            config.bluetooth.adapter = Some(adapter.clone());
        }
        if let Some(timeout) = self.timeout {
            config.session.connect_timeout_secs = timeout;
        }
        if self.disconnect_on_send_failure {
            config.session.disconnect_on_send_failure = true;
        }
    }
}
