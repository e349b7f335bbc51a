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

//! Interactive shell commands.
//!
//! Maps lines typed on stdin to session operations.

use spp_link::{RadioAdapter, SerialDeviceSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const HELP: &str = "\
Commands:
  connect        find the paired module and connect
  ping           send PING
  send <text>    send text followed by a newline
  disconnect     close the connection
  status         show session state
  devices        list paired devices
  cancel         abandon a running connect
  ack            clear a failed state
  help           show this text
  quit           disconnect and exit";

/// Shell command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Connect,
    Ping,
    /// Send text plus newline.
    Send(String),
    Disconnect,
    Status,
    Devices,
    Cancel,
    Ack,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "connect" | "c" => Some(Self::Connect),
            "ping" | "p" => Some(Self::Ping),
            "send" | "s" if !rest.is_empty() => Some(Self::Send(rest.to_string())),
            "disconnect" | "d" => Some(Self::Disconnect),
            "status" => Some(Self::Status),
            "devices" => Some(Self::Devices),
            "cancel" => Some(Self::Cancel),
            "ack" => Some(Self::Ack),
            "help" | "?" => Some(Self::Help),
            "quit" | "exit" | "q" => Some(Self::Quit),
            _ => None,
        }
    }

    /// Payload this command puts on the wire, if any.
    pub fn payload(&self) -> Option<Vec<u8>> {
        match self {
            Self::Ping => Some(spp_link::PING_PAYLOAD.to_vec()),
            Self::Send(text) => Some(format!("{}\n", text).into_bytes()),
            _ => None,
        }
    }
}

/// Read commands from stdin until EOF, which counts as `quit`.
pub fn spawn_reader() -> mpsc::UnboundedReceiver<ShellCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match ShellCommand::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => eprintln!("Unknown command: {} (try 'help')", line.trim()),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    let _ = tx.send(ShellCommand::Quit);
                    break;
                }
                Err(e) => {
                    warn!("stdin read error: {}", e);
                    let _ = tx.send(ShellCommand::Quit);
                    break;
                }
            }
        }
    });

    rx
}

/// Run a command against the session. `Quit` is left to the caller.
pub async fn execute<A: RadioAdapter>(command: ShellCommand, session: &SerialDeviceSession<A>) {
    debug!("Executing command: {:?}", command);

    match command {
        ShellCommand::Connect => {
            session.connect();
        }
        ShellCommand::Ping | ShellCommand::Send(_) => {
            if let Some(payload) = command.payload() {
                session.send(payload);
            }
        }
        ShellCommand::Disconnect => {
            session.disconnect();
        }
        ShellCommand::Status => {
            println!("Status: {}", session.state());
        }
        ShellCommand::Devices => match session.paired_devices().await {
            Ok(devices) if devices.is_empty() => println!("No paired devices"),
            Ok(devices) => {
                let pattern = &session.options().pattern;
                let selected = pattern.find(&devices, session.options().order).into_option();
                for device in devices {
                    let marker = if selected.as_ref() == Some(&device) { "*" } else { " " };
                    println!("{} {}", marker, device);
                }
            }
            Err(e) => println!("Error: {}", e),
        },
        ShellCommand::Cancel => {
            if !session.cancel_connect() {
                println!("No connection attempt in progress");
            }
        }
        ShellCommand::Ack => {
            if !session.acknowledge_failure() {
                println!("Nothing to acknowledge");
            }
        }
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_command_parse() {
        assert_eq!(ShellCommand::parse("connect"), Some(ShellCommand::Connect));
        assert_eq!(ShellCommand::parse("  PING "), Some(ShellCommand::Ping));
        assert_eq!(
            ShellCommand::parse("send hello world"),
            Some(ShellCommand::Send("hello world".to_string()))
        );
        assert_eq!(ShellCommand::parse("send"), None);
        assert_eq!(ShellCommand::parse("disconnect"), Some(ShellCommand::Disconnect));
        assert_eq!(ShellCommand::parse("exit"), Some(ShellCommand::Quit));
        assert_eq!(ShellCommand::parse("reboot"), None);
    }

    #[test]
    fn test_payloads() {
        assert_eq!(ShellCommand::Ping.payload(), Some(b"PING\n".to_vec()));
        assert_eq!(
            ShellCommand::Send("AT".to_string()).payload(),
            Some(b"AT\n".to_vec())
        );
        assert_eq!(ShellCommand::Status.payload(), None);
    }
}
