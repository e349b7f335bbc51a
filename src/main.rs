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

//! spp-link command line front-end

mod cli;
mod commands;
mod logging;

use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};

use cli::Cli;
use commands::ShellCommand;
use spp_link::bluetooth::BluezAdapter;
use spp_link::{spawn_observer, Config, RadioAdapter, SerialDeviceSession};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    info!("Starting spp-link v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply(&mut config);
    config.validate()?;
    info!("Configuration loaded");

    let adapter = BluezAdapter::new(config.bluetooth.adapter.as_deref()).await?;

    let (status_tx, observer) = spawn_observer(|event| println!("{}", event));
    let session = SerialDeviceSession::new(adapter, config.session_options(), status_tx);
    session.request_permissions();

    let result = if cli.send_once {
        send_once(&session).await
    } else {
        interactive(&session).await;
        Ok(())
    };

    session.shutdown().await;
    drop(session);

    // Let the observer print what is still queued.
    if tokio::time::timeout(Duration::from_secs(1), observer)
        .await
        .is_err()
    {
        warn!("Status observer did not finish");
    }

    info!("spp-link stopped");
    result
}

async fn send_once<A: RadioAdapter>(session: &SerialDeviceSession<A>) -> Result<()> {
    let Some(attempt) = session.connect() else {
        bail!("session busy");
    };
    attempt.finished().await;

    if !session.is_connected() {
        bail!("could not connect ({})", session.state());
    }

    let sent = session.ping().await?;
    session.disconnect().await?;
    if let Err(err) = sent {
        bail!("ping not delivered: {}", err);
    }
    Ok(())
}

async fn interactive<A: RadioAdapter>(session: &SerialDeviceSession<A>) {
    let mut command_rx = commands::spawn_reader();
    println!("{}", commands::HELP);

    loop {
        tokio::select! {
            Some(command) = command_rx.recv() => {
                if command == ShellCommand::Quit {
                    info!("Quit requested");
                    break;
                }
                commands::execute(command, session).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            else => break,
        }
    }
}
