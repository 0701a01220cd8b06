//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use clap::Parser;
use deskpet_companion::assets::DirectoryAssetProvider;
use deskpet_companion::behavior::{CompanionEvent, EventBus};
use deskpet_companion::config::{Arguments, Configuration};
use deskpet_companion::host::{ChatSettings, CompanionHost, HostCommand};
use deskpet_companion::ledger::FileLedgerStore;
use deskpet_companion::llm::build_provider;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Missing or broken configuration falls back to defaults
    let config = match Configuration::load(&arguments.config_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{}; using default configuration", e);
            Configuration::default()
        }
    };
    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting Deskpet companion...");

    let assets = Arc::new(DirectoryAssetProvider::new(
        config.assets.root.as_path(),
        config.assets.extension.as_str(),
    ));
    tracing::info!("Loading frames from {}", config.assets.root.as_path().display());

    let store = Arc::new(FileLedgerStore::new(config.ledger.path.as_path()));
    tracing::info!("Favorability ledger at {}", store.path().display());

    let chat = match config.chat.as_ref().map(|chat| chat.to_llm_config()) {
        Some(llm) => match build_provider(&llm) {
            Ok(provider) => Some(ChatSettings {
                provider,
                model: llm.default_model.clone(),
                max_retries: llm.max_retries,
            }),
            Err(e) => {
                tracing::error!("Chat disabled: {}", e);
                None
            }
        },
        None => {
            tracing::info!("Chat disabled: no chat section in configuration");
            None
        }
    };

    // Headless renderer: report what a window would show
    let events = EventBus::new();
    events.subscribe(|event| match event {
        CompanionEvent::FrameChanged { .. } => tracing::trace!("{:?}", event),
        CompanionEvent::StageEntered {
            companion,
            action,
            stage,
            frame_count,
        } => tracing::debug!(
            "[{}] {} stage {} ({} frames)",
            companion,
            action,
            stage,
            frame_count
        ),
        CompanionEvent::FavorabilityChanged {
            companion,
            new,
            delta,
            ..
        } => tracing::info!("[{}] {:+} favorability, now {}", companion, delta, new),
        CompanionEvent::ChatReplied { companion, text, .. } => {
            tracing::info!("[{}] says: {}", companion, text)
        }
        CompanionEvent::ActionBlocked {
            companion, reason, ..
        } => tracing::warn!("[{}] {}", companion, reason),
        other => tracing::info!("{:?}", other),
    });

    let mut host = CompanionHost::new(assets, store, events, chat);
    tracing::info!("Companion {} is awake", host.root_id());

    let (commands, receiver) = mpsc::channel(32);

    let console = commands.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match HostCommand::parse(&line) {
                    Ok(command) => {
                        if console.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("{}", e),
                },
                Ok(None) => {
                    tracing::debug!("Console closed");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read console: {}", e);
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, closing");
            commands.send(HostCommand::Close).await.ok();
        }
    });

    host.run(receiver).await;
    tracing::info!("Goodbye");
    Ok(())
}
