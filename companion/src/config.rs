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

use crate::llm::LlmConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "companion/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "companion/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Chat is disabled when this section is absent
    pub chat: Option<ChatConfig>,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Self, String> {
        tracing::debug!("Loading configuration from file: {}", path);
        let file =
            std::fs::File::open(path).map_err(|e| format!("Failed to open config file: {}", e))?;

        let conf = serde_yaml::from_reader(file)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(conf)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default)]
    pub root: EnvField<AssetRoot>,

    /// Frame file extension, matched case-insensitively
    #[serde(default = "default_frame_extension")]
    pub extension: String,
}

fn default_frame_extension() -> String {
    "png".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: Default::default(),
            extension: default_frame_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRoot(PathBuf);

impl AssetRoot {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl FromStr for AssetRoot {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl Default for AssetRoot {
    fn default() -> Self {
        Self(PathBuf::from("mod/0000_core/pet/vup"))
    }
}

impl std::fmt::Display for AssetRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub path: EnvField<LedgerPath>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPath(PathBuf);

impl LedgerPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl FromStr for LedgerPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl Default for LedgerPath {
    /// `~/.deskpet_config.json`, or the working directory when no home is known
    fn default() -> Self {
        let home = dirs::home_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        Self(home.join(".deskpet_config.json"))
    }
}

impl std::fmt::Display for LedgerPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Provider type (openai, ollama, lmstudio)
    #[serde(default = "default_chat_provider")]
    pub provider: String,

    #[serde(default)]
    pub endpoint: EnvField<ChatEndpoint>,

    /// API key, usually supplied as `${DESKPET_CHAT_API_KEY}`
    #[serde(default)]
    pub api_key: Option<EnvField<ChatApiKey>>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_chat_retries")]
    pub max_retries: u32,
}

fn default_chat_provider() -> String {
    "openai".to_string()
}

fn default_chat_model() -> String {
    "deepseek-chat".to_string()
}

fn default_chat_timeout() -> u64 {
    30
}

fn default_chat_retries() -> u32 {
    3
}

impl ChatConfig {
    pub fn to_llm_config(&self) -> LlmConfig {
        LlmConfig {
            provider: self.provider.clone(),
            endpoint: self.endpoint.as_str().to_string(),
            api_key: self
                .api_key
                .as_ref()
                .map(|key| key.as_str().to_string())
                .filter(|key| !key.is_empty()),
            default_model: self.model.clone(),
            timeout_seconds: self.timeout_seconds,
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEndpoint(String);

impl ChatEndpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChatEndpoint {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Default for ChatEndpoint {
    fn default() -> Self {
        Self(String::from("https://api.deepseek.com/chat/completions"))
    }
}

impl std::fmt::Display for ChatEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatApiKey(String);

impl ChatApiKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChatApiKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Display for ChatApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'****'")
    }
}
