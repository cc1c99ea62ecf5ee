//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::InstalledModel;
use crate::runtime::{LoadedModelState, RuntimeSettings};

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<InstalledModel>,
}

/// Single-model envelope used by upload, select and delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: InstalledModel,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelSelectionRequest {
    pub model_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuntimeLoadRequest {
    pub model_id: i64,
    /// Used for this load only; never persisted.
    #[serde(default)]
    pub config_override: Option<RuntimeSettings>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuntimeConfigResponse {
    pub config: RuntimeSettings,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RuntimeStateResponse {
    pub loaded: bool,
    pub model: Option<InstalledModel>,
    pub config: Option<RuntimeSettings>,
    /// Directory holding the loaded model file.
    pub runtime_path: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl RuntimeStateResponse {
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// `model` is `None` when the registry record is gone.
    pub fn loaded(model: Option<InstalledModel>, state: LoadedModelState) -> Self {
        let runtime_path = state
            .model_path
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned());
        Self {
            loaded: true,
            model,
            config: Some(state.config),
            runtime_path,
            loaded_at: Some(state.loaded_at),
        }
    }
}

/// Entry of the mock model catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub name: String,
    pub quantization: String,
    pub context_length: u32,
    /// Billions.
    pub parameter_count: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.85,
            max_tokens: 256,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_f64("temperature", self.temperature, 0.0, 2.0)?;
        check_f64("top_p", self.top_p, 0.0, 1.0)?;
        if self.max_tokens == 0 || self.max_tokens > 4096 {
            return Err(format!("max_tokens must be between 1 and 4096, got {}", self.max_tokens));
        }
        check_f64("presence_penalty", self.presence_penalty, -2.0, 2.0)?;
        check_f64("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
        Ok(())
    }
}

fn check_f64(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if !(min..=max).contains(&value) {
        return Err(format!("{field} must be between {min} and {max}, got {value}"));
    }
    Ok(())
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model_id: String,
    pub prompt: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub config: ChatConfig,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        self.config.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    pub token: String,
    pub index: u32,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model_id: String,
    pub stream: Vec<ChatChunk>,
}
