use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub sources: Sources,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub agent: Agent,
	#[serde(default)]
	pub feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub evaluation: EvaluationProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	/// Metric name forwarded to the evaluation service, e.g. "contextual_precision".
	pub metric: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Sources {
	pub local: LocalSource,
	pub remote: Option<RemoteSource>,
	pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalSource {
	pub path: PathBuf,
	pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSource {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSource {
	pub base_url: String,
	#[serde(default = "default_health_path")]
	pub health_path: String,
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_retry_interval_ms")]
	pub retry_interval_ms: u64,
	#[serde(default = "default_web_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_web_max_results")]
	pub max_results: u32,
	/// Optional. Argv used to provision the engine when the first lease is taken.
	pub start_command: Option<Vec<String>>,
	/// Optional. Argv used to tear the engine down when the last lease is released.
	pub stop_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fusion {
	pub top_n: u32,
	pub keyword_limit: u32,
	pub semantic_limit: u32,
	pub escalation: bool,
}
impl Default for Fusion {
	fn default() -> Self {
		Self { top_n: 5, keyword_limit: 5, semantic_limit: 3, escalation: true }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Agent {
	pub max_iterations: u32,
	pub history_max_turns: u32,
	pub turn_max_chars: u32,
}
impl Default for Agent {
	fn default() -> Self {
		Self { max_iterations: 5, history_max_turns: 24, turn_max_chars: 8_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Feedback {
	pub enabled: bool,
	pub threshold: f32,
	pub dir: PathBuf,
}
impl Default for Feedback {
	fn default() -> Self {
		Self { enabled: true, threshold: 0.5, dir: PathBuf::from("hallucinations") }
	}
}

fn default_health_path() -> String {
	"/search".to_string()
}

fn default_max_retries() -> u32 {
	5
}

fn default_retry_interval_ms() -> u64 {
	2_000
}

fn default_web_timeout_ms() -> u64 {
	10_000
}

fn default_web_max_results() -> u32 {
	5
}
