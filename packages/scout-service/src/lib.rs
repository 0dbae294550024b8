pub mod agent;
pub mod escalation;
pub mod feedback;
pub mod fusion;
pub mod ingest;
pub mod sources;
pub mod tools;
pub mod web_engine;

mod error;

pub use agent::{
	Completion, LoopOutcome, LoopState, Orchestrator, PartialResult, ToolInvocationRequest,
};
pub use error::{Error, Result};
pub use escalation::{Escalation, EscalationJudge};
pub use feedback::{FeedbackCapture, FeedbackOutcome};
pub use fusion::{FusionEngine, FusionOutput, SourceFailure};
pub use ingest::IngestReport;
pub use sources::{SourceAdapter, local::LocalAdapter, remote::RemoteAdapter, web::WebAdapter};
pub use tools::{
	KnowledgeBaseParams, ToolCall, ToolKind, ToolOutput, ToolRegistry, WebSearchParams,
};
pub use web_engine::{CommandLauncher, EngineLauncher, WebEngine, WebEngineLease};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use scout_config::{EmbeddingProviderConfig, EvaluationProviderConfig, LlmProviderConfig};
use scout_providers::{
	chat::{self, ChatCompletion, ChatOptions},
	embedding,
	evaluation::{self, EvaluationScore},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		options: ChatOptions<'a>,
	) -> BoxFuture<'a, scout_providers::Result<ChatCompletion>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, scout_providers::Result<Vec<Vec<f32>>>>;
}

pub trait EvaluationProvider
where
	Self: Send + Sync,
{
	fn score<'a>(
		&'a self,
		cfg: &'a EvaluationProviderConfig,
		input: &'a str,
		actual_output: &'a str,
		retrieval_context: &'a [String],
	) -> BoxFuture<'a, scout_providers::Result<EvaluationScore>>;
}

#[derive(Clone)]
pub struct Providers {
	pub chat: Arc<dyn ChatProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub evaluation: Arc<dyn EvaluationProvider>,
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { chat: provider.clone(), embedding: provider.clone(), evaluation: provider }
	}
}

struct DefaultProviders;
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		options: ChatOptions<'a>,
	) -> BoxFuture<'a, scout_providers::Result<ChatCompletion>> {
		Box::pin(chat::complete(cfg, messages, options))
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, scout_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl EvaluationProvider for DefaultProviders {
	fn score<'a>(
		&'a self,
		cfg: &'a EvaluationProviderConfig,
		input: &'a str,
		actual_output: &'a str,
		retrieval_context: &'a [String],
	) -> BoxFuture<'a, scout_providers::Result<EvaluationScore>> {
		Box::pin(evaluation::score(cfg, input, actual_output, retrieval_context))
	}
}

/// Pulls the first JSON object out of model output, tolerating code fences and surrounding prose.
pub(crate) fn extract_json_object(raw: &str) -> Option<Value> {
	let trimmed = raw.trim();

	if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
		return Some(value);
	}

	let start = trimmed.find('{')?;
	let end = trimmed.rfind('}')?;

	if end <= start {
		return None;
	}

	match serde_json::from_str::<Value>(&trimmed[start..=end]) {
		Ok(value @ Value::Object(_)) => Some(value),
		_ => None,
	}
}
