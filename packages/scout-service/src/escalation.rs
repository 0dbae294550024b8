use std::sync::Arc;

use serde_json::Value;

use scout_config::LlmProviderConfig;
use scout_domain::{CombinedResultSet, Query};
use scout_providers::chat::ChatOptions;

use crate::{ChatProvider, Error, Result};

const CONTEXT_PREVIEW_CHARS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
	None,
	WebSearch { query: String },
}

/// Asks the model whether local and remote evidence is enough to answer a query.
///
/// Any failure, including malformed model output, means no escalation.
#[derive(Clone)]
pub struct EscalationJudge {
	llm: LlmProviderConfig,
	chat: Arc<dyn ChatProvider>,
}
impl EscalationJudge {
	pub fn new(llm: LlmProviderConfig, chat: Arc<dyn ChatProvider>) -> Self {
		Self { llm, chat }
	}

	pub async fn judge(&self, query: &Query, evidence: &CombinedResultSet) -> Escalation {
		match self.try_judge(query, evidence).await {
			Ok(escalation) => escalation,
			Err(err) => {
				tracing::warn!(error = %err, "Escalation judgment failed; staying with local evidence.");

				Escalation::None
			},
		}
	}

	async fn try_judge(&self, query: &Query, evidence: &CombinedResultSet) -> Result<Escalation> {
		let messages = vec![
			serde_json::json!({ "role": "system", "content": build_prompt(query, evidence) }),
			serde_json::json!({ "role": "user", "content": query.text() }),
		];
		let schema = decision_schema();
		let completion = self
			.chat
			.complete(
				&self.llm,
				&messages,
				ChatOptions { response_schema: Some(("escalation", &schema)), tools: &[] },
			)
			.await?;

		parse_decision(&completion.content, query)
	}
}

fn build_prompt(query: &Query, evidence: &CombinedResultSet) -> String {
	let mut docs = String::new();

	if evidence.is_empty() {
		docs.push_str("[]\n");
	}

	for result in evidence.results() {
		docs.push_str(&format!(
			"- [{}] ({:.2}) {}\n",
			result.document.source_tag,
			result.relevance_score,
			scout_domain::conversation::clip_graphemes(&result.document.content, CONTEXT_PREVIEW_CHARS)
		));
	}

	format!(
		"You are a research assistant. Given a user's query and documents found in the local and \
		 remote knowledge bases, decide whether a web search is needed.\n\n\
		 Query: {}\n\
		 Documents:\n{docs}\n\
		 If the documents are sufficient, return {{\"tool\": \"none\"}}.\n\
		 If a web search is needed, return {{\"tool\": \"web_search\", \"query\": \"<specific search query>\"}}.\n\n\
		 Example:\n\
		 Query: What is the capital of France?\n\
		 Documents: []\n\
		 Response: {{\"tool\": \"web_search\", \"query\": \"capital city of France\"}}",
		query.text()
	)
}

fn decision_schema() -> Value {
	serde_json::json!({
		"type": "object",
		"properties": {
			"tool": { "type": "string", "enum": ["none", "web_search"] },
			"query": { "type": "string" }
		},
		"required": ["tool"]
	})
}

fn parse_decision(raw: &str, query: &Query) -> Result<Escalation> {
	let value = crate::extract_json_object(raw).ok_or_else(|| Error::MalformedDecision {
		message: "Escalation output is not a JSON object.".to_string(),
	})?;

	match value.get("tool").and_then(Value::as_str).map(str::trim) {
		Some("none") => Ok(Escalation::None),
		Some("web_search") => {
			let refined = value
				.get("query")
				.and_then(Value::as_str)
				.map(str::trim)
				.filter(|refined| !refined.is_empty())
				.unwrap_or_else(|| query.text().trim());

			if refined.is_empty() {
				return Err(Error::MalformedDecision {
					message: "Escalation chose web_search without any query.".to_string(),
				});
			}

			Ok(Escalation::WebSearch { query: refined.to_string() })
		},
		Some(other) => Err(Error::MalformedDecision {
			message: format!("Escalation chose unknown tool {other:?}."),
		}),
		None => Err(Error::MalformedDecision {
			message: "Escalation output has no tool field.".to_string(),
		}),
	}
}
