use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scout_domain::{CombinedResultSet, Query, RankedResult, SearchMode};

use crate::{
	Error, EscalationJudge, FusionEngine, FusionOutput, Result, SourceAdapter, escalation::Escalation,
	fusion,
};

const CONTENT_PREVIEW_CHARS: usize = 1_200;

/// The closed set of tools the decision loop may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
	KnowledgeBase,
	WebSearch,
}
impl ToolKind {
	pub const ALL: [Self; 2] = [Self::KnowledgeBase, Self::WebSearch];

	pub fn name(self) -> &'static str {
		match self {
			Self::KnowledgeBase => "knowledge_base",
			Self::WebSearch => "web_search",
		}
	}

	/// Accepts the canonical snake_case name as well as CamelCase spellings models like to emit.
	pub fn from_name(name: &str) -> Option<Self> {
		let normalized: String = name
			.trim()
			.chars()
			.filter(|ch| !matches!(ch, '_' | '-' | ' '))
			.map(|ch| ch.to_ascii_lowercase())
			.collect();

		match normalized.as_str() {
			"knowledgebase" => Some(Self::KnowledgeBase),
			"websearch" => Some(Self::WebSearch),
			_ => None,
		}
	}

	pub fn description(self) -> &'static str {
		match self {
			Self::KnowledgeBase =>
				"Search the local and remote knowledge bases with keywords and semantic questions. \
				 Falls back to the web when they do not cover the query.",
			Self::WebSearch => "Search the web directly.",
		}
	}

	pub fn parameters_schema(self) -> Value {
		match self {
			Self::KnowledgeBase => serde_json::json!({
				"type": "object",
				"properties": {
					"keywords": { "type": "array", "items": { "type": "string" } },
					"questions": { "type": "array", "items": { "type": "string" } }
				},
				"required": ["keywords", "questions"]
			}),
			Self::WebSearch => serde_json::json!({
				"type": "object",
				"properties": {
					"query": { "type": "string" },
					"max_results": { "type": "integer", "minimum": 1 }
				},
				"required": ["query"]
			}),
		}
	}
}
impl fmt::Display for ToolKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnowledgeBaseParams {
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default)]
	pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebSearchParams {
	pub query: String,
	#[serde(default)]
	pub max_results: Option<u32>,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
	KnowledgeBase(KnowledgeBaseParams),
	WebSearch(WebSearchParams),
}
impl ToolCall {
	pub fn kind(&self) -> ToolKind {
		match self {
			Self::KnowledgeBase(_) => ToolKind::KnowledgeBase,
			Self::WebSearch(_) => ToolKind::WebSearch,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
	pub kind: ToolKind,
	pub fusion: FusionOutput,
	/// Set when the knowledge base escalated to the web with this query.
	pub escalated_query: Option<String>,
}
impl ToolOutput {
	pub fn evidence(&self) -> &CombinedResultSet {
		&self.fusion.combined
	}

	/// Compact JSON rendering appended to the conversation as the tool turn.
	pub fn render(&self) -> String {
		let results: Vec<Value> =
			self.fusion.combined.results().iter().map(render_result).collect();
		let failures: Vec<Value> = self
			.fusion
			.failures
			.iter()
			.map(|failure| {
				serde_json::json!({
					"source": failure.source_tag,
					"mode": failure.search_mode,
					"error": failure.message,
				})
			})
			.collect();
		let mut body = serde_json::json!({
			"tool": self.kind.name(),
			"keyword_hits": self.fusion.keyword_results.len(),
			"semantic_hits": self.fusion.semantic_results.len(),
			"results": results,
		});

		if !failures.is_empty() {
			body["unavailable_sources"] = Value::Array(failures);
		}
		if let Some(query) = &self.escalated_query {
			body["escalated_web_query"] = Value::from(query.as_str());
		}

		body.to_string()
	}
}

fn render_result(result: &RankedResult) -> Value {
	let mut value = serde_json::json!({
		"id": result.document.id,
		"source": result.document.source_tag,
		"score": (result.relevance_score * 1_000.0).round() / 1_000.0,
		"content": scout_domain::conversation::clip_graphemes(
			&result.document.content,
			CONTENT_PREVIEW_CHARS
		),
	});

	if let Some(url) = result.document.metadata.get("url") {
		value["url"] = Value::from(url.as_str());
	}

	value
}

/// Maps tool names onto typed calls and executes them against the configured sources.
pub struct ToolRegistry {
	fusion: FusionEngine,
	escalation_enabled: bool,
	knowledge: Vec<Arc<dyn SourceAdapter>>,
	web: Option<(Arc<dyn SourceAdapter>, EscalationJudge)>,
	web_max_results: usize,
}
impl ToolRegistry {
	/// `knowledge` holds the local and remote adapters queried by the knowledge base tool.
	pub fn new(fusion_cfg: scout_config::Fusion, knowledge: Vec<Arc<dyn SourceAdapter>>) -> Self {
		Self {
			escalation_enabled: fusion_cfg.escalation,
			web_max_results: fusion_cfg.keyword_limit as usize,
			fusion: FusionEngine::new(fusion_cfg),
			knowledge,
			web: None,
		}
	}

	pub fn with_web(
		mut self,
		web: Arc<dyn SourceAdapter>,
		judge: EscalationJudge,
		max_results: usize,
	) -> Self {
		self.web = Some((web, judge));
		self.web_max_results = max_results.max(1);

		self
	}

	pub fn kinds(&self) -> Vec<ToolKind> {
		ToolKind::ALL
			.into_iter()
			.filter(|kind| *kind != ToolKind::WebSearch || self.web.is_some())
			.collect()
	}

	/// Function-style declarations for the available tools.
	pub fn declarations(&self) -> Vec<Value> {
		self.kinds()
			.into_iter()
			.map(|kind| {
				serde_json::json!({
					"type": "function",
					"function": {
						"name": kind.name(),
						"description": kind.description(),
						"parameters": kind.parameters_schema(),
					}
				})
			})
			.collect()
	}

	/// Resolves `name` and checks `parameters` before anything runs.
	pub fn validate(&self, name: &str, parameters: &Value) -> Result<ToolCall> {
		let Some(kind) = ToolKind::from_name(name).filter(|kind| self.kinds().contains(kind))
		else {
			return Err(Error::ToolDispatch {
				tool: name.to_string(),
				message: format!(
					"unknown tool. Available tools: {}.",
					self.kinds().iter().map(|kind| kind.name()).collect::<Vec<_>>().join(", ")
				),
			});
		};
		let parameters =
			if parameters.is_null() { Value::Object(Default::default()) } else { parameters.clone() };
		let invalid = |err: serde_json::Error| Error::ToolDispatch {
			tool: kind.name().to_string(),
			message: format!("invalid parameters: {err}"),
		};

		match kind {
			ToolKind::KnowledgeBase => {
				let params: KnowledgeBaseParams = serde_json::from_value(parameters).map_err(invalid)?;

				if params.keywords.iter().chain(params.questions.iter()).all(|s| s.trim().is_empty()) {
					return Err(Error::ToolDispatch {
						tool: kind.name().to_string(),
						message: "at least one keyword or question is required.".to_string(),
					});
				}

				Ok(ToolCall::KnowledgeBase(params))
			},
			ToolKind::WebSearch => {
				let params: WebSearchParams = serde_json::from_value(parameters).map_err(invalid)?;

				if params.query.trim().is_empty() {
					return Err(Error::ToolDispatch {
						tool: kind.name().to_string(),
						message: "query must not be empty.".to_string(),
					});
				}

				Ok(ToolCall::WebSearch(params))
			},
		}
	}

	/// Executes a validated call. `query` is the user's original question.
	pub async fn dispatch(&self, call: ToolCall, query: &Query) -> Result<ToolOutput> {
		match call {
			ToolCall::KnowledgeBase(params) => self.knowledge_base(params, query).await,
			ToolCall::WebSearch(params) => self.web_search(params).await,
		}
	}

	async fn knowledge_base(&self, params: KnowledgeBaseParams, query: &Query) -> Result<ToolOutput> {
		let mut output =
			self.fusion.fuse(query, &params.keywords, &params.questions, &self.knowledge).await;
		let mut escalated_query = None;

		if self.escalation_enabled
			&& let Some((web, judge)) = &self.web
			&& let Escalation::WebSearch { query: refined } = judge.judge(query, &output.combined).await
		{
			tracing::info!(refined_query = %refined, "Escalating to web search.");

			let web_output = self
				.fusion
				.fuse(&Query::new(refined.as_str()), &[refined.clone()], &[], std::slice::from_ref(web))
				.await;

			output.absorb(web_output, self.fusion.top_n());

			escalated_query = Some(refined);
		}

		Ok(ToolOutput { kind: ToolKind::KnowledgeBase, fusion: output, escalated_query })
	}

	async fn web_search(&self, params: WebSearchParams) -> Result<ToolOutput> {
		let Some((web, _)) = &self.web else {
			return Err(Error::ToolDispatch {
				tool: ToolKind::WebSearch.name().to_string(),
				message: "no web source is configured.".to_string(),
			});
		};
		let limit = params
			.max_results
			.map(|max| max as usize)
			.unwrap_or(self.web_max_results)
			.clamp(1, self.web_max_results.max(1));
		let docs = web.search(&Query::new(params.query.trim()), limit).await.map_err(|err| {
			Error::ToolDispatch { tool: ToolKind::WebSearch.name().to_string(), message: err.to_string() }
		})?;
		let keyword_results = fusion::rank(docs, web.tag(), SearchMode::Keyword);
		let combined = CombinedResultSet::fuse(keyword_results.iter().cloned(), self.fusion.top_n());

		Ok(ToolOutput {
			kind: ToolKind::WebSearch,
			fusion: FusionOutput { keyword_results, combined, ..Default::default() },
			escalated_query: None,
		})
	}
}
