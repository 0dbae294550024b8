use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scout_config::LlmProviderConfig;
use scout_domain::{
	CombinedResultSet, ConversationLog, ConversationTurn, Query, RankedResult, Role, WindowPolicy,
};
use scout_providers::chat::{ChatCompletion, ChatOptions};

use crate::{ChatProvider, Error, Result, ToolRegistry};

/// The structured decision the model emits on every reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
	#[serde(default)]
	pub reasoning: String,
	#[serde(default, alias = "tool")]
	pub tool_name: Option<String>,
	#[serde(default, alias = "tool_parameters")]
	pub parameters: Value,
	#[serde(default)]
	pub done: bool,
}
impl ToolInvocationRequest {
	pub fn schema() -> Value {
		serde_json::json!({
			"type": "object",
			"properties": {
				"reasoning": { "type": "string" },
				"tool_name": { "type": "string" },
				"parameters": { "type": "object" },
				"done": { "type": "boolean" }
			},
			"required": ["reasoning", "done"]
		})
	}

	fn from_completion(completion: ChatCompletion) -> Result<Self> {
		if let Some(value) = crate::extract_json_object(&completion.content) {
			let mut decision: Self = serde_json::from_value(value).map_err(|err| {
				Error::MalformedDecision { message: format!("Decision does not match the schema: {err}") }
			})?;

			if decision.tool_name.is_none()
				&& let Some(call) = &completion.tool_call
			{
				decision.tool_name = Some(call.name.clone());
				decision.parameters = call.arguments.clone();
			}

			return decision.checked();
		}

		match completion.tool_call {
			Some(call) => Self {
				reasoning: completion.content,
				tool_name: Some(call.name),
				parameters: call.arguments,
				done: false,
			}
			.checked(),
			None => Err(Error::MalformedDecision {
				message: "Reply is neither a JSON decision nor a tool call.".to_string(),
			}),
		}
	}

	fn checked(self) -> Result<Self> {
		if self.done && self.reasoning.trim().is_empty() {
			return Err(Error::MalformedDecision {
				message: "A finished decision must carry the answer in reasoning.".to_string(),
			});
		}
		if !self.done && self.tool_name.as_deref().is_none_or(|name| name.trim().is_empty()) {
			return Err(Error::MalformedDecision {
				message: "An unfinished decision must name a tool.".to_string(),
			});
		}

		Ok(self)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
	Reasoning,
	AwaitingToolResult,
	Done,
	MaxIterationsReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
	pub answer: String,
	pub history: Vec<ConversationTurn>,
	pub evidence: CombinedResultSet,
	pub iterations: u32,
	pub reasoning_calls: u32,
}
impl Completion {
	pub fn retrieval_context(&self) -> Vec<String> {
		self.evidence.contexts()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
	pub history: Vec<ConversationTurn>,
	pub evidence: CombinedResultSet,
	/// Reasoning from the last decision that parsed, if any.
	pub last_reasoning: Option<String>,
	pub iterations: u32,
	pub reasoning_calls: u32,
}

/// How a session ended. Running out of iterations is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
	Done(Completion),
	MaxIterationsReached(PartialResult),
}
impl LoopOutcome {
	pub fn state(&self) -> LoopState {
		match self {
			Self::Done(_) => LoopState::Done,
			Self::MaxIterationsReached(_) => LoopState::MaxIterationsReached,
		}
	}

	pub fn history(&self) -> &[ConversationTurn] {
		match self {
			Self::Done(completion) => &completion.history,
			Self::MaxIterationsReached(partial) => &partial.history,
		}
	}

	pub fn evidence(&self) -> &CombinedResultSet {
		match self {
			Self::Done(completion) => &completion.evidence,
			Self::MaxIterationsReached(partial) => &partial.evidence,
		}
	}

	pub fn reasoning_calls(&self) -> u32 {
		match self {
			Self::Done(completion) => completion.reasoning_calls,
			Self::MaxIterationsReached(partial) => partial.reasoning_calls,
		}
	}
}

enum Step {
	Reasoning,
	AwaitingToolResult(ToolInvocationRequest),
	Done(String),
	MaxIterationsReached,
}
impl Step {
	fn state(&self) -> LoopState {
		match self {
			Self::Reasoning => LoopState::Reasoning,
			Self::AwaitingToolResult(_) => LoopState::AwaitingToolResult,
			Self::Done(_) => LoopState::Done,
			Self::MaxIterationsReached => LoopState::MaxIterationsReached,
		}
	}
}

/// Per-session state. Never shared, so an abandoned session takes its history with it.
struct Session {
	log: ConversationLog,
	evidence: Vec<RankedResult>,
	last_reasoning: Option<String>,
	iterations: u32,
	reasoning_calls: u32,
}

/// Drives the reason, act, observe loop for one query at a time.
pub struct Orchestrator {
	llm: LlmProviderConfig,
	chat: Arc<dyn ChatProvider>,
	tools: Arc<ToolRegistry>,
	cfg: scout_config::Agent,
}
impl Orchestrator {
	pub fn new(
		llm: LlmProviderConfig,
		chat: Arc<dyn ChatProvider>,
		tools: Arc<ToolRegistry>,
		cfg: scout_config::Agent,
	) -> Self {
		Self { llm, chat, tools, cfg }
	}

	/// Runs until the model declares completion or the iteration budget is spent.
	///
	/// At most `max_iterations + 1` reasoning calls are made. Tool and model failures are
	/// written into the history and the loop keeps going.
	pub async fn run(&self, query: &Query) -> LoopOutcome {
		let max_iterations = self.cfg.max_iterations.max(1);
		let mut session = Session {
			log: ConversationLog::new(vec![
				ConversationTurn::system(self.system_prompt()),
				ConversationTurn::user(query.text()),
			]),
			evidence: Vec::new(),
			last_reasoning: None,
			iterations: 0,
			reasoning_calls: 0,
		};
		let mut step = Step::Reasoning;

		loop {
			tracing::debug!(
				state = ?step.state(),
				iteration = session.iterations,
				"Decision loop step."
			);

			step = match step {
				Step::Reasoning => {
					session.reasoning_calls += 1;

					match self.reason(&session.log).await {
						Ok(decision) => {
							session.log.push(ConversationTurn::assistant(render_decision(&decision)));
							session.last_reasoning = Some(decision.reasoning.clone());

							if decision.done {
								Step::Done(decision.reasoning)
							} else if session.iterations >= max_iterations {
								Step::MaxIterationsReached
							} else {
								Step::AwaitingToolResult(decision)
							}
						},
						Err(err) => {
							tracing::warn!(
								iteration = session.iterations,
								error = %err,
								"Reasoning step failed; recording it and continuing."
							);

							session.log.push(ConversationTurn::system(format!(
								"Your previous reply could not be used: {err}. Reply with one JSON object \
								 containing reasoning, tool_name, parameters and done."
							)));
							session.iterations += 1;

							if session.iterations >= max_iterations {
								Step::MaxIterationsReached
							} else {
								Step::Reasoning
							}
						},
					}
				},
				Step::AwaitingToolResult(decision) => {
					session.iterations += 1;

					let turn = self.execute(decision, query, &mut session.evidence).await;

					session.log.push(ConversationTurn::tool(turn));

					Step::Reasoning
				},
				Step::Done(answer) => {
					tracing::info!(
						iterations = session.iterations,
						reasoning_calls = session.reasoning_calls,
						"Decision loop finished."
					);

					return LoopOutcome::Done(Completion {
						answer,
						evidence: collect_evidence(session.evidence),
						history: session.log.into_turns(),
						iterations: session.iterations,
						reasoning_calls: session.reasoning_calls,
					});
				},
				Step::MaxIterationsReached => {
					tracing::warn!(
						max_iterations,
						reasoning_calls = session.reasoning_calls,
						"Decision loop reached its iteration budget."
					);

					return LoopOutcome::MaxIterationsReached(PartialResult {
						evidence: collect_evidence(session.evidence),
						history: session.log.into_turns(),
						last_reasoning: session.last_reasoning,
						iterations: session.iterations,
						reasoning_calls: session.reasoning_calls,
					});
				},
			};
		}
	}

	async fn reason(&self, log: &ConversationLog) -> Result<ToolInvocationRequest> {
		let policy = WindowPolicy {
			max_turns: self.cfg.history_max_turns as usize,
			max_chars: self.cfg.turn_max_chars as usize,
		};
		let messages: Vec<Value> = log.window(policy).iter().map(to_message).collect();
		let schema = ToolInvocationRequest::schema();
		let tools = self.tools.declarations();
		let completion = self
			.chat
			.complete(
				&self.llm,
				&messages,
				ChatOptions { response_schema: Some(("tool_invocation", &schema)), tools: &tools },
			)
			.await?;

		ToolInvocationRequest::from_completion(completion)
	}

	/// Returns the tool turn content. Failures become descriptive text instead of errors.
	async fn execute(
		&self,
		decision: ToolInvocationRequest,
		query: &Query,
		evidence: &mut Vec<RankedResult>,
	) -> String {
		let name = decision.tool_name.unwrap_or_default();
		let outcome = match self.tools.validate(&name, &decision.parameters) {
			Ok(call) => self.tools.dispatch(call, query).await,
			Err(err) => Err(err),
		};

		match outcome {
			Ok(output) => {
				tracing::info!(
					tool = %output.kind,
					results = output.evidence().len(),
					escalated = output.escalated_query.is_some(),
					"Tool finished."
				);

				evidence.extend(output.evidence().results().iter().cloned());

				output.render()
			},
			Err(err) => {
				tracing::warn!(tool = %name, error = %err, "Tool dispatch failed.");

				match err {
					Error::ToolDispatch { tool, message } => format!("Tool {tool} failed: {message}"),
					other => format!("Tool {name} failed: {other}"),
				}
			},
		}
	}

	fn system_prompt(&self) -> String {
		let tools = self
			.tools
			.kinds()
			.into_iter()
			.map(|kind| {
				format!(
					"- {}: {} Parameters: {}",
					kind.name(),
					kind.description(),
					kind.parameters_schema()
				)
			})
			.collect::<Vec<_>>()
			.join("\n");

		format!(
			"You are a tool calling agent that answers questions using the available tools.\n\
			 Break the user's task into tool calls and explain your reasoning at each step.\n\n\
			 Tools:\n{tools}\n\n\
			 Reply with one JSON object: {{\"reasoning\": string, \"tool_name\": string, \
			 \"parameters\": object, \"done\": boolean}}. When you can answer, set done to true and \
			 put the final answer in reasoning. Ground the answer in the tool results."
		)
	}
}

fn render_decision(decision: &ToolInvocationRequest) -> String {
	serde_json::to_value(decision)
		.map(|value| value.to_string())
		.unwrap_or_else(|_| decision.reasoning.clone())
}

/// Tool output travels as a user message; chat servers reject a bare `tool` role without a call id.
fn to_message(turn: &ConversationTurn) -> Value {
	match turn.role {
		Role::Tool => serde_json::json!({
			"role": Role::User.as_str(),
			"content": format!("Tool result:\n{}", turn.content),
		}),
		role => serde_json::json!({ "role": role.as_str(), "content": turn.content }),
	}
}

fn collect_evidence(evidence: Vec<RankedResult>) -> CombinedResultSet {
	CombinedResultSet::fuse(evidence, usize::MAX)
}
