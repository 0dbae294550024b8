use std::{
	sync::{Arc, Mutex, atomic::AtomicUsize},
	time::Duration,
};

use serde_json::Value;

use scout_config::LlmProviderConfig;
use scout_domain::{Query, Role, SourceTag};
use scout_providers::chat::{ChatCompletion, ChatOptions, ToolCall};
use scout_service::{
	BoxFuture, ChatProvider, EscalationJudge, LoopOutcome, LoopState, Orchestrator, SourceAdapter,
	ToolRegistry,
};

use super::{FakeAdapter, ScriptedChat, StallFirstChat, doc};

const DONE_PARIS: &str = r#"{"reasoning": "Paris is the capital of France.", "done": true}"#;
const ASK_KNOWLEDGE_BASE: &str = r#"{"reasoning": "Check the knowledge base.", "tool_name": "knowledge_base", "parameters": {"keywords": ["capital", "France"], "questions": ["What is the capital of France?"]}, "done": false}"#;

fn agent_config(max_iterations: u32) -> scout_config::Agent {
	scout_config::Agent { max_iterations, ..Default::default() }
}

fn registry() -> Arc<ToolRegistry> {
	let local: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Local,
		vec![doc("france.md", "Paris is the capital of France.", SourceTag::Local, Some(0.1))],
	));
	let fusion = scout_config::Fusion { escalation: false, ..Default::default() };

	Arc::new(ToolRegistry::new(fusion, vec![local]))
}

fn orchestrator(chat: Arc<dyn ChatProvider>, max_iterations: u32) -> Orchestrator {
	Orchestrator::new(super::llm_config(), chat, registry(), agent_config(max_iterations))
}

#[tokio::test]
async fn tool_result_feeds_the_next_reasoning_step() {
	let chat = Arc::new(ScriptedChat::new(vec![Some(ASK_KNOWLEDGE_BASE)], DONE_PARIS));
	let outcome = orchestrator(chat.clone(), 5).run(&Query::new("What is the capital of France?")).await;
	let LoopOutcome::Done(completion) = outcome else {
		panic!("Expected a completed answer.");
	};

	assert_eq!(completion.answer, "Paris is the capital of France.");
	assert_eq!(completion.reasoning_calls, 2);
	assert_eq!(completion.iterations, 1);
	assert_eq!(completion.retrieval_context(), vec!["Paris is the capital of France.".to_string()]);
	assert!(completion.history.iter().any(|turn| turn.role == Role::Tool));
	assert!(super::message_text(&chat.request(1)).contains("france.md"));
}

/// Answers the first request with a native tool call and records the tool names offered.
#[derive(Default)]
struct NativeToolChat {
	offered: Mutex<Vec<Vec<String>>>,
}
impl ChatProvider for NativeToolChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
		options: ChatOptions<'a>,
	) -> BoxFuture<'a, scout_providers::Result<ChatCompletion>> {
		let names = options
			.tools
			.iter()
			.filter_map(|tool| tool["function"]["name"].as_str().map(str::to_string))
			.collect();
		let mut offered = self.offered.lock().expect("offered poisoned");

		offered.push(names);

		let completion = if offered.len() == 1 {
			ChatCompletion {
				content: String::new(),
				tool_call: Some(ToolCall {
					name: "knowledge_base".to_string(),
					arguments: serde_json::json!({ "keywords": ["capital", "France"] }),
				}),
			}
		} else {
			ChatCompletion { content: DONE_PARIS.to_string(), tool_call: None }
		};

		Box::pin(async move { Ok(completion) })
	}
}

#[tokio::test]
async fn registered_tools_are_offered_and_native_calls_are_dispatched() {
	let chat = Arc::new(NativeToolChat::default());
	let outcome = orchestrator(chat.clone(), 5).run(&Query::new("What is the capital of France?")).await;
	let LoopOutcome::Done(completion) = outcome else {
		panic!("Expected a completed answer.");
	};
	let offered = chat.offered.lock().expect("offered poisoned").clone();

	assert_eq!(offered.len(), 2);
	assert!(offered.iter().all(|names| names == &vec!["knowledge_base".to_string()]));
	assert_eq!(completion.iterations, 1);
	assert_eq!(completion.retrieval_context(), vec!["Paris is the capital of France.".to_string()]);
}

#[tokio::test]
async fn unknown_tool_becomes_a_tool_turn_and_the_loop_continues() {
	let chat = Arc::new(ScriptedChat::new(
		vec![Some(r#"{"reasoning": "Compute it.", "tool_name": "calculator", "parameters": {}, "done": false}"#)],
		DONE_PARIS,
	));
	let outcome = orchestrator(chat.clone(), 5).run(&Query::new("What is the capital of France?")).await;

	assert_eq!(outcome.state(), LoopState::Done);
	assert_eq!(chat.calls(), 2);

	let second = chat.request(1);
	let last = second.last().expect("Second request must carry history.");

	assert!(last["content"].as_str().unwrap_or_default().contains("unknown tool"));
	assert!(
		outcome
			.history()
			.iter()
			.any(|turn| turn.role == Role::Tool && turn.content.contains("calculator"))
	);
}

#[tokio::test]
async fn never_finishing_model_stops_after_max_iterations_plus_one_calls() {
	for max_iterations in [1, 3, 5] {
		let chat = Arc::new(ScriptedChat::always(ASK_KNOWLEDGE_BASE));
		let outcome = orchestrator(chat.clone(), max_iterations).run(&Query::new("loop forever")).await;
		let LoopOutcome::MaxIterationsReached(partial) = outcome else {
			panic!("Expected the iteration budget to run out.");
		};

		assert_eq!(chat.calls() as u32, max_iterations + 1);
		assert_eq!(partial.reasoning_calls, max_iterations + 1);
		assert_eq!(partial.iterations, max_iterations);
		assert_eq!(partial.last_reasoning.as_deref(), Some("Check the knowledge base."));
		assert!(!partial.evidence.is_empty());
		assert_eq!(
			partial.history.iter().filter(|turn| turn.role == Role::Tool).count() as u32,
			max_iterations
		);
	}
}

#[tokio::test]
async fn malformed_and_failed_model_replies_consume_the_budget() {
	let chat = Arc::new(ScriptedChat::new(vec![Some("I am not JSON."), None], "still not JSON"));
	let outcome = orchestrator(chat.clone(), 3).run(&Query::new("anything")).await;

	assert_eq!(outcome.state(), LoopState::MaxIterationsReached);
	assert!(outcome.reasoning_calls() <= 4);
	assert_eq!(chat.calls(), 3);
	assert!(
		super::message_text(&chat.request(1)).contains("Your previous reply could not be used")
	);
}

#[tokio::test]
async fn failing_tool_is_reported_to_the_model() {
	let web: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::failing(SourceTag::Web));
	let judge_chat = Arc::new(ScriptedChat::always(r#"{"tool": "none"}"#));
	let tools = ToolRegistry::new(scout_config::Fusion::default(), Vec::new()).with_web(
		web,
		EscalationJudge::new(super::llm_config(), judge_chat),
		5,
	);
	let chat = Arc::new(ScriptedChat::new(
		vec![Some(r#"{"reasoning": "Search.", "tool_name": "web_search", "parameters": {"query": "capital of France"}, "done": false}"#)],
		DONE_PARIS,
	));
	let orchestrator =
		Orchestrator::new(super::llm_config(), chat.clone(), Arc::new(tools), agent_config(5));
	let outcome = orchestrator.run(&Query::new("What is the capital of France?")).await;

	assert_eq!(outcome.state(), LoopState::Done);
	assert!(super::message_text(&chat.request(1)).contains("Tool web_search failed"));
}

#[tokio::test]
async fn abandoned_session_leaves_nothing_behind() {
	let requests = Arc::new(Mutex::new(Vec::new()));
	let chat = Arc::new(StallFirstChat {
		calls: AtomicUsize::new(0),
		reply: DONE_PARIS.to_string(),
		requests: requests.clone(),
	});
	let orchestrator = orchestrator(chat, 5);
	let abandoned = tokio::time::timeout(
		Duration::from_millis(50),
		orchestrator.run(&Query::new("first secret question")),
	)
	.await;

	assert!(abandoned.is_err());

	let outcome = orchestrator.run(&Query::new("second question")).await;

	assert_eq!(outcome.state(), LoopState::Done);

	let second = requests.lock().expect("requests poisoned")[1].clone();
	let text = super::message_text(&second);

	assert!(text.contains("second question"));
	assert!(!text.contains("first secret question"));
	assert_eq!(second.len(), 2);
}
