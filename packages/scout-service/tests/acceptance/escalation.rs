use std::sync::Arc;

use scout_domain::{Query, SourceTag};
use scout_service::{
	Escalation, EscalationJudge, LocalAdapter, SourceAdapter, ToolKind, ToolRegistry,
};
use scout_storage::local::LocalIndex;
use scout_testkit::TestDir;

use super::{FakeAdapter, HashEmbedding, ScriptedChat, doc};

#[tokio::test]
async fn empty_knowledge_bases_escalate_capital_of_france_to_the_web() {
	let dir = TestDir::new("scout_escalation").expect("Failed to create test dir.");
	let index = LocalIndex::open(dir.path(), "local_files", super::DIMS)
		.await
		.expect("Failed to open local index.");
	let local: Arc<dyn SourceAdapter> =
		Arc::new(LocalAdapter::from_index(index, super::embedding_config(), Arc::new(HashEmbedding)));
	let remote: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(SourceTag::Remote, Vec::new()));
	let web = Arc::new(FakeAdapter::serving(
		SourceTag::Web,
		vec![doc(
			"https://en.wikipedia.org/wiki/Paris",
			"Paris is the capital and largest city of France.",
			SourceTag::Web,
			None,
		)],
	));
	let chat = Arc::new(ScriptedChat::always(
		r#"{"tool": "web_search", "query": "capital city of France"}"#,
	));
	let judge = EscalationJudge::new(super::llm_config(), chat.clone());
	let query = Query::new("capital of France");
	let registry = ToolRegistry::new(scout_config::Fusion::default(), vec![local, remote])
		.with_web(web.clone(), judge.clone(), 5);
	let call = registry
		.validate("knowledge_base", &serde_json::json!({ "keywords": ["capital", "France"] }))
		.expect("Valid knowledge base call.");
	let output = registry.dispatch(call, &query).await.expect("Knowledge base call failed.");

	assert_eq!(output.kind, ToolKind::KnowledgeBase);
	assert_eq!(output.escalated_query.as_deref(), Some("capital city of France"));
	assert_eq!(web.search_log(), vec!["capital city of France".to_string()]);
	assert_eq!(output.evidence().len(), 1);
	assert_eq!(output.evidence().results()[0].document.source_tag, SourceTag::Web);
	assert!(output.render().contains("escalated_web_query"));

	match judge.judge(&query, &Default::default()).await {
		Escalation::WebSearch { query } => assert!(!query.trim().is_empty()),
		Escalation::None => panic!("Empty evidence must escalate."),
	}
}

#[tokio::test]
async fn malformed_judgment_means_no_escalation() {
	let query = Query::new("capital of France");

	for reply in ["Sure! Searching the web now.", r#"{"tool": "calculator"}"#, r#"{"query": "x"}"#] {
		let judge = EscalationJudge::new(super::llm_config(), Arc::new(ScriptedChat::always(reply)));

		assert_eq!(judge.judge(&query, &Default::default()).await, Escalation::None);
	}

	let unreachable = EscalationJudge::new(
		super::llm_config(),
		Arc::new(ScriptedChat::new(vec![None], r#"{"tool": "web_search"}"#)),
	);

	assert_eq!(unreachable.judge(&query, &Default::default()).await, Escalation::None);
}

#[tokio::test]
async fn web_search_without_refined_query_reuses_the_user_query() {
	let judge = EscalationJudge::new(
		super::llm_config(),
		Arc::new(ScriptedChat::always(r#"{"tool": "web_search"}"#)),
	);

	assert_eq!(
		judge.judge(&Query::new("capital of France"), &Default::default()).await,
		Escalation::WebSearch { query: "capital of France".to_string() }
	);
}

#[tokio::test]
async fn sufficient_evidence_stays_local() {
	let local: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Local,
		vec![doc("visa.md", "Tourist visas allow stays of up to 90 days.", SourceTag::Local, Some(0.1))],
	));
	let web = Arc::new(FakeAdapter::serving(SourceTag::Web, Vec::new()));
	let judge = EscalationJudge::new(
		super::llm_config(),
		Arc::new(ScriptedChat::always(r#"{"tool": "none"}"#)),
	);
	let registry = ToolRegistry::new(scout_config::Fusion::default(), vec![local])
		.with_web(web.clone(), judge, 5);
	let call = registry
		.validate("knowledge_base", &serde_json::json!({ "questions": ["How long can I stay?"] }))
		.expect("Valid knowledge base call.");
	let output = registry
		.dispatch(call, &Query::new("visa stay duration"))
		.await
		.expect("Knowledge base call failed.");

	assert!(output.escalated_query.is_none());
	assert!(web.search_log().is_empty());
	assert_eq!(output.evidence().results()[0].document.id, "visa.md");
}
