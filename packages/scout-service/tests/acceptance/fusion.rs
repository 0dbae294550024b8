use std::{collections::BTreeMap, sync::Arc};

use scout_domain::{CandidateDocument, Query, SearchMode, SourceTag};
use scout_service::{BoxFuture, FusionEngine, Result, SourceAdapter};

use super::{FakeAdapter, doc};

/// Its searches panic instead of returning.
struct PanickingAdapter;
impl SourceAdapter for PanickingAdapter {
	fn tag(&self) -> SourceTag {
		SourceTag::Remote
	}

	fn search<'a>(
		&'a self,
		_query: &'a Query,
		_limit: usize,
	) -> BoxFuture<'a, Result<Vec<CandidateDocument>>> {
		panic!("remote client crashed")
	}

	fn upsert<'a>(
		&'a self,
		_id: &'a str,
		_content: &'a str,
		_metadata: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Ok(()) })
	}
}

fn engine() -> FusionEngine {
	FusionEngine::new(scout_config::Fusion::default())
}

#[tokio::test]
async fn crashed_search_task_is_reported_as_a_failure() {
	let local: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Local,
		vec![doc("visa.md", "Tourist visas allow stays of up to 90 days.", SourceTag::Local, Some(0.2))],
	));
	let remote: Arc<dyn SourceAdapter> = Arc::new(PanickingAdapter);
	let output = engine()
		.fuse(
			&Query::new("visa stay duration"),
			&["visa".to_string()],
			&["How long can I stay on a tourist visa?".to_string()],
			&[local, remote],
		)
		.await;

	assert_eq!(output.combined.len(), 1);
	assert_eq!(output.failures.len(), 2);
	assert!(output.failures.iter().all(|failure| failure.source_tag == SourceTag::Remote));
	assert!(output.failures.iter().any(|failure| failure.search_mode == SearchMode::Keyword));
	assert!(output.failures.iter().any(|failure| failure.search_mode == SearchMode::Semantic));
}

#[tokio::test]
async fn unavailable_adapter_does_not_abort_fusion() {
	let local: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Local,
		vec![
			doc("visa.md", "Tourist visas allow stays of up to 90 days.", SourceTag::Local, Some(0.2)),
			doc("passport.md", "Passports must be valid for six months.", SourceTag::Local, Some(0.6)),
		],
	));
	let remote: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::failing(SourceTag::Remote));
	let output = engine()
		.fuse(
			&Query::new("visa stay duration"),
			&["visa".to_string(), "stay".to_string()],
			&["How long can I stay on a tourist visa?".to_string()],
			&[local, remote],
		)
		.await;

	assert!(!output.combined.is_empty());
	assert!(
		output
			.combined
			.results()
			.iter()
			.all(|result| result.document.source_tag == SourceTag::Local)
	);
	assert_eq!(output.failures.len(), 2);
	assert!(output.failures.iter().all(|failure| failure.source_tag == SourceTag::Remote));
	assert_eq!(output.combined.results()[0].document.id, "visa.md");
}

#[tokio::test]
async fn duplicates_collapse_to_the_best_score_and_output_is_bounded() {
	let docs: Vec<_> = (0..8)
		.map(|idx| {
			doc(
				&format!("doc-{idx}"),
				&format!("content {idx}"),
				SourceTag::Remote,
				Some(idx as f32 * 0.1),
			)
		})
		.collect();
	let remote: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(SourceTag::Remote, docs));
	let web: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Web,
		vec![doc("doc-0", "same id, different source", SourceTag::Web, None)],
	));
	let output = engine()
		.fuse(
			&Query::new("content"),
			&["content".to_string()],
			&["what content exists?".to_string(), "any content?".to_string()],
			&[remote, web],
		)
		.await;
	let results = output.combined.results();

	assert!(results.len() <= 5);
	assert!(
		results.windows(2).all(|pair| pair[0].relevance_score >= pair[1].relevance_score)
	);

	let mut keys: Vec<_> =
		results.iter().map(|result| (result.document.id.clone(), result.document.source_tag)).collect();

	keys.sort_by(|left, right| left.0.cmp(&right.0).then(left.1.priority().cmp(&right.1.priority())));
	keys.dedup();

	assert_eq!(keys.len(), results.len());
	assert_eq!(results[0].document.id, "doc-0");
	assert!((results[0].relevance_score - 1.0).abs() < 1e-6);
	assert!(output.semantic_results.len() > output.keyword_results.len());
}

#[tokio::test]
async fn missing_distance_ranks_last_instead_of_disappearing() {
	let web: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Web,
		vec![doc("https://example.com", "Paris is the capital of France.", SourceTag::Web, None)],
	));
	let local: Arc<dyn SourceAdapter> = Arc::new(FakeAdapter::serving(
		SourceTag::Local,
		vec![doc("far.md", "Unrelated notes.", SourceTag::Local, Some(1.4))],
	));
	let output =
		engine().fuse(&Query::new("capital of France"), &[], &[], &[local, web]).await;
	let ids: Vec<&str> =
		output.combined.results().iter().map(|result| result.document.id.as_str()).collect();

	// Both score 0.0; local outranks web on ties.
	assert_eq!(ids, vec!["far.md", "https://example.com"]);
}

#[tokio::test]
async fn blank_keywords_fall_back_to_the_query_text() {
	let adapter = Arc::new(FakeAdapter::serving(SourceTag::Local, Vec::new()));
	let shared: Arc<dyn SourceAdapter> = adapter.clone();

	engine().fuse(&Query::new("capital of France"), &[" ".to_string()], &[], &[shared]).await;

	assert_eq!(adapter.search_log(), vec!["capital of France".to_string()]);
}
