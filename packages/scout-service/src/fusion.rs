use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tokio::task::JoinSet;

use scout_config::Fusion;
use scout_domain::{CandidateDocument, CombinedResultSet, Query, RankedResult, SearchMode, SourceTag};

use crate::{Error, Result, SourceAdapter};

/// One adapter call that failed and was left out of the fused result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
	pub source_tag: SourceTag,
	pub search_mode: SearchMode,
	pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionOutput {
	pub keyword_results: Vec<RankedResult>,
	pub semantic_results: Vec<RankedResult>,
	pub combined: CombinedResultSet,
	pub failures: Vec<SourceFailure>,
}
impl FusionOutput {
	/// Folds `other` in and re-ranks the combined set over everything seen so far.
	pub fn absorb(&mut self, other: FusionOutput, top_n: usize) {
		self.keyword_results.extend(other.keyword_results);
		self.semantic_results.extend(other.semantic_results);
		self.failures.extend(other.failures);
		self.combined = CombinedResultSet::fuse(
			self.keyword_results.iter().chain(self.semantic_results.iter()).cloned(),
			top_n,
		);
	}

	pub fn contexts(&self) -> Vec<String> {
		self.combined.contexts()
	}
}

struct Call {
	order: usize,
	source_tag: SourceTag,
	search_mode: SearchMode,
	result: Result<Vec<CandidateDocument>>,
}

/// Fans one request out over several adapters and merges what comes back.
#[derive(Debug, Clone)]
pub struct FusionEngine {
	cfg: Fusion,
}
impl FusionEngine {
	pub fn new(cfg: Fusion) -> Self {
		Self { cfg }
	}

	pub fn top_n(&self) -> usize {
		self.cfg.top_n as usize
	}

	/// Runs one keyword search and one semantic search per question against every adapter.
	///
	/// Calls run concurrently. A failing call contributes nothing and is reported in
	/// [`FusionOutput::failures`]; it never aborts the others. Blank keywords fall back to the
	/// query text.
	pub async fn fuse(
		&self,
		query: &Query,
		keywords: &[String],
		questions: &[String],
		adapters: &[Arc<dyn SourceAdapter>],
	) -> FusionOutput {
		let keyword_query = {
			let joined = Query::from_keywords(keywords, query.filter().cloned());

			if joined.is_blank() { query.clone() } else { joined }
		};
		let mut requests = vec![(keyword_query, SearchMode::Keyword, self.cfg.keyword_limit)];

		for question in questions.iter().filter(|question| !question.trim().is_empty()) {
			let semantic_query = match query.filter() {
				Some(filter) => Query::with_filter(question.trim(), filter.clone()),
				None => Query::new(question.trim()),
			};

			requests.push((semantic_query, SearchMode::Semantic, self.cfg.semantic_limit));
		}

		let mut tasks = JoinSet::new();
		let mut spawned = HashMap::new();
		let mut order = 0;

		for adapter in adapters {
			for (request, search_mode, limit) in &requests {
				let adapter = adapter.clone();
				let request = request.clone();
				let source_tag = adapter.tag();
				let search_mode = *search_mode;
				let limit = *limit as usize;
				let call_order = order;

				order += 1;

				let handle = tasks.spawn(async move {
					let result = adapter.search(&request, limit).await;

					Call { order: call_order, source_tag, search_mode, result }
				});

				spawned.insert(handle.id(), (call_order, source_tag, search_mode));
			}
		}

		let mut calls = Vec::with_capacity(order);
		let mut output = FusionOutput::default();

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok(call) => calls.push(call),
				Err(err) => {
					tracing::error!(error = %err, "Source search task did not complete.");

					if let Some((order, source_tag, search_mode)) = spawned.remove(&err.id()) {
						calls.push(Call {
							order,
							source_tag,
							search_mode,
							result: Err(Error::unavailable(
								source_tag,
								format!("search task did not complete: {err}"),
							)),
						});
					}
				},
			}
		}

		// Completion order is nondeterministic; restore submission order before ranking.
		calls.sort_by_key(|call| call.order);

		for call in calls {
			match call.result {
				Ok(docs) => {
					let ranked = rank(docs, call.source_tag, call.search_mode);

					match call.search_mode {
						SearchMode::Keyword => output.keyword_results.extend(ranked),
						SearchMode::Semantic => output.semantic_results.extend(ranked),
					}
				},
				Err(err) => {
					tracing::warn!(
						source = %call.source_tag,
						mode = ?call.search_mode,
						error = %err,
						"Source search failed; continuing without it."
					);

					output.failures.push(SourceFailure {
						source_tag: call.source_tag,
						search_mode: call.search_mode,
						message: err.to_string(),
					});
				},
			}
		}

		output.combined = CombinedResultSet::fuse(
			output.keyword_results.iter().chain(output.semantic_results.iter()).cloned(),
			self.top_n(),
		);

		tracing::debug!(
			keyword = output.keyword_results.len(),
			semantic = output.semantic_results.len(),
			combined = output.combined.len(),
			failures = output.failures.len(),
			"Fused source results."
		);

		output
	}
}

pub(crate) fn rank(
	docs: Vec<CandidateDocument>,
	source_tag: SourceTag,
	search_mode: SearchMode,
) -> Vec<RankedResult> {
	docs.into_iter()
		.filter(|doc| !doc.content.trim().is_empty())
		.enumerate()
		.map(|(idx, mut doc)| {
			doc.source_tag = source_tag;

			RankedResult::new(doc, search_mode, idx as u32 + 1)
		})
		.collect()
}
