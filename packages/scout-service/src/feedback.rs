use std::{path::PathBuf, sync::Arc};

use tokio::task::JoinHandle;

use scout_config::{EvaluationProviderConfig, Feedback};
use scout_domain::FailureRecord;
use scout_providers::evaluation::EvaluationScore;
use scout_storage::failures::FailureStore;

use crate::{Error, EvaluationProvider, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
	Disabled,
	/// The evaluation service could not produce a score.
	Unscored { message: String },
	Passed { score: f32 },
	Captured { record: FailureRecord, path: PathBuf },
	/// The score was below threshold but the record could not be written.
	NotPersisted { score: f32, message: String },
}

/// Scores finished answers and keeps evidence of the bad ones.
pub struct FeedbackCapture {
	cfg: Feedback,
	evaluation_cfg: EvaluationProviderConfig,
	evaluator: Arc<dyn EvaluationProvider>,
	store: FailureStore,
}
impl FeedbackCapture {
	pub fn new(
		cfg: Feedback,
		evaluation_cfg: EvaluationProviderConfig,
		evaluator: Arc<dyn EvaluationProvider>,
	) -> Self {
		let store = FailureStore::new(cfg.dir.clone());

		Self { cfg, evaluation_cfg, evaluator, store }
	}

	pub fn store(&self) -> &FailureStore {
		&self.store
	}

	pub async fn evaluate(
		&self,
		query: &str,
		answer: &str,
		retrieval_context: &[String],
	) -> Result<EvaluationScore> {
		Ok(self.evaluator.score(&self.evaluation_cfg, query, answer, retrieval_context).await?)
	}

	/// Scores the answer and persists a record when it falls below the threshold.
	///
	/// Never fails: evaluation and persistence problems are logged and reported in the outcome.
	pub async fn capture(
		&self,
		query: &str,
		answer: &str,
		retrieval_context: Vec<String>,
	) -> FeedbackOutcome {
		if !self.cfg.enabled {
			return FeedbackOutcome::Disabled;
		}

		let score = match self.evaluate(query, answer, &retrieval_context).await {
			Ok(score) => score,
			Err(err) => {
				tracing::warn!(error = %err, "Answer evaluation failed; skipping feedback capture.");

				return FeedbackOutcome::Unscored { message: err.to_string() };
			},
		};

		if score.score >= self.cfg.threshold {
			tracing::debug!(score = score.score, "Answer passed evaluation.");

			return FeedbackOutcome::Passed { score: score.score };
		}

		let record = FailureRecord::new(
			query,
			answer,
			retrieval_context,
			score.score,
			score.reason,
			self.evaluation_cfg.metric.as_str(),
		);

		match self.store.persist(&record).await {
			Ok(path) => FeedbackOutcome::Captured { record, path },
			Err(err) => {
				let err = Error::Persistence { message: err.to_string() };

				tracing::error!(
					record_id = %record.id,
					score = record.score,
					error = %err,
					"Failed to persist failure record."
				);

				FeedbackOutcome::NotPersisted { score: record.score, message: err.to_string() }
			},
		}
	}

	/// Runs [`FeedbackCapture::capture`] in the background. The caller may ignore the handle.
	pub fn submit(
		self: &Arc<Self>,
		query: String,
		answer: String,
		retrieval_context: Vec<String>,
	) -> JoinHandle<FeedbackOutcome> {
		let capture = self.clone();

		tokio::spawn(async move { capture.capture(&query, &answer, retrieval_context).await })
	}
}
