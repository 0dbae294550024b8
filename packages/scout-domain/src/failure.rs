use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Evidence of a low-scoring answer, kept for offline correction.
///
/// Records are write-once and self-contained: nothing in them refers back to live session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
	pub id: Uuid,
	pub query: String,
	pub answer: String,
	pub retrieval_context: Vec<String>,
	pub score: f32,
	#[serde(default)]
	pub reason: Option<String>,
	pub metric: String,
	/// Groups repeated failures of the same query without making them collide.
	pub fingerprint: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl FailureRecord {
	pub fn new(
		query: impl Into<String>,
		answer: impl Into<String>,
		retrieval_context: Vec<String>,
		score: f32,
		reason: Option<String>,
		metric: impl Into<String>,
	) -> Self {
		let query = query.into();
		let fingerprint = query_fingerprint(&query);

		Self {
			id: Uuid::new_v4(),
			query,
			answer: answer.into(),
			retrieval_context,
			score,
			reason,
			metric: metric.into(),
			fingerprint,
			created_at: OffsetDateTime::now_utc(),
		}
	}
}

pub fn query_fingerprint(query: &str) -> String {
	let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

	blake3::hash(normalized.as_bytes()).to_hex().to_string()
}
