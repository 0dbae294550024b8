use std::{
	cmp::Ordering,
	collections::{BTreeMap, HashMap},
	fmt,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
	Local,
	Remote,
	Web,
}
impl SourceTag {
	/// Lower values win ties: local beats remote beats web.
	pub fn priority(self) -> u8 {
		match self {
			Self::Local => 0,
			Self::Remote => 1,
			Self::Web => 2,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Remote => "remote",
			Self::Web => "web",
		}
	}
}
impl fmt::Display for SourceTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	Keyword,
	Semantic,
}

/// A single hit produced by exactly one adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
	/// Unique within `source_tag`.
	pub id: String,
	pub content: String,
	pub source_tag: SourceTag,
	/// Cosine-domain distance in `[0, 2]` when the backing store reports one.
	pub distance: Option<f32>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
	pub document: CandidateDocument,
	/// In `[0, 1]`.
	pub relevance_score: f32,
	pub search_mode: SearchMode,
	/// 1-based position in the adapter's own result list.
	pub rank: u32,
}
impl RankedResult {
	pub fn new(document: CandidateDocument, search_mode: SearchMode, rank: u32) -> Self {
		let relevance_score = relevance_from_distance(document.distance);

		Self { document, relevance_score, search_mode, rank }
	}

	fn key(&self) -> (String, SourceTag) {
		(self.document.id.clone(), self.document.source_tag)
	}
}

/// Deduplicated, ordered, bounded result set.
///
/// Entries are unique by `(document.id, source_tag)`, sorted by relevance descending, then by
/// source priority, then by original rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedResultSet {
	results: Vec<RankedResult>,
}
impl CombinedResultSet {
	pub fn fuse<I>(candidates: I, top_n: usize) -> Self
	where
		I: IntoIterator<Item = RankedResult>,
	{
		let mut merged: Vec<RankedResult> = Vec::new();
		let mut by_key: HashMap<(String, SourceTag), usize> = HashMap::new();

		for candidate in candidates {
			match by_key.get(&candidate.key()) {
				Some(&idx) =>
					if candidate.relevance_score > merged[idx].relevance_score {
						merged[idx] = candidate;
					},
				None => {
					by_key.insert(candidate.key(), merged.len());
					merged.push(candidate);
				},
			}
		}

		merged.sort_by(|left, right| {
			cmp_f32_desc(left.relevance_score, right.relevance_score)
				.then_with(|| {
					left.document.source_tag.priority().cmp(&right.document.source_tag.priority())
				})
				.then_with(|| left.rank.cmp(&right.rank))
		});
		merged.truncate(top_n);

		Self { results: merged }
	}

	pub fn results(&self) -> &[RankedResult] {
		&self.results
	}

	pub fn len(&self) -> usize {
		self.results.len()
	}

	pub fn is_empty(&self) -> bool {
		self.results.is_empty()
	}

	pub fn contexts(&self) -> Vec<String> {
		self.results.iter().map(|result| result.document.content.clone()).collect()
	}
}

/// Maps a cosine-domain distance onto a `[0, 1]` relevance score.
///
/// Missing or non-finite distances rank at the bottom instead of being dropped.
pub fn relevance_from_distance(distance: Option<f32>) -> f32 {
	match distance {
		Some(distance) if distance.is_finite() => (1.0 - distance).clamp(0.0, 1.0),
		_ => 0.0,
	}
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
