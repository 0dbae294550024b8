use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-text query issued against a knowledge source.
///
/// Queries are immutable once built; adapters only ever borrow them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
	text: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	filter: Option<QueryFilter>,
}
impl Query {
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into(), filter: None }
	}

	pub fn with_filter(text: impl Into<String>, filter: QueryFilter) -> Self {
		Self { text: text.into(), filter: Some(filter) }
	}

	/// Joins keywords into a single keyword query, dropping blanks.
	pub fn from_keywords<S>(keywords: &[S], filter: Option<QueryFilter>) -> Self
	where
		S: AsRef<str>,
	{
		let text = keywords
			.iter()
			.map(|keyword| keyword.as_ref().trim())
			.filter(|keyword| !keyword.is_empty())
			.collect::<Vec<_>>()
			.join(" ");

		Self { text, filter }
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn filter(&self) -> Option<&QueryFilter> {
		self.filter.as_ref()
	}

	pub fn is_blank(&self) -> bool {
		self.text.trim().is_empty()
	}
}

/// Exact-match metadata constraints. Every entry must match for a document to qualify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
	pub equals: BTreeMap<String, String>,
}
impl QueryFilter {
	pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
		self.equals.iter().all(|(key, value)| metadata.get(key) == Some(value))
	}

	pub fn is_empty(&self) -> bool {
		self.equals.is_empty()
	}
}
