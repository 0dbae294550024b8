pub mod failures;
pub mod local;
pub mod qdrant;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::collections::BTreeMap;

/// A stored document as returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
	pub id: String,
	pub content: String,
	pub metadata: BTreeMap<String, String>,
	/// Cosine distance in `[0, 2]`.
	pub distance: f32,
}
