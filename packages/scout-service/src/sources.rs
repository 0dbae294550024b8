pub mod local;
pub mod remote;
pub mod web;

use std::collections::BTreeMap;

use scout_config::EmbeddingProviderConfig;
use scout_domain::{CandidateDocument, Query, SourceTag};

use crate::{BoxFuture, EmbeddingProvider, Error, Result};

/// Uniform contract over one knowledge source.
///
/// `search` returns an empty list when nothing matches and fails with
/// [`Error::SourceUnavailable`] only when the backing service cannot be reached. `upsert` replaces
/// whatever was stored under the id and `delete` of an unknown id succeeds.
pub trait SourceAdapter
where
	Self: Send + Sync,
{
	fn tag(&self) -> SourceTag;

	fn search<'a>(
		&'a self,
		query: &'a Query,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<CandidateDocument>>>;

	fn upsert<'a>(
		&'a self,
		id: &'a str,
		content: &'a str,
		metadata: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;
}

pub(crate) async fn embed_one(
	provider: &dyn EmbeddingProvider,
	cfg: &EmbeddingProviderConfig,
	source_tag: SourceTag,
	text: &str,
) -> Result<Vec<f32>> {
	let texts = [text.to_string()];
	let vectors = provider.embed(cfg, &texts).await.map_err(|err| {
		if err.is_unreachable() { Error::unavailable(source_tag, err) } else { err.into() }
	})?;
	let Some(vector) = vectors.into_iter().next() else {
		return Err(Error::Provider { message: "Embedding provider returned no vectors.".to_string() });
	};

	if vector.len() != cfg.dimensions as usize {
		return Err(Error::Provider {
			message: format!(
				"Embedding has {} dimensions; expected {}.",
				vector.len(),
				cfg.dimensions
			),
		});
	}

	Ok(vector)
}
