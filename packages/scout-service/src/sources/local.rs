use std::{collections::BTreeMap, sync::Arc};

use scout_config::{EmbeddingProviderConfig, LocalSource};
use scout_domain::{CandidateDocument, Query, SourceTag};
use scout_storage::local::{LocalDocument, LocalIndex};

use crate::{BoxFuture, EmbeddingProvider, Result, SourceAdapter, sources};

/// Adapter over the on-disk [`LocalIndex`].
pub struct LocalAdapter {
	index: LocalIndex,
	embedding_cfg: EmbeddingProviderConfig,
	embedding: Arc<dyn EmbeddingProvider>,
}
impl LocalAdapter {
	pub async fn open(
		cfg: &LocalSource,
		embedding_cfg: EmbeddingProviderConfig,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Result<Self> {
		let index = LocalIndex::open(&cfg.path, &cfg.collection, embedding_cfg.dimensions).await?;

		Ok(Self::from_index(index, embedding_cfg, embedding))
	}

	pub fn from_index(
		index: LocalIndex,
		embedding_cfg: EmbeddingProviderConfig,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { index, embedding_cfg, embedding }
	}

	pub fn index(&self) -> &LocalIndex {
		&self.index
	}

	async fn search_inner(&self, query: &Query, limit: usize) -> Result<Vec<CandidateDocument>> {
		if query.is_blank() || limit == 0 || self.index.is_empty().await {
			return Ok(Vec::new());
		}

		let vector = sources::embed_one(
			self.embedding.as_ref(),
			&self.embedding_cfg,
			SourceTag::Local,
			query.text(),
		)
		.await?;
		let hits = self.index.query(&vector, limit, query.filter()).await?;

		Ok(hits
			.into_iter()
			.map(|hit| CandidateDocument {
				id: hit.id,
				content: hit.content,
				source_tag: SourceTag::Local,
				distance: Some(hit.distance),
				metadata: hit.metadata,
			})
			.collect())
	}

	async fn upsert_inner(
		&self,
		id: &str,
		content: &str,
		metadata: &BTreeMap<String, String>,
	) -> Result<()> {
		let vector =
			sources::embed_one(self.embedding.as_ref(), &self.embedding_cfg, SourceTag::Local, content)
				.await?;

		self.index
			.upsert(LocalDocument {
				id: id.to_string(),
				content: content.to_string(),
				metadata: metadata.clone(),
				vector,
			})
			.await?;

		Ok(())
	}
}
impl SourceAdapter for LocalAdapter {
	fn tag(&self) -> SourceTag {
		SourceTag::Local
	}

	fn search<'a>(
		&'a self,
		query: &'a Query,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<CandidateDocument>>> {
		Box::pin(self.search_inner(query, limit))
	}

	fn upsert<'a>(
		&'a self,
		id: &'a str,
		content: &'a str,
		metadata: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_inner(id, content, metadata))
	}

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if !self.index.delete(id).await? {
				tracing::debug!(id, "Local delete found nothing to remove.");
			}

			Ok(())
		})
	}
}
