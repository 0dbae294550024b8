use std::{collections::BTreeMap, sync::Arc};

use scout_config::{EmbeddingProviderConfig, RemoteSource};
use scout_domain::{CandidateDocument, Query, SourceTag};
use scout_storage::qdrant::QdrantStore;

use crate::{BoxFuture, EmbeddingProvider, Error, Result, SourceAdapter, sources};

/// Adapter over the remote Qdrant collection.
pub struct RemoteAdapter {
	store: QdrantStore,
	embedding_cfg: EmbeddingProviderConfig,
	embedding: Arc<dyn EmbeddingProvider>,
}
impl RemoteAdapter {
	/// Connects and creates the collection when it does not exist yet.
	pub async fn connect(
		cfg: &RemoteSource,
		embedding_cfg: EmbeddingProviderConfig,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Result<Self> {
		let store = QdrantStore::new(cfg)?;

		store.ensure_collection().await.map_err(|err| Error::unavailable(SourceTag::Remote, err))?;

		Ok(Self { store, embedding_cfg, embedding })
	}

	async fn search_inner(&self, query: &Query, limit: usize) -> Result<Vec<CandidateDocument>> {
		if query.is_blank() || limit == 0 {
			return Ok(Vec::new());
		}

		let vector = sources::embed_one(
			self.embedding.as_ref(),
			&self.embedding_cfg,
			SourceTag::Remote,
			query.text(),
		)
		.await?;
		let hits = self
			.store
			.query(vector, limit, query.filter())
			.await
			.map_err(|err| Error::unavailable(SourceTag::Remote, err))?;

		Ok(hits
			.into_iter()
			.map(|hit| CandidateDocument {
				id: hit.id,
				content: hit.content,
				source_tag: SourceTag::Remote,
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
		let vector = sources::embed_one(
			self.embedding.as_ref(),
			&self.embedding_cfg,
			SourceTag::Remote,
			content,
		)
		.await?;

		self.store.upsert(id, content, metadata, vector).await?;

		Ok(())
	}
}
impl SourceAdapter for RemoteAdapter {
	fn tag(&self) -> SourceTag {
		SourceTag::Remote
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
			self.store.delete(id).await?;

			Ok(())
		})
	}
}
