use std::collections::BTreeMap;

use scout_config::WebSource;
use scout_domain::{CandidateDocument, Query, SourceTag};
use scout_providers::web::{self, WebHit};

use crate::{BoxFuture, Error, Result, SourceAdapter, WebEngineLease};

/// Read-only adapter over the web meta-search engine.
///
/// Holding the adapter keeps its [`WebEngineLease`] alive; call [`WebAdapter::close`] to hand the
/// lease back.
pub struct WebAdapter {
	cfg: WebSource,
	lease: WebEngineLease,
}
impl WebAdapter {
	pub fn new(cfg: WebSource, lease: WebEngineLease) -> Self {
		Self { cfg, lease }
	}

	pub async fn close(self) {
		self.lease.release().await;
	}

	async fn search_inner(&self, query: &Query, limit: usize) -> Result<Vec<CandidateDocument>> {
		let limit = limit.min(self.cfg.max_results as usize);

		if query.is_blank() || limit == 0 {
			return Ok(Vec::new());
		}

		let hits = web::search(&self.cfg, query.text(), limit).await.map_err(|err| {
			if err.is_unreachable() { Error::unavailable(SourceTag::Web, err) } else { err.into() }
		})?;

		Ok(hits.into_iter().enumerate().map(|(idx, hit)| hit_to_candidate(idx, hit)).collect())
	}
}
impl SourceAdapter for WebAdapter {
	fn tag(&self) -> SourceTag {
		SourceTag::Web
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
		_id: &'a str,
		_content: &'a str,
		_metadata: &'a BTreeMap<String, String>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async {
			Err(Error::InvalidRequest { message: "The web source is read-only.".to_string() })
		})
	}

	fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async {
			Err(Error::InvalidRequest { message: "The web source is read-only.".to_string() })
		})
	}
}

fn hit_to_candidate(idx: usize, hit: WebHit) -> CandidateDocument {
	let id = if hit.url.is_empty() { format!("answer:{idx}") } else { hit.url.clone() };
	let mut metadata = BTreeMap::new();

	if !hit.url.is_empty() {
		metadata.insert("url".to_string(), hit.url);
	}
	if !hit.title.is_empty() {
		metadata.insert("title".to_string(), hit.title);
	}
	if let Some(engine) = hit.engine {
		metadata.insert("engine".to_string(), engine);
	}

	CandidateDocument { id, content: hit.content, source_tag: SourceTag::Web, distance: None, metadata }
}
