use reqwest::StatusCode;
use serde_json::Value;

use crate::{Error, Result};

/// One result from the meta-search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct WebHit {
	pub url: String,
	pub title: String,
	pub content: String,
	pub engine: Option<String>,
}

pub async fn search(
	cfg: &scout_config::WebSource,
	query: &str,
	limit: usize,
) -> Result<Vec<WebHit>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}/search", cfg.base_url);
	let res = client.get(url).query(&[("q", query), ("format", "json")]).send().await?;
	let json: Value = res.error_for_status()?.json().await?;
	let mut hits = parse_search_response(&json)?;

	hits.truncate(limit);

	Ok(hits)
}

/// Readiness probe. `Ok(false)` means the engine answered but is not ready yet; an `Err`
/// means it could not be reached.
pub async fn probe(cfg: &scout_config::WebSource) -> Result<bool> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.base_url, cfg.health_path);
	let res = client.get(url).send().await?;

	Ok(matches!(res.status(), StatusCode::OK | StatusCode::NOT_FOUND))
}

fn parse_search_response(json: &Value) -> Result<Vec<WebHit>> {
	let results = json.get("results").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Web search response is missing results.".to_string() }
	})?;
	let mut hits = Vec::with_capacity(results.len());

	for answer in json.get("answers").and_then(|v| v.as_array()).into_iter().flatten() {
		let (content, url) = match answer {
			Value::String(text) => (text.clone(), String::new()),
			other => (
				other.get("answer").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
				other.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
			),
		};

		if !content.trim().is_empty() {
			hits.push(WebHit { url, title: "Direct answer".to_string(), content, engine: None });
		}
	}

	for item in results {
		let Some(url) = item.get("url").and_then(|v| v.as_str()) else {
			tracing::debug!("Web result missing url.");

			continue;
		};
		let title = item.get("title").and_then(|v| v.as_str()).unwrap_or_default();
		let content = item.get("content").and_then(|v| v.as_str()).unwrap_or_default();

		hits.push(WebHit {
			url: url.to_string(),
			title: title.to_string(),
			content: content.to_string(),
			engine: item.get("engine").and_then(|v| v.as_str()).map(str::to_string),
		});
	}

	Ok(hits)
}
