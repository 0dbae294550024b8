use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationScore {
	/// In `[0, 1]`.
	pub score: f32,
	pub reason: Option<String>,
}

pub async fn score(
	cfg: &scout_config::EvaluationProviderConfig,
	input: &str,
	actual_output: &str,
	retrieval_context: &[String],
) -> Result<EvaluationScore> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"metric": cfg.metric,
		"input": input,
		"actual_output": actual_output,
		"retrieval_context": retrieval_context,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_evaluation_response(&json)
}

fn parse_evaluation_response(json: &Value) -> Result<EvaluationScore> {
	let body = json.get("result").unwrap_or(json);
	let score = body.get("score").and_then(|v| v.as_f64()).ok_or_else(|| {
		Error::InvalidResponse { message: "Evaluation response is missing score.".to_string() }
	})? as f32;

	if !score.is_finite() || !(0.0..=1.0).contains(&score) {
		return Err(Error::InvalidResponse {
			message: format!("Evaluation score {score} is outside the range 0.0-1.0."),
		});
	}

	let reason = body.get("reason").and_then(|v| v.as_str()).map(str::to_string);

	Ok(EvaluationScore { score, reason })
}
