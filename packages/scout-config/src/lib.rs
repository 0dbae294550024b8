mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, EmbeddingProviderConfig, EvaluationProviderConfig, Feedback, Fusion,
	LlmProviderConfig, LocalSource, Providers, RemoteSource, Service, Sources, WebSource,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, api_base, model) in [
		("llm", &cfg.providers.llm.api_base, &cfg.providers.llm.model),
		("embedding", &cfg.providers.embedding.api_base, &cfg.providers.embedding.model),
		("evaluation", &cfg.providers.evaluation.api_base, &cfg.providers.evaluation.metric),
	] {
		if api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_base must be non-empty."),
			});
		}
		if model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} model must be non-empty."),
			});
		}
	}

	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number zero or greater."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.sources.local.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "sources.local.collection must be non-empty.".to_string(),
		});
	}

	if let Some(remote) = cfg.sources.remote.as_ref() {
		if remote.url.trim().is_empty() || remote.collection.trim().is_empty() {
			return Err(Error::Validation {
				message: "sources.remote.url and sources.remote.collection must be non-empty."
					.to_string(),
			});
		}
		if remote.vector_dim != cfg.providers.embedding.dimensions {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must match sources.remote.vector_dim."
					.to_string(),
			});
		}
	}
	if let Some(web) = cfg.sources.web.as_ref() {
		if web.base_url.trim().is_empty() {
			return Err(Error::Validation {
				message: "sources.web.base_url must be non-empty.".to_string(),
			});
		}
		if web.max_retries == 0 {
			return Err(Error::Validation {
				message: "sources.web.max_retries must be greater than zero.".to_string(),
			});
		}
		if web.max_results == 0 {
			return Err(Error::Validation {
				message: "sources.web.max_results must be greater than zero.".to_string(),
			});
		}

		for (label, command) in
			[("start_command", &web.start_command), ("stop_command", &web.stop_command)]
		{
			if let Some(argv) = command
				&& argv.first().map(|program| program.trim().is_empty()).unwrap_or(true)
			{
				return Err(Error::Validation {
					message: format!("sources.web.{label} must name a program."),
				});
			}
		}
	}

	if cfg.fusion.top_n == 0 {
		return Err(Error::Validation {
			message: "fusion.top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.fusion.keyword_limit == 0 || cfg.fusion.semantic_limit == 0 {
		return Err(Error::Validation {
			message: "fusion.keyword_limit and fusion.semantic_limit must be greater than zero."
				.to_string(),
		});
	}
	if cfg.agent.max_iterations == 0 {
		return Err(Error::Validation {
			message: "agent.max_iterations must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.history_max_turns < 2 {
		return Err(Error::Validation {
			message: "agent.history_max_turns must be at least 2.".to_string(),
		});
	}
	if cfg.agent.turn_max_chars == 0 {
		return Err(Error::Validation {
			message: "agent.turn_max_chars must be greater than zero.".to_string(),
		});
	}
	if !cfg.feedback.threshold.is_finite() {
		return Err(Error::Validation {
			message: "feedback.threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.feedback.threshold) {
		return Err(Error::Validation {
			message: "feedback.threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.feedback.enabled && cfg.feedback.dir.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "feedback.dir must be non-empty when feedback is enabled.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(web) = cfg.sources.web.as_mut() {
		if web.start_command.as_ref().map(|argv| argv.is_empty()).unwrap_or(false) {
			web.start_command = None;
		}
		if web.stop_command.as_ref().map(|argv| argv.is_empty()).unwrap_or(false) {
			web.stop_command = None;
		}

		web.base_url = web.base_url.trim_end_matches('/').to_string();
	}

	for api_base in [
		&mut cfg.providers.llm.api_base,
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.evaluation.api_base,
	] {
		*api_base = api_base.trim_end_matches('/').to_string();
	}
}
