use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use scout_config::Config;
use scout_domain::Query;
use scout_service::{
	EscalationJudge, FeedbackCapture, FeedbackOutcome, LocalAdapter, LoopOutcome, Orchestrator,
	Providers, RemoteAdapter, SourceAdapter, ToolRegistry, WebAdapter, WebEngine, ingest,
};
use scout_storage::failures::FailureStore;

#[derive(Debug, Parser)]
#[command(
	version = scout_cli::VERSION,
	rename_all = "kebab",
	styles = scout_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Answer a question with the retrieval agent.
	Ask {
		query: String,
		/// Print the full outcome as JSON instead of the bare answer.
		#[arg(long)]
		json: bool,
	},
	/// Add a file, or every file in a folder, to a knowledge source.
	Ingest {
		#[arg(value_name = "PATH")]
		path: PathBuf,
		#[arg(long, short = 'r')]
		recursive: bool,
		#[arg(long, value_enum, default_value_t = Target::Local)]
		target: Target,
	},
	/// Remove a document from a knowledge source.
	Forget {
		id: String,
		#[arg(long, value_enum, default_value_t = Target::Local)]
		target: Target,
	},
	/// List captured failure records.
	Failures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
	Local,
	Remote,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = scout_config::load(&args.config)?;

	init_tracing(&config);

	let providers = Providers::default();

	match args.command {
		Command::Ask { query, json } => ask(&config, &providers, &query, json).await,
		Command::Ingest { path, recursive, target } => {
			let adapter = open_target(&config, &providers, target).await?;
			let report = if path.is_dir() {
				ingest::ingest_folder(adapter.as_ref(), &path, recursive).await?
			} else {
				ingest::ingest_files(adapter.as_ref(), std::slice::from_ref(&path)).await
			};

			for id in &report.added {
				println!("added {id}");
			}
			for error in &report.errors {
				eprintln!("failed {error}");
			}

			if report.is_success() {
				Ok(())
			} else {
				Err(eyre::eyre!("{} file(s) failed to ingest.", report.errors.len()))
			}
		},
		Command::Forget { id, target } => {
			let adapter = open_target(&config, &providers, target).await?;

			ingest::forget(adapter.as_ref(), &id).await?;

			println!("forgot {id}");

			Ok(())
		},
		Command::Failures => {
			let records = FailureStore::new(config.feedback.dir.clone()).list().await?;

			println!("{}", serde_json::to_string_pretty(&records)?);

			Ok(())
		},
	}
}

async fn ask(
	config: &Config,
	providers: &Providers,
	query: &str,
	as_json: bool,
) -> color_eyre::Result<()> {
	let llm = config.providers.llm.clone();
	let local: Arc<dyn SourceAdapter> = Arc::new(
		LocalAdapter::open(
			&config.sources.local,
			config.providers.embedding.clone(),
			providers.embedding.clone(),
		)
		.await?,
	);
	let mut knowledge = vec![local];

	if let Some(remote) = &config.sources.remote {
		match RemoteAdapter::connect(
			remote,
			config.providers.embedding.clone(),
			providers.embedding.clone(),
		)
		.await
		{
			Ok(adapter) => knowledge.push(Arc::new(adapter)),
			Err(err) => {
				tracing::warn!(error = %err, "Remote source unavailable; continuing without it.")
			},
		}
	}

	let mut registry = ToolRegistry::new(config.fusion.clone(), knowledge);
	let mut web_source = None;

	if let Some(web) = &config.sources.web {
		let web_engine = WebEngine::from_config(web.clone());

		match web_engine.acquire().await {
			Ok(lease) => {
				let adapter = Arc::new(WebAdapter::new(web.clone(), lease));
				let judge = EscalationJudge::new(llm.clone(), providers.chat.clone());

				registry = registry.with_web(adapter.clone(), judge, web.max_results as usize);
				web_source = Some((web_engine, adapter));
			},
			Err(err) => {
				tracing::warn!(error = %err, "Web source unavailable; continuing without it.")
			},
		}
	}

	let orchestrator =
		Orchestrator::new(llm, providers.chat.clone(), Arc::new(registry), config.agent.clone());
	let outcome = orchestrator.run(&Query::new(query)).await;

	// The registry holds the other reference to the web adapter.
	drop(orchestrator);

	if let Some((web_engine, adapter)) = web_source {
		match Arc::try_unwrap(adapter) {
			Ok(adapter) => adapter.close().await,
			Err(_) => {
				tracing::warn!("Web adapter is still shared; shutting the engine down directly.");

				web_engine.shutdown().await;
			},
		}
	}

	let feedback = match &outcome {
		LoopOutcome::Done(completion) => {
			let capture = Arc::new(FeedbackCapture::new(
				config.feedback.clone(),
				config.providers.evaluation.clone(),
				providers.evaluation.clone(),
			));

			Some(capture.submit(
				query.to_string(),
				completion.answer.clone(),
				completion.retrieval_context(),
			))
		},
		LoopOutcome::MaxIterationsReached(_) => None,
	};

	print_outcome(&outcome, as_json)?;

	if let Some(handle) = feedback {
		match handle.await {
			Ok(FeedbackOutcome::Captured { path, record }) => tracing::info!(
				path = %path.display(),
				score = record.score,
				"Answer scored below threshold; failure record captured."
			),
			Ok(other) => tracing::debug!(outcome = ?other, "Feedback capture finished."),
			Err(err) => tracing::error!(error = %err, "Feedback capture task failed."),
		}
	}
	Ok(())
}

async fn open_target(
	config: &Config,
	providers: &Providers,
	target: Target,
) -> color_eyre::Result<Box<dyn SourceAdapter>> {
	let embedding_cfg = config.providers.embedding.clone();

	match target {
		Target::Local => Ok(Box::new(
			LocalAdapter::open(&config.sources.local, embedding_cfg, providers.embedding.clone())
				.await?,
		)),
		Target::Remote => {
			let remote = config
				.sources
				.remote
				.as_ref()
				.ok_or_else(|| eyre::eyre!("sources.remote is not configured."))?;

			Ok(Box::new(
				RemoteAdapter::connect(remote, embedding_cfg, providers.embedding.clone()).await?,
			))
		},
	}
}

fn print_outcome(outcome: &LoopOutcome, as_json: bool) -> color_eyre::Result<()> {
	if as_json {
		let value = match outcome {
			LoopOutcome::Done(completion) => json!({
				"state": outcome.state(),
				"answer": completion.answer,
				"iterations": completion.iterations,
				"reasoning_calls": completion.reasoning_calls,
				"evidence": completion.evidence,
				"history": completion.history,
			}),
			LoopOutcome::MaxIterationsReached(partial) => json!({
				"state": outcome.state(),
				"last_reasoning": partial.last_reasoning,
				"iterations": partial.iterations,
				"reasoning_calls": partial.reasoning_calls,
				"evidence": partial.evidence,
				"history": partial.history,
			}),
		};

		println!("{}", serde_json::to_string_pretty(&value)?);

		return Ok(());
	}

	match outcome {
		LoopOutcome::Done(completion) => println!("{}", completion.answer),
		LoopOutcome::MaxIterationsReached(partial) => {
			eprintln!(
				"No final answer after {} iteration(s); showing the last reasoning.",
				partial.iterations
			);
			println!("{}", partial.last_reasoning.as_deref().unwrap_or_default());
		},
	}

	Ok(())
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
