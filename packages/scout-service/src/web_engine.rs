use std::{sync::Arc, time::Duration};

use tokio::{process::Command, runtime::Handle, sync::Mutex, time};

use scout_config::WebSource;
use scout_providers::web;

use crate::{BoxFuture, Error, Result};

/// Provisions and tears down the process behind the web engine.
pub trait EngineLauncher
where
	Self: Send + Sync,
{
	fn start<'a>(&'a self) -> BoxFuture<'a, Result<()>>;

	fn stop<'a>(&'a self) -> BoxFuture<'a, Result<()>>;
}

/// Runs the configured argv for start and stop. A missing command means the engine is managed
/// elsewhere and the step is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher {
	pub start: Option<Vec<String>>,
	pub stop: Option<Vec<String>>,
}
impl CommandLauncher {
	pub fn from_config(cfg: &WebSource) -> Self {
		Self { start: cfg.start_command.clone(), stop: cfg.stop_command.clone() }
	}
}
impl EngineLauncher for CommandLauncher {
	fn start<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(run_command(self.start.as_deref()))
	}

	fn stop<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(run_command(self.stop.as_deref()))
	}
}

async fn run_command(argv: Option<&[String]>) -> Result<()> {
	let Some((program, args)) = argv.and_then(|argv| argv.split_first()) else {
		return Ok(());
	};
	let output = Command::new(program).args(args).output().await.map_err(|err| {
		Error::EngineUnavailable { message: format!("Failed to run {program:?}: {err}.") }
	})?;

	if !output.status.success() {
		return Err(Error::EngineUnavailable {
			message: format!(
				"{program:?} exited with {}: {}",
				output.status,
				String::from_utf8_lossy(&output.stderr).trim()
			),
		});
	}

	Ok(())
}

#[derive(Debug, Default)]
struct EngineState {
	leases: usize,
	running: bool,
	/// Bumped by [`WebEngine::shutdown`]; leases from an older generation no longer count.
	generation: u64,
}

/// The single web engine shared by every session of a running system.
///
/// Sessions take a [`WebEngineLease`]. The first lease provisions the engine and waits for it to
/// become healthy; releasing the last lease stops it.
pub struct WebEngine {
	cfg: WebSource,
	launcher: Arc<dyn EngineLauncher>,
	state: Mutex<EngineState>,
}
impl WebEngine {
	pub fn new(cfg: WebSource, launcher: Arc<dyn EngineLauncher>) -> Arc<Self> {
		Arc::new(Self { cfg, launcher, state: Mutex::new(EngineState::default()) })
	}

	pub fn from_config(cfg: WebSource) -> Arc<Self> {
		let launcher = Arc::new(CommandLauncher::from_config(&cfg));

		Self::new(cfg, launcher)
	}

	pub fn config(&self) -> &WebSource {
		&self.cfg
	}

	/// Takes a lease, starting the engine if nobody holds one yet.
	///
	/// Fails with [`Error::EngineUnavailable`] when the engine is still unhealthy after
	/// `max_retries` probes.
	pub async fn acquire(self: &Arc<Self>) -> Result<WebEngineLease> {
		let mut state = self.state.lock().await;

		if !state.running {
			if let Err(err) = self.launcher.start().await {
				tracing::warn!(error = %err, "Web engine start command failed; probing anyway.");
			}
			if let Err(err) = self.wait_until_ready().await {
				if let Err(stop_err) = self.launcher.stop().await {
					tracing::warn!(error = %stop_err, "Failed to stop unhealthy web engine.");
				}

				return Err(err);
			}

			state.running = true;

			tracing::info!(base_url = %self.cfg.base_url, "Web engine is ready.");
		}

		state.leases += 1;

		Ok(WebEngineLease { engine: self.clone(), generation: state.generation, released: false })
	}

	pub async fn lease_count(&self) -> usize {
		self.state.lock().await.leases
	}

	pub async fn is_running(&self) -> bool {
		self.state.lock().await.running
	}

	/// Stops the engine regardless of outstanding leases. Safe to call repeatedly.
	pub async fn shutdown(&self) {
		let mut state = self.state.lock().await;

		state.leases = 0;
		state.generation += 1;

		self.stop_locked(&mut state).await;
	}

	async fn release_one(&self, generation: u64) {
		let mut state = self.state.lock().await;

		if generation != state.generation {
			tracing::debug!(generation, "Ignoring a lease taken before the last shutdown.");

			return;
		}

		state.leases = state.leases.saturating_sub(1);

		if state.leases == 0 {
			self.stop_locked(&mut state).await;
		}
	}

	async fn stop_locked(&self, state: &mut EngineState) {
		if !state.running {
			return;
		}

		state.running = false;

		match self.launcher.stop().await {
			Ok(()) => tracing::info!("Web engine stopped."),
			Err(err) => tracing::error!(error = %err, "Failed to stop web engine."),
		}
	}

	async fn wait_until_ready(&self) -> Result<()> {
		let interval = Duration::from_millis(self.cfg.retry_interval_ms);
		let max_retries = self.cfg.max_retries.max(1);

		for attempt in 1..=max_retries {
			match web::probe(&self.cfg).await {
				Ok(true) => return Ok(()),
				Ok(false) => tracing::debug!(attempt, "Web engine answered but is not ready."),
				Err(err) => tracing::debug!(attempt, error = %err, "Web engine probe failed."),
			}

			if attempt < max_retries {
				time::sleep(interval).await;
			}
		}

		Err(Error::EngineUnavailable {
			message: format!(
				"{} did not become healthy after {max_retries} attempts.",
				self.cfg.base_url
			),
		})
	}
}

/// Scoped claim on the [`WebEngine`].
///
/// Prefer [`WebEngineLease::release`]. A lease dropped without it is released on the current
/// Tokio runtime in the background.
pub struct WebEngineLease {
	engine: Arc<WebEngine>,
	generation: u64,
	released: bool,
}
impl WebEngineLease {
	pub fn engine(&self) -> &Arc<WebEngine> {
		&self.engine
	}

	pub async fn release(mut self) {
		self.released = true;

		self.engine.release_one(self.generation).await;
	}
}
impl Drop for WebEngineLease {
	fn drop(&mut self) {
		if self.released {
			return;
		}

		let engine = self.engine.clone();
		let generation = self.generation;

		match Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move { engine.release_one(generation).await });
			},
			Err(_) => tracing::warn!("Web engine lease dropped outside a runtime; it was not released."),
		}
	}
}
