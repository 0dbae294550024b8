mod error;

pub use error::{Error, Result};

use std::{
	env, fs,
	net::SocketAddr,
	path::{Path, PathBuf},
	time::Duration,
};

use axum::Router;
use qdrant_client::Qdrant;
use tokio::{net::TcpListener, task::JoinHandle, time};
use uuid::Uuid;

pub fn env_qdrant_url() -> Option<String> {
	env::var("SCOUT_QDRANT_URL").ok()
}

/// Uniquely named scratch directory, removed on drop.
pub struct TestDir {
	path: PathBuf,
}
impl TestDir {
	pub fn new(prefix: &str) -> Result<Self> {
		let path = env::temp_dir().join(format!("{prefix}_{}", Uuid::new_v4().simple()));

		fs::create_dir_all(&path)?;

		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn join(&self, name: &str) -> PathBuf {
		self.path.join(name)
	}
}
impl Drop for TestDir {
	fn drop(&mut self) {
		if let Err(err) = fs::remove_dir_all(&self.path)
			&& err.kind() != std::io::ErrorKind::NotFound
		{
			eprintln!("Test directory cleanup failed for {:?}: {err}.", self.path);
		}
	}
}

/// An `axum` router served on an ephemeral loopback port for the lifetime of the value.
pub struct StubServer {
	addr: SocketAddr,
	handle: JoinHandle<()>,
}
impl StubServer {
	pub async fn start(router: Router) -> Result<Self> {
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let handle = tokio::spawn(async move {
			if let Err(err) = axum::serve(listener, router).await {
				eprintln!("Stub server stopped: {err}.");
			}
		});

		Ok(Self { addr, handle })
	}

	pub fn base_url(&self) -> String {
		format!("http://{}", self.addr)
	}
}
impl Drop for StubServer {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

/// Base URL on loopback where nothing is listening.
pub async fn closed_base_url() -> Result<String> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;

	drop(listener);

	Ok(format!("http://{addr}"))
}

/// Deterministic bag-of-words embedding. Texts sharing words land close together under cosine
/// distance, which is all retrieval tests need.
pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
	let dimensions = dimensions.max(1);
	let mut vec = vec![0.0_f32; dimensions];

	for token in text
		.split(|ch: char| !ch.is_alphanumeric())
		.filter(|token| !token.is_empty())
		.map(str::to_lowercase)
	{
		let hash = blake3::hash(token.as_bytes());
		let bytes = hash.as_bytes();
		let mut index_bytes = [0_u8; 8];

		index_bytes.copy_from_slice(&bytes[..8]);

		let index = (u64::from_le_bytes(index_bytes) % dimensions as u64) as usize;

		vec[index] += 1.0;
	}

	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vec {
			*value /= norm;
		}
	}

	vec
}

/// Qdrant collection name scoped to one test run. Call [`TestCollection::cleanup`] when done.
pub struct TestCollection {
	name: String,
	url: String,
}
impl TestCollection {
	pub fn new(url: &str, prefix: &str) -> Self {
		Self { name: format!("{prefix}_{}", Uuid::new_v4().simple()), url: url.to_string() }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn cleanup(self) -> Result<()> {
		let client = Qdrant::from_url(&self.url)
			.build()
			.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
		let max_attempts = 4;
		let mut backoff = Duration::from_millis(100);

		for attempt in 1..=max_attempts {
			match time::timeout(Duration::from_secs(10), client.delete_collection(self.name.clone()))
				.await
			{
				Ok(Ok(_)) => return Ok(()),
				Ok(Err(err)) =>
					if attempt == max_attempts {
						return Err(Error::Message(format!(
							"Failed to delete Qdrant collection {:?} after {attempt} attempts: {err}.",
							self.name
						)));
					},
				Err(_) =>
					if attempt == max_attempts {
						return Err(Error::Message(format!(
							"Timed out deleting Qdrant collection {:?} after {attempt} attempts.",
							self.name
						)));
					},
			}

			time::sleep(backoff).await;

			backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
		}

		Ok(())
	}
}
