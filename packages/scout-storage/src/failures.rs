use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use tokio::{fs, io::AsyncWriteExt};

use crate::{Error, Result};
use scout_domain::FailureRecord;

const RECORD_FILE: &str = "record.json";

/// Write-once directory of failure records, one subdirectory per record.
///
/// Each record directory is named `<unix-seconds>-<record-id>`, so two failures of the same query
/// never share a location.
#[derive(Debug, Clone)]
pub struct FailureStore {
	dir: PathBuf,
}
impl FailureStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Writes `record` and returns its directory. Fails with [`Error::Conflict`] instead of
	/// overwriting an existing record.
	pub async fn persist(&self, record: &FailureRecord) -> Result<PathBuf> {
		fs::create_dir_all(&self.dir).await?;

		let record_dir =
			self.dir.join(format!("{}-{}", record.created_at.unix_timestamp(), record.id.simple()));

		match fs::create_dir(&record_dir).await {
			Ok(()) => {},
			Err(err) if err.kind() == ErrorKind::AlreadyExists => {
				return Err(Error::Conflict(format!(
					"Failure record {} already exists at {}.",
					record.id,
					record_dir.display()
				)));
			},
			Err(err) => return Err(err.into()),
		}

		write_new(&record_dir.join("query.txt"), record.query.as_bytes()).await?;
		write_new(&record_dir.join("text.txt"), record.answer.as_bytes()).await?;
		write_new(&record_dir.join("rag.txt"), record.retrieval_context.join("\n\n").as_bytes())
			.await?;

		// record.json is written last; list() treats its presence as "complete".
		let raw = serde_json::to_vec_pretty(record)?;
		let tmp = record_dir.join(format!("{RECORD_FILE}.tmp"));

		write_new(&tmp, &raw).await?;
		fs::rename(&tmp, record_dir.join(RECORD_FILE)).await?;

		tracing::info!(
			record_id = %record.id,
			score = record.score,
			path = %record_dir.display(),
			"Persisted failure record."
		);

		Ok(record_dir)
	}

	/// All complete records, oldest first.
	pub async fn list(&self) -> Result<Vec<FailureRecord>> {
		let mut entries = match fs::read_dir(&self.dir).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(err.into()),
		};
		let mut records = Vec::new();

		while let Some(entry) = entries.next_entry().await? {
			if !entry.file_type().await?.is_dir() {
				continue;
			}

			let path = entry.path().join(RECORD_FILE);
			let raw = match fs::read(&path).await {
				Ok(raw) => raw,
				Err(err) if err.kind() == ErrorKind::NotFound => continue,
				Err(err) => return Err(err.into()),
			};

			match serde_json::from_slice::<FailureRecord>(&raw) {
				Ok(record) => records.push(record),
				Err(err) => {
					tracing::warn!(
						error = %err,
						path = %path.display(),
						"Skipping unreadable failure record."
					);
				},
			}
		}

		records.sort_by(|left, right| {
			left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
		});

		Ok(records)
	}
}

async fn write_new(path: &Path, bytes: &[u8]) -> Result<()> {
	let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path).await?;

	file.write_all(bytes).await?;
	file.flush().await?;

	Ok(())
}
