use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
	time::UNIX_EPOCH,
};

use tokio::fs;

use crate::{Error, Result, SourceAdapter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
	pub added: Vec<String>,
	/// One entry per file that could not be ingested, prefixed with its path.
	pub errors: Vec<String>,
}
impl IngestReport {
	pub fn is_success(&self) -> bool {
		self.errors.is_empty()
	}
}

/// Ingests every regular file under `dir`. Per-file failures are collected, not raised.
pub async fn ingest_folder(
	adapter: &dyn SourceAdapter,
	dir: &Path,
	recursive: bool,
) -> Result<IngestReport> {
	match fs::metadata(dir).await {
		Ok(meta) if meta.is_dir() => {},
		_ => {
			return Err(Error::InvalidRequest {
				message: format!("Invalid folder path: {}.", dir.display()),
			});
		},
	}

	let files = collect_files(dir, recursive).await?;

	Ok(ingest_files(adapter, &files).await)
}

pub async fn ingest_files(adapter: &dyn SourceAdapter, paths: &[PathBuf]) -> IngestReport {
	let mut report = IngestReport::default();

	for path in paths {
		match ingest_file(adapter, path).await {
			Ok(id) => report.added.push(id),
			Err(err) => {
				tracing::warn!(path = %path.display(), error = %err, "Failed to ingest file.");

				report.errors.push(format!("{}: {err}", path.display()));
			},
		}
	}

	tracing::info!(
		source = %adapter.tag(),
		added = report.added.len(),
		errors = report.errors.len(),
		"Ingestion finished."
	);

	report
}

/// Upserts one file under its path and returns the document id.
pub async fn ingest_file(adapter: &dyn SourceAdapter, path: &Path) -> Result<String> {
	let meta = fs::metadata(path).await.map_err(|err| Error::InvalidRequest {
		message: format!("File not found: {err}."),
	})?;

	if !meta.is_file() {
		return Err(Error::InvalidRequest { message: "Not a regular file.".to_string() });
	}

	let raw = fs::read(path).await.map_err(|err| Error::Storage { message: err.to_string() })?;
	let content = String::from_utf8(raw).map_err(|_| Error::InvalidRequest {
		message: "File is not valid UTF-8 text.".to_string(),
	})?;

	if content.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "File is empty.".to_string() });
	}

	let id = path.to_string_lossy().into_owned();
	let modified = meta
		.modified()
		.ok()
		.and_then(|time| time.duration_since(UNIX_EPOCH).ok())
		.map(|duration| duration.as_secs())
		.unwrap_or_default();
	let extension = path
		.extension()
		.map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
		.unwrap_or_default();
	let metadata = BTreeMap::from([
		("source".to_string(), id.clone()),
		("size".to_string(), meta.len().to_string()),
		("modified".to_string(), modified.to_string()),
		("extension".to_string(), extension),
	]);

	adapter.upsert(&id, &content, &metadata).await?;

	Ok(id)
}

/// Removes a previously ingested document. Unknown ids are not an error.
pub async fn forget(adapter: &dyn SourceAdapter, id: &str) -> Result<()> {
	adapter.delete(id).await
}

async fn collect_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
	let mut pending = vec![dir.to_path_buf()];
	let mut files = Vec::new();

	while let Some(current) = pending.pop() {
		let mut entries = fs::read_dir(&current)
			.await
			.map_err(|err| Error::Storage { message: format!("{}: {err}", current.display()) })?;

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|err| Error::Storage { message: format!("{}: {err}", current.display()) })?
		{
			let Ok(file_type) = entry.file_type().await else { continue };

			if file_type.is_dir() {
				if recursive {
					pending.push(entry.path());
				}
			} else if file_type.is_file() {
				files.push(entry.path());
			}
		}
	}

	files.sort();

	Ok(files)
}
