use std::{
	cmp::Ordering,
	collections::BTreeMap,
	io::ErrorKind,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::{fs, sync::RwLock};
use uuid::Uuid;

use crate::{Error, Result, StoredHit};
use scout_domain::QueryFilter;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDocument {
	pub id: String,
	pub content: String,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
	pub vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
	version: u32,
	vector_dim: u32,
	documents: Vec<LocalDocument>,
}

/// File-backed cosine index for one collection.
///
/// Reads share the lock. Writes hold it exclusively through the snapshot rename, so writes to
/// the same id land in completion order.
pub struct LocalIndex {
	path: PathBuf,
	vector_dim: u32,
	docs: RwLock<BTreeMap<String, LocalDocument>>,
}
impl LocalIndex {
	pub async fn open(dir: &Path, collection: &str, vector_dim: u32) -> Result<Self> {
		if vector_dim == 0 {
			return Err(Error::InvalidArgument("vector_dim must be greater than zero.".to_string()));
		}

		fs::create_dir_all(dir).await?;

		let path = dir.join(format!("{collection}.json"));
		let docs = match fs::read(&path).await {
			Ok(raw) => {
				let snapshot: Snapshot = serde_json::from_slice(&raw)?;

				if snapshot.vector_dim != vector_dim {
					return Err(Error::Conflict(format!(
						"Collection {collection:?} was built with vector_dim {} but {vector_dim} was requested.",
						snapshot.vector_dim
					)));
				}

				snapshot.documents.into_iter().map(|doc| (doc.id.clone(), doc)).collect()
			},
			Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
			Err(err) => return Err(err.into()),
		};

		tracing::debug!(path = %path.display(), "Opened local index.");

		Ok(Self { path, vector_dim, docs: RwLock::new(docs) })
	}

	pub fn vector_dim(&self) -> u32 {
		self.vector_dim
	}

	pub async fn len(&self) -> usize {
		self.docs.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.docs.read().await.is_empty()
	}

	pub async fn get(&self, id: &str) -> Option<LocalDocument> {
		self.docs.read().await.get(id).cloned()
	}

	/// Inserts or replaces the document stored under `doc.id`.
	pub async fn upsert(&self, doc: LocalDocument) -> Result<()> {
		self.check_dim(&doc.vector)?;

		let mut docs = self.docs.write().await;
		let previous = docs.insert(doc.id.clone(), doc.clone());

		if let Err(err) = self.persist(&docs).await {
			match previous {
				Some(previous) => docs.insert(doc.id.clone(), previous),
				None => docs.remove(&doc.id),
			};

			return Err(err);
		}

		Ok(())
	}

	/// Removes `id`. Returns whether anything was stored under it.
	pub async fn delete(&self, id: &str) -> Result<bool> {
		let mut docs = self.docs.write().await;
		let Some(previous) = docs.remove(id) else { return Ok(false) };

		if let Err(err) = self.persist(&docs).await {
			docs.insert(id.to_string(), previous);

			return Err(err);
		}

		Ok(true)
	}

	pub async fn query(
		&self,
		vector: &[f32],
		limit: usize,
		filter: Option<&QueryFilter>,
	) -> Result<Vec<StoredHit>> {
		self.check_dim(vector)?;

		let docs = self.docs.read().await;
		let mut hits: Vec<StoredHit> = docs
			.values()
			.filter(|doc| filter.map(|filter| filter.matches(&doc.metadata)).unwrap_or(true))
			.map(|doc| StoredHit {
				id: doc.id.clone(),
				content: doc.content.clone(),
				metadata: doc.metadata.clone(),
				distance: cosine_distance(vector, &doc.vector),
			})
			.collect();

		hits.sort_by(|left, right| {
			left.distance
				.partial_cmp(&right.distance)
				.unwrap_or(Ordering::Equal)
				.then_with(|| left.id.cmp(&right.id))
		});
		hits.truncate(limit);

		Ok(hits)
	}

	fn check_dim(&self, vector: &[f32]) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector has {} dimensions; index expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		Ok(())
	}

	async fn persist(&self, docs: &BTreeMap<String, LocalDocument>) -> Result<()> {
		let snapshot = Snapshot {
			version: SNAPSHOT_VERSION,
			vector_dim: self.vector_dim,
			documents: docs.values().cloned().collect(),
		};
		let raw = serde_json::to_vec(&snapshot)?;
		let tmp = self.path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));

		fs::write(&tmp, raw).await?;

		if let Err(err) = fs::rename(&tmp, &self.path).await {
			let _ = fs::remove_file(&tmp).await;

			return Err(err.into());
		}

		Ok(())
	}
}

/// `1 - cos(a, b)`, in `[0, 2]`. A zero vector is treated as orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b.iter()) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0)
}
