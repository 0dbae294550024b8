use std::collections::{BTreeMap, HashMap};

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
		PointStruct, PointsIdsList, Query, QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder,
		Value, VectorParamsBuilder, value::Kind,
	},
};
use uuid::Uuid;

use crate::{Error, Result, StoredHit};
use scout_domain::QueryFilter;

pub const DOC_ID_KEY: &str = "doc_id";
pub const CONTENT_KEY: &str = "content";
pub const METADATA_PREFIX: &str = "meta_";

/// Remote document store backed by a single cosine Qdrant collection.
pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &scout_config::RemoteSource) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
					VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
				),
			)
			.await?;

		tracing::info!(collection = %self.collection, "Created Qdrant collection.");

		Ok(())
	}

	pub async fn upsert(
		&self,
		id: &str,
		content: &str,
		metadata: &BTreeMap<String, String>,
		vector: Vec<f32>,
	) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut payload_map = HashMap::new();

		payload_map.insert(DOC_ID_KEY.to_string(), Value::from(id.to_string()));
		payload_map.insert(CONTENT_KEY.to_string(), Value::from(content.to_string()));

		for (key, value) in metadata {
			payload_map.insert(format!("{METADATA_PREFIX}{key}"), Value::from(value.clone()));
		}

		let point = PointStruct::new(point_id(id).to_string(), vector, Payload::from(payload_map));
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn delete(&self, id: &str) -> Result<()> {
		let ids = PointsIdsList { ids: vec![PointId::from(point_id(id).to_string())] };
		let delete = DeletePointsBuilder::new(self.collection.clone()).points(ids).wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}

	pub async fn query(
		&self,
		vector: Vec<f32>,
		limit: usize,
		filter: Option<&QueryFilter>,
	) -> Result<Vec<StoredHit>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.with_payload(true)
			.limit(limit as u64);

		if let Some(filter) = filter.filter(|filter| !filter.is_empty()) {
			search = search.filter(build_filter(filter));
		}

		let response = self.client.query(search).await?;

		Ok(response.result.into_iter().filter_map(scored_point_to_hit).collect())
	}
}

/// Qdrant only accepts UUID or integer point ids, so document ids map onto stable v5 UUIDs.
pub fn point_id(doc_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_URL, doc_id.as_bytes())
}

fn build_filter(filter: &QueryFilter) -> Filter {
	Filter::must(
		filter
			.equals
			.iter()
			.map(|(key, value)| Condition::matches(format!("{METADATA_PREFIX}{key}"), value.clone())),
	)
}

fn scored_point_to_hit(point: ScoredPoint) -> Option<StoredHit> {
	let Some(id) = payload_string(&point.payload, DOC_ID_KEY) else {
		tracing::warn!("Qdrant point missing doc_id.");

		return None;
	};
	let content = payload_string(&point.payload, CONTENT_KEY).unwrap_or_default();
	let metadata = point
		.payload
		.iter()
		.filter_map(|(key, value)| {
			let key = key.strip_prefix(METADATA_PREFIX)?;

			match &value.kind {
				Some(Kind::StringValue(text)) => Some((key.to_string(), text.clone())),
				_ => None,
			}
		})
		.collect();

	Some(StoredHit { id, content, metadata, distance: (1.0 - point.score).clamp(0.0, 2.0) })
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}
