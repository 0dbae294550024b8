use std::{fs, sync::Arc};

use scout_domain::{Query, SourceTag};
use scout_service::{LocalAdapter, SourceAdapter, ingest};
use scout_storage::local::LocalIndex;
use scout_testkit::TestDir;

use super::HashEmbedding;

async fn local_adapter(dir: &TestDir) -> LocalAdapter {
	let index = LocalIndex::open(&dir.join("index"), "local_files", super::DIMS)
		.await
		.expect("Failed to open local index.");

	LocalAdapter::from_index(index, super::embedding_config(), Arc::new(HashEmbedding))
}

fn seed(dir: &TestDir) -> std::path::PathBuf {
	let root = dir.join("docs");

	fs::create_dir_all(root.join("nested")).expect("Failed to create docs dir.");
	fs::write(root.join("visa.MD"), "Tourist visas allow stays of up to 90 days.")
		.expect("Failed to write visa.MD.");
	fs::write(root.join("nested").join("france.txt"), "Paris is the capital of France.")
		.expect("Failed to write france.txt.");
	fs::write(root.join("blob.bin"), [0xff_u8, 0xfe, 0x00, 0x9f]).expect("Failed to write blob.");

	root
}

#[tokio::test]
async fn folder_ingestion_collects_per_file_errors() {
	let dir = TestDir::new("scout_ingest").expect("Failed to create test dir.");
	let adapter = local_adapter(&dir).await;
	let root = seed(&dir);
	let report = ingest::ingest_folder(&adapter, &root, true).await.expect("Ingestion failed.");

	assert_eq!(report.added.len(), 2);
	assert_eq!(report.errors.len(), 1);
	assert!(report.errors[0].contains("blob.bin"));
	assert!(!report.is_success());

	let visa_id = root.join("visa.MD").to_string_lossy().into_owned();
	let stored = adapter.index().get(&visa_id).await.expect("visa.MD must be stored.");

	assert_eq!(stored.metadata.get("extension").map(String::as_str), Some(".md"));
	assert_eq!(stored.metadata.get("source"), Some(&visa_id));
	assert!(stored.metadata.contains_key("modified"));
}

#[tokio::test]
async fn non_recursive_ingestion_skips_subfolders() {
	let dir = TestDir::new("scout_ingest").expect("Failed to create test dir.");
	let adapter = local_adapter(&dir).await;
	let root = seed(&dir);
	let report = ingest::ingest_folder(&adapter, &root, false).await.expect("Ingestion failed.");

	assert_eq!(report.added.len(), 1);
	assert!(report.added[0].ends_with("visa.MD"));
}

#[tokio::test]
async fn missing_folder_is_rejected() {
	let dir = TestDir::new("scout_ingest").expect("Failed to create test dir.");
	let adapter = local_adapter(&dir).await;

	assert!(ingest::ingest_folder(&adapter, &dir.join("nope"), true).await.is_err());
}

#[tokio::test]
async fn reingesting_replaces_and_forget_removes() {
	let dir = TestDir::new("scout_ingest").expect("Failed to create test dir.");
	let adapter = local_adapter(&dir).await;
	let file = dir.join("notes.md");

	fs::write(&file, "Berlin is the capital of Germany.").expect("Failed to write notes.");
	ingest::ingest_files(&adapter, std::slice::from_ref(&file)).await;
	fs::write(&file, "Paris is the capital of France.").expect("Failed to rewrite notes.");
	ingest::ingest_files(&adapter, std::slice::from_ref(&file)).await;

	assert_eq!(adapter.index().len().await, 1);

	let hits = adapter.search(&Query::new("capital of France"), 5).await.expect("Search failed.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].content, "Paris is the capital of France.");
	assert_eq!(hits[0].source_tag, SourceTag::Local);
	assert!(hits[0].distance.is_some());

	let id = file.to_string_lossy().into_owned();

	ingest::forget(&adapter, &id).await.expect("Forget failed.");
	ingest::forget(&adapter, &id).await.expect("Forgetting twice must succeed.");

	assert!(adapter.index().is_empty().await);
	assert!(adapter.search(&Query::new("capital"), 5).await.expect("Search failed.").is_empty());
}
