//! Sticker auto-collection: download, hash, dedupe, file cleanup.

mod common;

use common::{ScriptedProvider, build_agent};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01,
];

fn sticker_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn duplicate_sticker_bytes_keep_one_row_and_one_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PNG_BYTES)
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;
    // Same bytes under a different URL: must dedupe on content hash
    Mock::given(method("GET"))
        .and(path("/b.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PNG_BYTES)
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let harness = build_agent(ScriptedProvider::new(vec![]));
    let storage = harness.sticker_dir.clone();

    harness
        .agent
        .auto_save_sticker(format!("{}/a.png", server.uri()), "开心的猫".to_string())
        .await;
    assert_eq!(harness.store.sticker_count().unwrap(), 1);
    assert_eq!(sticker_files(&storage).len(), 1);

    harness
        .agent
        .auto_save_sticker(format!("{}/b.png", server.uri()), "另一个描述".to_string())
        .await;
    // No second row, and the temp download was removed
    assert_eq!(harness.store.sticker_count().unwrap(), 1);
    assert_eq!(sticker_files(&storage).len(), 1);

    let found = harness.store.search_stickers("猫", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].use_count, 0);
}

#[tokio::test]
async fn oversized_sticker_is_rejected() {
    let server = MockServer::start().await;
    let big = vec![0u8; 6 * 1024 * 1024];
    Mock::given(method("GET"))
        .and(path("/big.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(big)
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let harness = build_agent(ScriptedProvider::new(vec![]));
    harness
        .agent
        .auto_save_sticker(format!("{}/big.png", server.uri()), String::new())
        .await;
    assert_eq!(harness.store.sticker_count().unwrap(), 0);
}
