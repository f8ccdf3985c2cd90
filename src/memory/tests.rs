use super::*;
use crate::config::MemoryConfig;
use chrono::{Duration, Utc};

fn test_store() -> (MemoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = MemoryConfig::default();
    cfg.sqlite.path = dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let store = MemoryStore::new(&cfg, None).unwrap();
    (store, dir)
}

fn log(message_id: &str, group_id: i64, content: &str) -> MessageLog {
    MessageLog {
        id: 0,
        message_id: message_id.to_string(),
        group_id,
        user_id: 100,
        nickname: "测试".to_string(),
        content: content.to_string(),
        msg_type: "group".to_string(),
        mention_self: false,
        forwards: None,
        created_at: Utc::now(),
    }
}

// ---- mood ----

#[test]
fn mood_defaults_on_first_access() {
    let (store, _dir) = test_store();
    let mood = store.get_mood_state().unwrap();
    assert_eq!(mood.valence, 0.0);
    assert_eq!(mood.energy, 0.5);
    assert_eq!(mood.sociability, 0.5);
}

#[test]
fn mood_updates_are_clamped() {
    let (store, _dir) = test_store();
    let mood = store.update_mood_state(5.0, 5.0, -5.0, "big swing").unwrap();
    assert_eq!(mood.valence, 1.0);
    assert_eq!(mood.energy, 1.0);
    assert_eq!(mood.sociability, 0.0);
    assert_eq!(mood.last_reason, "big swing");

    let mood = store.update_mood_state(-3.0, 0.0, 0.0, "crash").unwrap();
    assert_eq!(mood.valence, -1.0);
}

#[test]
fn mood_decay_contracts_toward_neutral() {
    let (store, _dir) = test_store();
    store.update_mood_state(0.8, 0.4, -0.4, "excited").unwrap();

    let before = store.get_mood_state().unwrap();
    let after = store.apply_mood_decay().unwrap();
    assert!(after.valence.abs() < before.valence.abs());
    assert!((after.energy - 0.5).abs() < (before.energy - 0.5).abs());
    assert!((after.sociability - 0.5).abs() < (before.sociability - 0.5).abs());

    // Repeated decay converges
    for _ in 0..200 {
        store.apply_mood_decay().unwrap();
    }
    let settled = store.get_mood_state().unwrap();
    assert!(settled.valence.abs() < 0.001);
    assert!((settled.energy - 0.5).abs() < 0.001);
    assert!((settled.sociability - 0.5).abs() < 0.001);
}

#[test]
fn mood_decay_holds_the_fixpoint() {
    let (store, _dir) = test_store();
    let mood = store.apply_mood_decay().unwrap();
    assert_eq!(mood.valence, 0.0);
    assert_eq!(mood.energy, 0.5);
    assert_eq!(mood.sociability, 0.5);
}

// ---- stickers ----

#[test]
fn sticker_dedupe_on_hash() {
    let (store, _dir) = test_store();
    let dup = store.save_sticker("a.png", "hash1", "开心的猫").unwrap();
    assert!(!dup);
    assert_eq!(store.sticker_count().unwrap(), 1);

    let dup = store.save_sticker("b.png", "hash1", "另一个描述").unwrap();
    assert!(dup);
    assert_eq!(store.sticker_count().unwrap(), 1);
}

#[test]
fn sticker_search_and_touch() {
    let (store, _dir) = test_store();
    store.save_sticker("a.png", "h1", "开心的猫").unwrap();
    store.save_sticker("b.png", "h2", "无语的狗").unwrap();

    let hits = store.search_stickers("猫", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_name, "a.png");

    store.touch_sticker(hits[0].id).unwrap();
    let sticker = store.get_sticker(hits[0].id).unwrap().unwrap();
    assert_eq!(sticker.use_count, 1);

    // Empty keyword returns everything, most used first
    let all = store.search_stickers("", 10).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].file_hash, "h1");
}

// ---- jargon ----

#[test]
fn jargon_upsert_overwrites_meaning() {
    let (store, _dir) = test_store();
    store.save_jargon(1, "触摸", "旧含义", "").unwrap();
    store.save_jargon(1, "触摸", "新含义", "有人说了就笑").unwrap();

    let jargons = store.get_jargons(1, 10).unwrap();
    assert_eq!(jargons.len(), 1);
    assert_eq!(jargons[0].meaning, "新含义");
    assert_eq!(jargons[0].count, 2);
    assert!(!jargons[0].verified);
}

#[test]
fn jargon_auto_verifies_after_repeated_references() {
    let (store, _dir) = test_store();
    for _ in 0..5 {
        store.save_jargon(1, "梗", "含义", "").unwrap();
    }
    let jargons = store.get_jargons(1, 10).unwrap();
    assert!(jargons[0].verified);
    assert!(store.get_unverified_jargons(1, 10).unwrap().is_empty());
}

#[test]
fn jargon_review_flow() {
    let (store, _dir) = test_store();
    store.save_jargon(1, "新梗", "不确定", "").unwrap();
    let unverified = store.get_unverified_jargons(1, 10).unwrap();
    assert_eq!(unverified.len(), 1);

    store.review_jargon(unverified[0].id, true).unwrap();
    assert!(store.get_unverified_jargons(1, 10).unwrap().is_empty());
    assert!(store.get_jargons(1, 10).unwrap()[0].verified);
}

// ---- expressions ----

#[test]
fn expression_uniqueness_and_backfill() {
    let (store, _dir) = test_store();
    let created = store.save_expression(1, "打招呼", "哟西", "").unwrap();
    assert!(created);

    // Same key with examples: no new row, examples backfilled
    let created = store.save_expression(1, "打招呼", "哟西", "哟西，来了").unwrap();
    assert!(!created);
    let exps = store.get_expressions(1, 10).unwrap();
    assert_eq!(exps.len(), 1);
    assert_eq!(exps[0].examples, "哟西，来了");
    assert_eq!(exps[0].count, 2);

    // Existing examples are not overwritten
    let created = store.save_expression(1, "打招呼", "哟西", "别的例子").unwrap();
    assert!(!created);
    assert_eq!(store.get_expressions(1, 10).unwrap()[0].examples, "哟西，来了");
}

#[test]
fn rejected_expressions_are_excluded() {
    let (store, _dir) = test_store();
    store.save_expression(1, "吐槽", "就这？", "").unwrap();
    let unchecked = store.get_unchecked_expressions(1, 10).unwrap();
    assert_eq!(unchecked.len(), 1);

    store.review_expression(unchecked[0].id, false).unwrap();
    assert!(store.get_expressions(1, 10).unwrap().is_empty());
    assert!(store.get_unchecked_expressions(1, 10).unwrap().is_empty());

    store.review_expression(unchecked[0].id, true).unwrap();
    assert_eq!(store.get_expressions(1, 10).unwrap().len(), 1);
}

// ---- member profiles ----

#[test]
fn profile_find_or_insert_defaults() {
    let (store, _dir) = test_store();
    let profile = store.get_or_create_member_profile(100, "老王").unwrap();
    assert_eq!(profile.nickname, "老王");
    assert!((profile.activity - 0.5).abs() < f64::EPSILON);
    assert!((profile.intimacy - 0.3).abs() < f64::EPSILON);

    // Second call finds the same row
    let again = store.get_or_create_member_profile(100, "王哥").unwrap();
    assert_eq!(again.id, profile.id);
    assert_eq!(again.nickname, "老王");
}

#[test]
fn profile_activity_recent_speaker_gains() {
    let (store, _dir) = test_store();
    let mut profile = store.get_or_create_member_profile(100, "老王").unwrap();
    profile.last_speak = Utc::now();
    profile.msg_count += 1;
    store.update_member_profile(&mut profile).unwrap();
    assert!(profile.activity > 0.5);
    assert!(profile.activity <= 1.0);
}

#[test]
fn profile_activity_decays_when_idle_and_floors() {
    let (store, _dir) = test_store();
    let mut profile = store.get_or_create_member_profile(100, "老王").unwrap();
    profile.last_speak = Utc::now() - Duration::days(30);
    store.update_member_profile(&mut profile).unwrap();
    assert!((profile.activity - 0.1).abs() < f64::EPSILON);
}

#[test]
fn profile_floats_are_clamped_on_write() {
    let (store, _dir) = test_store();
    let mut profile = store.get_or_create_member_profile(100, "老王").unwrap();
    profile.intimacy = 7.0;
    profile.last_speak = Utc::now();
    store.update_member_profile(&mut profile).unwrap();
    assert!(profile.intimacy <= 1.0);

    let reloaded = store.get_member_profile(100).unwrap().unwrap();
    assert!(reloaded.intimacy <= 1.0);
}

// ---- memories / hybrid retrieval ----

#[tokio::test]
async fn keyword_fallback_matches_and_orders() {
    // No embedding client configured: retrieval must take the keyword path.
    let (store, _dir) = test_store();
    let mut low = Memory {
        id: 0,
        mem_type: MemoryType::GroupFact,
        group_id: 1,
        user_id: 0,
        content: "群里有人养了一只 cat".to_string(),
        importance: 0.3,
        access_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    store.save_memory(&mut low).await.unwrap();

    let mut high = Memory {
        content: "cat 是群主的宠物".to_string(),
        importance: 0.9,
        ..low.clone()
    };
    high.id = 0;
    store.save_memory(&mut high).await.unwrap();

    let mut other_group = Memory {
        content: "别的群也有 cat".to_string(),
        group_id: 2,
        ..low.clone()
    };
    other_group.id = 0;
    store.save_memory(&mut other_group).await.unwrap();

    let found = store.query_memory("cat", 1, None, 5).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].content, "cat 是群主的宠物");

    // Access counts were bumped for the hits
    let bumped = store.get_memory(found[0].id).unwrap().unwrap();
    assert_eq!(bumped.access_count, 1);
}

#[tokio::test]
async fn query_with_group_zero_spans_groups() {
    let (store, _dir) = test_store();
    for gid in [1_i64, 2, 3] {
        let mut mem = Memory {
            id: 0,
            mem_type: MemoryType::Conversation,
            group_id: gid,
            user_id: 0,
            content: format!("group {} talked about rust", gid),
            importance: 0.5,
            access_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.save_memory(&mut mem).await.unwrap();
    }
    let found = store.query_memory("rust", 0, None, 10).await.unwrap();
    assert_eq!(found.len(), 3);
}

#[tokio::test]
async fn type_filter_applies() {
    let (store, _dir) = test_store();
    for (t, content) in [
        (MemoryType::GroupFact, "rust 群规"),
        (MemoryType::Conversation, "rust 聊天"),
    ] {
        let mut mem = Memory {
            id: 0,
            mem_type: t,
            group_id: 1,
            user_id: 0,
            content: content.to_string(),
            importance: 0.5,
            access_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.save_memory(&mut mem).await.unwrap();
    }
    let found = store
        .query_memory("rust", 1, Some(MemoryType::GroupFact), 10)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content, "rust 群规");
}

#[tokio::test]
async fn delete_memory_removes_row() {
    let (store, _dir) = test_store();
    let mut mem = Memory {
        id: 0,
        mem_type: MemoryType::SelfExperience,
        group_id: 1,
        user_id: 0,
        content: "被夸了很开心".to_string(),
        importance: 0.7,
        access_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    store.save_memory(&mut mem).await.unwrap();
    assert!(store.delete_memory(mem.id).unwrap());
    assert!(store.get_memory(mem.id).unwrap().is_none());
    assert!(!store.delete_memory(mem.id).unwrap());
}

// ---- vector index ----

#[test]
fn vector_search_orders_and_thresholds() {
    let (store, _dir) = test_store();
    // Reach the index through a standalone handle sharing semantics
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = MemoryConfig::default();
    cfg.sqlite.path = dir.path().join("v.db").to_string_lossy().to_string();
    drop(store);
    let store = MemoryStore::new(&cfg, None).unwrap();
    drop(store);

    let conn = rusqlite::Connection::open(dir.path().join("v.db")).unwrap();
    let conn = std::sync::Arc::new(std::sync::Mutex::new(conn));
    let index = VectorIndex::new(conn, Metric::Cosine);

    index.insert(1, 1, "group_fact", &[1.0, 0.0]).unwrap();
    index.insert(2, 1, "group_fact", &[0.9, 0.1]).unwrap();
    index.insert(3, 1, "group_fact", &[0.0, 1.0]).unwrap();
    index.insert(4, 2, "group_fact", &[1.0, 0.0]).unwrap();

    let hits = index.search(&[1.0, 0.0], 1, None, 10, 0.5).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].memory_id, 1);
    assert_eq!(hits[1].memory_id, 2);
    assert!(hits[0].score >= hits[1].score);

    // Threshold 0.0 admits the orthogonal vector too
    let hits = index.search(&[1.0, 0.0], 1, None, 10, 0.0).unwrap();
    assert_eq!(hits.len(), 3);

    // Threshold 1.0 only admits (near-)exact matches
    let hits = index.search(&[1.0, 0.0], 1, None, 10, 0.9999).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory_id, 1);

    // group_id 0 spans groups
    let hits = index.search(&[1.0, 0.0], 0, None, 10, 0.5).unwrap();
    assert_eq!(hits.len(), 3);

    index.delete_by_memory_ids(&[1, 2]).unwrap();
    let hits = index.search(&[1.0, 0.0], 1, None, 10, 0.0).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory_id, 3);

    index.delete_by_group(2).unwrap();
    let hits = index.search(&[1.0, 0.0], 0, None, 10, 0.0).unwrap();
    assert_eq!(hits.len(), 1);
}

// ---- message log ----

#[test]
fn recent_messages_are_oldest_first() {
    let (store, _dir) = test_store();
    for i in 0..5 {
        let mut entry = log(&format!("m{}", i), 1, &format!("msg {}", i));
        entry.created_at = Utc::now() - Duration::seconds(100 - i);
        store.add_message(&entry).unwrap();
    }
    let recent = store.recent_messages(1, 3, 0).unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].content, "msg 2");
    assert_eq!(recent[2].content, "msg 4");

    // Offset skips the newest rows
    let older = store.recent_messages(1, 2, 3).unwrap();
    assert_eq!(older[0].content, "msg 0");
    assert_eq!(older[1].content, "msg 1");
}

#[test]
fn message_log_is_idempotent_on_message_id() {
    let (store, _dir) = test_store();
    store.add_message(&log("m1", 1, "first")).unwrap();
    store.add_message(&log("m1", 1, "duplicate")).unwrap();
    let (rows, total) = store.list_message_logs(1, 1, 20).unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].content, "first");
}

#[test]
fn trim_keeps_latest_rows_per_group() {
    let (store, _dir) = test_store();
    for i in 0..10 {
        let mut entry = log(&format!("a{}", i), 1, &format!("g1 {}", i));
        entry.created_at = Utc::now() - Duration::seconds(100 - i);
        store.add_message(&entry).unwrap();
    }
    for i in 0..4 {
        let mut entry = log(&format!("b{}", i), 2, &format!("g2 {}", i));
        entry.created_at = Utc::now() - Duration::seconds(100 - i);
        store.add_message(&entry).unwrap();
    }

    let deleted = store.trim_message_logs(3).unwrap();
    assert_eq!(deleted, 8); // 7 from group 1, 1 from group 2

    let g1 = store.recent_messages(1, 100, 0).unwrap();
    assert_eq!(g1.len(), 3);
    assert_eq!(g1[0].content, "g1 7");
    let g2 = store.recent_messages(2, 100, 0).unwrap();
    assert_eq!(g2.len(), 3);

    // Idempotent
    assert_eq!(store.trim_message_logs(3).unwrap(), 0);
}

#[test]
fn forward_payload_round_trips() {
    let (store, _dir) = test_store();
    let mut entry = log("f1", 1, "[合并转发]");
    entry.forwards = Some(r#"[{"user_id":5,"nickname":"甲","content":"hi"}]"#.to_string());
    store.add_message(&entry).unwrap();

    let row = store.get_message_log("f1").unwrap().unwrap();
    let forwards = row.forwards.unwrap();
    assert!(forwards.contains("甲"));
}

#[test]
fn stats_count_rows() {
    let (store, _dir) = test_store();
    store.add_message(&log("m1", 1, "hello")).unwrap();
    store.save_sticker("a.png", "h", "desc").unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.stickers, 1);
    assert_eq!(stats.memories, 0);
}
