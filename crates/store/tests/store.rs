//! End-to-end store behaviour over a real (temporary) database file.

use futures::TryStreamExt;
use kura_model::filter::{ArtworkFilter, ArtworkOrder, CountRule, ExistenceFilter, TagFilter, TextFilter, UserFilter};
use kura_model::{Artwork, ArtworkFlags, ArtworkKind, ExtensionKind, User, UserProfile};
use kura_store::{CountKind, Database, LibraryFiles, RetryPolicy, Store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::UtcDateTime;
use tokio_util::sync::CancellationToken;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        busy_wait: Duration::from_millis(50),
        commit_busy_retries: 0,
    }
}

async fn open() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::connect(dir.path().join("kura.db")).await.unwrap();
    (dir, db)
}

fn ts(seconds: i64) -> UtcDateTime {
    UtcDateTime::from_unix_timestamp(seconds).unwrap()
}

fn artwork(id: u64, tags: &[u32], caption: &str) -> Artwork {
    let mut flags = ArtworkFlags::default();
    flags.set_visible(true);
    Artwork {
        id,
        user_id: 100,
        page_count: 1,
        width: 800,
        height: 600,
        kind: ArtworkKind::Illustration,
        extension: ExtensionKind::Jpg,
        flags,
        created_at: ts(1_600_000_000),
        file_date: ts(1_600_000_000),
        tags: tags.to_vec(),
        title: format!("work {id}"),
        caption: caption.to_string(),
        ..Artwork::default()
    }
}

async fn collect_ids(store: &mut Store, filter: &ArtworkFilter, cancel: &CancellationToken) -> Vec<u64> {
    let stream = store.filter_artworks(filter, cancel);
    futures::pin_mut!(stream);
    let mut ids = Vec::new();
    while let Some(artwork) = stream.try_next().await.unwrap() {
        ids.push(artwork.id);
    }
    ids
}

fn tag_intersect(values: &[&str]) -> TagFilter {
    TagFilter {
        exacts: values.iter().map(|v| v.to_string()).collect(),
        or: false,
        ..TagFilter::default()
    }
}

#[tokio::test]
async fn test_upsert_and_get_round_trip() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let mut original = artwork(7, &[], "caption");
    original.kind = ArtworkKind::Animation;
    original.extension = ExtensionKind::Zip;
    original.page_count = 3;
    original.extra_tags = Some(vec![]);
    original.memo = Some("note to self".to_string());
    original.hidden_pages = Some([(1u32, kura_model::HideReason::Dislike)].into_iter().collect());
    original.frame_delays = Some(vec![40, 40, 80]);
    let tag = store.register_tag("scenery", &cancel).await.unwrap();
    let tool = store.register_tool("brush", &cancel).await.unwrap();
    original.tags = vec![tag];
    original.tools = vec![tool];

    assert!(store.upsert_artwork(&original, &cancel).await.unwrap());
    let loaded = store.get_artwork(7, &cancel).await.unwrap().unwrap();

    assert_eq!(loaded.tags, vec![tag]);
    assert_eq!(loaded.tools, vec![tool]);
    assert_eq!(loaded.kind, ArtworkKind::Animation);
    assert_eq!(loaded.memo.as_deref(), Some("note to self"));
    assert_eq!(loaded.hidden_pages, original.hidden_pages);
    assert_eq!(loaded.frame_delays.as_deref(), Some(&[40, 40, 80][..]));
    assert_eq!(loaded.created_at, original.created_at);
    assert!(loaded.flags.visible());
    assert!(!loaded.flags.muted());

    // Second upsert of the same record is an update.
    assert!(!store.upsert_artwork(&original, &cancel).await.unwrap());
    assert_eq!(store.count(CountKind::Artworks, &cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn test_total_view_never_regresses() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let mut fresh = artwork(1, &[], "");
    fresh.total_view = 500;
    fresh.total_bookmarks = 5;
    store.upsert_artwork(&fresh, &cancel).await.unwrap();

    // An out-of-order stale snapshot must not shrink the view counter,
    // while other counters follow the input.
    let mut stale = artwork(1, &[], "");
    stale.total_view = 200;
    stale.total_bookmarks = 9;
    store.upsert_artwork(&stale, &cancel).await.unwrap();
    let loaded = store.get_artwork(1, &cancel).await.unwrap().unwrap();
    assert_eq!(loaded.total_view, 500);
    assert_eq!(loaded.total_bookmarks, 9);

    let mut newer = artwork(1, &[], "");
    newer.total_view = 700;
    store.upsert_artwork(&newer, &cancel).await.unwrap();
    let loaded = store.get_artwork(1, &cancel).await.unwrap().unwrap();
    assert_eq!(loaded.total_view, 700);
}

#[tokio::test]
async fn test_tag_algebra_end_to_end() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let t10 = store.register_tag("t10", &cancel).await.unwrap();
    let t20 = store.register_tag("t20", &cancel).await.unwrap();
    let t30 = store.register_tag("t30", &cancel).await.unwrap();

    store.upsert_artwork(&artwork(1, &[t10, t20], "has ab inside"), &cancel).await.unwrap();
    store.upsert_artwork(&artwork(2, &[t10], "nothing here"), &cancel).await.unwrap();
    store.upsert_artwork(&artwork(3, &[t20, t30], "also ab here"), &cancel).await.unwrap();

    // intersect {t10} -> {1, 2}
    let filter = ArtworkFilter {
        tag_filter: Some(tag_intersect(&["t10"])),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![1, 2]);

    // intersect {t10} except {t20} -> {2}
    let filter = ArtworkFilter {
        tag_filter: Some(TagFilter {
            ignore_exacts: vec!["t20".to_string()],
            ignore_or: false,
            ..tag_intersect(&["t10"])
        }),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![2]);

    // intersect {t10, t20} (and-chain) -> {1}
    let filter = ArtworkFilter {
        tag_filter: Some(tag_intersect(&["t10", "t20"])),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![1]);

    // standalone except {t20} -> {2} (only artwork without it)
    let filter = ArtworkFilter {
        tag_filter: Some(TagFilter {
            ignore_exacts: vec!["t20".to_string()],
            ignore_or: false,
            ..TagFilter::default()
        }),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![2]);

    // partial "t1" (substring, below the token threshold) -> {1, 2}
    let filter = ArtworkFilter {
        tag_filter: Some(TagFilter {
            partials: vec!["t1".to_string()],
            or: true,
            ..TagFilter::default()
        }),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![1, 2]);

    // text partial "ab" over captions -> {1, 3}
    let filter = ArtworkFilter {
        text_filter: Some(TextFilter {
            partials: vec!["ab".to_string()],
            partial_or: false,
            ..TextFilter::default()
        }),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![1, 3]);

    // paging over the first query: count 1, offset 1 -> {2}
    let filter = ArtworkFilter {
        tag_filter: Some(tag_intersect(&["t10"])),
        order: ArtworkOrder::Id,
        count: Some(1),
        offset: 1,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![2]);

    // filtered count ignores paging
    let filter = ArtworkFilter {
        tag_filter: Some(tag_intersect(&["t10"])),
        count: Some(1),
        offset: 1,
        ..ArtworkFilter::default()
    };
    assert_eq!(store.count_artworks(&filter, &cancel).await.unwrap(), 2);
}

#[tokio::test]
async fn test_token_match_tag_search() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let landscape = store.register_tag("landscape", &cancel).await.unwrap();
    let portrait = store.register_tag("portrait", &cancel).await.unwrap();
    store.upsert_artwork(&artwork(1, &[landscape], ""), &cancel).await.unwrap();
    store.upsert_artwork(&artwork(2, &[portrait], ""), &cancel).await.unwrap();

    // Three characters and above go through the token index.
    let filter = ArtworkFilter {
        tag_filter: Some(TagFilter {
            partials: vec!["landscape".to_string()],
            or: true,
            ..TagFilter::default()
        }),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![1]);

    assert_eq!(store.search_tags("landscape", &cancel).await.unwrap(), vec![landscape]);
    assert_eq!(store.search_tags("la", &cancel).await.unwrap(), vec![landscape]);
}

#[tokio::test]
async fn test_register_tag_is_idempotent() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let first = store.register_tag("same", &cancel).await.unwrap();
    let second = store.register_tag("same", &cancel).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.find_tag("same", &cancel).await.unwrap(), Some(first));
    assert_eq!(store.tag_value(first, &cancel).await.unwrap().as_deref(), Some("same"));
    assert_eq!(store.count(CountKind::Tags, &cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn test_user_round_trip_and_merge() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let deep = User {
        id: 9,
        name: Some("alpha".to_string()),
        account: Some("alpha_acc".to_string()),
        is_followed: true,
        profile: Some(UserProfile {
            region: Some("somewhere".to_string()),
            total_artworks: 12,
            ..UserProfile::default()
        }),
        extra_tags: Some(vec![]),
        ..User::default()
    };
    assert!(store.upsert_user(&deep, &cancel).await.unwrap());

    // A shallow refresh must not erase the stored detail.
    let shallow = User {
        id: 9,
        is_followed: false,
        is_muted: true,
        ..User::default()
    };
    assert!(!store.upsert_user(&shallow, &cancel).await.unwrap());

    let loaded = store.get_user(9, &cancel).await.unwrap().unwrap();
    assert_eq!(loaded.name.as_deref(), Some("alpha"));
    assert!(loaded.is_muted);
    assert!(!loaded.is_followed);
    assert_eq!(loaded.profile.as_ref().map(|p| p.total_artworks), Some(12));
}

#[tokio::test]
async fn test_filter_users_by_name() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    for (id, name) in [(1u64, "alice"), (2, "bob"), (3, "alina")] {
        let user = User {
            id,
            name: Some(name.to_string()),
            ..User::default()
        };
        store.upsert_user(&user, &cancel).await.unwrap();
    }

    let filter = UserFilter {
        name_filter: Some(TextFilter {
            partials: vec!["ali".to_string()],
            partial_or: true,
            ..TextFilter::default()
        }),
        ..UserFilter::default()
    };
    let stream = store.filter_users(&filter, &cancel);
    futures::pin_mut!(stream);
    let mut ids = Vec::new();
    while let Some(user) = stream.try_next().await.unwrap() {
        ids.push(user.id);
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_hidden_records_are_excluded_by_default() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let mut hidden = artwork(1, &[], "");
    hidden.hide_reason = kura_model::HideReason::Dislike;
    store.upsert_artwork(&hidden, &cancel).await.unwrap();
    store.upsert_artwork(&artwork(2, &[], ""), &cancel).await.unwrap();

    let filter = ArtworkFilter {
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![2]);

    // An allow list brings it back.
    let filter = ArtworkFilter {
        hide_filter: Some(kura_model::filter::HideFilter {
            allow: vec![kura_model::HideReason::Dislike],
            disallow: vec![],
        }),
        order: ArtworkOrder::Id,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![1]);
}

#[tokio::test]
async fn test_existence_filter_defers_paging() {
    let (dir, db) = open().await;
    let cancel = CancellationToken::new();
    let originals = dir.path().join("originals");
    let archives = dir.path().join("archives");
    std::fs::create_dir_all(&originals).unwrap();
    std::fs::create_dir_all(&archives).unwrap();
    // Only artworks 2 and 3 have their single page on disk.
    std::fs::write(originals.join("2_p0.jpg"), b"x").unwrap();
    std::fs::write(originals.join("3_p0.jpg"), b"x").unwrap();

    let mut store = db
        .store_with(fast_retry())
        .await
        .unwrap()
        .with_files(Arc::new(LibraryFiles::new(originals.clone(), archives.clone())));

    for id in 1..=4u64 {
        store.upsert_artwork(&artwork(id, &[], ""), &cancel).await.unwrap();
    }

    // Without the existence filter, offset 1 would skip artwork 1 and
    // return {2}; with it, paging applies to the post-filtered set {2, 3}.
    let filter = ArtworkFilter {
        existence: Some(ExistenceFilter {
            pages: Some(CountRule::Min(1)),
            ..ExistenceFilter::default()
        }),
        order: ArtworkOrder::Id,
        count: Some(1),
        offset: 1,
        ..ArtworkFilter::default()
    };
    assert_eq!(collect_ids(&mut store, &filter, &cancel).await, vec![3]);
}

#[tokio::test]
async fn test_existence_filter_without_source_is_rejected() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let filter = ArtworkFilter {
        existence: Some(ExistenceFilter::default()),
        ..ArtworkFilter::default()
    };
    let stream = store.filter_artworks(&filter, &cancel);
    futures::pin_mut!(stream);
    let result = stream.try_next().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_delete_where_filter() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    let junk = store.register_tag("junk", &cancel).await.unwrap();
    store.upsert_artwork(&artwork(1, &[junk], ""), &cancel).await.unwrap();
    store.upsert_artwork(&artwork(2, &[], ""), &cancel).await.unwrap();

    let filter = ArtworkFilter {
        tag_filter: Some(tag_intersect(&["junk"])),
        ..ArtworkFilter::default()
    };
    assert_eq!(store.delete_artworks(&filter, &cancel).await.unwrap(), 1);
    assert!(store.get_artwork(1, &cancel).await.unwrap().is_none());
    assert!(store.get_artwork(2, &cancel).await.unwrap().is_some());
    assert_eq!(store.count(CountKind::Artworks, &cancel).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_officially_removed() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    store.upsert_artwork(&artwork(5, &[], ""), &cancel).await.unwrap();
    store.mark_artwork_removed(5, &cancel).await.unwrap();
    let loaded = store.get_artwork(5, &cancel).await.unwrap().unwrap();
    assert!(loaded.is_officially_removed);
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut store = db.store_with(fast_retry()).await.unwrap();

    store.begin_transaction(&cancel).await.unwrap();
    store.upsert_artwork(&artwork(1, &[], ""), &cancel).await.unwrap();
    store.rollback_transaction(&cancel).await.unwrap();
    assert!(store.get_artwork(1, &cancel).await.unwrap().is_none());

    store.begin_transaction(&cancel).await.unwrap();
    store.upsert_artwork(&artwork(2, &[], ""), &cancel).await.unwrap();
    store.end_transaction(&cancel).await.unwrap();
    assert!(store.get_artwork(2, &cancel).await.unwrap().is_some());
}

#[tokio::test]
async fn test_busy_retry_completes_after_lock_release() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut holder = db.store_with(fast_retry()).await.unwrap();
    holder.begin_exclusive_transaction(&cancel).await.unwrap();

    let mut writer = db.store_with(fast_retry()).await.unwrap();
    let handle = tokio::spawn(async move {
        let cancel = CancellationToken::new();
        writer.upsert_artwork(&artwork(1, &[], ""), &cancel).await.unwrap();
    });

    // Let the writer hit the lock and spin a few retry intervals.
    tokio::time::sleep(Duration::from_millis(200)).await;
    holder.rollback_transaction(&cancel).await.unwrap();
    handle.await.unwrap();

    assert!(holder.get_artwork(1, &cancel).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cancellation_stops_busy_wait_within_one_interval() {
    let (_dir, db) = open().await;
    let cancel = CancellationToken::new();
    let mut holder = db.store_with(fast_retry()).await.unwrap();
    holder.begin_exclusive_transaction(&cancel).await.unwrap();

    let slow = RetryPolicy {
        busy_wait: Duration::from_secs(30),
        commit_busy_retries: 0,
    };
    let mut writer = db.store_with(slow).await.unwrap();
    let writer_cancel = CancellationToken::new();
    let task_cancel = writer_cancel.clone();
    let started = std::time::Instant::now();
    let handle =
        tokio::spawn(async move { writer.upsert_artwork(&artwork(1, &[], ""), &task_cancel).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    writer_cancel.cancel();
    let result = handle.await.unwrap();
    assert!(result.is_err());
    assert!(format!("{:?}", result.unwrap_err()).contains("Cancelled"));
    // Cancellation cut the 30 second busy wait short.
    assert!(started.elapsed() < Duration::from_secs(5));

    holder.rollback_transaction(&cancel).await.unwrap();
}
