use chrono::{DateTime, Duration, TimeZone, Utc};
use lifestream_core::{
    Account, ActivityContent, ContentKind, IngestOutcome, NormalizedActivity, Render,
    ServiceKind, TimelineQuery, TimelineStore,
};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2009, 1, 1, hour, minute, 0).unwrap()
}

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "lifestream_{}_{}",
        tag,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    dir
}

fn photo(key: &str, published: DateTime<Utc>) -> NormalizedActivity {
    NormalizedActivity {
        natural_key: key.to_owned(),
        published,
        title: Some(format!("photo {}", key)),
        link: Some(format!("https://www.flickr.com/photos/x/{}", key)),
        content: ActivityContent::FlickrPhoto {
            photo_id: key.to_owned(),
            square_thumb_link: Some(format!("https://farm1.static.flickr.com/1/{}_s.jpg", key)),
            image_500px_link: Some(format!("https://farm1.static.flickr.com/1/{}.jpg", key)),
            taken_on: None,
        },
    }
}

fn bookmark(url: &str, published: DateTime<Utc>) -> NormalizedActivity {
    NormalizedActivity {
        natural_key: url.to_owned(),
        published,
        title: Some("A link".into()),
        link: Some(url.to_owned()),
        content: ActivityContent::DeliciousLink {
            description: "worth reading".into(),
            tags: vec!["rust".into()],
        },
    }
}

fn flickr(username: &str) -> Account {
    Account::new(ServiceKind::Flickr, username).with_batching(Duration::minutes(15))
}

#[tokio::test]
async fn reingesting_a_known_activity_changes_nothing() {
    let store = TimelineStore::in_memory();
    let account = flickr("alice");

    let first = store.ingest(&account, photo("42", at(10, 0))).await.unwrap();
    assert!(matches!(first, IngestOutcome::Created { .. }));
    let before = store.snapshot().await;

    let second = store.ingest(&account, photo("42", at(10, 0))).await.unwrap();
    assert_eq!(second, IngestOutcome::Existing);

    let after = store.snapshot().await;
    assert_eq!(after.activity_count(), 1);
    assert_eq!(
        before.entries().cloned().collect::<Vec<_>>(),
        after.entries().cloned().collect::<Vec<_>>()
    );
    assert!(!store.is_new(&account.id, "42", at(10, 0)).await);
}

#[tokio::test]
async fn same_key_with_a_different_timestamp_is_a_new_activity() {
    let store = TimelineStore::in_memory();
    let account = flickr("alice");

    store.ingest(&account, photo("42", at(10, 0))).await.unwrap();
    assert!(store.is_new(&account.id, "42", at(10, 1)).await);
    let outcome = store.ingest(&account, photo("42", at(10, 1))).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Created { .. }));
}

#[tokio::test]
async fn dedup_is_scoped_per_account() {
    let store = TimelineStore::in_memory();
    let alice = flickr("alice");
    let bob = flickr("bob");

    let a = store.ingest(&alice, photo("42", at(10, 0))).await.unwrap();
    let b = store.ingest(&bob, photo("42", at(10, 0))).await.unwrap();
    assert!(matches!(a, IngestOutcome::Created { .. }));
    assert!(matches!(b, IngestOutcome::Created { .. }));

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.activity_count(), 2);
    assert_eq!(snapshot.entry_count(), 2);
}

#[tokio::test]
async fn store_survives_a_reload() {
    let dir = temp_dir("reload");
    let path = dir.join("timeline_store.json");
    let account = flickr("alice");

    let store = TimelineStore::load_from(&path).await;
    store.ingest(&account, photo("1", at(10, 0))).await.unwrap();
    store.ingest(&account, photo("2", at(10, 5))).await.unwrap();
    assert!(path.exists());

    let reloaded = TimelineStore::load_from(&path).await;
    let snapshot = reloaded.snapshot().await;
    assert_eq!(snapshot.activity_count(), 2);
    assert_eq!(snapshot.entry_count(), 1);
    assert!(!reloaded.is_new(&account.id, "2", at(10, 5)).await);

    // Batching continues against the reloaded entry and ids do not collide.
    let outcome = reloaded.ingest(&account, photo("3", at(10, 8))).await.unwrap();
    match outcome {
        IngestOutcome::Created { activity, assignment } => {
            assert!(snapshot.activity(activity).is_err());
            assert!(matches!(assignment, lifestream_core::Assignment::Joined(_)));
        }
        other => panic!("expected a new activity, got {:?}", other),
    }

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn load_uses_tmp_fallback_on_corrupted_store() {
    let dir = temp_dir("corrupt");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("timeline_store.json");

    let seed = TimelineStore::in_memory();
    seed.ingest(&flickr("alice"), photo("1", at(10, 0))).await.unwrap();
    let bytes = serde_json::to_vec(&seed.snapshot().await).unwrap();

    tokio::fs::write(&path, b"{ this is not json ").await.unwrap();
    tokio::fs::write(dir.join("timeline_store.json.tmp"), bytes).await.unwrap();

    let store = TimelineStore::load_from(&path).await;
    assert_eq!(store.snapshot().await.activity_count(), 1, "should fall back to tmp file");

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn orphans_are_retried_on_the_next_run() {
    let store = TimelineStore::in_memory();
    let account = flickr("alice");

    store.ingest(&account, photo("1", at(10, 0))).await.unwrap();
    store.ingest(&account, photo("2", at(10, 20))).await.unwrap();
    let outcome = store.ingest(&account, photo("3", at(10, 10))).await.unwrap();
    let orphan = match outcome {
        IngestOutcome::Created { activity, assignment } => {
            assert!(assignment.is_ambiguous());
            activity
        }
        other => panic!("expected a new activity, got {:?}", other),
    };

    // Still ambiguous under the same policy.
    assert_eq!(store.heal_orphans(&account).await.unwrap(), 0);

    let unbatched = Account {
        batching: false,
        ..account.clone()
    };
    assert_eq!(store.heal_orphans(&unbatched).await.unwrap(), 1);
    let snapshot = store.snapshot().await;
    assert!(snapshot.activity(orphan).unwrap().entry.is_some());
    assert_eq!(snapshot.entry_count(), 3);
    assert!(snapshot.orphans(&account.id).is_empty());
}

#[tokio::test]
async fn high_water_mark_tracks_the_latest_activity_per_account() {
    let store = TimelineStore::in_memory();
    let alice = flickr("alice");
    let bob = flickr("bob");

    assert!(store.high_water_mark(&alice.id).await.is_none());
    store.ingest(&alice, photo("1", at(10, 0))).await.unwrap();
    store.ingest(&alice, photo("2", at(11, 0))).await.unwrap();
    store.ingest(&bob, photo("9", at(12, 0))).await.unwrap();

    let mark = store.high_water_mark(&alice.id).await.unwrap();
    assert_eq!(mark.published, at(11, 0));
    assert_eq!(mark.natural_key, "2");
}

#[tokio::test]
async fn timeline_is_newest_first_with_rendered_members() {
    let store = TimelineStore::in_memory();
    let alice = flickr("alice");
    let links = Account::new(ServiceKind::Delicious, "alice");

    store.ingest(&alice, photo("1", at(9, 0))).await.unwrap();
    store.ingest(&alice, photo("2", at(9, 4))).await.unwrap();
    store.ingest(&links, bookmark("http://example.com/a", at(12, 0))).await.unwrap();
    store.ingest(&alice, photo("3", at(11, 0))).await.unwrap();

    let timeline = store.timeline(&TimelineQuery::default()).await;
    let starts: Vec<_> = timeline.iter().map(|e| e.span_start).collect();
    assert_eq!(starts, vec![at(12, 0), at(11, 0), at(9, 0)]);

    let batch = &timeline[2];
    assert_eq!(batch.content_kind, ContentKind::FlickrPhoto);
    assert_eq!(batch.members.len(), 2);
    assert!(batch.members[0].published <= batch.members[1].published);
    let rendered = batch.rendered();
    assert_eq!(rendered[0].headline, "photo 1");
    assert_eq!(
        rendered[0].thumbnail.as_deref(),
        Some("https://farm1.static.flickr.com/1/1_s.jpg")
    );

    let link = timeline[0].members[0].render();
    assert_eq!(link.body.as_deref(), Some("worth reading"));
    assert!(link.thumbnail.is_none());

    let only_photos = store
        .timeline(&TimelineQuery {
            account: Some(alice.id.clone()),
            limit: Some(1),
        })
        .await;
    assert_eq!(only_photos.len(), 1);
    assert_eq!(only_photos[0].span_start, at(11, 0));
}

#[tokio::test]
async fn concurrent_accounts_share_one_file_backed_store() {
    let dir = temp_dir("concurrent");
    let path = dir.join("timeline_store.json");
    let store = TimelineStore::load_from(&path).await;

    let accounts: Vec<Account> = (0..8).map(|n| flickr(&format!("user{}", n))).collect();
    let runs = accounts.iter().map(|account| {
        let store = store.clone();
        async move {
            let mut failures = 0;
            for minute in 0..20 {
                let record = photo(&format!("{}-{}", account.id, minute), at(10, minute));
                if store.ingest(account, record).await.is_err() {
                    failures += 1;
                }
            }
            failures
        }
    });
    let failures: usize = futures_util::future::join_all(runs).await.into_iter().sum();
    assert_eq!(failures, 0);

    let reloaded = TimelineStore::load_from(&path).await.snapshot().await;
    assert_eq!(reloaded.activity_count(), 160);
    // 10:00-10:15 fill one batch per account, 10:16-10:19 start a second.
    assert_eq!(reloaded.entry_count(), 16);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn healed_orphans_are_written_to_disk() {
    let dir = temp_dir("heal");
    let path = dir.join("timeline_store.json");
    let store = TimelineStore::load_from(&path).await;
    let account = flickr("alice");

    store.ingest(&account, photo("1", at(10, 0))).await.unwrap();
    store.ingest(&account, photo("2", at(10, 20))).await.unwrap();
    store.ingest(&account, photo("3", at(10, 10))).await.unwrap();
    assert_eq!(store.snapshot().await.orphans(&account.id).len(), 1);

    let unbatched = Account {
        batching: false,
        ..account.clone()
    };
    assert_eq!(store.heal_orphans(&unbatched).await.unwrap(), 1);

    let reloaded = TimelineStore::load_from(&path).await.snapshot().await;
    assert!(reloaded.orphans(&account.id).is_empty());
    assert_eq!(reloaded.entry_count(), 3);

    let _ = std::fs::remove_dir_all(&dir);
}
