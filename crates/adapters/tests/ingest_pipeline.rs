//! End-to-end ingestion runs against the scripted feed and in-memory store

use std::sync::Arc;
use std::time::Duration;

use askfeed_adapters::feed::StubFeedSource;
use askfeed_adapters::media::{MediaLimits, StubMediaDescriber};
use askfeed_adapters::store::InMemoryStore;
use askfeed_domain::usecases::{
    IngestConfig, IngestError, Ingestor, RetryPolicy, SyncState, TriggerOutcome, ingest_status,
};
use askfeed_domain::{
    Author, AuthorStore, Clock, FeedPost, FeedUser, FollowStore, IngestRun, Media, Photo,
    PostStore, RunLedger, RunStatus, User, UserId, UserStore,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

struct FixedClock(OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

type TestIngestor = Ingestor<StubFeedSource, InMemoryStore, FixedClock>;

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_733_040_000).unwrap()
}

fn hours_ago(hours: i64) -> OffsetDateTime {
    now() - time::Duration::hours(hours)
}

fn account(id: i64, handle: &str) -> FeedUser {
    FeedUser {
        id: id.to_string(),
        handle: handle.to_string(),
        display_name: Some(handle.to_uppercase()),
    }
}

fn post(id: i64, author: &FeedUser, published_at: OffsetDateTime) -> FeedPost {
    FeedPost {
        id: id.to_string(),
        url: format!("https://x.com/{}/status/{}", author.handle, id),
        text: format!("post {}", id),
        created_at: published_at.format(&Rfc3339).unwrap(),
        author: author.clone(),
        conversation_id: Some(id.to_string()),
        ..Default::default()
    }
}

fn repost(id: i64, author: &FeedUser, published_at: OffsetDateTime) -> FeedPost {
    FeedPost {
        is_repost: true,
        ..post(id, author, published_at)
    }
}

fn test_config() -> IngestConfig {
    IngestConfig {
        following_limit: 150,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        },
        page_delay: Duration::from_millis(100),
        author_delay: Duration::from_millis(200),
        max_media_per_run: 200,
        max_images_per_post: 4,
    }
}

struct Harness {
    ingestor: TestIngestor,
    store: Arc<InMemoryStore>,
    feed: Arc<StubFeedSource>,
    user: User,
}

async fn harness_with(feed: StubFeedSource, config: IngestConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let user = User {
        id: UserId::new(),
        handle: "alice".to_string(),
        created_at: hours_ago(1000),
    };
    store.create_user(&user).await.unwrap();

    let feed = Arc::new(feed);
    let ingestor = Ingestor::new(
        Arc::clone(&feed),
        Arc::clone(&store),
        Arc::new(FixedClock(now())),
        config,
    );

    Harness {
        ingestor,
        store,
        feed,
        user,
    }
}

async fn harness(feed: StubFeedSource) -> Harness {
    harness_with(feed, test_config()).await
}

#[tokio::test(start_paused = true)]
async fn empty_following_completes_with_nothing_fetched() {
    let h = harness(StubFeedSource::empty()).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::from_secs(24 * 3600))
        .await
        .unwrap();

    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.authors_processed, 0);

    let runs = h.store.runs_for(h.user.id).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Ok);
    assert_eq!(runs[0].fetched_count, 0);
    assert!(runs[0].completed_at.is_some());
    assert!(runs[0].err_text.is_none());
}

#[tokio::test(start_paused = true)]
async fn keeps_only_original_posts_and_tracks_last_seen() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![vec![
                post(105, &bob, hours_ago(1)),
                repost(104, &bob, hours_ago(2)),
                post(103, &bob, hours_ago(3)),
                repost(102, &bob, hours_ago(4)),
                post(101, &bob, hours_ago(5)),
            ]],
        );
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 3);
    let ids: Vec<i64> = h
        .store
        .posts_for(h.user.id)
        .unwrap()
        .iter()
        .map(|p| p.post_id)
        .collect();
    assert_eq!(ids, vec![101, 103, 105]);

    let author = h.store.get_author(11).await.unwrap().unwrap();
    assert_eq!(author.last_seen_at, Some(hours_ago(1)));

    let stored = h.store.posts_for(h.user.id).unwrap();
    assert!(stored.iter().all(|p| !p.edited_seen && p.author_id == 11));
    assert_eq!(stored[0].conversation_id, Some(101));
}

#[tokio::test(start_paused = true)]
async fn replies_are_kept_only_within_own_thread() {
    let bob = account(11, "bob");
    let self_reply = FeedPost {
        is_reply: true,
        in_reply_to_user_id: Some("11".to_string()),
        ..post(202, &bob, hours_ago(1))
    };
    let other_reply = FeedPost {
        is_reply: true,
        in_reply_to_user_id: Some("99".to_string()),
        ..post(201, &bob, hours_ago(2))
    };
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts("bob", vec![vec![self_reply, other_reply]]);
    let h = harness(feed).await;

    h.ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert!(h.store.post_exists(h.user.id, 202).await.unwrap());
    assert!(!h.store.post_exists(h.user.id, 201).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn unparsable_timestamps_are_skipped() {
    let bob = account(11, "bob");
    let broken = FeedPost {
        created_at: "not a date".to_string(),
        ..post(301, &bob, hours_ago(1))
    };
    let classic = FeedPost {
        created_at: "Sun Dec 01 05:00:00 +0000 2024".to_string(),
        ..post(302, &bob, hours_ago(2))
    };
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts("bob", vec![vec![broken, classic]]);
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert!(h.store.post_exists(h.user.id, 302).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn second_run_stores_nothing_new() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![vec![post(2, &bob, hours_ago(1)), post(1, &bob, hours_ago(2))]],
        );
    let h = harness(feed).await;

    let first = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();
    let second = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(first.fetched, 2);
    assert_eq!(second.fetched, 0);
    assert_eq!(h.store.posts_for(h.user.id).unwrap().len(), 2);
    assert_eq!(h.store.runs_for(h.user.id).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn following_set_is_bounded() {
    let accounts: Vec<FeedUser> = (1..=5).map(|i| account(i, &format!("a{}", i))).collect();
    let feed = StubFeedSource::empty().with_following(
        "alice",
        vec![accounts[..3].to_vec(), accounts[3..].to_vec()],
    );
    let config = IngestConfig {
        following_limit: 2,
        ..test_config()
    };
    let h = harness_with(feed, config).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.following_refreshed, 2);
    assert_eq!(h.store.following_count(h.user.id).await.unwrap(), 2);

    // The limit was reached on the first page
    let following_calls = h
        .feed
        .calls()
        .iter()
        .filter(|c| c.starts_with("following:"))
        .count();
    assert_eq!(following_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn full_following_set_stops_paging_at_limit() {
    let pages: Vec<Vec<FeedUser>> = (1..=20)
        .map(|i| vec![account(100 + i, &format!("new{}", i))])
        .collect();
    let feed = StubFeedSource::empty().with_following("alice", pages);
    let config = IngestConfig {
        following_limit: 2,
        ..test_config()
    };
    let h = harness_with(feed, config).await;

    for id in 1..=2 {
        h.store
            .upsert_author(&Author {
                id,
                handle: format!("old{}", id),
                display_name: None,
                last_seen_at: None,
            })
            .await
            .unwrap();
        assert!(
            h.store
                .upsert_following(h.user.id, id, hours_ago(48), 2)
                .await
                .unwrap()
        );
    }

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    // New accounts do not fit, but they still count toward the limit
    let following_calls = h
        .feed
        .calls()
        .iter()
        .filter(|c| c.starts_with("following:"))
        .count();
    assert_eq!(following_calls, 2);
    assert_eq!(summary.following_refreshed, 0);
    assert_eq!(h.store.following_count(h.user.id).await.unwrap(), 2);

    let runs = h.store.runs_for(h.user.id).unwrap();
    assert_eq!(runs[0].status, RunStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn following_pages_are_followed_until_exhausted() {
    let accounts: Vec<FeedUser> = (1..=4).map(|i| account(i, &format!("a{}", i))).collect();
    let feed = StubFeedSource::empty().with_following(
        "alice",
        vec![accounts[..2].to_vec(), accounts[2..].to_vec()],
    );
    let h = harness(feed).await;

    h.ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    let following = h.store.following(h.user.id).await.unwrap();
    assert_eq!(
        following.iter().map(|f| f.handle.as_str()).collect::<Vec<_>>(),
        vec!["a1", "a2", "a3", "a4"]
    );
    assert!(following.iter().all(|f| f.last_checked_at == Some(now())));
}

#[tokio::test(start_paused = true)]
async fn backfill_stops_at_cutoff() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![
                vec![post(5, &bob, hours_ago(1)), post(4, &bob, hours_ago(10))],
                vec![post(3, &bob, hours_ago(20)), post(2, &bob, hours_ago(30))],
                vec![post(1, &bob, hours_ago(40))],
            ],
        );
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::from_secs(24 * 3600))
        .await
        .unwrap();

    assert_eq!(summary.fetched, 3);
    for id in [5, 4, 3] {
        assert!(h.store.post_exists(h.user.id, id).await.unwrap());
    }
    for id in [2, 1] {
        assert!(!h.store.post_exists(h.user.id, id).await.unwrap());
    }
    assert_eq!(h.feed.post_requests("bob"), 2);

    let cutoff = hours_ago(24);
    assert!(
        h.store
            .posts_for(h.user.id)
            .unwrap()
            .iter()
            .all(|p| p.published_at >= cutoff)
    );
}

#[tokio::test(start_paused = true)]
async fn regular_mode_reads_one_page_per_author() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![
                vec![post(4, &bob, hours_ago(1)), post(3, &bob, hours_ago(2))],
                vec![post(2, &bob, hours_ago(3)), post(1, &bob, hours_ago(4))],
            ],
        );
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(h.feed.post_requests("bob"), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_finalizes_as_rate_limited() {
    let feed = StubFeedSource::empty().rate_limit_following("alice", 10);
    let h = harness(feed).await;

    let err = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap_err();
    assert_eq!(err.run_status(), RunStatus::RateLimited);

    let following_calls = h
        .feed
        .calls()
        .iter()
        .filter(|c| c.starts_with("following:"))
        .count();
    assert_eq!(following_calls, 4);

    let runs = h.store.runs_for(h.user.id).unwrap();
    assert_eq!(runs[0].status, RunStatus::RateLimited);
    assert_eq!(runs[0].retried, 3);
    assert_eq!(runs[0].rate_limit_hits, 4);
    assert!(runs[0].err_text.as_deref().unwrap().contains("Rate limited"));
    assert!(runs[0].completed_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn transient_rate_limit_is_retried() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts("bob", vec![vec![post(1, &bob, hours_ago(1))]])
        .rate_limit_posts("bob", 2);
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.retried, 2);
    assert_eq!(summary.rate_limit_hits, 2);

    let runs = h.store.runs_for(h.user.id).unwrap();
    assert_eq!(runs[0].status, RunStatus::Ok);
    assert_eq!(runs[0].retried, 2);
}

#[tokio::test(start_paused = true)]
async fn failing_author_is_skipped() {
    let bob = account(11, "bob");
    let carol = account(12, "carol");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone(), carol.clone()]])
        .with_posts("carol", vec![vec![post(7, &carol, hours_ago(1))]])
        .fail_posts("bob", 500);
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.authors_processed, 2);
    assert!(h.store.post_exists(h.user.id, 7).await.unwrap());

    let runs = h.store.runs_for(h.user.id).unwrap();
    assert_eq!(runs[0].status, RunStatus::Ok);
    assert_eq!(runs[0].cursor, 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_author_is_skipped() {
    let bob = account(11, "bob");
    let carol = account(12, "carol");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone(), carol.clone()]])
        .with_posts("carol", vec![vec![post(7, &carol, hours_ago(1))]])
        .rate_limit_posts("bob", 10);
    let h = harness(feed).await;

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(h.feed.post_requests("bob"), 4);
    assert_eq!(h.feed.post_requests("carol"), 1);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.retried, 3);
    assert_eq!(summary.rate_limit_hits, 4);
    assert!(h.store.post_exists(h.user.id, 7).await.unwrap());

    let runs = h.store.runs_for(h.user.id).unwrap();
    assert_eq!(runs[0].status, RunStatus::Ok);
    assert_eq!(runs[0].cursor, 2);
    assert_eq!(runs[0].rate_limit_hits, 4);
    assert!(runs[0].err_text.is_none());
}

#[tokio::test(start_paused = true)]
async fn relationship_without_author_is_skipped() {
    let carol = account(12, "carol");
    let feed = StubFeedSource::empty()
        .with_posts("carol", vec![vec![post(7, &carol, hours_ago(1))]]);
    let h = harness(feed).await;

    // Relationship row whose author was never stored
    h.store
        .upsert_following(h.user.id, 99, hours_ago(48), 150)
        .await
        .unwrap();
    h.store
        .upsert_author(&Author {
            id: 12,
            handle: "carol".to_string(),
            display_name: None,
            last_seen_at: None,
        })
        .await
        .unwrap();
    h.store
        .upsert_following(h.user.id, 12, hours_ago(48), 150)
        .await
        .unwrap();

    let summary = h
        .ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.authors_processed, 2);
    assert_eq!(summary.fetched, 1);
    assert!(h.store.post_exists(h.user.id, 7).await.unwrap());
    assert!(!h.feed.calls().iter().any(|c| c.starts_with("posts::")));
    assert_eq!(h.store.runs_for(h.user.id).unwrap()[0].status, RunStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn active_run_blocks_a_second_run() {
    let h = harness(StubFeedSource::empty()).await;

    let active = IngestRun::start(h.user.id, hours_ago(1));
    h.store.create_run(&active).await.unwrap();

    match h.ingestor.ingest_user_data(h.user.id, Duration::ZERO).await {
        Err(IngestError::AlreadyRunning { run_id, .. }) => assert_eq!(run_id, active.id),
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }

    match h.ingestor.trigger(h.user.id, 0).await.unwrap() {
        TriggerOutcome::Conflict { run_id, started_at } => {
            assert_eq!(run_id, active.id);
            assert_eq!(started_at, hours_ago(1));
        }
        TriggerOutcome::Accepted { .. } => panic!("expected conflict"),
    }

    assert_eq!(h.store.runs_for(h.user.id).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_user_creates_no_run() {
    let h = harness(StubFeedSource::empty()).await;
    let ghost = UserId::new();

    assert!(matches!(
        h.ingestor.ingest_user_data(ghost, Duration::ZERO).await,
        Err(IngestError::UserNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        h.ingestor.trigger(ghost, 0).await,
        Err(IngestError::UserNotFound(_))
    ));
    assert!(h.store.runs_for(ghost).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn trigger_dispatches_and_status_reports_outcome() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts("bob", vec![vec![post(1, &bob, hours_ago(1))]]);
    let h = harness(feed).await;

    let before = ingest_status(h.store.as_ref(), h.user.id, None)
        .await
        .unwrap();
    assert_eq!(before.sync_state, SyncState::NeverRun);

    assert!(matches!(
        h.ingestor.trigger(h.user.id, 721).await,
        Err(IngestError::InvalidBackfill { hours: 721, .. })
    ));

    let handle = match h.ingestor.trigger(h.user.id, 48).await.unwrap() {
        TriggerOutcome::Accepted { handle } => handle,
        TriggerOutcome::Conflict { .. } => panic!("expected accepted"),
    };
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.fetched, 1);

    let after = ingest_status(h.store.as_ref(), h.user.id, Some(5))
        .await
        .unwrap();
    assert_eq!(after.last_sync_at, Some(now()));
    assert!(after.current_run.is_none());
    assert_eq!(after.recent_runs.len(), 1);
    assert_eq!(
        after.sync_state,
        SyncState::Completed {
            status: RunStatus::Ok,
            error: None
        }
    );

    assert!(
        ingest_status(h.store.as_ref(), h.user.id, Some(0))
            .await
            .is_err()
    );
    assert!(
        ingest_status(h.store.as_ref(), h.user.id, Some(51))
            .await
            .is_err()
    );
}

#[tokio::test(start_paused = true)]
async fn status_reports_running_run() {
    let h = harness(StubFeedSource::empty()).await;
    let active = IngestRun::start(h.user.id, hours_ago(1));
    h.store.create_run(&active).await.unwrap();

    let status = ingest_status(h.store.as_ref(), h.user.id, None)
        .await
        .unwrap();
    assert_eq!(
        status.sync_state,
        SyncState::Running {
            run_id: active.id.clone(),
            started_at: hours_ago(1)
        }
    );
    assert!(status.last_sync_at.is_none());
}

fn with_photo(mut p: FeedPost, url: &str) -> FeedPost {
    p.media = Media {
        photos: vec![Photo {
            url: url.to_string(),
        }],
        videos: vec![],
    };
    p
}

#[tokio::test(start_paused = true)]
async fn media_descriptions_are_appended_within_budget() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![vec![
                with_photo(post(2, &bob, hours_ago(1)), "https://img.example/2.jpg"),
                with_photo(post(1, &bob, hours_ago(2)), "https://img.example/1.jpg"),
            ]],
        );
    let config = IngestConfig {
        max_media_per_run: 1,
        ..test_config()
    };
    let h = harness_with(feed, config).await;
    let media = Arc::new(StubMediaDescriber::new(MediaLimits::default()));
    let ingestor = h.ingestor.clone().with_media(media.clone());

    ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    let posts = h.store.posts_for(h.user.id).unwrap();
    assert_eq!(posts[1].post_id, 2);
    assert_eq!(
        posts[1].text,
        "post 2\n\n[Image 1: picture at https://img.example/2.jpg]"
    );
    assert_eq!(posts[0].text, "post 1");
    assert_eq!(media.requested().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn media_budget_is_charged_per_post_image_limit() {
    let bob = account(11, "bob");
    let mut crowded = post(2, &bob, hours_ago(1));
    crowded.media = Media {
        photos: (1..=10)
            .map(|i| Photo {
                url: format!("https://img.example/2-{}.jpg", i),
            })
            .collect(),
        videos: vec![],
    };
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![vec![
                crowded,
                with_photo(post(1, &bob, hours_ago(2)), "https://img.example/1.jpg"),
            ]],
        );
    let config = IngestConfig {
        max_media_per_run: 5,
        max_images_per_post: 4,
        ..test_config()
    };
    let h = harness_with(feed, config).await;
    let media = Arc::new(StubMediaDescriber::new(MediaLimits::default()));
    let ingestor = h.ingestor.clone().with_media(media.clone());

    ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    let requested = media.requested();
    assert_eq!(requested.len(), 5);
    assert_eq!(requested[4], "https://img.example/1.jpg");

    let posts = h.store.posts_for(h.user.id).unwrap();
    assert_eq!(posts[0].post_id, 1);
    assert_eq!(
        posts[0].text,
        "post 1\n\n[Image 1: picture at https://img.example/1.jpg]"
    );
    assert!(!posts[1].text.contains("[Image 5:"));
}

#[tokio::test(start_paused = true)]
async fn media_failures_degrade_to_plain_text() {
    let bob = account(11, "bob");
    let feed = StubFeedSource::empty()
        .with_following("alice", vec![vec![bob.clone()]])
        .with_posts(
            "bob",
            vec![vec![with_photo(
                post(1, &bob, hours_ago(1)),
                "https://img.example/1.jpg",
            )]],
        );
    let h = harness(feed).await;
    let ingestor = h
        .ingestor
        .clone()
        .with_media(Arc::new(StubMediaDescriber::failing()));

    let summary = ingestor
        .ingest_user_data(h.user.id, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(h.store.posts_for(h.user.id).unwrap()[0].text, "post 1");
}
