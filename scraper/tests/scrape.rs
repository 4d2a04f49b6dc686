use moltbook_client::{AuthorPayload, FetchBatch, PostPayload, RetryConfig, SubmoltPayload};
use moltscrape_core::{Checkpoint, CheckpointError, CoreError, MoltbookApiError, ScrapeOutput};
use scraper::{run, CheckpointStore, PostSource, ScrapeOptions};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Serves a pre-scripted sequence of batch results and records every
/// fetch, so tests can assert on cursors and retry pacing.
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<FetchBatch, CoreError>>>,
    fetches: Mutex<Vec<(u64, Instant)>>,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<FetchBatch, CoreError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    fn fetch_cursors(&self) -> Vec<u64> {
        self.fetches.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    fn fetch_gaps(&self) -> Vec<Duration> {
        let fetches = self.fetches.lock().unwrap();
        fetches
            .windows(2)
            .map(|w| w[1].1.duration_since(w[0].1))
            .collect()
    }
}

impl PostSource for ScriptedSource {
    async fn fetch_batch(&self, cursor: u64, _limit: u32) -> Result<FetchBatch, CoreError> {
        self.fetches.lock().unwrap().push((cursor, Instant::now()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(FetchBatch {
                    posts: Vec::new(),
                    next_cursor: cursor,
                    has_more: false,
                })
            })
    }
}

fn payload(id: &str) -> PostPayload {
    PostPayload {
        id: Some(id.to_string()),
        title: Some(format!("title {id}")),
        content: Some(format!("content {id}")),
        author: Some(AuthorPayload {
            id: Some("author-1".to_string()),
            name: Some("clawdia".to_string()),
        }),
        submolt: Some(SubmoltPayload {
            id: Some("submolt-1".to_string()),
            name: Some("agents".to_string()),
        }),
        upvotes: Some(7),
        comment_count: Some(2),
        created_at: Some("2026-01-12T09:30:00Z".to_string()),
    }
}

fn batch(ids: &[&str], next_cursor: u64, has_more: bool) -> Result<FetchBatch, CoreError> {
    Ok(FetchBatch {
        posts: ids.iter().map(|id| payload(id)).collect(),
        next_cursor,
        has_more,
    })
}

fn server_error(status_code: u16) -> Result<FetchBatch, CoreError> {
    Err(CoreError::Api(MoltbookApiError::ServerError { status_code }))
}

fn options(dir: &Path, target_count: usize) -> ScrapeOptions {
    let mut opts = ScrapeOptions::new(target_count, dir.join("posts.json"));
    opts.batch_pause = Duration::ZERO;
    opts.retry = RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
    };
    opts
}

fn read_output(path: &Path) -> ScrapeOutput {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn ids(output: &ScrapeOutput) -> Vec<&str> {
    output.posts.iter().map(|p| p.id.as_str()).collect()
}

#[tokio::test]
async fn end_to_end_two_batches_with_invalid_post() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 8);

    let mut invalid = payload("bad");
    invalid.content = None;
    let batch1 = Ok(FetchBatch {
        posts: vec![
            payload("p1"),
            payload("p2"),
            invalid,
            payload("p3"),
            payload("p4"),
        ],
        next_cursor: 25,
        has_more: true,
    });
    let source = ScriptedSource::new(vec![
        batch1,
        batch(&["p5", "p6", "p7", "p8", "p9"], 50, true),
    ]);

    let written = run(&source, &opts).await.unwrap();
    assert_eq!(written, 8);

    let output = read_output(&opts.output_path);
    assert_eq!(output.count, 8);
    assert_eq!(
        ids(&output),
        vec!["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"]
    );
    for post in &output.posts {
        assert!(!post.title.is_empty());
        assert!(!post.content.is_empty());
    }

    // Checkpoint survived completion, cursor pointing past batch 2
    let checkpoint = CheckpointStore::new(&opts.checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.cursor, 50);
    assert_eq!(checkpoint.posts.len(), 9);
}

#[tokio::test]
async fn resume_after_completion_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 8);

    let source = ScriptedSource::new(vec![
        batch(&["p1", "p2", "p3", "p4"], 25, true),
        batch(&["p5", "p6", "p7", "p8", "p9"], 50, true),
    ]);
    run(&source, &opts).await.unwrap();
    let first = read_output(&opts.output_path);

    // No new remote data: the second run must not fetch anything
    let idle = ScriptedSource::new(Vec::new());
    let written = run(&idle, &opts).await.unwrap();
    assert_eq!(written, 8);
    assert_eq!(idle.fetch_count(), 0);

    let second = read_output(&opts.output_path);
    assert_eq!(ids(&second), ids(&first));
}

#[tokio::test]
async fn overlapping_batches_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);

    let source = ScriptedSource::new(vec![
        batch(&["a", "b", "c"], 3, true),
        batch(&["b", "c", "d"], 6, false),
    ]);

    let written = run(&source, &opts).await.unwrap();
    assert_eq!(written, 4);

    let output = read_output(&opts.output_path);
    assert_eq!(ids(&output), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn overshoot_is_truncated_to_target_in_fetch_order() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);

    let source = ScriptedSource::new(vec![
        batch(&["p1", "p2", "p3", "p4", "p5"], 5, true),
        batch(&["p6", "p7", "p8", "p9", "p10"], 10, true),
        batch(&["p11", "p12", "p13", "p14", "p15"], 15, true),
    ]);

    let written = run(&source, &opts).await.unwrap();
    assert_eq!(written, 10);
    // Target reached after two batches; the third is never requested
    assert_eq!(source.fetch_count(), 2);

    let output = read_output(&opts.output_path);
    assert_eq!(
        ids(&output),
        vec!["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8", "p9", "p10"]
    );
}

#[tokio::test]
async fn restart_after_crash_keeps_checkpointed_posts() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);

    // State left behind by a run that crashed after checkpointing
    let store = CheckpointStore::new(&opts.checkpoint_path);
    let recovered = vec![
        payload("a").into_post().unwrap(),
        payload("b").into_post().unwrap(),
    ];
    store.save(&Checkpoint::new(25, recovered)).unwrap();

    let source = ScriptedSource::new(vec![batch(&["c", "d"], 50, false)]);
    let written = run(&source, &opts).await.unwrap();
    assert_eq!(written, 4);

    // Resumed from the checkpoint cursor, not from zero
    assert_eq!(source.fetch_cursors(), vec![25]);

    let output = read_output(&opts.output_path);
    assert_eq!(ids(&output), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn exhausted_retries_abort_but_keep_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);

    let source = ScriptedSource::new(vec![
        batch(&["a", "b", "c"], 25, true),
        server_error(500),
        server_error(502),
        server_error(503),
    ]);

    let err = run(&source, &opts).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::RetriesExhausted { attempts: 3, .. }
    ));

    // The failed run never writes the output artifact
    assert!(!opts.output_path.exists());

    // The last successful batch is still durable for the next run
    let checkpoint = CheckpointStore::new(&opts.checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.cursor, 25);
    assert_eq!(checkpoint.posts.len(), 3);
}

#[tokio::test]
async fn auth_failure_aborts_without_retrying() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);

    let source = ScriptedSource::new(vec![Err(CoreError::Api(
        MoltbookApiError::AuthenticationFailed {
            reason: "key rejected".to_string(),
        },
    ))]);

    let err = run(&source, &opts).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Api(MoltbookApiError::AuthenticationFailed { .. })
    ));
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn corrupt_checkpoint_aborts_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);
    std::fs::write(&opts.checkpoint_path, b"definitely not json").unwrap();

    let source = ScriptedSource::new(vec![batch(&["a"], 25, false)]);
    let err = run(&source, &opts).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Checkpoint(CheckpointError::Corrupted { .. })
    ));
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn end_of_results_is_a_short_completion() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 10);

    let source = ScriptedSource::new(vec![batch(&["a", "b", "c"], 25, false)]);
    let written = run(&source, &opts).await.unwrap();
    assert_eq!(written, 3);

    let output = read_output(&opts.output_path);
    assert_eq!(ids(&output), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn no_resume_discards_existing_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path(), 10);
    opts.resume = false;

    let store = CheckpointStore::new(&opts.checkpoint_path);
    store
        .save(&Checkpoint::new(
            25,
            vec![payload("stale").into_post().unwrap()],
        ))
        .unwrap();

    let source = ScriptedSource::new(vec![batch(&["x", "y"], 25, false)]);
    let written = run(&source, &opts).await.unwrap();
    assert_eq!(written, 2);
    assert_eq!(source.fetch_cursors(), vec![0]);

    let output = read_output(&opts.output_path);
    assert_eq!(ids(&output), vec!["x", "y"]);
}

#[tokio::test]
async fn backoff_delays_grow_between_retries() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path(), 1);
    opts.retry = RetryConfig {
        max_attempts: 5,
        base_delay_ms: 20,
        max_delay_ms: 10_000,
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
    };

    let source = ScriptedSource::new(vec![
        server_error(500),
        server_error(502),
        server_error(503),
        batch(&["a"], 25, false),
    ]);

    run(&source, &opts).await.unwrap();

    // Four attempts, three backoff sleeps: 20ms, 40ms, 80ms
    let gaps = source.fetch_gaps();
    assert_eq!(gaps.len(), 3);
    assert!(gaps[0] >= Duration::from_millis(20));
    assert!(gaps[1] >= Duration::from_millis(40));
    assert!(gaps[2] >= Duration::from_millis(80));
    assert!(gaps[2] >= gaps[0]);
}
