//! Run loop behaviour: ordering, cap, pacing, and outcome routing.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use syndicate::content::{ContentItem, ItemKey, Platform, PlatformStatus};
use syndicate::run::{RunController, StopReason};

use crate::support::{
    footer_config, item, item_with_body, published, rejected, titles, Event, Harness, ManualClock,
    ScriptedPublisher, Workspace,
};

fn submit(title: &str) -> Event {
    Event::Submit(title.to_owned())
}

fn pause(secs: u64) -> Event {
    Event::Sleep(Duration::from_secs(secs))
}

#[tokio::test]
async fn publishes_in_queue_order_up_to_the_cap() {
    let ws = Workspace::with_queue(&["A", "B", "C", "D", "E"].map(item));
    let harness = Harness::new(
        ws.settings(3, 30),
        vec![
            published("https://dev.to/me/a"),
            published("https://dev.to/me/b"),
            published("https://dev.to/me/c"),
        ],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.published, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.remaining, 2);
    assert_eq!(report.stop, StopReason::CapReached);

    assert_eq!(titles(&ws.queue_items()), vec!["D", "E"]);
    let archive = ws.archive_items();
    assert_eq!(titles(&archive), vec!["A", "B", "C"]);
    for entry in &archive {
        let state = match entry.state(Platform::Devto) {
            Some(state) => state,
            None => panic!("archived entry should carry devto state"),
        };
        assert_eq!(state.status, PlatformStatus::Published);
        assert!(state.url.is_some());
        assert!(state.timestamp.is_some());
    }
}

#[tokio::test]
async fn pacing_separates_successes_but_not_the_last_one() {
    let ws = Workspace::with_queue(&["A", "B", "C", "D"].map(item));
    let harness = Harness::new(
        ws.settings(3, 30),
        vec![
            published("https://dev.to/me/a"),
            published("https://dev.to/me/b"),
            published("https://dev.to/me/c"),
        ],
    );

    let _ = harness.run_ok().await;
    assert_eq!(
        harness.events(),
        vec![
            submit("A"),
            pause(30),
            submit("B"),
            pause(30),
            submit("C"),
        ]
    );
}

#[tokio::test]
async fn no_pacing_when_the_queue_runs_dry() {
    let ws = Workspace::with_queue(&["A", "B"].map(item));
    let harness = Harness::new(
        ws.settings(5, 10),
        vec![published("https://dev.to/me/a"), published("https://dev.to/me/b")],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.stop, StopReason::QueueDrained);
    assert_eq!(report.published, 2);
    assert_eq!(
        harness.events(),
        vec![submit("A"), pause(10), submit("B")]
    );
}

#[tokio::test]
async fn zero_pacing_never_sleeps() {
    let ws = Workspace::with_queue(&["A", "B"].map(item));
    let harness = Harness::new(
        ws.settings(5, 0),
        vec![published("https://dev.to/me/a"), published("https://dev.to/me/b")],
    );

    let _ = harness.run_ok().await;
    assert_eq!(harness.events(), vec![submit("A"), submit("B")]);
}

#[tokio::test]
async fn retryable_failure_ends_the_run_and_keeps_the_item() {
    let ws = Workspace::with_queue(&["A", "B"].map(item));
    let harness = Harness::new(ws.settings(3, 30), vec![rejected(429, "Rate limit reached")]);

    let report = harness.run_ok().await;
    match &report.stop {
        StopReason::BackPressure { reason } => assert!(reason.contains("429")),
        other => panic!("expected back-pressure, got {other}"),
    }
    assert_eq!(report.published, 0);
    assert_eq!(report.remaining, 2);
    assert_eq!(harness.events(), vec![submit("A")]);
    assert_eq!(titles(&ws.queue_items()), vec!["A", "B"]);
    assert!(ws.archive_items().is_empty());
}

#[tokio::test]
async fn permanent_failure_is_archived_and_the_run_continues() {
    let ws = Workspace::with_queue(&["Broken", "Good"].map(item));
    let harness = Harness::new(
        ws.settings(1, 30),
        vec![
            rejected(422, "Title can't be blank"),
            published("https://dev.to/me/good"),
        ],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.stop, StopReason::CapReached);
    assert_eq!(harness.events(), vec![submit("Broken"), submit("Good")]);

    assert!(ws.queue_items().is_empty());
    let archive = ws.archive_items();
    assert_eq!(titles(&archive), vec!["Broken", "Good"]);
    assert_eq!(archive[0].status(Platform::Devto), PlatformStatus::Failed);
    assert_eq!(
        archive[0]
            .state(Platform::Devto)
            .and_then(|s| s.error.as_deref()),
        Some("HTTP 422: Title can't be blank")
    );
    assert_eq!(archive[1].status(Platform::Devto), PlatformStatus::Published);
}

#[tokio::test]
async fn canonical_collision_is_archived_as_published() {
    let canonical = "https://blog.example/already-there";
    let ws = Workspace::with_queue(&[item("Dup").with_canonical_url(canonical)]);
    let harness = Harness::new(
        ws.settings(3, 30),
        vec![rejected(422, "Canonical url has already been taken")],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.published, 1);
    let archive = ws.archive_items();
    assert_eq!(
        archive[0]
            .state(Platform::Devto)
            .and_then(|s| s.url.as_deref()),
        Some(canonical)
    );
}

#[tokio::test]
async fn missing_queue_is_a_no_op() {
    let ws = Workspace::new();
    let harness = Harness::new(ws.settings(3, 30), Vec::new());

    let report = harness.run_ok().await;
    assert_eq!(report.stop, StopReason::NoQueue);
    assert!(harness.events().is_empty());
    assert!(!ws.queue.exists());
    assert!(!ws.archive.exists());
}

#[tokio::test]
async fn items_already_terminal_in_the_queue_are_skipped() {
    let stale = item("Stale").published(
        Platform::Devto,
        "https://dev.to/me/stale".to_owned(),
        chrono::Utc::now(),
    );
    let ws = Workspace::with_queue(&[stale, item("Fresh")]);
    let harness = Harness::new(ws.settings(3, 30), vec![published("https://dev.to/me/fresh")]);

    let report = harness.run_ok().await;
    assert_eq!(report.published, 1);
    assert_eq!(harness.events(), vec![submit("Fresh")]);
    assert_eq!(titles(&ws.queue_items()), vec!["Stale"]);
}

#[tokio::test]
async fn submissions_carry_footer_and_normalized_tags() {
    let ws = Workspace::with_queue(&[item("Tagged").with_tags(["Rust", "Web Dev", "rust"])]);
    let harness = Harness::new(
        ws.settings_with(footer_config(), 3, 30),
        vec![published("https://dev.to/me/tagged")],
    );

    let _ = harness.run_ok().await;
    let sent = harness.publisher.submissions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tags, vec!["rust", "webdev"]);
    assert_eq!(
        sent[0].body,
        "Body of Tagged\n\n---\nOriginally published at https://blog.example"
    );

    let archived = ws.archive_items();
    assert_eq!(archived[0].body(), "Body of Tagged");
    assert_eq!(archived[0].tags(), ["Rust", "Web Dev", "rust"]);
}

#[tokio::test]
async fn controller_rejects_a_publisher_for_another_platform() {
    let ws = Workspace::new();
    let events = Arc::default();
    let publisher = Arc::new(ScriptedPublisher::new(
        Platform::Hashnode,
        Vec::new(),
        Arc::clone(&events),
    ));
    let clock = Arc::new(ManualClock::new(events));

    let controller = RunController::new(ws.settings(3, 30), publisher, clock);
    assert!(controller.is_err());
}

#[tokio::test]
async fn report_summarises_the_run() {
    let ws = Workspace::with_queue(&["A", "B"].map(item));
    let harness = Harness::new(ws.settings(1, 30), vec![published("https://dev.to/me/a")]);

    let report = harness.run_ok().await;
    assert_eq!(
        report.to_string(),
        "Dev.to: published 1, failed 0, 1 pending (per-run cap reached)"
    );
}

#[tokio::test]
async fn permanent_then_successes_respect_order_and_cap() {
    let ws = Workspace::with_queue(&["A", "B", "C"].map(item));
    let harness = Harness::new(
        ws.settings(2, 30),
        vec![
            rejected(400, "Bad request"),
            published("https://dev.to/me/b"),
            published("https://dev.to/me/c"),
        ],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.stop, StopReason::CapReached);
    assert_eq!(titles(&ws.queue_items()), Vec::<String>::new());

    let archive = ws.archive_items();
    assert_eq!(titles(&archive), vec!["A", "B", "C"]);
    assert_eq!(archive[0].status(Platform::Devto), PlatformStatus::Failed);
    assert_eq!(
        harness.events(),
        vec![submit("A"), submit("B"), pause(30), submit("C")]
    );
}

#[tokio::test]
async fn cap_of_two_leaves_the_tail_queued() {
    let ws = Workspace::with_queue(&["A", "B", "C", "D"].map(item));
    let harness = Harness::new(
        ws.settings(2, 0),
        vec![
            rejected(400, "Bad request"),
            published("https://dev.to/me/b"),
            published("https://dev.to/me/c"),
        ],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.published, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(titles(&ws.queue_items()), vec!["D"]);
}

#[tokio::test]
async fn run_preserves_the_set_of_item_identities() {
    let queued = [
        item("A"),
        item("B").with_canonical_url("https://blog.example/b"),
        item("C"),
        item("D"),
        item("E"),
    ];
    let ws = Workspace::with_queue(&queued);
    let before: BTreeSet<ItemKey> = queued.iter().map(ContentItem::key).collect();

    let harness = Harness::new(
        ws.settings(3, 0),
        vec![
            published("https://dev.to/me/a"),
            rejected(422, "Canonical url has already been taken"),
            rejected(404, "Not found"),
            rejected(503, "Service unavailable"),
        ],
    );
    let report = harness.run_ok().await;
    assert!(matches!(report.stop, StopReason::BackPressure { .. }));
    assert_eq!(report.published, 2);
    assert_eq!(report.failed, 1);

    let queue = ws.queue_items();
    let archive = ws.archive_items();
    let after: BTreeSet<ItemKey> = queue.iter().chain(&archive).map(ContentItem::key).collect();
    assert_eq!(before, after);
    assert_eq!(queue.len().saturating_add(archive.len()), queued.len());
    assert_eq!(titles(&queue), vec!["D", "E"]);
}

#[tokio::test]
async fn items_sharing_a_title_are_published_separately() {
    let ws = Workspace::with_queue(&[
        item_with_body("Weekly notes", "week one"),
        item_with_body("Weekly notes", "week two"),
    ]);
    let harness = Harness::new(
        ws.settings(5, 0),
        vec![
            published("https://dev.to/me/weekly-notes-1"),
            published("https://dev.to/me/weekly-notes-2"),
        ],
    );

    let report = harness.run_ok().await;
    assert_eq!(report.published, 2);
    assert_eq!(
        harness.events(),
        vec![submit("Weekly notes"), submit("Weekly notes")]
    );
    assert!(ws.queue_items().is_empty());
    let bodies: Vec<String> = ws
        .archive_items()
        .iter()
        .map(|entry| entry.body().to_owned())
        .collect();
    assert_eq!(bodies, vec!["week one", "week two"]);
}
