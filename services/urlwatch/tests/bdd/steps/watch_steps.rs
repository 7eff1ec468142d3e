//! Step definitions for change_detection.feature

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use urlwatch::fetcher::ConditionalFetcher;
use urlwatch::io::HttpClient;
use urlwatch::notifier::{EventKind, Notifier};
use urlwatch::watcher::WatchExit;
use urlwatch::{watch_until, Target, WatchSettings};

use crate::world::{Reply, ScriptedClient, UrlWatchWorld};

const POLL_DELAY: Duration = Duration::from_millis(5);

fn reply(status: u16, etag: Option<String>, body: String) -> Reply {
    Reply { status, etag, body }
}

// --- Given steps ---

#[given(expr = "{string} answers {int} with ETag {string} and body {string}")]
fn url_answers_with_etag(
    world: &mut UrlWatchWorld,
    url: String,
    status: u16,
    etag: String,
    body: String,
) {
    world
        .scripts
        .push((url, vec![reply(status, Some(etag), body)]));
}

#[given(expr = "{string} answers {int} without validators and body {string}")]
fn url_answers_without_validators(
    world: &mut UrlWatchWorld,
    url: String,
    status: u16,
    body: String,
) {
    world.scripts.push((url, vec![reply(status, None, body)]));
}

#[given(expr = "{string} answers {int}")]
fn url_answers_status(world: &mut UrlWatchWorld, url: String, status: u16) {
    world
        .scripts
        .push((url, vec![reply(status, None, String::new())]));
}

#[given(expr = "then answers {int} with ETag {string} and body {string}")]
fn then_answers_with_etag(world: &mut UrlWatchWorld, status: u16, etag: String, body: String) {
    world.push_reply(reply(status, Some(etag), body));
}

#[given(expr = "then answers {int} without validators and body {string}")]
fn then_answers_without_validators(world: &mut UrlWatchWorld, status: u16, body: String) {
    world.push_reply(reply(status, None, body));
}

#[given(expr = "then answers {int}")]
fn then_answers_status(world: &mut UrlWatchWorld, status: u16) {
    world.push_reply(reply(status, None, String::new()));
}

// --- When steps ---

async fn watch(world: &mut UrlWatchWorld, shutdown_after: Option<Duration>) {
    let client = Arc::new(ScriptedClient::new(&world.scripts));
    world.client = Some(Arc::clone(&client));

    let targets = world
        .scripts
        .iter()
        .map(|(url, _)| Target::new(url.clone(), POLL_DELAY))
        .collect();
    let settings = WatchSettings {
        delay: POLL_DELAY,
        liveness_delay: Duration::from_secs(3600),
    };
    let http: Arc<dyn HttpClient> = client;
    let notifier: Arc<dyn Notifier> = Arc::clone(&world.notifier) as Arc<dyn Notifier>;

    world.reports = watch_until(
        targets,
        Arc::new(ConditionalFetcher::new(http)),
        notifier,
        settings,
        async move {
            match shutdown_after {
                Some(after) => {
                    tokio::time::sleep(after).await;
                    "SIGTERM".to_string()
                }
                None => std::future::pending::<String>().await,
            }
        },
    )
    .await;
}

#[when("the URLs are watched until they finish")]
async fn watched_until_finished(world: &mut UrlWatchWorld) {
    watch(world, None).await;
}

#[when(expr = "the URLs are watched for {int} milliseconds")]
async fn watched_for(world: &mut UrlWatchWorld, millis: u64) {
    watch(world, Some(Duration::from_millis(millis))).await;
}

// --- Then steps ---

#[then(expr = "the watch of {string} ends with {string}")]
fn watch_ends_with(world: &mut UrlWatchWorld, url: String, expected: String) {
    let exit = world.report_for(&url).exit.clone();
    let matched = match expected.as_str() {
        "changed" => exit == Some(WatchExit::Changed),
        "baseline failed" => matches!(exit, Some(WatchExit::BaselineFailed(_))),
        "cancelled" => exit == Some(WatchExit::Cancelled),
        other => panic!("unknown exit {:?}", other),
    };
    assert!(matched, "{} ended with {:?}, expected {}", url, exit, expected);
}

#[then(expr = "{string} was fetched {int} times")]
fn was_fetched(world: &mut UrlWatchWorld, url: String, count: usize) {
    assert_eq!(world.client().requests_for(&url).len(), count);
}

#[then(expr = "{int} {string} notification was sent for {string}")]
fn notifications_sent(world: &mut UrlWatchWorld, count: usize, message: String, url: String) {
    let events = world.notifier.events.lock().unwrap();
    let matching = events
        .iter()
        .filter(|e| e.message == message && e.url == url)
        .count();
    assert_eq!(matching, count, "events: {:?}", *events);
}

#[then(expr = "the notification {string} was sent for {string}")]
fn notification_sent(world: &mut UrlWatchWorld, message: String, url: String) {
    let events = world.notifier.events.lock().unwrap();
    assert!(
        events.iter().any(|e| e.message == message && e.url == url),
        "events: {:?}",
        *events
    );
}

#[then(expr = "every poll of {string} after the baseline sent If-None-Match {string}")]
fn polls_sent_etag(world: &mut UrlWatchWorld, url: String, etag: String) {
    let requests = world.client().requests_for(&url);
    assert!(requests.len() >= 2, "{} polled {} times", url, requests.len());
    assert_eq!(requests[0].if_none_match, None);
    for conditions in requests.iter().skip(1) {
        assert_eq!(conditions.if_none_match.as_deref(), Some(etag.as_str()));
    }
}

#[then("only the shutdown notification was sent")]
fn only_shutdown_sent(world: &mut UrlWatchWorld) {
    let events = world.notifier.events.lock().unwrap();
    assert_eq!(events.len(), 1, "events: {:?}", *events);
    assert_eq!(events[0].kind, EventKind::Shutdown);
}
