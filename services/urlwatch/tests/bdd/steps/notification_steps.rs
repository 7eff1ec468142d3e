//! Step definitions for notification.feature

use std::sync::Arc;
use std::time::Instant;

use cucumber::{given, then, when};
use urlwatch::notifier::{CommandNotifier, EventKind, NotificationEvent, Notifier};
use urlwatch::NotificationConfig;

use crate::world::UrlWatchWorld;

fn sink(world: &UrlWatchWorld) -> CommandNotifier {
    let config = world
        .notification
        .clone()
        .expect("notification command not configured");
    CommandNotifier::new(config)
}

#[given(expr = "the notification command {string}")]
fn notification_command(world: &mut UrlWatchWorld, argv: String) {
    let notification: Vec<String> = serde_json::from_str(&argv).expect("argv must be a JSON array");
    let config = NotificationConfig { notification };
    config.validate().expect("notification command should be valid");
    world.notification = Some(config);
}

#[when(expr = "a {string} notification is sent for {string}")]
async fn notification_is_sent(world: &mut UrlWatchWorld, message: String, url: String) {
    let event = NotificationEvent {
        kind: EventKind::Changed,
        message,
        url,
    };
    let output = sink(world).notify(&event).await;
    world.notification_outputs.push(output);
}

#[when(expr = "{int} notifications are sent at the same time")]
async fn notifications_sent_together(world: &mut UrlWatchWorld, count: usize) {
    let notifier = Arc::new(sink(world));
    let started = Instant::now();

    let handles: Vec<_> = (0..count)
        .map(|i| {
            let notifier = Arc::clone(&notifier);
            tokio::spawn(async move {
                notifier
                    .notify(&NotificationEvent::error(
                        format!("event {}", i),
                        "http://example.com/",
                    ))
                    .await
            })
        })
        .collect();
    for handle in handles {
        world
            .notification_outputs
            .push(handle.await.expect("notify task panicked"));
    }

    world.notification_elapsed = Some(started.elapsed());
}

#[then(expr = "the notification output is {string}")]
fn notification_output_is(world: &mut UrlWatchWorld, expected: String) {
    let output = world.notification_outputs.last().expect("nothing sent");
    assert_eq!(output.trim_end(), expected);
}

#[then(expr = "the notification output starts with {string}")]
fn notification_output_starts_with(world: &mut UrlWatchWorld, prefix: String) {
    let output = world.notification_outputs.last().expect("nothing sent");
    assert!(output.starts_with(&prefix), "output was {:?}", output);
}

#[then(expr = "sending them took at least {int} milliseconds")]
fn sending_took_at_least(world: &mut UrlWatchWorld, millis: u64) {
    let elapsed = world.notification_elapsed.expect("nothing sent");
    assert!(
        elapsed.as_millis() >= u128::from(millis),
        "took {:?}",
        elapsed
    );
}
