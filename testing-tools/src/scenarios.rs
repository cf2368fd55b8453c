use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

const EVENT_TYPE: &str = "smoke_test";
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_WINDOW: Duration = Duration::from_secs(1);

fn outcome(scenario: &str, start: Instant, failure: Option<String>) -> TestResult {
    match &failure {
        None => println!("{} Scenario passed", "✓".green()),
        Some(msg) => println!("{} {}", "✗".red(), msg),
    }
    TestResult {
        scenario: scenario.to_string(),
        passed: failure.is_none(),
        message: failure,
        duration: start.elapsed(),
    }
}

/// A message published to a channel reaches its subscriber with the same id and data.
pub async fn test_channel_delivery(
    base_url: &str,
    api_client: &ApiClient,
    channel: &str,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Channel Delivery ===".bright_cyan().bold());

    let mut sse = Connection::establish(base_url, channel, None, "Subscriber".to_string()).await?;
    api_client
        .wait_for_subscribers(channel, 1, EVENT_TIMEOUT)
        .await?;
    println!("{} Subscribed to {}", "✓".green(), channel);

    println!("{} Publishing to {}...", "→".blue(), channel);
    let deliveries = api_client
        .publish(Some(channel), "delivery-1", EVENT_TYPE, "hello")
        .await?;
    println!("{} Server reported {} delivery(ies)", "✓".green(), deliveries);

    let failure = match sse.wait_for_event(EVENT_TYPE, EVENT_TIMEOUT).await {
        Ok(event) => {
            print_event(&sse.label, &event);
            if event.id.as_deref() == Some("delivery-1") && event.data == "hello" {
                None
            } else {
                Some(format!(
                    "Expected id=delivery-1 data=hello, got id={:?} data={}",
                    event.id, event.data
                ))
            }
        }
        Err(e) => Some(format!("Timeout: {}", e)),
    };

    Ok(outcome("channel_delivery", start, failure))
}

/// Publishing without a channel reaches subscribers of every channel.
pub async fn test_broadcast_all(
    base_url: &str,
    api_client: &ApiClient,
    channels: &[String],
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Broadcast To All Channels ===".bright_cyan().bold());

    let mut connections = Vec::new();
    for channel in channels {
        let label = format!("Subscriber on {}", channel);
        connections.push(Connection::establish(base_url, channel, None, label).await?);
        api_client
            .wait_for_subscribers(channel, 1, EVENT_TIMEOUT)
            .await?;
    }
    println!("{} Subscribed to {} channel(s)", "✓".green(), channels.len());

    println!("{} Publishing to all channels...", "→".blue());
    let deliveries = api_client
        .publish(None, "broadcast-1", EVENT_TYPE, "to everyone")
        .await?;
    println!("{} Server reported {} delivery(ies)", "✓".green(), deliveries);

    let mut failure = None;
    for sse in &mut connections {
        match sse.wait_for_event(EVENT_TYPE, EVENT_TIMEOUT).await {
            Ok(event) => print_event(&sse.label, &event),
            Err(e) => {
                failure = Some(format!("{} on {}: {}", sse.label, sse.channel, e));
                break;
            }
        }
    }

    Ok(outcome("broadcast_all", start, failure))
}

/// A message published to one channel is never seen by another channel's subscriber.
pub async fn test_channel_isolation(
    base_url: &str,
    api_client: &ApiClient,
    target: &str,
    bystander: &str,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Channel Isolation ===".bright_cyan().bold());

    let mut target_sse =
        Connection::establish(base_url, target, None, "Target".to_string()).await?;
    let mut bystander_sse =
        Connection::establish(base_url, bystander, None, "Bystander".to_string()).await?;
    api_client
        .wait_for_subscribers(target, 1, EVENT_TIMEOUT)
        .await?;
    api_client
        .wait_for_subscribers(bystander, 1, EVENT_TIMEOUT)
        .await?;

    println!("{} Publishing to {} only...", "→".blue(), target);
    api_client
        .publish(Some(target), "isolation-1", EVENT_TYPE, "private")
        .await?;

    let failure = if let Err(e) = target_sse.wait_for_event(EVENT_TYPE, EVENT_TIMEOUT).await {
        Some(format!("Target did not receive the message: {}", e))
    } else if !bystander_sse.stays_quiet(EVENT_TYPE, QUIET_WINDOW).await {
        Some(format!("{} received a message published to {}", bystander, target))
    } else {
        None
    };

    Ok(outcome("channel_isolation", start, failure))
}
