use anyhow::Result;
use clap::Parser;
use colored::*;

use testing_tools::api_client::ApiClient;
use testing_tools::output::{all_passed, print_test_summary};
use testing_tools::scenarios;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the broadcast server (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Prefix for the channel names the scenarios subscribe to
    #[arg(long, default_value = "smoke")]
    channel_prefix: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Publish to one channel and receive it on a subscriber
    ChannelDelivery,
    /// Publish to all channels and receive it on every subscriber
    BroadcastAll,
    /// Publish to one channel and make sure another channel stays quiet
    ChannelIsolation,
    /// Run all tests
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let api_client = ApiClient::new(reqwest::Client::new(), cli.base_url.clone());
    println!("{} Checking server health...", "→".blue());
    api_client.health().await?;
    println!("{} Server is up at {}", "✓".green(), cli.base_url);

    let first = format!("{}-1", cli.channel_prefix);
    let second = format!("{}-2", cli.channel_prefix);

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    let run_delivery = matches!(cli.scenario, ScenarioChoice::ChannelDelivery | ScenarioChoice::All);
    let run_broadcast = matches!(cli.scenario, ScenarioChoice::BroadcastAll | ScenarioChoice::All);
    let run_isolation =
        matches!(cli.scenario, ScenarioChoice::ChannelIsolation | ScenarioChoice::All);

    if run_delivery {
        results.push(scenarios::test_channel_delivery(&cli.base_url, &api_client, &first).await?);
    }
    if run_broadcast {
        let channels = [first.clone(), second.clone()];
        results.push(scenarios::test_broadcast_all(&cli.base_url, &api_client, &channels).await?);
    }
    if run_isolation {
        results.push(
            scenarios::test_channel_isolation(&cli.base_url, &api_client, &first, &second).await?,
        );
    }

    print_test_summary(&results);

    if !all_passed(&results) {
        std::process::exit(1);
    }

    Ok(())
}
