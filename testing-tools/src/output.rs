use colored::*;
use std::time::Duration;

use crate::sse_client::Event;

#[derive(Debug)]
pub struct TestResult {
    pub scenario: String,
    pub passed: bool,
    pub message: Option<String>,
    pub duration: Duration,
}

pub fn print_event(label: &str, event: &Event) {
    println!(
        "\n[{}] {} event received (id: {})",
        label.bright_blue().bold(),
        event.event_type.yellow(),
        event.id.as_deref().unwrap_or("-")
    );
    println!("   {}", event.data.dimmed());
}

/// True when every scenario passed.
pub fn all_passed(results: &[TestResult]) -> bool {
    results.iter().all(|r| r.passed)
}

pub fn print_test_summary(results: &[TestResult]) {
    println!("\n{}", "=== TEST SUMMARY ===".bright_white().bold());

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    for result in results {
        let status = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };

        println!("[{}] {} ({:?})", status, result.scenario, result.duration);

        if let Some(msg) = &result.message {
            println!("      {}", msg.dimmed());
        }
    }

    println!(
        "\n{}: {} passed, {} failed",
        "Results".bold(),
        passed.to_string().green(),
        failed.to_string().red()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool) -> TestResult {
        TestResult {
            scenario: "scenario".to_string(),
            passed,
            message: None,
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_all_passed() {
        assert!(all_passed(&[]));
        assert!(all_passed(&[result(true), result(true)]));
        assert!(!all_passed(&[result(true), result(false)]));
    }
}
