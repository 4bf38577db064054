//! Test runner - drives voice-bot calls against the agent under test.
//!
//! Talks to a running callsim server over its REST API: places one call
//! per selected scenario, polls until the provider reports a terminal
//! status, and prints a pass/fail summary. Scenario listing is local and
//! performs no network I/O.

use callsim_scenarios::Scenario;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// How long to wait for one call to reach a terminal status.
const CALL_COMPLETION_TIMEOUT: Duration = Duration::from_secs(180);

/// Interval between call-status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "callsim", version, about = "Automated patient calls against a phone agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Place test calls for the selected scenarios")]
    Run {
        #[arg(long, num_args = 1.., help = "Specific scenario IDs to run (default: all)")]
        scenarios: Vec<String>,

        #[arg(
            long,
            default_value = "http://localhost:8765",
            help = "Base URL of the callsim server"
        )]
        url: String,

        #[arg(long, default_value_t = 15, help = "Seconds to wait between calls")]
        wait: u64,

        #[arg(long, help = "List available scenarios and exit")]
        list: bool,
    },
}

struct ScenarioResult {
    id: &'static str,
    call_sid: Option<String>,
    status: String,
}

impl ScenarioResult {
    fn placed(&self) -> bool {
        self.call_sid.is_some()
    }
}

/// Resolves the requested ids against the catalog, in catalog order for
/// the default run and request order otherwise. Unknown ids are returned
/// separately: they are reported and skipped, never fatal to the run.
fn select_scenarios(requested: &[String]) -> (Vec<&'static Scenario>, Vec<String>) {
    if requested.is_empty() {
        return (callsim_scenarios::all().iter().collect(), Vec::new());
    }
    let mut selected = Vec::with_capacity(requested.len());
    let mut unknown = Vec::new();
    for id in requested {
        match callsim_scenarios::get(id) {
            Ok(scenario) => selected.push(scenario),
            Err(_) => unknown.push(id.clone()),
        }
    }
    (selected, unknown)
}

fn print_listing() {
    println!("\nAvailable scenarios:\n");
    for scenario in callsim_scenarios::all() {
        println!("  {:<26} - {}", scenario.id, scenario.name);
    }
    println!();
}

/// Polls the server until the call reaches a terminal status or the
/// completion timeout elapses.
async fn wait_for_completion(client: &reqwest::Client, base_url: &str, call_sid: &str) -> String {
    let deadline = Instant::now() + CALL_COMPLETION_TIMEOUT;

    while Instant::now() < deadline {
        let status = client
            .get(format!("{base_url}/call-status/{call_sid}"))
            .send()
            .await;
        if let Ok(response) = status {
            if response.status().is_success() {
                if let Ok(body) = response.json::<Value>().await {
                    if let Some(status) = body["status"].as_str() {
                        if callsim_telephony::is_terminal_status(status) {
                            return status.to_string();
                        }
                    }
                }
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    "timeout".to_string()
}

async fn run_scenario(
    client: &reqwest::Client,
    base_url: &str,
    scenario: &'static Scenario,
    index: usize,
    total: usize,
) -> ScenarioResult {
    println!("\n{}", "=".repeat(64));
    println!("  [{index}/{total}] {}", scenario.name);
    println!("  {}", scenario.description);
    println!("{}", "=".repeat(64));

    let started = Instant::now();
    let response = client
        .post(format!("{base_url}/make-call"))
        .json(&serde_json::json!({ "scenario_id": scenario.id }))
        .send()
        .await;

    let call_sid = match response {
        Ok(response) if response.status().is_success() => {
            match response.json::<Value>().await {
                Ok(body) => body["call_sid"].as_str().map(|s| s.to_string()),
                Err(e) => {
                    println!("  ERROR: unreadable make-call response: {e}");
                    None
                }
            }
        }
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            println!("  ERROR: {status} - {body}");
            None
        }
        Err(e) => {
            println!("  ERROR: {e}");
            None
        }
    };

    let Some(call_sid) = call_sid else {
        return ScenarioResult {
            id: scenario.id,
            call_sid: None,
            status: "placement-failed".to_string(),
        };
    };

    println!("  Call SID : {call_sid}");
    println!("  Waiting for call to complete...");

    let status = wait_for_completion(client, base_url, &call_sid).await;
    println!("  Status   : {status}");
    println!("  Duration : {:.0}s", started.elapsed().as_secs_f64());

    ScenarioResult {
        id: scenario.id,
        call_sid: Some(call_sid),
        status,
    }
}

/// Runs the selected scenarios sequentially. Returns `true` if every call
/// was at least placed successfully.
async fn run_all(scenarios: Vec<&'static Scenario>, base_url: &str, wait_between: u64) -> bool {
    let total = scenarios.len();
    let client = reqwest::Client::new();

    println!("\nStarting {total} test call(s) against {base_url}");

    // Quick health check before burning provider minutes.
    match client.get(format!("{base_url}/health")).send().await {
        Ok(response) if response.status().is_success() => {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            println!(
                "Server OK - public URL: {}\n",
                body["public_url"].as_str().unwrap_or("<unknown>")
            );
        }
        _ => {
            println!("ERROR: cannot reach the callsim server at {base_url}");
            println!("Make sure it's running: callsim-server");
            return false;
        }
    }

    let mut results = Vec::with_capacity(total);
    for (i, scenario) in scenarios.into_iter().enumerate() {
        let result = run_scenario(&client, base_url, scenario, i + 1, total).await;
        results.push(result);

        // Pause between calls: provider rate limits plus natural spacing.
        if i + 1 < total {
            println!("\n  Pausing {wait_between}s before next call...");
            tokio::time::sleep(Duration::from_secs(wait_between)).await;
        }
    }

    println!("\n{}", "=".repeat(64));
    println!("  TEST RUN SUMMARY");
    println!("{}", "=".repeat(64));

    let completed = results.iter().filter(|r| r.status == "completed").count();
    for result in &results {
        let icon = if result.status == "completed" {
            "  OK"
        } else {
            "FAIL"
        };
        println!("  [{icon}] {:<26} - {}", result.id, result.status);
    }
    println!(
        "\n  Completed: {completed}/{total}   Other: {}/{total}",
        total - completed
    );
    println!("  Transcripts saved under the server's transcripts directory");
    println!("{}\n", "=".repeat(64));

    results.iter().all(ScenarioResult::placed)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let Commands::Run {
        scenarios,
        url,
        wait,
        list,
    } = cli.command;

    if list {
        print_listing();
        return;
    }

    let (selected, unknown) = select_scenarios(&scenarios);
    for id in &unknown {
        eprintln!("skipping unknown scenario: {id}");
    }
    if !unknown.is_empty() {
        let available: Vec<&str> = callsim_scenarios::ids().collect();
        eprintln!("available: {}", available.join(", "));
    }
    if selected.is_empty() {
        eprintln!("no known scenarios selected, nothing to run");
        return;
    }

    let all_placed = run_all(selected, url.trim_end_matches('/'), wait).await;
    if !all_placed {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection_is_the_whole_catalog_in_order() {
        let (selected, unknown) = select_scenarios(&[]);
        assert_eq!(selected.len(), 18);
        assert_eq!(selected[0].id, "new_patient_scheduling");
        assert_eq!(selected[17].id, "rapid_topic_switch");
        assert!(unknown.is_empty());
    }

    #[test]
    fn explicit_selection_preserves_request_order() {
        let requested = vec![
            "billing_question".to_string(),
            "new_patient_scheduling".to_string(),
        ];
        let (selected, unknown) = select_scenarios(&requested);
        assert_eq!(selected[0].id, "billing_question");
        assert_eq!(selected[1].id, "new_patient_scheduling");
        assert!(unknown.is_empty());
    }

    #[test]
    fn unknown_scenarios_are_skipped_not_fatal() {
        let requested = vec!["nope".to_string(), "billing_question".to_string()];
        let (selected, unknown) = select_scenarios(&requested);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "billing_question");
        assert_eq!(unknown, vec!["nope".to_string()]);
    }
}
