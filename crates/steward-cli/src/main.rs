//! Steward CLI
//!
//! Command-line interface for stewardship contract evaluation.
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate output against contract
//! steward evaluate --contract contract.yaml --output response.txt
//!
//! # Pipe from stdin, with a prior user turn and a host metadata entry
//! cat response.txt | steward evaluate --contract contract.yaml \
//!     --context "I want to talk to a real person" --metadata handoff=live-chat
//!
//! # JSON output with a fixed timestamp
//! steward evaluate --contract contract.yaml --output response.txt \
//!     --format json --evaluated-at 2025-12-20T00:00:00Z
//!
//! # Validate contract
//! steward contract validate contract.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - 0: PROCEED
//! - 1: ESCALATE
//! - 2: BLOCKED
//! - 3: Error

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use steward_core::{Contract, EvaluationResult, LensType, Output, State};

/// Steward: Stewardship contracts for AI systems
#[derive(Parser)]
#[command(name = "steward")]
#[command(version)]
#[command(about = "Evaluate AI outputs against stewardship contracts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an output against a contract
    Evaluate {
        /// Path to the stewardship contract (YAML or JSON)
        #[arg(short, long)]
        contract: PathBuf,

        /// Path to the output file to evaluate (reads from stdin if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Show every lens finding
        #[arg(long)]
        explain: bool,

        /// Prior conversation turn, oldest first (repeatable)
        #[arg(long)]
        context: Vec<String>,

        /// Host metadata entry as key=value (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Explicit timestamp for reproducible results (RFC 3339).
        /// Example: --evaluated-at 2025-12-20T00:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        evaluated_at: Option<DateTime<Utc>>,
    },

    /// Contract management commands
    Contract {
        #[command(subcommand)]
        action: ContractAction,
    },

    /// List the five lenses in priority order
    Lenses,
}

#[derive(Subcommand)]
enum ContractAction {
    /// Validate a contract file
    Validate {
        /// Path to the contract file
        path: PathBuf,
    },

    /// Show contract details
    Show {
        /// Path to the contract file
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse an RFC 3339 timestamp such as "2025-12-20T00:00:00Z".
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected RFC 3339 (e.g., 2025-12-20T00:00:00Z)", e))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    match run(Cli::parse()) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Evaluate {
            contract,
            output,
            format,
            explain,
            context,
            metadata,
            evaluated_at,
        } => {
            let contract = load_contract(&contract)?;
            let content = read_output(output.as_deref())?;
            let output = metadata
                .into_iter()
                .fold(Output::text(content).with_context(context), |output, (key, value)| {
                    output.with_metadata(key, value)
                });

            let result = steward_core::evaluate_at(&contract, &output, evaluated_at.unwrap_or_else(Utc::now))
                .context("Evaluation failed")?;

            match format {
                OutputFormat::Json => println!("{}", result.to_json_pretty()?),
                OutputFormat::Text => print_text_result(&result, explain),
            }

            Ok(exit_code(&result.state))
        }

        Commands::Contract { action } => match action {
            ContractAction::Validate { path } => Ok(validate_contract(&path)),
            ContractAction::Show { path } => show_contract(&path),
        },

        Commands::Lenses => {
            for lens in LensType::PRIORITY {
                println!("{}. {}: {}", lens.priority() + 1, lens.display_name(), lens.question());
            }
            Ok(ExitCode::from(0))
        }
    }
}

fn exit_code(state: &State) -> ExitCode {
    match state {
        State::Proceed { .. } => ExitCode::from(0),
        State::Escalate { .. } => ExitCode::from(1),
        State::Blocked { .. } => ExitCode::from(2),
    }
}

fn load_contract(path: &Path) -> Result<Contract> {
    Contract::from_file(path).with_context(|| format!("Failed to load contract from {:?}", path))
}

fn read_output(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read output from {:?}", path)),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn print_text_result(result: &EvaluationResult, explain: bool) {
    println!("{}", result.state.label());
    println!();

    match &result.state {
        State::Proceed { summary } => {
            println!("{}", summary);
        }
        State::Escalate {
            decision_point,
            escalation_rule,
            options,
            ..
        } => {
            println!("Decision: {}", decision_point);
            if let Some(rule) = escalation_rule {
                println!("Rule: {} ({})", rule, rule.section.path());
            }
            println!();
            println!("Options:");
            for option in options {
                println!("  - {}", option);
            }
        }
        State::Blocked { violation } => {
            println!("Violation: {} - {}", violation.rule_id, violation.rule_text);
            println!("Lens: {}", violation.lens);
            if !violation.evidence.is_empty() {
                println!();
                println!("Evidence:");
                for e in &violation.evidence {
                    println!("  - {} at {}", e.claim, e.locator);
                }
            }
            println!();
            println!("Contact: {}", violation.accountable_human);
        }
    }

    println!();
    println!("Confidence: {:.0}%", result.confidence * 100.0);

    if explain {
        println!();
        println!("--- Lens Findings ---");

        for finding in result.lens_findings.all() {
            println!();
            println!(
                "{}: {:?} ({:.0}% confidence)",
                finding.lens,
                finding.state,
                finding.confidence * 100.0
            );
            if let Some(reason) = &finding.reason {
                println!("  {}", reason);
            }
            for rule in &finding.rules_evaluated {
                match &rule.rationale {
                    Some(why) => println!("  - {}: {:?} ({})", rule.rule_id, rule.result, why),
                    None => println!("  - {}: {:?}", rule.rule_id, rule.result),
                }
            }
        }
    }
}

fn validate_contract(path: &Path) -> ExitCode {
    match Contract::from_file(path) {
        Ok(c) => {
            println!("Contract is valid: {}", c.name);
            println!();
            println!("Version: {}", c.version());
            println!("Schema: {}", c.schema_version);
            println!("Purpose: {}", c.intent.purpose);
            println!("Accountable: {}", c.accountability.answerable_human);
            ExitCode::from(0)
        }
        Err(e) => {
            eprintln!("Contract validation failed: {}", e);
            ExitCode::from(1)
        }
    }
}

fn show_contract(path: &Path) -> Result<ExitCode> {
    let contract = load_contract(path)?;

    println!("Contract: {}", contract.name);
    println!("Version: {} (schema {})", contract.version(), contract.schema_version);
    if let Some(description) = &contract.description {
        println!("{}", description);
    }
    println!();

    println!("Intent:");
    println!("  Purpose: {}", contract.intent.purpose);
    for goal in &contract.intent.optimizing_for {
        println!("  Optimizing for: {}", goal);
    }
    println!();

    println!("Rules:");
    for (section, rules) in contract.rule_lists() {
        if rules.is_empty() {
            continue;
        }
        println!("  {}:", section.path());
        for rule in rules {
            println!("    {}: {}", rule.id, rule.rule);
        }
    }
    println!();

    println!("Accountability:");
    println!("  Answerable human: {}", contract.accountability.answerable_human);
    if let Some(approved) = &contract.accountability.approved_by {
        println!("  Approved by: {}", approved);
    }
    if !contract.accountability.escalation_path.is_empty() {
        println!("  Escalation path: {}", contract.accountability.escalation_path.join(" -> "));
    }
    if let Some(cadence) = &contract.accountability.review_cadence {
        println!("  Review cadence: {}", cadence);
    }

    Ok(ExitCode::from(0))
}
