mod config;
mod dry_run;
mod logging;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use texter_core::{placeholders, render_str, ScriptContext};
use texter_session::{CoordinatorState, Directive, SessionError, SessionSettings};

use dry_run::{parse_answer, parse_fault, read_payload, ActionOutcome, AnswerArg, DryRun, FaultArg};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Texting-session engine driver.
#[derive(Parser)]
#[command(name = "texter", version, about = "Texting-session engine driver")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a texter.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the available steps, responses and draft for a contact
    Steps {
        /// Path to the session payload JSON
        payload: PathBuf,
        /// Answer a question before showing (STEP=VALUE, empty VALUE clears)
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<AnswerArg>,
    },

    /// Render a script template against a contact
    Render {
        /// Path to the session payload JSON
        payload: PathBuf,
        /// Template text with {placeholders}
        #[arg(long)]
        script: String,
    },

    /// Send a message and save answers (dry run)
    Submit {
        /// Path to the session payload JSON
        payload: PathBuf,
        /// Answer a question before sending (STEP=VALUE, empty VALUE clears)
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<AnswerArg>,
        /// Message text; defaults to the session draft
        #[arg(long)]
        message: Option<String>,
        /// Make the next call of an operation fail (OP=STATUS:MESSAGE)
        #[arg(long = "fail", value_parser = parse_fault)]
        faults: Vec<FaultArg>,
    },

    /// Send the opt-out message and opt the contact out (dry run)
    OptOut {
        /// Path to the session payload JSON
        payload: PathBuf,
        /// Message text; defaults to the configured opt-out script
        #[arg(long)]
        message: Option<String>,
        /// Make the next call of an operation fail (OP=STATUS:MESSAGE)
        #[arg(long = "fail", value_parser = parse_fault)]
        faults: Vec<FaultArg>,
    },

    /// Save answers and close the conversation (dry run)
    Close {
        /// Path to the session payload JSON
        payload: PathBuf,
        /// Answer a question before closing (STEP=VALUE, empty VALUE clears)
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<AnswerArg>,
        /// Make the next call of an operation fail (OP=STATUS:MESSAGE)
        #[arg(long = "fail", value_parser = parse_fault)]
        faults: Vec<FaultArg>,
    },
}

#[derive(Debug, Clone, Copy)]
enum ActionKind {
    Submit,
    OptOut,
    Close,
}

impl ActionKind {
    fn name(self) -> &'static str {
        match self {
            ActionKind::Submit => "submit",
            ActionKind::OptOut => "opt-out",
            ActionKind::Close => "close",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    logging::init(&config.logging.filter, cli.quiet);
    tracing::debug!(path = ?cli.config, filter = %config.logging.filter, "configuration loaded");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let settings = config.session;

    match cli.command {
        Commands::Steps { payload, answers } => {
            rt.block_on(cmd_steps(&payload, &answers, settings, cli.output, cli.quiet));
        }
        Commands::Render { payload, script } => {
            cmd_render(&payload, &script, cli.output, cli.quiet);
        }
        Commands::Submit {
            payload,
            answers,
            message,
            faults,
        } => {
            rt.block_on(cmd_action(
                ActionKind::Submit,
                &payload,
                &answers,
                message.as_deref(),
                &faults,
                settings,
                cli.output,
                cli.quiet,
            ));
        }
        Commands::OptOut {
            payload,
            message,
            faults,
        } => {
            rt.block_on(cmd_action(
                ActionKind::OptOut,
                &payload,
                &[],
                message.as_deref(),
                &faults,
                settings,
                cli.output,
                cli.quiet,
            ));
        }
        Commands::Close {
            payload,
            answers,
            faults,
        } => {
            rt.block_on(cmd_action(
                ActionKind::Close,
                &payload,
                &answers,
                None,
                &faults,
                settings,
                cli.output,
                cli.quiet,
            ));
        }
    }
}

async fn cmd_steps(
    payload_path: &Path,
    answers: &[AnswerArg],
    settings: SessionSettings,
    output: OutputFormat,
    quiet: bool,
) {
    let payload = match read_payload(payload_path) {
        Ok(p) => p,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let run = match DryRun::start(&payload, settings, answers, &[]).await {
        Ok(r) => r,
        Err(e) => {
            report_session_error(&e, output, quiet);
            process::exit(1);
        }
    };
    let session = &run.session;
    let available = match session.available_steps() {
        Ok(steps) => steps,
        Err(e) => {
            report_session_error(&e, output, quiet);
            process::exit(1);
        }
    };
    let current = available[available.len() - 1];

    match output {
        OutputFormat::Json => {
            let steps: Vec<serde_json::Value> = available
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "script": s.script.as_deref().map(|t| session.render(t)),
                        "question": s.active_question().map(|q| q.text.clone()),
                    })
                })
                .collect();
            let doc = json!({
                "contact": session.contact_id(),
                "gate": session.gate(),
                "available": steps,
                "current": {
                    "id": current.id,
                    "question": current.active_question(),
                },
                "responses": session.responses(),
                "draft": session.draft(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => {
            println!("contact: {}", session.contact_id());
            if let Some((banner, recovery)) = session.banner() {
                println!("{} [{}]", banner, recovery.label());
            }
            if session.should_skip() {
                println!("contact has opted out; skip");
            }
            println!("available:");
            for step in &available {
                let question = step.active_question().map(|q| q.text.as_str()).unwrap_or("-");
                println!("  {}  {}", step.id, question);
            }
            if let Some(q) = current.active_question() {
                let options: Vec<&str> = q.answer_options.iter().map(|o| o.value.as_str()).collect();
                println!("current question: {} [{}]", q.text, options.join(", "));
            }
            if !session.responses().is_empty() {
                println!("responses:");
                for (step_id, value) in session.responses().iter() {
                    println!("  {} = {}", step_id, value.unwrap_or("(none)"));
                }
            }
            println!("draft: {}", session.draft());
        }
    }
}

fn cmd_render(payload_path: &Path, script: &str, output: OutputFormat, quiet: bool) {
    let payload = match read_payload(payload_path) {
        Ok(p) => p,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let ctx = ScriptContext::from_payload(&payload);
    let unresolved: Vec<&str> = placeholders(script)
        .into_iter()
        .filter(|name| ctx.lookup(name).is_none())
        .collect();
    for name in &unresolved {
        tracing::warn!(placeholder = %name, "unresolved placeholder renders empty");
    }
    let rendered = render_str(script, &ctx);
    match output {
        OutputFormat::Json => {
            println!("{}", json!({ "text": rendered, "unresolved": unresolved }));
        }
        OutputFormat::Text => {
            println!("{}", rendered);
            if !quiet && !unresolved.is_empty() {
                eprintln!("warning: unresolved placeholders: {}", unresolved.join(", "));
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_action(
    kind: ActionKind,
    payload_path: &Path,
    answers: &[AnswerArg],
    message: Option<&str>,
    faults: &[FaultArg],
    settings: SessionSettings,
    output: OutputFormat,
    quiet: bool,
) {
    let payload = match read_payload(payload_path) {
        Ok(p) => p,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let mut run = match DryRun::start(&payload, settings, answers, faults).await {
        Ok(r) => r,
        Err(e) => {
            report_session_error(&e, output, quiet);
            process::exit(1);
        }
    };

    let result = match kind {
        ActionKind::Submit => {
            if let Some(text) = message {
                run.session.set_draft(text);
            }
            run.session.submit().await
        }
        ActionKind::OptOut => run.session.opt_out(message).await,
        ActionKind::Close => run.session.close().await,
    };
    let outcome = run.outcome(result).await;

    if !quiet {
        print_outcome(kind, &outcome, output);
    }
    if let Some(err) = &outcome.error {
        report_session_error(err, output, quiet);
        process::exit(1);
    }
}

fn print_outcome(kind: ActionKind, outcome: &ActionOutcome, output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(outcome)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => {
            if let Some(report) = &outcome.report {
                let stages: Vec<String> = report.stages.iter().map(|s| s.to_string()).collect();
                println!("{} completed ({})", kind.name(), stages.join(", "));
            }
            println!("state: {}", describe_state(outcome.state));
            println!("calls:");
            for call in &outcome.calls {
                match &call.error {
                    None => println!("  {} {} ok", call.operation, call.contact_id),
                    Some(e) => println!("  {} {} failed: {}", call.operation, call.contact_id, e),
                }
            }
        }
    }
}

fn describe_state(state: CoordinatorState) -> String {
    match state {
        CoordinatorState::Idle => "idle".to_string(),
        CoordinatorState::Sending => "sending".to_string(),
        CoordinatorState::Completed => "completed".to_string(),
        CoordinatorState::Failed { stage } => format!("failed at {}", stage),
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", json!({ "error": msg }));
        }
    }
}

fn report_session_error(err: &SessionError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    let exit_to_worklist = err.directive() == Some(Directive::ExitToWorklist);
    match output {
        OutputFormat::Text => {
            eprintln!("error: {}", err);
            if let Some(recovery) = err.recovery() {
                eprintln!("recovery: {}", recovery.label());
            }
            if exit_to_worklist {
                eprintln!("returning to worklist");
            }
        }
        OutputFormat::Json => {
            eprintln!(
                "{}",
                json!({
                    "error": err.to_string(),
                    "recovery": err.recovery().map(|r| r.label()),
                    "directive": err.directive(),
                    "fatal": err.is_fatal(),
                })
            );
        }
    }
}
