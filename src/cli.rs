use crate::config::AppConfig;
use crate::extract::{extract_file, DocxExtractor};
use crate::model::{AssistantOption, WorkflowEvent};
use crate::orchestrator::{Workbench, WorkbenchState};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "assistant-desk",
    version,
    about = "Submit text to a hosted assistant, poll the run, and print the cited result"
)]
pub struct Cli {
    /// Path to the config file (endpoint, credential, assistant catalog)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Service base URL (overrides the config file)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// API version query parameter (overrides the config file)
    #[arg(long)]
    pub api_version: Option<String>,

    /// Assistant to use, by name or 1-based catalog index
    #[arg(long)]
    pub assistant: Option<String>,

    /// Input text; enables one-shot mode
    #[arg(long)]
    pub input: Option<String>,

    /// Attach a file whose extracted text is appended to the input; repeatable
    #[arg(long)]
    pub file: Vec<PathBuf>,

    /// Interval between run status polls (default 8s, or the config file's value)
    #[arg(long)]
    pub poll_interval: Option<humantime::Duration>,

    /// Print the final report as JSON instead of plain text
    #[arg(long)]
    pub json: bool,

    /// List the configured assistants and exit
    #[arg(long)]
    pub list_assistants: bool,
}

/// Merge CLI overrides into the loaded configuration.
pub fn build_config(args: &Cli) -> Result<AppConfig> {
    let mut cfg = AppConfig::load(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint.as_deref() {
        cfg.endpoint = endpoint.to_string();
    }
    if let Some(version) = args.api_version.as_deref() {
        cfg.api_version = version.to_string();
    }
    if let Some(interval) = args.poll_interval {
        cfg.poll_interval = interval.into();
    }
    Ok(cfg)
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;

    if args.list_assistants {
        print_catalog(&cfg.assistants);
        return Ok(());
    }

    if args.input.is_some() || !args.file.is_empty() {
        run_one_shot(args, cfg).await
    } else {
        run_interactive(args, cfg).await
    }
}

fn print_catalog(assistants: &[AssistantOption]) {
    if assistants.is_empty() {
        println!("No assistants configured. Add [[assistant]] entries to the config file.");
        return;
    }
    for (i, a) in assistants.iter().enumerate() {
        println!("{}. {} - {}", i + 1, a.name, a.description);
    }
}

/// Spawn a task that prints workflow progress to stderr so the result on
/// stdout stays clean for piping.
fn spawn_event_printer() -> (
    mpsc::UnboundedSender<WorkflowEvent>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let handle = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            match ev {
                WorkflowEvent::PhaseStarted { phase } => {
                    eprintln!("== {} ==", phase.label());
                }
                WorkflowEvent::PollTick { status } => {
                    eprintln!("run status: {}", status.as_str());
                }
                WorkflowEvent::Info(msg) => {
                    eprintln!("{msg}");
                }
            }
        }
    });
    (tx, handle)
}

fn select_assistant(cfg: &AppConfig, selector: Option<&str>) -> Result<AssistantOption> {
    match selector {
        Some(sel) => cfg
            .find_assistant(sel)
            .cloned()
            .with_context(|| format!("no assistant named or numbered '{sel}'")),
        None => cfg
            .assistants
            .first()
            .cloned()
            .context("no assistants configured; add [[assistant]] entries to the config file"),
    }
}

async fn run_one_shot(args: Cli, cfg: AppConfig) -> Result<()> {
    let assistant = select_assistant(&cfg, args.assistant.as_deref())?;
    let mut workbench = Workbench::new(&cfg)?;
    workbench.select(assistant.clone());

    if let Some(input) = args.input.as_deref() {
        workbench.append_input(input);
    }
    for path in &args.file {
        let extracted = extract_file(path, &DocxExtractor)?;
        eprintln!("attached: {}", extracted.display_name);
        workbench.attach(extracted);
    }

    let (event_tx, printer) = spawn_event_printer();
    if let Err(rejection) = workbench.process(&event_tx).await {
        anyhow::bail!("{}", rejection.message());
    }
    drop(event_tx);
    let _ = printer.await;

    if args.json {
        let report = workbench.report(&assistant);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", workbench.result());
    }

    if workbench.state() == WorkbenchState::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Commands accepted by the interactive loop.
enum ReplCommand {
    Assistants,
    Use(String),
    Attach(String),
    Show,
    Process,
    Reset,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<ReplCommand> {
    if !line.starts_with('/') {
        return None;
    }
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or("").trim().to_string();
    Some(match command {
        "/assistants" => ReplCommand::Assistants,
        "/use" => ReplCommand::Use(arg),
        "/attach" => ReplCommand::Attach(arg),
        "/show" => ReplCommand::Show,
        "/process" => ReplCommand::Process,
        "/reset" => ReplCommand::Reset,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    })
}

fn print_help() {
    println!("Commands:");
    println!("  /assistants        list the configured assistants");
    println!("  /use <name|index>  select an assistant");
    println!("  /attach <path>     append a file's extracted text to the input");
    println!("  /show              show the current input, selection, and state");
    println!("  /process           submit the input to the selected assistant");
    println!("  /reset             clear input, result, and attached file");
    println!("  /quit              exit");
    println!("Any other line is appended to the input buffer.");
}

/// Read one line from stdin without blocking async tasks. Returns None on
/// EOF.
async fn read_input_line() -> Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let n = io::stdin().read_line(&mut line)?;
        Ok::<_, io::Error>((n > 0).then_some(line))
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read input")?;
    Ok(line)
}

async fn run_interactive(args: Cli, cfg: AppConfig) -> Result<()> {
    let mut workbench = Workbench::new(&cfg)?;
    if let Ok(assistant) = select_assistant(&cfg, args.assistant.as_deref()) {
        println!("Using assistant: {} - {}", assistant.name, assistant.description);
        workbench.select(assistant);
    } else {
        println!("No assistant selected; use /assistants and /use.");
    }
    println!("Type '/help' for commands, '/quit' to exit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = read_input_line().await? else {
            break; // EOF
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(command) = parse_command(trimmed) else {
            workbench.append_input(trimmed);
            continue;
        };

        match command {
            ReplCommand::Assistants => print_catalog(&cfg.assistants),
            ReplCommand::Use(sel) => {
                if sel.is_empty() {
                    println!("Usage: /use <name|index>");
                } else {
                    match cfg.find_assistant(&sel) {
                        Some(a) => {
                            println!("Using assistant: {} - {}", a.name, a.description);
                            workbench.select(a.clone());
                        }
                        None => println!("No assistant named or numbered '{sel}'"),
                    }
                }
            }
            ReplCommand::Attach(path) => {
                if path.is_empty() {
                    println!("Usage: /attach <path>");
                } else {
                    match extract_file(PathBuf::from(&path).as_path(), &DocxExtractor) {
                        Ok(extracted) => {
                            println!("attached: {}", extracted.display_name);
                            workbench.attach(extracted);
                        }
                        Err(e) => eprintln!("Error attaching file: {e:#}"),
                    }
                }
            }
            ReplCommand::Show => {
                let selected = workbench
                    .selected()
                    .map(|a| a.name.as_str())
                    .unwrap_or("<none>");
                println!("assistant: {selected}");
                if let Some(file) = workbench.attached_file() {
                    println!("attached:  {file}");
                }
                println!("state:     {:?}", workbench.state());
                if workbench.input().is_empty() {
                    println!("input:     <empty>");
                } else {
                    println!("input:\n{}", workbench.input());
                }
                if !workbench.result().is_empty() {
                    println!("result:\n{}", workbench.result());
                }
            }
            ReplCommand::Process => {
                let (event_tx, printer) = spawn_event_printer();
                match workbench.process(&event_tx).await {
                    Ok(()) => {
                        drop(event_tx);
                        let _ = printer.await;
                        println!("{}", workbench.result());
                    }
                    Err(rejection) => {
                        drop(event_tx);
                        let _ = printer.await;
                        println!("{}", rejection.message());
                    }
                }
            }
            ReplCommand::Reset => {
                workbench.reset();
                println!("cleared");
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Quit => break,
            ReplCommand::Unknown(cmd) => {
                println!("Unknown command: {cmd} (try /help)");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn file_poll_interval_survives_when_flag_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "endpoint = \"https://x.example\"\npoll_interval = \"30s\"\n",
        );
        let args = Cli::parse_from(["assistant-desk", "--config", path.to_str().unwrap()]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn poll_interval_flag_overrides_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "endpoint = \"https://x.example\"\npoll_interval = \"30s\"\n",
        );
        let args = Cli::parse_from([
            "assistant-desk",
            "--config",
            path.to_str().unwrap(),
            "--poll-interval",
            "2s",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn endpoint_flag_overrides_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "endpoint = \"https://file.example\"\n");
        let args = Cli::parse_from([
            "assistant-desk",
            "--config",
            path.to_str().unwrap(),
            "--endpoint",
            "https://flag.example",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.endpoint, "https://flag.example");
    }

    #[test]
    fn plain_lines_are_not_commands() {
        assert!(parse_command("Summarize this").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn commands_split_off_their_argument() {
        match parse_command("/use Meeting Minutes") {
            Some(ReplCommand::Use(arg)) => assert_eq!(arg, "Meeting Minutes"),
            _ => panic!("expected /use"),
        }
        match parse_command("/attach notes/minutes.docx") {
            Some(ReplCommand::Attach(arg)) => assert_eq!(arg, "notes/minutes.docx"),
            _ => panic!("expected /attach"),
        }
        assert!(matches!(parse_command("/process"), Some(ReplCommand::Process)));
        assert!(matches!(parse_command("/quit"), Some(ReplCommand::Quit)));
        assert!(matches!(
            parse_command("/bogus"),
            Some(ReplCommand::Unknown(_))
        ));
    }
}
