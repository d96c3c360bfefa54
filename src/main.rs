use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use agensight::logging::{self, LogTarget};
use agensight::model::{AgentData, SpanDetails, Trace, TraceDetail};
use agensight::tui::views::timeline::{bar_cells, tick_line};
use agensight::versions::{list_versions, VersionListing};
use agensight::{fallback, serve, tui, ApiClient, Config, ConfigBackend, StudioError, VersionWorkflow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "agensight")]
#[command(author, version, about = "Agensight Studio - agent trace timelines and prompt/config versioning")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Backend base URL (overrides config and AGENSIGHT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the terminal dashboard (default)
    Dashboard,

    /// Run the studio API proxy server
    Serve {
        /// Port to listen on (default: [server] port from config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List recorded traces
    Traces,

    /// Show one trace as a timeline
    Trace {
        /// Trace ID
        id: String,

        /// Chart width in columns
        #[arg(long, default_value = "60")]
        width: u16,
    },

    /// Show prompts and completions recorded for a span
    Span {
        /// Span ID
        id: String,
    },

    /// List configuration versions, newest first
    Versions,

    /// Print a configuration document
    Config {
        /// Version to fetch (default: main configuration)
        #[arg(long)]
        version: Option<String>,
    },

    /// Create a new configuration version
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Version to copy from (default: the current version)
        #[arg(long)]
        from: Option<String>,

        /// Don't promote the new version to the main configuration
        #[arg(long)]
        no_sync: bool,
    },

    /// Promote a version to the main configuration
    Sync {
        /// Version to sync
        version: String,
    },

    /// Replace one agent inside a version
    UpdateAgent {
        /// Version to edit
        #[arg(long)]
        version: String,

        /// JSON file holding the agent definition
        #[arg(long)]
        file: PathBuf,
    },

    /// Send a prompt update payload
    UpdatePrompt {
        /// JSON file holding the payload
        #[arg(long)]
        file: PathBuf,
    },

    /// Generate shell completion scripts
    ///
    /// Examples:
    ///   agensight completion zsh > ~/.zsh/completions/_agensight
    ///   agensight completion bash >> ~/.bashrc
    #[command(verbatim_doc_comment)]
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = Config::load();
    if let Some(url) = &args.api_url {
        config.api.base_url = url.trim().to_string();
    }

    let command = args.command.unwrap_or(Command::Dashboard);

    // The dashboard owns the terminal, so its logs go to a file
    let log_file = config.log_file();
    let target = match command {
        Command::Dashboard => LogTarget::File(&log_file),
        _ => LogTarget::Stderr,
    };
    if let Err(e) = logging::init(args.verbose, config.log.level.as_deref(), target) {
        eprintln!("{} {}", "Warning:".yellow(), e);
    }

    match run(command, &config, args.json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config, json: bool) -> agensight::Result<()> {
    if let Command::Completion { shell } = command {
        let mut cmd = Args::command();
        generate(shell, &mut cmd, "agensight", &mut io::stdout());
        return Ok(());
    }

    let client = ApiClient::from_config(config)?;

    match command {
        Command::Dashboard => tui::run(config, client),
        Command::Serve { port } => serve::start_proxy_server(port.unwrap_or(config.server.port), client),
        Command::Traces => cmd_traces(&client, json),
        Command::Trace { id, width } => cmd_trace(&client, config, &id, width, json),
        Command::Span { id } => cmd_span(&client, &id, json),
        Command::Versions => cmd_versions(&client, json),
        Command::Config { version } => print_json(&client.fetch_config(version.as_deref())?),
        Command::Commit {
            message,
            from,
            no_sync,
        } => cmd_commit(client, &message, from, !no_sync, json),
        Command::Sync { version } => {
            let mut workflow = VersionWorkflow::new(client);
            workflow.sync(&version)?;
            println!("{} v{} to main configuration", "Synced".green(), version);
            Ok(())
        }
        Command::UpdateAgent { version, file } => {
            let agent: AgentData = serde_json::from_value(read_json_file(&file)?)
                .map_err(|e| StudioError::validation(format!("{}: {}", file.display(), e)))?;
            let mut workflow = VersionWorkflow::new(client);
            let outcome = workflow.update_agent(&version, agent)?;
            if json {
                return print_json(&outcome.result);
            }
            println!(
                "{} agent in v{}",
                "Updated".green(),
                outcome.result.version
            );
            if outcome.version_mismatch() {
                println!(
                    "   {} backend returned v{} instead of v{}",
                    "Note:".yellow(),
                    outcome.result.version,
                    outcome.requested_version
                );
            }
            Ok(())
        }
        Command::UpdatePrompt { file } => {
            let result = client.update_prompt(read_json_file(&file)?)?;
            if json {
                return print_json(&result);
            }
            println!("{} prompt (v{})", "Updated".green(), result.version);
            Ok(())
        }
        Command::Completion { .. } => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> agensight::Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StudioError::Config(format!("JSON output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn read_json_file(path: &Path) -> agensight::Result<Value> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| StudioError::validation(format!("{}: {}", path.display(), e)))
}

fn fallback_notice(what: &str) {
    eprintln!(
        "{} backend unavailable, showing {}",
        "Note:".yellow(),
        what
    );
}

fn cmd_versions(client: &ApiClient, json: bool) -> agensight::Result<()> {
    let listing: VersionListing = list_versions(client);
    if json {
        #[derive(Serialize)]
        struct Out<'a> {
            versions: &'a [agensight::model::ConfigVersion],
            fallback: bool,
        }
        return print_json(&Out {
            versions: &listing.versions,
            fallback: listing.fallback,
        });
    }

    if listing.fallback {
        fallback_notice("fallback versions");
    }
    println!("\n{}", "Configuration versions".cyan().bold());
    if listing.versions.is_empty() {
        println!("   No versions found.");
    }
    for v in &listing.versions {
        let label = format!("v{}", v.version);
        let label = if v.is_current {
            format!("{} {}", label.green().bold(), "(current)".green())
        } else {
            label.normal().to_string()
        };
        let date = v.timestamp.get(..10).unwrap_or(&v.timestamp);
        println!("   {}  {}  {}", label, date.dimmed(), v.commit_message);
    }
    Ok(())
}

fn cmd_commit(
    client: ApiClient,
    message: &str,
    from: Option<String>,
    sync_to_main: bool,
    json: bool,
) -> agensight::Result<()> {
    let mut workflow = VersionWorkflow::new(client);
    let source = match from {
        Some(v) => v,
        None => {
            let listing = workflow.list_versions();
            listing
                .current()
                .or_else(|| listing.versions.first())
                .map(|v| v.version.clone())
                .unwrap_or_default()
        }
    };
    let result = workflow.commit(&source, message, sync_to_main)?;
    if json {
        return print_json(&result);
    }
    println!(
        "{} v{} from v{}",
        "Created".green(),
        result.version,
        source
    );
    if result.synced_to_main.unwrap_or(sync_to_main) {
        println!("   {} main configuration", "Synced".green());
    }
    Ok(())
}

fn cmd_traces(client: &ApiClient, json: bool) -> agensight::Result<()> {
    let (traces, fallback) = match client.list_traces() {
        Ok(traces) => (traces, false),
        Err(e) if e.allows_fallback() => {
            warn!(error = %e, "trace list unavailable, using demo traces");
            (fallback::demo_traces(), true)
        }
        Err(e) => return Err(e),
    };
    if json {
        return print_json(&traces);
    }

    if fallback {
        fallback_notice("demo traces");
    }
    println!("\n{}", "Traces".cyan().bold());
    if traces.is_empty() {
        println!("   No traces recorded yet.");
    }
    for trace in &traces {
        print_trace_row(trace);
    }
    Ok(())
}

fn print_trace_row(trace: &Trace) {
    let meta = match trace.metadata_summary() {
        Some(pairs) => pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" "),
        None => "invalid metadata".to_string(),
    };
    println!(
        "   {:>6}  {:<32} {:>9}  {}",
        trace.id.yellow(),
        trace.name,
        trace.latency_label(),
        meta.dimmed()
    );
}

fn cmd_trace(
    client: &ApiClient,
    config: &Config,
    id: &str,
    width: u16,
    json: bool,
) -> agensight::Result<()> {
    let detail: TraceDetail = match client.get_trace(id) {
        Ok(detail) => detail,
        Err(e) if e.status() == Some(404) => return Err(e),
        Err(e) if e.allows_fallback() => match fallback::demo_trace_detail(id) {
            Some(detail) => {
                warn!(id, error = %e, "trace unavailable, using demo trace");
                fallback_notice("a demo trace");
                detail
            }
            None => return Err(e),
        },
        Err(e) => return Err(e),
    };
    if json {
        return print_json(&detail);
    }

    println!(
        "\n{} {}",
        detail.trace.name.cyan().bold(),
        format!("({})", detail.trace.latency_label()).dimmed()
    );

    let Some(timeline) = config
        .timeline_builder()
        .build(&detail.agents, Some(&detail.trace))
    else {
        println!("   No spans recorded for this trace.");
        return Ok(());
    };

    let cols = width.max(10);
    let pad = " ".repeat(18);
    println!("{}{}", pad, tick_line(&timeline.time_marks, cols as usize).dimmed());
    for bar in &timeline.bars {
        let chart: String = bar_cells(bar, cols, None).iter().map(|c| c.glyph).collect();
        let name: String = bar.name.chars().take(16).collect();
        println!("  {:<16}|{}|", name, chart);
        for tool in &bar.tools {
            println!(
                "      {} {} {}",
                "↳".dimmed(),
                tool.name.magenta(),
                format!("{:.2}s", tool.length).dimmed()
            );
        }
    }
    Ok(())
}

fn cmd_span(client: &ApiClient, id: &str, json: bool) -> agensight::Result<()> {
    let details: SpanDetails = match client.get_span_details(id) {
        Ok(details) => details,
        Err(e) if e.allows_fallback() => {
            warn!(id, error = %e, "span details unavailable, using demo data");
            fallback_notice("demo span details");
            fallback::demo_span_details(id)
        }
        Err(e) => return Err(e),
    };
    if json {
        return print_json(&details);
    }

    println!("\n{} {}", "Span".cyan().bold(), details.span_id);
    if !details.prompts.is_empty() {
        println!("\n{}", "Prompts".bold());
        for p in &details.prompts {
            println!("   {} {}", format!("[{}]", p.role).yellow(), p.content);
        }
    }
    if !details.completions.is_empty() {
        println!("\n{}", "Completions".bold());
        for c in &details.completions {
            println!("   {} {}", format!("[{}]", c.role).green(), c.content);
            if let Some(total) = c.total_tokens {
                println!("   {}", format!("{} tokens", total).dimmed());
            }
        }
    }
    if !details.tools.is_empty() {
        println!("\n{}", "Tools".bold());
        for tool in &details.tools {
            println!("   {}", tool);
        }
    }
    Ok(())
}
