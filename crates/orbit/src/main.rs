use std::env;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::{LevelFilter, debug, info, warn};
use orbit::config::{self, APP_NAME, AppConfig};
use orbit::{PatchLog, Workspace};
use orbit_protocol::{ServerStatus, UtteranceSource, WorkspaceComponent};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

const DEFAULT_SAY_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_attach(ctx: RuntimeContext) -> Result<()> {
    handle_attach(&ctx).await
}

#[tokio::main]
async fn async_say(ctx: RuntimeContext, cmd: SayCommand) -> Result<()> {
    handle_say(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Attach => async_attach(ctx),
        Command::Say(cmd) => async_say(ctx, cmd),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Orbit - voice and text driven collaborative workspace client.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Workspace session to join (overrides session.id)
    #[arg(long, value_name = "ID", global = true)]
    session: Option<String>,
    /// Session server base URL (overrides server.base_url)
    #[arg(long, value_name = "URL", global = true)]
    server: Option<String>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Do not change anything on disk
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
    /// Assume "yes" for interactive prompts
    #[arg(short = 'y', long = "yes", global = true)]
    assume_yes: bool,
    /// Maximum seconds to wait for the server
    #[arg(long = "timeout", value_name = "SECONDS", global = true)]
    timeout: Option<u64>,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Join a session interactively; each stdin line is sent as an utterance
    Attach,
    /// Send one utterance and print the resulting workspace
    Say(SayCommand),
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct SayCommand {
    /// What to say
    #[arg(value_name = "TEXT", required = true, num_args = 1..)]
    text: Vec<String>,
    /// Report the utterance as spoken rather than typed
    #[arg(long)]
    voice: bool,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let mut config = config::load_config(&paths.config_file)?;
        if let Some(ref session) = common.session {
            config.session.id = session.clone();
        }
        if let Some(ref server) = common.server {
            config.server.base_url = server.clone();
        }
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("orbit={level},orbit_protocol={level},tungstenite=warn"))
        });

        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }

        // The library logs through `log`; route it as well.
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.config.logging.level.as_str()),
        );
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Info),
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn wait_timeout(&self) -> Duration {
        self.common
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SAY_TIMEOUT)
    }
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
}

impl AppPaths {
    fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!("invalid config file path: {config_file:?}"));
        }

        Ok(Self { config_file })
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config: {}", self.config_file.display())
    }
}

// ============================================================================
// Session commands
// ============================================================================

/// One line typed into `orbit attach`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttachInput {
    Utterance(String),
    Sync,
    SetCompleted { id: String, completed: bool },
    List,
    Log,
    Quit,
    Empty,
    Invalid(String),
}

impl AttachInput {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Utterance(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name, arg) {
            ("sync", _) => Self::Sync,
            ("list" | "ls", _) => Self::List,
            ("log", _) => Self::Log,
            ("quit" | "exit" | "q", _) => Self::Quit,
            ("done", id) if !id.is_empty() => Self::SetCompleted {
                id: id.to_string(),
                completed: true,
            },
            ("undone", id) if !id.is_empty() => Self::SetCompleted {
                id: id.to_string(),
                completed: false,
            },
            _ => Self::Invalid(line.to_string()),
        }
    }
}

async fn handle_attach(ctx: &RuntimeContext) -> Result<()> {
    let workspace = Workspace::new(&ctx.config.server, &ctx.config.session)
        .context("creating workspace session")?;
    info!("Joining session '{}'", ctx.config.session.id);
    workspace.connect();

    let mut connection = workspace.subscribe_connection();
    let mut server_status = workspace.subscribe_server_status();
    let mut components = workspace.subscribe_components();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else { break };
                match AttachInput::parse(&line) {
                    AttachInput::Utterance(text) => {
                        if !workspace.connection_status().is_connected() {
                            warn!("Not connected; utterance dropped");
                        }
                        workspace.send_utterance(text, UtteranceSource::Text);
                    }
                    AttachInput::Sync => workspace.request_sync(),
                    AttachInput::SetCompleted { id, completed } => {
                        if workspace.component(&id).is_none() {
                            warn!("No component with id '{}'", id);
                        }
                        workspace.send_action(
                            "mark_complete",
                            id,
                            Some(json!({ "completed": completed })),
                        );
                    }
                    AttachInput::List => print_components(&workspace.components(), ctx.common.json)?,
                    AttachInput::Log => print_patch_log(&workspace.patch_log(), ctx.common.json)?,
                    AttachInput::Quit => break,
                    AttachInput::Empty => {}
                    AttachInput::Invalid(input) => {
                        eprintln!("unknown command: {input} (try /sync, /done <id>, /undone <id>, /list, /log, /quit)");
                    }
                }
            }
            Ok(()) = connection.changed() => {
                let status = *connection.borrow_and_update();
                eprintln!("connection: {status}");
            }
            Ok(()) = server_status.changed() => {
                let status = *server_status.borrow_and_update();
                match workspace.status_message() {
                    Some(message) => eprintln!("server: {status} ({message})"),
                    None => eprintln!("server: {status}"),
                }
            }
            Ok(()) = components.changed() => {
                let snapshot = components.borrow_and_update().clone();
                print_components(&snapshot, ctx.common.json)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    workspace.shutdown().await;
    Ok(())
}

async fn handle_say(ctx: &RuntimeContext, cmd: SayCommand) -> Result<()> {
    let text = cmd.text.join(" ");
    let source = if cmd.voice {
        UtteranceSource::Voice
    } else {
        UtteranceSource::Text
    };
    let timeout = ctx.wait_timeout();

    let workspace = Workspace::new(&ctx.config.server, &ctx.config.session)
        .context("creating workspace session")?;
    workspace.connect();

    // The answer to the connect-time sync request has to land first, or it would
    // replace whatever our utterance produced.
    let mut patch_log = workspace.subscribe_patch_log();
    tokio::time::timeout(timeout, patch_log.wait_for(|log| log.last_seq() > 0))
        .await
        .map_err(|_| {
            anyhow!(
                "no workspace snapshot from {} within {:?}",
                ctx.config.server.base_url,
                timeout
            )
        })?
        .context("session worker stopped")?;

    let mut server_status = workspace.subscribe_server_status();
    server_status.mark_unchanged();
    workspace.send_utterance(text, source);

    if tokio::time::timeout(timeout, wait_until_settled(&mut server_status))
        .await
        .is_err()
    {
        warn!("Server did not settle within {:?}", timeout);
    }

    if !ctx.common.json {
        for intent in workspace.last_intents() {
            match intent.target() {
                Some(target) => println!("intent: {} -> {}", intent.kind(), target),
                None => println!("intent: {}", intent.kind()),
            }
        }
    }
    print_components(&workspace.components(), ctx.common.json)?;

    workspace.shutdown().await;
    Ok(())
}

/// Wait for the server to go busy and come back to a resting state.
async fn wait_until_settled(status: &mut watch::Receiver<ServerStatus>) {
    let mut seen_busy = false;
    while status.changed().await.is_ok() {
        match *status.borrow_and_update() {
            ServerStatus::Thinking | ServerStatus::Updating => seen_busy = true,
            ServerStatus::Error => return,
            ServerStatus::Synced | ServerStatus::Listening if seen_busy => return,
            _ => {}
        }
    }
}

fn print_components(components: &[WorkspaceComponent], as_json: bool) -> Result<()> {
    if as_json {
        println!(
            "{}",
            serde_json::to_string(components).context("serializing components to JSON")?
        );
        return Ok(());
    }

    if components.is_empty() {
        println!("(workspace is empty)");
        return Ok(());
    }
    for component in components {
        println!("{}", format_component(component));
    }
    Ok(())
}

fn format_component(component: &WorkspaceComponent) -> String {
    let check = if component.completed { "[x]" } else { "[ ]" };
    let mut line = format!(
        "{check} {:<10} {:<8} {}",
        component.id, component.component_type, component.title
    );
    let schedule: Vec<&str> = [component.date.as_deref(), component.time_slot.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    line.push_str(&format!(" ({}", component.priority));
    if !schedule.is_empty() {
        line.push_str(", ");
        line.push_str(&schedule.join(" "));
    }
    line.push(')');
    line
}

fn print_patch_log(log: &PatchLog, as_json: bool) -> Result<()> {
    for entry in log.entries() {
        if as_json {
            println!(
                "{}",
                serde_json::to_string(entry).context("serializing patch log entry")?
            );
            continue;
        }
        let kinds: Vec<&str> = entry.operations.iter().map(|op| op.kind()).collect();
        println!(
            "#{} {}{} [{}]",
            entry.seq,
            entry.applied_at.to_rfc3339(),
            if entry.resync { " resync" } else { "" },
            kinds.join(", ")
        );
    }
    Ok(())
}

// ============================================================================
// Config commands
// ============================================================================

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }

    if ctx.common.dry_run {
        info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }

    config::write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ctx.config)
                        .context("serializing config to JSON")?
                );
            } else {
                println!(
                    "{}",
                    toml::to_string_pretty(&ctx.config).context("serializing config to TOML")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            config::write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}
