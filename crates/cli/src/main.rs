//! svcscope: Inspect Windows services from the command line
//!
//! Usage:
//!   svcscope list --state active     # Running (and pending) services
//!   svcscope config Spooler          # Static configuration of a service
//!   svcscope triggers W32Time        # Start/stop triggers
//!   svcscope dependents RpcSs -r     # Everything that depends on RpcSs
//!   svcscope call '{"op": "getServiceTriggers", "args": ["W32Time"]}'
//!
//! Output formats:
//!   --json     Machine-readable JSON
//!   (default)  Human-readable tables and blocks
#![cfg_attr(not(windows), allow(dead_code))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::{OwoColorize, Style};
use std::io::{self, BufRead, Write};
use svcscope_core::{
    render, DependentServices, DesiredState, ErrorKind, ErrorReport, ManagerConfig, Request,
    ScmError, Service, ServiceControl, ServiceInformation, ServiceManager,
};
use tabled::{
    settings::{object::Columns, style::Style as TableStyle, Alignment, Modify},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Label width for aligned output
const LABEL_WIDTH: usize = 14;

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ERROR_GENERAL: i32 = 1;
    pub const ERROR_NOT_FOUND: i32 = 2;
    pub const ERROR_ACCESS_DENIED: i32 = 3;
    pub const ERROR_INVALID_INPUT: i32 = 4;
    pub const ERROR_HOST_UNREACHABLE: i32 = 5;
}

/// Configuration file support
mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::PathBuf;
    use svcscope_core::ManagerConfig;
    use tracing::warn;

    /// User configuration from ~/.svcscope/config.toml
    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct Config {
        /// Worker pool and native buffer limits
        pub manager: ManagerConfig,
        /// Default output settings
        pub output: OutputConfig,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    pub struct OutputConfig {
        /// Disable colored output by default
        pub no_color: bool,
        /// Use JSON output by default
        pub json: bool,
        /// Host to enumerate when `list` is given no --host
        pub host: Option<String>,
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".svcscope").join("config.toml"))
    }

    /// Load configuration from file, falling back to defaults
    pub fn load_config() -> Config {
        let Some(path) = config_path() else {
            return Config::default();
        };

        if !path.exists() {
            return Config::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => parse_config(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                Config::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read config file");
                Config::default()
            }
        }
    }

    pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(content)
    }

    /// Generate a sample config file content
    pub fn sample_config() -> &'static str {
        r#"# svcscope configuration file
# Place this file at ~/.svcscope/config.toml

[manager]
# Native queries allowed to run at once
workers = 4
# Largest buffer allocated for a single native call, in bytes
max_buffer_bytes = 8388608
# Largest number of pages accepted from one enumeration
max_pages = 4096
# Depth limit for `dependents --recursive`
max_depth = 16

[output]
# Disable colored output
no_color = false
# Use JSON output by default
json = false
# Default host for `list` (leave unset for the local machine)
# host = "fileserver01"
"#
    }
}

#[derive(Parser)]
#[command(name = "svcscope")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  svcscope list                        List every Win32 service
  svcscope list --state active         Only running and pending services
  svcscope list --host srv01           Services on a remote machine
  svcscope config Spooler              Show configuration of Spooler
  svcscope triggers W32Time --json     Triggers as JSON
  svcscope dependents RpcSs -r         Transitive dependents of RpcSs
  svcscope call < requests.jsonl       Run JSON requests, one per line")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Output as JSON (for scripting and automation)
    #[arg(long, short = 'j', global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log native calls and negotiation retries to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Generate a sample config file at ~/.svcscope/config.toml
    #[arg(long)]
    init_config: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List services with their runtime status
    List {
        /// Which services to include: active, inactive or all
        #[arg(long, short = 's', default_value_t = DesiredState::All)]
        state: DesiredState,

        /// Remote machine to query (default: local machine)
        #[arg(long, short = 'H')]
        host: Option<String>,

        /// One line per service instead of a table
        #[arg(long)]
        short: bool,
    },

    /// Show the static configuration of a service
    Config {
        /// Service name (not the display name)
        name: String,
    },

    /// Show the start and stop triggers of a service
    Triggers {
        /// Service name
        name: String,
    },

    /// Show services that depend on a service
    Dependents {
        /// Service name
        name: String,

        /// Which dependents to include: active, inactive or all
        #[arg(long, short = 's', default_value_t = DesiredState::All)]
        state: DesiredState,

        /// Follow dependents of dependents
        #[arg(long, short = 'r')]
        recursive: bool,

        /// Depth limit for --recursive (default from config)
        #[arg(long, value_name = "N", requires = "recursive")]
        max_depth: Option<usize>,
    },

    /// Run JSON requests ({"op": .., "args": [..]}) from the argument or stdin
    Call {
        /// A single request; read one request per line from stdin when absent
        request: Option<String>,
    },
}

/// Color configuration for output
struct Colors {
    enabled: bool,
    header: Style,
    success: Style,
    warning: Style,
    error: Style,
    info: Style,
    dim: Style,
}

impl Colors {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                enabled: true,
                header: Style::new().bold().cyan(),
                success: Style::new().green(),
                warning: Style::new().yellow(),
                error: Style::new().red().bold(),
                info: Style::new().cyan(),
                dim: Style::new().dimmed(),
            }
        } else {
            Self {
                enabled: false,
                header: Style::new(),
                success: Style::new(),
                warning: Style::new(),
                error: Style::new(),
                info: Style::new(),
                dim: Style::new(),
            }
        }
    }
}

/// Output settings after merging the config file and flags
struct Output {
    json: bool,
    default_host: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load configuration file
    let cfg = config::load_config();

    // Apply config defaults (CLI flags override config)
    let colors = Colors::new(!cli.no_color && !cfg.output.no_color && supports_color());
    let output = Output {
        json: cli.json || cfg.output.json,
        default_host: cfg.output.host.clone(),
    };

    if cli.init_config {
        handle_init_config(&colors);
        return;
    }

    let Some(command) = cli.command else {
        print_error(&colors, "No command specified");
        eprintln!();
        eprintln!("Usage: svcscope [OPTIONS] <COMMAND>");
        eprintln!();
        eprintln!("Run 'svcscope --help' for more information.");
        std::process::exit(exit_codes::ERROR_INVALID_INPUT);
    };

    info!(workers = cfg.manager.workers, "starting");

    if let Err(e) = execute(command, cfg.manager, &output, &colors).await {
        print_error(&colors, &format!("{:#}", e));
        std::process::exit(exit_code_for(&e));
    }
    std::process::exit(exit_codes::SUCCESS);
}

/// Install the stderr subscriber; RUST_LOG wins over --verbose
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "svcscope=debug,svcscope_core=debug,svcscope_platform_windows=debug"
    } else {
        "svcscope=warn,svcscope_core=warn,svcscope_platform_windows=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[cfg(windows)]
async fn execute(
    command: Command,
    manager_config: ManagerConfig,
    output: &Output,
    colors: &Colors,
) -> Result<()> {
    use svcscope_platform_windows::NativeBackend;

    let backend = NativeBackend::new(manager_config.clone());
    let manager = ServiceManager::new(backend, manager_config)?;
    run(&manager, command, output, colors).await
}

#[cfg(not(windows))]
async fn execute(
    _command: Command,
    _manager_config: ManagerConfig,
    _output: &Output,
    _colors: &Colors,
) -> Result<()> {
    anyhow::bail!("This tool only works on Windows")
}

/// Route a command to its handler
async fn run<B: ServiceControl>(
    manager: &ServiceManager<B>,
    command: Command,
    output: &Output,
    colors: &Colors,
) -> Result<()> {
    match command {
        Command::List { state, host, short } => {
            let host = host.or_else(|| output.default_host.clone()).unwrap_or_default();
            let services = manager
                .enumerate_services(state, &host)?
                .await
                .with_context(|| format!("Failed to list {} services", state))?;
            if output.json {
                print_json(&services)
            } else if short {
                for service in &services {
                    println!("{}", render::render_short(service));
                }
                Ok(())
            } else {
                print_service_table(&services, colors);
                Ok(())
            }
        }
        Command::Config { name } => {
            let info = manager
                .get_service_configuration(&name)?
                .await
                .with_context(|| format!("Failed to read configuration of {}", name))?;
            if output.json {
                print_json(&info)
            } else if colors.enabled {
                print_colored_configuration(&name, &info, colors);
                Ok(())
            } else {
                print!("{}", render::render_configuration(&name, &info));
                Ok(())
            }
        }
        Command::Triggers { name } => {
            let triggers = manager
                .get_service_triggers(&name)?
                .await
                .with_context(|| format!("Failed to read triggers of {}", name))?;
            if output.json {
                print_json(&triggers)
            } else {
                print!("{}", render::render_triggers(&name, &triggers));
                Ok(())
            }
        }
        Command::Dependents {
            name,
            state,
            recursive: false,
            ..
        } => {
            let dependents = manager
                .enum_dependent_services(&name, state)?
                .await
                .with_context(|| format!("Failed to list dependents of {}", name))?;
            if output.json {
                print_json(&dependents)
            } else {
                print_dependents_table(&name, &dependents, colors);
                Ok(())
            }
        }
        Command::Dependents {
            name,
            state,
            recursive: true,
            max_depth,
        } => {
            let closure = manager
                .walk_dependents(&name, state, max_depth)
                .await
                .with_context(|| format!("Failed to list dependents of {}", name))?;
            if output.json {
                print_json(&closure)
            } else {
                print!("{}", render::render_closure(&closure));
                if !closure.errors.is_empty() {
                    print_warning(
                        colors,
                        &format!("{} services could not be queried", closure.errors.len()),
                    );
                }
                Ok(())
            }
        }
        Command::Call { request } => handle_call(manager, request).await,
    }
}

/// Run JSON requests and print one compact JSON result per line.
///
/// Failed requests print `{"error": {...}}` and do not stop later ones; the
/// first failure determines the exit code.
async fn handle_call<B: ServiceControl>(
    manager: &ServiceManager<B>,
    request: Option<String>,
) -> Result<()> {
    let lines: Vec<String> = match request {
        Some(line) => vec![line],
        None => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("Failed to read requests from stdin")?,
    };

    let mut first_failure: Option<ScmError> = None;
    let stdout = io::stdout();

    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        let result = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => match Request::from_json(&value) {
                Ok(request) => {
                    debug!(op = request.op(), "dispatching request");
                    manager.dispatch(request).await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(ScmError::invalid_argument(format!("request is not valid JSON: {}", e))),
        };

        let rendered = match result {
            Ok(value) => render::render_json_compact(&value)?,
            Err(e) => {
                let rendered =
                    render::render_json_compact(&serde_json::json!({ "error": ErrorReport::from(&e) }))?;
                first_failure.get_or_insert(e);
                rendered
            }
        };
        writeln!(stdout.lock(), "{}", rendered).ok();
    }

    match first_failure {
        Some(e) => Err(e).context("One or more requests failed"),
        None => Ok(()),
    }
}

/// Map the taxonomy of the underlying error to a process exit code
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ScmError>().map(ScmError::kind) {
        Some(ErrorKind::ServiceNotFound) => exit_codes::ERROR_NOT_FOUND,
        Some(ErrorKind::AccessDenied) => exit_codes::ERROR_ACCESS_DENIED,
        Some(ErrorKind::InvalidArgument) => exit_codes::ERROR_INVALID_INPUT,
        Some(ErrorKind::HostUnreachable) => exit_codes::ERROR_HOST_UNREACHABLE,
        _ => exit_codes::ERROR_GENERAL,
    }
}

/// Handle --init-config flag
fn handle_init_config(colors: &Colors) {
    use std::fs;

    let Some(config_path) = config::config_path() else {
        print_error(colors, "Could not determine home directory");
        std::process::exit(exit_codes::ERROR_GENERAL);
    };

    // Create directory if it doesn't exist
    if let Some(parent) = config_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            print_error(colors, &format!("Failed to create config directory: {}", e));
            std::process::exit(exit_codes::ERROR_GENERAL);
        }
    }

    if config_path.exists() {
        eprintln!(
            "{} Config file already exists at: {}",
            "warning:".style(colors.warning),
            config_path.display()
        );
        eprintln!("Use a text editor to modify it, or delete it first to regenerate.");
        std::process::exit(exit_codes::SUCCESS);
    }

    match fs::write(&config_path, config::sample_config()) {
        Ok(()) => {
            eprintln!(
                "{} Created config file at: {}",
                "success:".style(colors.success),
                config_path.display()
            );
            std::process::exit(exit_codes::SUCCESS);
        }
        Err(e) => {
            print_error(colors, &format!("Failed to write config file: {}", e));
            std::process::exit(exit_codes::ERROR_GENERAL);
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = render::render_json_string(value).context("Failed to render JSON")?;
    println!("{}", json);
    Ok(())
}

/// Service row for list tables
#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "PID")]
    pid: String,
    #[tabled(rename = "Process")]
    process: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
}

impl ServiceRow {
    fn new(service: &Service) -> Self {
        let process = &service.process;
        Self {
            name: service.name.clone(),
            state: process.current_state.to_string(),
            pid: process
                .id
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            process: process.name.clone().unwrap_or_else(|| "-".to_string()),
            display_name: service.display_name.clone(),
        }
    }
}

fn print_table(rows: &[ServiceRow]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let table = Table::new(rows)
        .with(TableStyle::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();

    for line in table.lines() {
        writeln!(out, "  {}", line).ok();
    }
}

fn print_service_table(services: &[Service], colors: &Colors) {
    if services.is_empty() {
        println!("{} No matching services", "→".style(colors.info));
        return;
    }

    let running = services.iter().filter(|s| s.is_running()).count();
    println!(
        "\n{} {} services ({} running):\n",
        "→".style(colors.info),
        services.len(),
        running.style(colors.success)
    );

    let rows: Vec<ServiceRow> = services.iter().map(ServiceRow::new).collect();
    print_table(&rows);
}

fn print_dependents_table(root: &str, dependents: &DependentServices, colors: &Colors) {
    if dependents.is_empty() {
        println!(
            "{} No services depend on {}",
            "→".style(colors.info),
            root.style(colors.header)
        );
        return;
    }

    println!(
        "\n{} {} services depend on {}:\n",
        "→".style(colors.info),
        dependents.len(),
        root.style(colors.header)
    );

    let rows: Vec<ServiceRow> = dependents.values().map(ServiceRow::new).collect();
    print_table(&rows);
}

fn print_colored_configuration(name: &str, info: &ServiceInformation, colors: &Colors) {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "{}", format!("─── {} ───", name).style(colors.header)).ok();
    writeln!(out).ok();

    print_row(&mut out, "Type", &info.service_type.to_string(), colors);
    print_row(&mut out, "Start type", &info.start_type.to_string(), colors);
    print_row(&mut out, "Error control", &info.error_control.to_string(), colors);
    print_row(&mut out, "Binary", &info.binary_path, colors);
    print_row(&mut out, "Account", &info.account, colors);

    if let Some(group) = &info.load_order_group {
        print_row(&mut out, "Group", group, colors);
    }
    if let Some(tag) = info.tag_id {
        print_row(&mut out, "Tag", &tag.to_string(), colors);
    }

    let deps = info.dependency_names();
    if !deps.is_empty() {
        print_section(&mut out, "Depends on", colors);
        for dep in deps {
            print_sub_item(&mut out, dep, colors.info);
        }
    }

    if let Some(description) = &info.description {
        print_section(&mut out, "Description", colors);
        print_sub_item(&mut out, description, colors.dim);
    }
}

/// Print an aligned label with value
fn print_row(out: &mut impl Write, label: &str, value: &str, colors: &Colors) {
    writeln!(
        out,
        "{:>width$} : {}",
        label.style(colors.header),
        value,
        width = LABEL_WIDTH
    )
    .ok();
}

/// Print an aligned section header
fn print_section(out: &mut impl Write, label: &str, colors: &Colors) {
    writeln!(out).ok();
    writeln!(
        out,
        "{:>width$} :",
        label.style(colors.header),
        width = LABEL_WIDTH
    )
    .ok();
}

/// Print sub-items with proper indentation
fn print_sub_item(out: &mut impl Write, value: &str, value_style: Style) {
    writeln!(
        out,
        "{:>width$}   {}",
        "",
        value.style(value_style),
        width = LABEL_WIDTH
    )
    .ok();
}

/// Print an error message
fn print_error(colors: &Colors, message: &str) {
    eprintln!("{} {}", "error:".style(colors.error), message);
}

/// Print a warning message
fn print_warning(colors: &Colors, message: &str) {
    eprintln!("{} {}", "warning:".style(colors.warning), message);
}

/// Check if the terminal supports color
fn supports_color() -> bool {
    // Check for common NO_COLOR convention
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    // On Windows, try to enable ENABLE_VIRTUAL_TERMINAL_PROCESSING
    #[cfg(windows)]
    {
        use std::os::windows::io::AsRawHandle;
        use windows::Win32::Foundation::HANDLE;
        use windows::Win32::System::Console::{
            GetConsoleMode, SetConsoleMode, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
        };

        let stdout = io::stdout();
        let handle = HANDLE(stdout.as_raw_handle() as _);

        unsafe {
            let mut mode = std::mem::zeroed();
            if GetConsoleMode(handle, &mut mode).is_ok() {
                let new_mode = mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING;
                if SetConsoleMode(handle, new_mode).is_ok() {
                    return true;
                }
            }
        }

        // Redirected output gets no escape codes
        false
    }

    #[cfg(not(windows))]
    {
        use std::io::IsTerminal;
        io::stdout().is_terminal()
    }
}
