//! Argument parsing and command dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use helmsman_api_models::{ResourceId, ResourceKind};
use helmsman_console::ConsoleConfig;
use helmsman_console::context::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};
use helmsman_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use tracing::{Instrument, debug, info_span};
use url::Url;
use uuid::Uuid;

use crate::client::{
    AppContext, CliDependencies, CliResult, FilterArg, ParentArg, parse_filter, parse_parent,
    parse_resource, parse_url,
};
use crate::commands::list::handle_list;
use crate::commands::options::handle_options;
use crate::commands::remove::handle_remove;
use crate::commands::show::handle_show;
use crate::commands::whoami::handle_whoami;

/// Entrypoint used by the binary; returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    init_cli_logging(&cli);
    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let deps = match CliDependencies::from_env(&cli, &trace_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let span = info_span!("command", command = command_name, trace_id = %trace_id);
    match dispatch(cli, &deps).instrument(span).await {
        Ok(()) => {
            debug!(command = command_name, "command finished");
            0
        }
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, deps: &CliDependencies) -> CliResult<()> {
    let ctx = AppContext::new(deps, console_config(&cli))?;
    let output = cli.output;

    match cli.command {
        Command::Ls(args) => handle_list(&ctx, args, output).await,
        Command::Show(args) => handle_show(&ctx, args, output).await,
        Command::Options(args) => handle_options(&ctx, args, output).await,
        Command::Rm(args) => handle_remove(&ctx, args, output).await,
        Command::Whoami => handle_whoami(&ctx, output).await,
    }
}

fn console_config(cli: &Cli) -> ConsoleConfig {
    let mut config = ConsoleConfig::new(cli.api_url.clone());
    config.timeout_secs = cli.timeout;
    config.default_page_size = cli.default_page_size;
    config.token.clone_from(&cli.token);
    config
}

fn init_cli_logging(cli: &Cli) {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.map_or_else(LogFormat::infer, LogFormat::from),
        build_sha: option_env!("HELMSMAN_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: logging disabled: {err}");
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Ls(_) => "ls",
        Command::Show(_) => "show",
        Command::Options(_) => "options",
        Command::Rm(args) => {
            if args.from.is_some() {
                "rm_disassociate"
            } else {
                "rm"
            }
        }
        Command::Whoami => "whoami",
    }
}

#[derive(Parser)]
#[command(
    name = "helmsman",
    about = "Browse and prune automation controller resources"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "HELMSMAN_API_URL",
        value_parser = parse_url,
        default_value = "http://127.0.0.1:8013"
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "HELMSMAN_TOKEN",
        hide_env_values = true,
        help = "OAuth2 bearer token"
    )]
    pub(crate) token: Option<String>,
    #[arg(
        long,
        global = true,
        env = "HELMSMAN_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "HTTP timeout in seconds"
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "HELMSMAN_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE,
        help = "Rows per page when `ls --page-size` is not given"
    )]
    pub(crate) default_page_size: u32,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "HELMSMAN_LOG",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log filter directive; RUST_LOG takes precedence"
    )]
    pub(crate) log_level: String,
    #[arg(long, global = true, value_enum)]
    pub(crate) log_format: Option<LogFormatArg>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List a resource collection.
    Ls(ListArgs),
    /// Show one resource.
    Show(ShowArgs),
    /// Show searchable keys and permissions of a collection.
    Options(OptionsArgs),
    /// Delete resources, or detach them from a parent with `--from`.
    Rm(RemoveArgs),
    /// Show the server version and the signed-in user.
    Whoami,
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    #[arg(value_parser = parse_resource, help = "Resource collection, e.g. credentials")]
    pub(crate) resource: ResourceKind,
    #[arg(
        long,
        help = "Location search string with namespaced keys, e.g. credential.page=2"
    )]
    pub(crate) query: Option<String>,
    #[arg(
        long = "filter",
        value_parser = parse_filter,
        help = "Filter as KEY=VALUE, e.g. name__icontains=web"
    )]
    pub(crate) filters: Vec<FilterArg>,
    #[arg(
        long = "exclude",
        value_parser = parse_filter,
        help = "Exclude rows matching KEY=VALUE"
    )]
    pub(crate) excludes: Vec<FilterArg>,
    #[arg(long)]
    pub(crate) page: Option<i64>,
    #[arg(long)]
    pub(crate) page_size: Option<u32>,
    #[arg(long)]
    pub(crate) order_by: Option<String>,
    #[arg(long, requires = "order_by", help = "Sort descending")]
    pub(crate) desc: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ShowArgs {
    #[arg(value_parser = parse_resource)]
    pub(crate) resource: ResourceKind,
    pub(crate) id: ResourceId,
}

#[derive(Args, Debug)]
pub(crate) struct OptionsArgs {
    #[arg(value_parser = parse_resource)]
    pub(crate) resource: ResourceKind,
}

#[derive(Args, Debug)]
pub(crate) struct RemoveArgs {
    #[arg(value_parser = parse_resource)]
    pub(crate) resource: ResourceKind,
    #[arg(required = true, value_delimiter = ',', help = "Identifiers to remove")]
    pub(crate) ids: Vec<ResourceId>,
    #[arg(
        long,
        value_parser = parse_parent,
        help = "Detach from RESOURCE/ID instead of deleting"
    )]
    pub(crate) from: Option<ParentArg>,
    #[arg(long, help = "Proceed without a confirmation dry run")]
    pub(crate) yes: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}
