use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yapmc::config::{default_data_dir, load_config, resolve_data_dir, AppConfig};
use yapmc::env::load_env_file;
use yapmc::executor::{execute, print_call_result};
use yapmc::importer::{
    apply_header_rules, har_entry_summaries, parse_curl, parse_har, strip_browser_headers,
};
use yapmc::model::{Environment, Request};
use yapmc::store::{EnvironmentStore, RequestStore};

const NO_ENVIRONMENT: &str = "No Environment";
const UNGROUPED: &str = "Ungrouped";

#[derive(Parser, Debug)]
#[command(
    name = "yapmc",
    version,
    about = "Save, import and run HTTP API calls",
    disable_help_subcommand = true
)]
struct Cli {
    /// Directory holding api-calls.json and environments.json
    #[arg(long, env = "YAPMC_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a saved request and print the report
    Run {
        #[arg(value_name = "NAME")]
        name: String,
        /// Environment supplying {{variables}} (defaults to settings.json)
        #[arg(short, long)]
        env: Option<String>,
    },
    /// List saved requests by group
    List {
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Delete a saved request
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Import requests from a cURL command or HAR archive
    Import {
        #[command(subcommand)]
        source: ImportSource,
    },
    /// Manage environments
    Env {
        #[command(subcommand)]
        action: EnvCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ImportSource {
    /// Import a single cURL command
    Curl {
        #[arg(value_name = "COMMAND")]
        command: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        group: Option<String>,
        /// Overwrite an existing request without asking
        #[arg(short, long)]
        force: bool,
    },
    /// Import requests captured in a HAR archive
    Har {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Import only this entry (1-based, as shown by --list)
        #[arg(short, long)]
        entry: Option<usize>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        group: Option<String>,
        /// Show the archive's entries without importing
        #[arg(short, long)]
        list: bool,
        /// Keep headers the browser added on its own
        #[arg(long)]
        keep_browser_headers: bool,
        /// Overwrite existing requests without asking
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum EnvCommand {
    /// List environments
    List,
    /// Print an environment's variables
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Create or replace an environment from a dotenv file
    Import {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "DOTENV")]
        file: PathBuf,
        #[arg(short, long)]
        force: bool,
    },
    /// Set one variable, creating the environment if needed
    Set {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Delete an environment
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

struct App {
    config: AppConfig,
    requests: RequestStore,
    environments: EnvironmentStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let app = open_app(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Run { name, env } => run_request(&app, &name, env.as_deref()).await,
        Commands::List { group } => list_requests(&app, group.as_deref()),
        Commands::Delete { name } => {
            if !app.requests.delete(&name)? {
                bail!("no saved request named '{name}'");
            }
            println!("{} request '{name}'", "Deleted".green().bold());
            Ok(())
        }
        Commands::Import { source } => match source {
            ImportSource::Curl {
                command,
                name,
                group,
                force,
            } => import_curl(&app, &command, name, group, force),
            ImportSource::Har {
                file,
                entry,
                name,
                group,
                list,
                keep_browser_headers,
                force,
            } => {
                let text = std::fs::read_to_string(&file)
                    .with_context(|| format!("reading HAR file {}", file.display()))?;
                if list {
                    return list_har_entries(&text);
                }
                import_har(
                    &app,
                    &text,
                    HarImport {
                        entry,
                        name,
                        group,
                        keep_browser_headers,
                        force,
                    },
                )
            }
        },
        Commands::Env { action } => handle_env(&app, action),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn open_app(explicit_dir: Option<&Path>) -> Result<App> {
    let settings_dir = default_data_dir().ok();
    let config = match &settings_dir {
        Some(dir) => load_config(dir)
            .context("loading settings")?
            .map(|loaded| loaded.config)
            .unwrap_or_default(),
        None => AppConfig::default(),
    };

    let data_dir = match &settings_dir {
        Some(default_dir) => resolve_data_dir(explicit_dir, &config, default_dir),
        None => explicit_dir
            .map(Path::to_path_buf)
            .or_else(|| config.storage_location.clone())
            .ok_or_else(|| anyhow!("no home directory found; pass --data-dir"))?,
    };
    tracing::debug!(data_dir = %data_dir.display(), "using data directory");

    Ok(App {
        requests: RequestStore::in_dir(&data_dir),
        environments: EnvironmentStore::in_dir(&data_dir),
        config,
    })
}

async fn run_request(app: &App, name: &str, env_name: Option<&str>) -> Result<()> {
    let request = app
        .requests
        .load(name)?
        .ok_or_else(|| anyhow!("no saved request named '{name}'"))?;

    let environment = match env_name.or(app.config.default_environment.as_deref()) {
        Some(env_name) => app
            .environments
            .load(env_name)?
            .ok_or_else(|| anyhow!("no environment named '{env_name}'"))?,
        None => Environment::new(NO_ENVIRONMENT),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .context("building progress style")?,
    );
    spinner.set_message(format!("{} {}", request.method, request.name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = execute(&request, &environment).await;
    spinner.finish_and_clear();

    print_call_result(&request, &environment, &result);
    Ok(())
}

fn list_requests(app: &App, group: Option<&str>) -> Result<()> {
    let requests = match group {
        Some(group) => app.requests.in_group(group)?,
        None => app.requests.load_all()?.into_values().collect(),
    };
    if requests.is_empty() {
        println!("No saved requests.");
        return Ok(());
    }

    let mut grouped: IndexMap<&str, Vec<&Request>> = IndexMap::new();
    for request in &requests {
        grouped
            .entry(request.group.as_deref().unwrap_or(UNGROUPED))
            .or_default()
            .push(request);
    }

    for (group, members) in grouped {
        println!("{}", group.bold());
        for request in members {
            println!(
                "  {:<7} {}  {}",
                request.method.as_str().cyan(),
                request.name,
                request.url.dimmed()
            );
        }
    }
    Ok(())
}

fn import_curl(
    app: &App,
    command: &str,
    name: Option<String>,
    group: Option<String>,
    force: bool,
) -> Result<()> {
    let mut request = parse_curl(command)?;
    if let Some(name) = name {
        request.name = name;
    }
    request.group = group;
    request.headers = apply_import_rules(&app.config, request.headers);

    save_request(app, &request, force)?;
    Ok(())
}

struct HarImport {
    entry: Option<usize>,
    name: Option<String>,
    group: Option<String>,
    keep_browser_headers: bool,
    force: bool,
}

fn list_har_entries(text: &str) -> Result<()> {
    for (index, summary) in har_entry_summaries(text)?.iter().enumerate() {
        println!("{:>4}  {summary}", index + 1);
    }
    Ok(())
}

fn import_har(app: &App, text: &str, options: HarImport) -> Result<()> {
    let requests = match options.entry {
        Some(entry) => parse_har(&single_entry_archive(text, entry)?)?,
        None => parse_har(text)?,
    };

    if options.name.is_some() && requests.len() > 1 {
        bail!(
            "--name needs a single request but the archive holds {}; pick one with --entry",
            requests.len()
        );
    }

    let mut requests = dedupe_names(requests);
    let mut saved = 0;
    for request in &mut requests {
        if let Some(name) = &options.name {
            request.name = name.clone();
        }
        request.group = options.group.clone();

        let headers = std::mem::take(&mut request.headers);
        let headers = if options.keep_browser_headers {
            headers
        } else {
            strip_browser_headers(headers)
        };
        request.headers = apply_import_rules(&app.config, headers);

        if save_request(app, request, options.force)? {
            saved += 1;
        }
    }

    println!("Imported {saved} of {} request(s)", requests.len());
    Ok(())
}

/// Re-wraps one entry of `text` as its own archive. `entry` is 1-based.
fn single_entry_archive(text: &str, entry: usize) -> Result<String> {
    let mut document: Value = serde_json::from_str(text).context("parsing HAR file")?;
    let entries = document
        .pointer_mut("/log/entries")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| anyhow!("Invalid HAR format: missing 'entries' array"))?;

    let count = entries.len();
    let selected = entry
        .checked_sub(1)
        .filter(|index| *index < count)
        .map(|index| entries.swap_remove(index))
        .ok_or_else(|| anyhow!("entry {entry} is out of range (archive has {count} entries)"))?;

    Ok(json!({ "log": { "entries": [selected] } }).to_string())
}

/// Suffixes repeated names within one batch: `Users`, `Users 2`, `Users 3`.
fn dedupe_names(requests: Vec<Request>) -> Vec<Request> {
    let mut seen: IndexMap<String, usize> = IndexMap::new();
    requests
        .into_iter()
        .map(|mut request| {
            let count = seen.entry(request.name.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                let mut suffix = *count;
                let mut candidate = format!("{} {suffix}", request.name);
                while seen.contains_key(&candidate) {
                    suffix += 1;
                    candidate = format!("{} {suffix}", request.name);
                }
                seen.insert(candidate.clone(), 1);
                request.name = candidate;
            }
            request
        })
        .collect()
}

fn apply_import_rules(
    config: &AppConfig,
    headers: IndexMap<String, String>,
) -> IndexMap<String, String> {
    let rules = &config.import;
    apply_header_rules(
        headers,
        rules.include_headers.as_deref(),
        rules.exclude_headers.as_deref(),
        Some(&rules.append_headers),
    )
}

fn save_request(app: &App, request: &Request, force: bool) -> Result<bool> {
    if !force && app.requests.exists(&request.name)? {
        let prompt = format!(
            "A request named '{}' already exists. Overwrite it?",
            request.name
        );
        if !Confirm::new(&prompt).with_default(false).prompt()? {
            println!("{} '{}'", "Skipped".yellow(), request.name);
            return Ok(false);
        }
    }

    app.requests.save(request)?;
    println!(
        "{} {} {}",
        "Saved".green().bold(),
        request.method.as_str().cyan(),
        request.name
    );
    Ok(true)
}

fn handle_env(app: &App, action: EnvCommand) -> Result<()> {
    match action {
        EnvCommand::List => {
            let environments = app.environments.load_all()?;
            if environments.is_empty() {
                println!("No environments.");
            }
            for (name, environment) in environments {
                let marker = if app.config.default_environment.as_deref() == Some(name.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{}{}  {} variable(s)",
                    name.bold(),
                    marker.dimmed(),
                    environment.variables.len()
                );
            }
        }
        EnvCommand::Show { name } => {
            let environment = app
                .environments
                .load(&name)?
                .ok_or_else(|| anyhow!("no environment named '{name}'"))?;
            println!("{}", environment.name.bold());
            for (key, value) in &environment.variables {
                println!("  {key} = {value}");
            }
        }
        EnvCommand::Import { name, file, force } => {
            let environment = load_env_file(&file, &name)?;
            if !force && app.environments.exists(&name)? {
                let prompt = format!("An environment named '{name}' already exists. Replace it?");
                if !Confirm::new(&prompt).with_default(false).prompt()? {
                    println!("{} '{name}'", "Skipped".yellow());
                    return Ok(());
                }
            }
            app.environments.save(&environment)?;
            println!(
                "{} environment '{name}' with {} variable(s)",
                "Saved".green().bold(),
                environment.variables.len()
            );
        }
        EnvCommand::Set { name, key, value } => {
            let environment = app
                .environments
                .load(&name)?
                .unwrap_or_else(|| Environment::new(name.clone()))
                .with_variable(key.clone(), value);
            app.environments.save(&environment)?;
            println!("{} {key} in '{name}'", "Set".green().bold());
        }
        EnvCommand::Delete { name } => {
            if !app.environments.delete(&name)? {
                bail!("no environment named '{name}'");
            }
            println!("{} environment '{name}'", "Deleted".green().bold());
        }
    }
    Ok(())
}
