//! aclctl, управление ACL-файлами из командной строки.
//!
//! Создание, добавление и удаление записей, проверка доступа принципала и
//! просмотр содержимого файла.

use std::{path::PathBuf, process};

use aclstore::{
    error::LogLevel, init_logging, AclStore, AclStoreError, ErrorExt, LogFormat, LoggingConfig,
    StoreConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "aclctl")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), ")"))]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT"),
    "\nbuilt:  ",
    env!("BUILD_TIME"),
))]
#[command(about = "Manage flat-file principal ACLs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Локальный realm для имён без `@realm`
    #[arg(short, long, global = true, help = "Realm appended to principals without one")]
    realm: Option<String>,
    /// TOML-файл настроек
    #[arg(
        short,
        long,
        global = true,
        env = "ACLSTORE_CONFIG",
        help = "Path to a TOML settings file"
    )]
    config: Option<PathBuf>,
    /// Предел ожидания блокировки, мс
    #[arg(long, global = true, help = "Give up waiting for a busy lock after N milliseconds")]
    lock_timeout_ms: Option<u64>,
    /// Подробный вывод (debug)
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,
    /// Только предупреждения и ошибки
    #[arg(short = 'q', long, global = true, help = "Only log warnings and errors")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Создать пустой ACL или очистить существующий
    Init {
        file: PathBuf,
        /// Права нового файла (восьмеричные); 0600 добавляется всегда
        #[arg(long, default_value = "600", value_parser = parse_mode)]
        mode: u32,
    },
    /// Добавить принципала
    Add { file: PathBuf, principal: String },
    /// Удалить принципала
    #[command(alias = "rm")]
    Del { file: PathBuf, principal: String },
    /// Проверить доступ (с учётом шаблонов); код выхода 1 при отказе
    Check { file: PathBuf, principal: String },
    /// Проверить точное вхождение канонической строки
    Exact { file: PathBuf, canonical: String },
    /// Показать записи
    #[command(alias = "ls")]
    List {
        file: PathBuf,
        #[arg(long, help = "Print entries as a JSON array")]
        json: bool,
    },
    /// Показать каноническую форму имени
    Canon { principal: String },
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| format!("invalid octal mode '{s}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _logging = init_logging(LoggingConfig {
        level: log_level(cli.verbose, cli.quiet).to_string(),
        format: LogFormat::Compact,
        with_ansi: false,
        ..Default::default()
    })
    .context("failed to initialize logging")?;

    match run(&cli) {
        Ok(true) => Ok(()),
        Ok(false) => process::exit(1),
        Err(e) => {
            match e.downcast_ref::<AclStoreError>() {
                Some(acl_err) => eprintln!("{}", report(acl_err)),
                None => eprintln!("Error: {e:#}"),
            }
            process::exit(1);
        }
    }
}

/// Пишет подробности ошибки в лог с уровнем по её коду и возвращает
/// строку для stderr. Пути и детали ввода-вывода видны только в логе.
fn report(err: &AclStoreError) -> String {
    let code = err.status_code();
    let details = err.log_message();
    let tags = err.metrics_tags();
    match code.log_level() {
        _ if code.is_critical() => error!(?tags, %details, "ACL command failed"),
        LogLevel::Error | LogLevel::Warn => warn!(?tags, %details, "ACL command failed"),
        LogLevel::Info => info!(?tags, %details, "ACL command rejected"),
        LogLevel::Debug | LogLevel::Trace => debug!(?tags, %details, "ACL command rejected"),
    }

    let mut line = format!("Error [{code}]: {}", err.client_message());
    if code.is_retryable() {
        line.push_str(" (retry later)");
    }
    line
}

fn log_level(
    verbose: bool,
    quiet: bool,
) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

fn store_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = StoreConfig::load_from(cli.config.as_deref())?;
    if let Some(realm) = &cli.realm {
        config.local_realm = realm.clone();
    }
    if let Some(ms) = cli.lock_timeout_ms {
        config.lock_timeout_ms = Some(ms);
    }
    config.validate()?;
    debug!(?config, "Store configuration");
    Ok(config)
}

/// Выполняет команду. `Ok(false)`: отрицательный ответ без ошибки.
fn run(cli: &Cli) -> Result<bool> {
    let config = store_config(cli)?;
    let mut store = AclStore::new(&config);

    match &cli.command {
        Commands::Init { file, mode } => {
            store.initialize(file, *mode)?;
            println!("initialized {}", file.display());
        }
        Commands::Add { file, principal } => {
            store.add(file, principal)?;
            println!("added {}", canonical_or_raw(&store, principal));
        }
        Commands::Del { file, principal } => {
            store.delete(file, principal)?;
            println!("removed {}", canonical_or_raw(&store, principal));
        }
        Commands::Check { file, principal } => {
            let allowed = store.check(file, principal);
            println!("{}", if allowed { "allowed" } else { "denied" });
            return Ok(allowed);
        }
        Commands::Exact { file, canonical } => {
            let found = store.exact_match(file, canonical);
            println!("{}", if found { "present" } else { "absent" });
            return Ok(found);
        }
        Commands::List { file, json } => {
            let entries = store
                .entries(file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{entry}");
                }
            }
        }
        Commands::Canon { principal } => match store.canonicalize(principal) {
            Some(canon) => println!("{canon}"),
            None => {
                return Err(AclStoreError::invalid_principal(principal.as_str()).into());
            }
        },
    }

    let stats = store.cache_stats();
    debug!(reloads = stats.reloads, hits = stats.hits, "Done");
    Ok(true)
}

fn canonical_or_raw(
    store: &AclStore,
    principal: &str,
) -> String {
    store
        .canonicalize(principal)
        .map(|c| c.into_string())
        .unwrap_or_else(|| principal.to_string())
}
