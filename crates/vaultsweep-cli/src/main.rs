mod prompt;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing::subscriber::set_global_default;
use tracing_subscriber::EnvFilter;

use vaultsweep_core::{AppConfig, CipherView, Database, ExitCode, UriMatchStrategy, VaultError};
use vaultsweep_dedup::{
    DeDuplicateService, DedupError, DuplicateOptions, DuplicateReviewer, DuplicateScan,
    KeepFirstReviewer, LocalCipherAuthorization,
};

use crate::prompt::PromptReviewer;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "vaultsweep",
    about = "Find and clean up duplicate logins in a local vault",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting VAULTSWEEP_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (-q).
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    quiet: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a plaintext JSON vault export.
    Import { file: PathBuf },

    /// List ciphers in the vault.
    List {
        /// Show only ciphers in the trash.
        #[arg(long)]
        trashed: bool,
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Report duplicate sets without deleting anything.
    Scan {
        /// Base, Hostname, Host or Exact.
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Delete duplicates, keeping one cipher per set.
    Dedupe {
        /// Base, Hostname, Host or Exact.
        #[arg(long)]
        strategy: Option<String>,
        /// Delete without prompting, keeping the first cipher of every set.
        #[arg(long)]
        confirm: bool,
        /// Choose the cipher to keep in every set.
        #[arg(long, conflicts_with = "confirm")]
        interactive: bool,
    },

    /// Move ciphers out of the trash.
    Restore {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information.
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config values.
    List,
    /// Get a specific config key, e.g. `dedup.uri_strategy`.
    Get { key: String },
    /// Print the config file location.
    Path,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("VAULTSWEEP_JSON").as_deref() == Ok("1");

    let code = match run(cli, json_output).await {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for(&err);
            if json_output {
                let _ = print_json(&serde_json::json!({
                    "status": "error",
                    "error": error_kind(code),
                    "message": format!("{err:#}"),
                }));
            } else {
                eprintln!("error: {err:#}");
            }
            code
        }
    };

    std::process::exit(code.code());
}

async fn run(cli: Cli, json_output: bool) -> Result<ExitCode> {
    let start = Instant::now();

    // Load config (honors VAULTSWEEP_CONFIG and VAULTSWEEP_VAULT_PATH)
    let mut config = AppConfig::load()?;
    if let Ok(vault_path) = std::env::var("VAULTSWEEP_VAULT_PATH") {
        config.set_vault_path(vault_path.into());
    }
    init_tracing(&config.log.level, cli.verbose, cli.quiet);

    let user_id = config.core.user_id.clone();

    match cli.command {
        Commands::Import { file } => {
            let db = open_db(&config)?;
            let report = vaultsweep_core::import_export(&db, &user_id, &file)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": report,
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("Imported {} ciphers ({} skipped).", report.imported, report.skipped);
            }
        }

        Commands::List { trashed, limit } => {
            let db = open_db(&config)?;
            let ciphers: Vec<CipherView> = db
                .list_ciphers(&user_id, trashed)?
                .into_iter()
                .filter(|c| c.is_deleted() == trashed)
                .collect();
            let total = ciphers.len();
            let shown: Vec<&CipherView> = ciphers.iter().take(limit).collect();
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": shown, "total": total, "limit": limit },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if shown.is_empty() {
                if trashed {
                    println!("Trash is empty.");
                } else {
                    println!("No ciphers in vault. Use `vaultsweep import` to add some.");
                }
            } else {
                for cipher in &shown {
                    print_cipher_row(cipher);
                }
                if total > shown.len() {
                    println!("... {} more", total - shown.len());
                }
            }
        }

        Commands::Scan { strategy } => {
            let options = parse_options(strategy.as_deref())?;
            let service = build_service(&config, Arc::new(KeepFirstReviewer::default()))?;
            let scan = service.find_duplicates(&user_id, options).await?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": scan,
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_scan(&scan);
            }
        }

        Commands::Dedupe { strategy, confirm, interactive } => {
            let options = parse_options(strategy.as_deref())?;

            if !confirm && !interactive {
                let service = build_service(&config, Arc::new(KeepFirstReviewer::default()))?;
                let scan = service.find_duplicates(&user_id, options).await?;
                let planned = KeepFirstReviewer::select(&scan.sets);
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "error",
                        "error": "confirm_required",
                        "data": { "sets_found": scan.sets.len(), "would_delete": planned },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    print_scan(&scan);
                    if !planned.is_empty() {
                        eprintln!(
                            "\n{} ciphers would be deleted. Add --confirm to delete, or --interactive to choose.",
                            planned.len()
                        );
                    }
                }
                return Ok(if planned.is_empty() {
                    ExitCode::Success
                } else {
                    ExitCode::ConfirmRequired
                });
            }

            let reviewer: Arc<dyn DuplicateReviewer> = if interactive {
                Arc::new(PromptReviewer::stdio())
            } else {
                Arc::new(KeepFirstReviewer::new(true))
            };
            let service = build_service(&config, reviewer)?;
            let result = service.find_and_handle_duplicates(&user_id, options).await?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": result,
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!(
                    "{} duplicate sets: {} moved to trash, {} permanently deleted.",
                    result.sets_found, result.trashed, result.permanently_deleted
                );
                print_warnings(&result.warnings);
            }
        }

        Commands::Restore { ids } => {
            let db = open_db(&config)?;
            for id in &ids {
                db.get_cipher(&user_id, id)?;
            }
            let restored = db.restore_many(&user_id, &ids)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "restored": restored, "requested": ids.len() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("Restored {restored} of {} ciphers.", ids.len());
            }
        }

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::List => {
                    let entries = config.entries()?;
                    if json_output {
                        let map: serde_json::Map<String, serde_json::Value> = entries
                            .into_iter()
                            .map(|(k, v)| (k, serde_json::Value::String(v)))
                            .collect();
                        print_json(&serde_json::json!({"status":"ok","data":map,"meta":{"duration_ms":dur}}))?;
                    } else {
                        for (k, v) in &entries {
                            println!("{k} = {v}");
                        }
                    }
                }
                ConfigAction::Get { key } => match config.get(&key)? {
                    Some(val) => {
                        if json_output {
                            print_json(&serde_json::json!({"status":"ok","data":{"key":key,"value":val},"meta":{"duration_ms":dur}}))?;
                        } else {
                            println!("{val}");
                        }
                    }
                    None => {
                        if json_output {
                            print_json(&serde_json::json!({"status":"error","error":"not_found","message":format!("Unknown config key: {key}"),"meta":{"duration_ms":dur}}))?;
                        } else {
                            eprintln!("Unknown config key: {key}");
                        }
                        return Ok(ExitCode::NotFound);
                    }
                },
                ConfigAction::Path => {
                    let path = AppConfig::config_path();
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "path": path, "exists": path.exists() },
                            "meta": { "duration_ms": dur }
                        }))?;
                    } else {
                        println!("{}", path.display());
                    }
                }
            }
        }

        Commands::Version => {
            let version = env!("CARGO_PKG_VERSION");
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"version":version},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("vaultsweep v{version}");
            }
        }
    }

    Ok(ExitCode::Success)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(base_level: &str, verbose: u8, quiet: u8) {
    const LEVELS: [Level; 5] = [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE];

    let base = base_level.parse::<Level>().unwrap_or(Level::WARN);
    let base_idx = LEVELS.iter().position(|l| *l == base).unwrap_or(1);
    let idx = (base_idx + verbose as usize)
        .saturating_sub(quiet as usize)
        .min(LEVELS.len() - 1);

    let env_filter = EnvFilter::from_default_env().add_directive(LEVELS[idx].into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    let _ = set_global_default(subscriber);
}

fn parse_options(strategy: Option<&str>) -> Result<DuplicateOptions> {
    let uri_strategy = strategy
        .map(str::parse::<UriMatchStrategy>)
        .transpose()?;
    Ok(DuplicateOptions { uri_strategy })
}

fn build_service(
    config: &AppConfig,
    reviewer: Arc<dyn DuplicateReviewer>,
) -> Result<DeDuplicateService> {
    let db = open_db(config)?;
    Ok(DeDuplicateService::from_config(
        Arc::new(db),
        Arc::new(LocalCipherAuthorization),
        reviewer,
        &config.dedup,
    ))
}

fn open_db(config: &AppConfig) -> Result<Database> {
    Ok(Database::open(&config.vault_path())?)
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_cipher_row(cipher: &CipherView) {
    let username = cipher.username().unwrap_or("");
    let uri = cipher.uri_strings().first().copied().unwrap_or("");
    println!(
        "{id:<36}  {kind:<8}  {name:<30}  {username:<24}  {uri}",
        id = cipher.id,
        kind = cipher.cipher_type.to_string(),
        name = cipher.display_name(),
    );
}

fn print_scan(scan: &DuplicateScan) {
    if scan.sets.is_empty() {
        println!("No duplicates found ({} matching).", scan.strategy);
    } else {
        println!("{} duplicate sets ({} matching):", scan.sets.len(), scan.strategy);
        for set in &scan.sets {
            println!("\n{}", set.key);
            for cipher in &set.ciphers {
                let trash = if cipher.is_deleted() { "  (trash)" } else { "" };
                println!("  {:<36}  {}{trash}", cipher.id, cipher.display_name());
            }
        }
    }
    print_warnings(&scan.warnings);
}

fn print_warnings(warnings: &vaultsweep_dedup::DuplicateOperationWarnings) {
    if warnings.unparseable_uri_count > 0 {
        eprintln!(
            "warning: {} URIs could not be parsed, e.g. {}",
            warnings.unparseable_uri_count,
            warnings.unparseable_uri_samples.join(", ")
        );
    }
    if warnings.exact_fallback_count > 0 {
        eprintln!(
            "warning: {} URIs were matched approximately under Exact, e.g. {}",
            warnings.exact_fallback_count,
            warnings.exact_fallback_samples.join(", ")
        );
    }
    if warnings.permission_denied_count > 0 {
        eprintln!(
            "warning: no permission to delete {} ciphers: {}",
            warnings.permission_denied_count,
            warnings.permission_denied_names.join(", ")
        );
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let vault_error = err.downcast_ref::<VaultError>().or_else(|| {
        match err.downcast_ref::<DedupError>() {
            Some(DedupError::Core(inner)) => Some(inner),
            _ => None,
        }
    });

    match vault_error {
        Some(VaultError::CipherNotFound(_)) => ExitCode::NotFound,
        Some(VaultError::UnknownStrategy(_)) => ExitCode::InvalidArgs,
        _ => ExitCode::GeneralError,
    }
}

fn error_kind(code: ExitCode) -> &'static str {
    match code {
        ExitCode::NotFound => "not_found",
        ExitCode::InvalidArgs => "invalid_args",
        ExitCode::ConfirmRequired => "confirm_required",
        ExitCode::Success | ExitCode::GeneralError => "error",
    }
}
