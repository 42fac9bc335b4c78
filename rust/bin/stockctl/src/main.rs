//! `stockctl`: command-line client for the Stockroom ERP proxy.
//!
//! Signs in, keeps the session in `~/.stockroom/state.toml`, and reads
//! or writes warehouse collections (products, quants, locations, ...).

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stockroom_client::FileStore;

/// Stockroom CLI tool.
#[derive(Parser, Debug)]
#[command(name = "stockctl", about = "Stockroom ERP proxy client")]
struct Cli {
    /// Path to the state file (default: ~/.stockroom/state.toml).
    #[arg(long = "state", global = true)]
    state: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Proxy and ERP target settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Sign in to the proxy.
    Login {
        /// Login email.
        #[arg(long)]
        email: Option<String>,
        /// Password (prefer the interactive prompt).
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Validate the stored session and show who is signed in.
    Status,

    /// List a collection (products, quants, locations, ...).
    Get {
        /// Collection name.
        collection: String,
    },

    /// Update one record.
    Update {
        /// Collection name.
        collection: String,
        /// Record id.
        id: i64,
        /// Changed fields as a JSON object.
        #[arg(long = "json", default_value = "{}")]
        json_body: String,
        /// Replace a many2many field: `field=1,2,3` (repeatable).
        #[arg(long = "m2m")]
        m2m: Vec<String>,
    },

    /// Create a record.
    Create {
        /// Collection name.
        collection: String,
        /// Field values as a JSON object.
        #[arg(long = "json")]
        json_body: Option<String>,
        /// Read JSON from file.
        #[arg(short = 'f', long = "file")]
        file: Option<String>,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Set proxy URL and ERP target.
    Set {
        /// Proxy base URL.
        #[arg(long)]
        proxy: Option<String>,
        /// Odoo base URL, sent as x-odoo-base.
        #[arg(long = "odoo-base")]
        odoo_base: Option<String>,
        /// Odoo database, sent as x-odoo-db.
        #[arg(long = "odoo-db")]
        odoo_db: Option<String>,
    },
    /// Show current settings and identity.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let state_path = cli
        .state
        .map(PathBuf::from)
        .unwrap_or_else(FileStore::default_path);
    let json_output = cli.output == "json";

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Set {
                proxy,
                odoo_base,
                odoo_db,
            } => {
                commands::config::set(
                    proxy.as_deref(),
                    odoo_base.as_deref(),
                    odoo_db.as_deref(),
                    &state_path,
                )?;
            }
            ConfigAction::Show => {
                commands::config::show(&state_path)?;
            }
        },

        Commands::Login { email, password } => {
            let email = match email {
                Some(e) => e,
                None => commands::prompt("Email: ")?,
            };
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password: ")?,
            };
            commands::login::login(&email, &password, &state_path).await?;
        }

        Commands::Logout => {
            commands::login::logout(&state_path)?;
        }

        Commands::Status => {
            commands::login::status(&state_path).await?;
        }

        Commands::Get { collection } => {
            commands::resource::get(&collection, json_output, &state_path).await?;
        }

        Commands::Update {
            collection,
            id,
            json_body,
            m2m,
        } => {
            commands::resource::update(&collection, id, &json_body, &m2m, &state_path).await?;
        }

        Commands::Create {
            collection,
            json_body,
            file,
        } => {
            let body = if let Some(path) = file {
                std::fs::read_to_string(&path)?
            } else if let Some(json) = json_body {
                json
            } else {
                anyhow::bail!("Provide --json or -f <file>.");
            };
            commands::resource::create(&collection, &body, &state_path).await?;
        }

        Commands::Version => {
            println!("stockctl v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
