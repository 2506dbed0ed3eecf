use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use settings_server::config::{load_config, BootConfig};
use settings_server::security::{issue_token, verify_token, Role};
use settings_server::settings::{capture_env, Settings, SettingsHandle};
use settings_server::store::{self, migrate_file_to_table, FileStore, SettingsStore, SqliteStore};

#[derive(Parser)]
#[command(name = "settings-cli")]
#[command(about = "Management CLI for the settings server", long_about = None)]
struct Cli {
    /// Boot configuration file (TOML), used to locate the store.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Bearer token for API calls. Minted from the local store when omitted.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a token signed with the local secrets
    Token {
        #[arg(long, default_value = "user")]
        role: Role,
        #[arg(long)]
        subject: Option<String>,
        /// Lifetime in seconds; no expiry when omitted
        #[arg(long)]
        expires: Option<u64>,
    },
    /// Verify a token against the local secrets
    Verify { token: String },
    /// Print the raw contents of the configured store
    DumpStore,
    /// Copy an env file into the SQLite store
    MigrateEnv {
        /// Source file; defaults to the configured env path
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Flag a SQLite row as immutable
    Lock { key: String },
    /// Clear the immutable flag of a SQLite row
    Unlock { key: String },
    /// List all settings through the API
    List,
    /// Read one setting through the API
    Get { key: String },
    /// Create settings through the API (KEY=VALUE ...)
    Create {
        #[arg(required = true, value_parser = parse_pair)]
        pairs: Vec<(String, Value)>,
        #[arg(long)]
        restart: bool,
    },
    /// Update settings through the API (KEY=VALUE ...)
    Update {
        #[arg(required = true, value_parser = parse_pair)]
        pairs: Vec<(String, Value)>,
        #[arg(long)]
        restart: bool,
    },
}

/// `KEY=VALUE`; the value is read as JSON when it parses, as text otherwise.
fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

async fn local_settings(boot: &BootConfig) -> Result<Arc<Settings>, Box<dyn std::error::Error>> {
    let store = store::open(&boot.store).await?;
    let handle = SettingsHandle::load(store, capture_env()).await?;
    Ok(handle.snapshot())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let boot = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Token {
            role,
            subject,
            expires,
        } => {
            let settings = local_settings(&boot).await?;
            println!("{}", issue_token(&settings, role, subject.as_deref(), expires)?);
        }
        Commands::Verify { token } => {
            let settings = local_settings(&boot).await?;
            match verify_token(&settings, &token) {
                Ok(principal) => println!(
                    "valid: role={} signed_with={} subject={}",
                    principal.role.as_str(),
                    principal.verified_with.as_str(),
                    principal.subject.as_deref().unwrap_or("-")
                ),
                Err(e) => {
                    eprintln!("invalid: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::DumpStore => {
            if boot.store.use_db {
                let table = SqliteStore::open(&boot.store.db_path).await?;
                println!("{}", serde_json::to_string_pretty(&table.entries().await?)?);
            } else {
                let file = FileStore::new(&boot.store.env_path);
                println!("{}", serde_json::to_string_pretty(&file.read_all().await?)?);
            }
        }
        Commands::MigrateEnv { from } => {
            let source = from.unwrap_or_else(|| boot.store.env_path.clone());
            let file = FileStore::new(&source);
            let table = SqliteStore::open(&boot.store.db_path).await?;
            let count = migrate_file_to_table(&file, &table).await?;
            println!(
                "migrated {count} setting(s) from {} to {}",
                file.describe(),
                table.describe()
            );
        }
        Commands::Lock { key } => set_flag(&boot, &key, true).await?,
        Commands::Unlock { key } => set_flag(&boot, &key, false).await?,
        Commands::List => {
            let client = ApiClient::new(&cli.url, cli.token, &boot, Role::User).await?;
            client.send(reqwest::Method::GET, "/admin/settings", None, false).await?;
        }
        Commands::Get { key } => {
            let client = ApiClient::new(&cli.url, cli.token, &boot, Role::User).await?;
            client
                .send(reqwest::Method::GET, &format!("/admin/settings/{key}"), None, false)
                .await?;
        }
        Commands::Create { pairs, restart } => {
            let client = ApiClient::new(&cli.url, cli.token, &boot, Role::Admin).await?;
            let body: BTreeMap<String, Value> = pairs.into_iter().collect();
            client
                .send(reqwest::Method::PUT, "/admin/settings", Some(body), restart)
                .await?;
        }
        Commands::Update { pairs, restart } => {
            let client = ApiClient::new(&cli.url, cli.token, &boot, Role::Admin).await?;
            let body: BTreeMap<String, Value> = pairs.into_iter().collect();
            client
                .send(reqwest::Method::POST, "/admin/settings", Some(body), restart)
                .await?;
        }
    }

    Ok(())
}

async fn set_flag(boot: &BootConfig, key: &str, immutable: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !boot.store.use_db {
        eprintln!("Error: row flags exist only in the SQLite store");
        std::process::exit(2);
    }
    let table = SqliteStore::open(&boot.store.db_path).await?;
    if table.set_immutable(key, immutable).await? {
        println!("{key}: immutable={immutable}");
    } else {
        eprintln!("Error: no setting named '{key}'");
        std::process::exit(1);
    }
    Ok(())
}

struct ApiClient {
    base: String,
    client: reqwest::Client,
    headers: HeaderMap,
}

impl ApiClient {
    async fn new(
        url: &str,
        token: Option<String>,
        boot: &BootConfig,
        role: Role,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let token = match token {
            Some(token) => token,
            None => {
                let settings = local_settings(boot).await?;
                issue_token(&settings, role, Some("settings-cli"), Some(300))?
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        Ok(Self {
            base: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            headers,
        })
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<BTreeMap<String, Value>>,
        restart: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base))
            .headers(self.headers.clone());
        if restart {
            request = request.query(&[("restart", "true")]);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        print_response(request.send().await?).await
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: settings API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
