use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use timevault_guard::config::{load_config, GuardConfig};
use timevault_guard::http::InboundRequest;
use timevault_guard::sanitize::{create_secure_hash, generate_secure_token, SanitizeKind, SanitizeOptions};
use timevault_guard::security::client_ip::X_FORWARDED_FOR;
use timevault_guard::{InputSanitizer, RequestValidator, SecurityManager};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for the TimeVault request guard", long_about = None)]
struct Cli {
    /// Configuration file; built-in defaults when omitted.
    #[arg(short, long, global = true, env = "TIMEVAULT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sanitize a value and print the result
    Sanitize {
        /// text, number, amount, email, url or crypto
        #[arg(short, long, default_value = "text")]
        kind: SanitizeKind,
        #[arg(long)]
        allow_html: bool,
        #[arg(long, default_value_t = timevault_guard::sanitize::DEFAULT_MAX_LENGTH)]
        max_length: usize,
        value: String,
    },
    /// SHA-256 hex digest of the input
    Hash { data: String },
    /// Random hex token
    Token {
        /// Number of random bytes
        #[arg(short, long, default_value_t = 32)]
        length: usize,
    },
    /// Print the security headers the gateway attaches
    Headers,
    /// Print endpoint policies
    Rules { endpoint: Option<String> },
    /// Validate a request body against an endpoint policy
    Check {
        endpoint: String,
        /// JSON body
        body: String,
        #[arg(short, long, default_value = "POST")]
        method: String,
        /// Client address to validate as
        #[arg(long)]
        client_ip: Option<String>,
    },
    /// Check a running gateway's health endpoint and headers
    Probe {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    match cli.command {
        Commands::Sanitize { kind, allow_html, max_length, value } => {
            let sanitizer = InputSanitizer::new(config.security.trusted_domains.iter().cloned());
            let options = SanitizeOptions {
                allow_html,
                max_length,
                ..SanitizeOptions::default()
            };
            print_json(&serde_json::to_value(sanitizer.sanitize_str(&value, kind, &options))?)?;
        }
        Commands::Hash { data } => println!("{}", create_secure_hash(data)),
        Commands::Token { length } => println!("{}", generate_secure_token(length)),
        Commands::Headers => {
            let manager = SecurityManager::from_env(config.security)?;
            print_json(&serde_json::to_value(manager.security_headers())?)?;
        }
        Commands::Rules { endpoint } => {
            let value = match endpoint {
                Some(name) => match config.endpoints.get(&name) {
                    Some(policy) => serde_json::to_value(policy)?,
                    None => return Err(format!("Unknown endpoint: {}", name).into()),
                },
                None => serde_json::to_value(&config.endpoints)?,
            };
            print_json(&value)?;
        }
        Commands::Check { endpoint, body, method, client_ip } => {
            let Some(policy) = config.endpoints.get(&endpoint) else {
                return Err(format!("Unknown endpoint: {}", endpoint).into());
            };
            let manager = SecurityManager::from_env(config.security.clone())?;
            let validator = RequestValidator::new(manager.config());

            let body: Value = serde_json::from_str(&body)?;
            let mut request = InboundRequest::new(method.parse()?, &format!("/api/{}", endpoint)).with_json(&body);
            if let Some(ip) = client_ip {
                request = request.with_header(X_FORWARDED_FOR, &ip);
            }

            let outcome = validator.validate_request(&request, policy);
            print_json(&json!({
                "outcome": outcome,
                "rejection": outcome.rejection,
            }))?;
        }
        Commands::Probe { url } => {
            let res = reqwest::get(format!("{}/health", url.trim_end_matches('/'))).await?;
            let status = res.status();
            let headers: serde_json::Map<String, Value> = res
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        Value::String(value.to_str().unwrap_or("<binary>").to_string()),
                    )
                })
                .collect();
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            print_json(&json!({
                "status": status.as_u16(),
                "headers": headers,
                "body": res.json::<Value>().await.unwrap_or(Value::Null),
            }))?;
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
