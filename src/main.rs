// Firebase MCP Gateway - Main Entry Point
//
// CLI and MCP stdio server. All tool calls route through the gateway.
// Usage:
//   firebase-mcp serve                          # Run MCP server (stdio)
//   firebase-mcp call <tool> <json-args>        # One-shot tool call
//   firebase-mcp status                         # Show effective policy and limits
//   firebase-mcp config-export <json_file>      # Write effective config JSON

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use firebase_mcp::{
    config::ServerConfig,
    firebase::RestBackend,
    mcp,
    policy::RequestContext,
    rate_limit::RateLimiter,
    registry::{Dispatcher, ToolRegistry},
    tools,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "firebase-mcp")]
#[command(version)]
#[command(about = "Firebase MCP gateway - Firestore, Auth and Storage tools behind a policy gate")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, default_value = "firebase-mcp.json")]
    config: PathBuf,

    /// Reject every write operation
    #[arg(long)]
    read_only: bool,

    /// Restrict Firestore to these collections (repeatable)
    #[arg(long = "allow-collection")]
    allow_collections: Vec<String>,

    /// Disable all Authentication tools
    #[arg(long)]
    disable_auth: bool,

    /// Disable all Storage tools
    #[arg(long)]
    disable_storage: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC)
    Serve,

    /// One-shot tool call, prints the response envelope.
    /// Exits 1 when the envelope is an error.
    Call {
        /// Tool name (firestore_get_document, auth_list_users, ...)
        tool: String,

        /// Arguments as JSON string
        args: String,
    },

    /// Show effective policy, rate limits and registered tools
    Status,

    /// Export the effective config to a JSON file
    ConfigExport {
        /// Destination file
        json_file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Serve => {
            config.validate()?;
            let dispatcher = build_dispatcher(&config)?;
            mcp::run(&dispatcher);
            Ok(())
        }

        Commands::Call { tool, args } => {
            config.validate()?;
            let args: serde_json::Value =
                serde_json::from_str(&args).context("Arguments must be valid JSON")?;
            let dispatcher = build_dispatcher(&config)?;
            let ctx = RequestContext::local();
            let response = dispatcher.dispatch(&tool, &args, &ctx);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.is_error {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Status => {
            let mut registry = ToolRegistry::new();
            tools::register_all(&mut registry).map_err(|e| anyhow::anyhow!(e))?;
            println!("firebase-mcp v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Project:             {}", display_or(&config.project_id, "(not set)"));
            println!("Service account:     {}", display_or(&config.service_account_path, "(not set)"));
            println!("Storage bucket:      {}", config.bucket());
            println!();
            println!("Read-only:           {}", config.security.read_only);
            println!(
                "Allowed collections: {}",
                if config.security.allowed_collections.is_empty() {
                    "(all)".to_string()
                } else {
                    config.security.allowed_collections.join(", ")
                }
            );
            println!("Auth tools:          {}", enabled(!config.security.disable_auth));
            println!("Storage tools:       {}", enabled(!config.security.disable_storage));
            println!();
            println!(
                "Rate limit:          {} requests / {} ms",
                config.rate_limit.max_requests, config.rate_limit.window_ms
            );
            println!();
            println!("Tools ({}):", registry.len());
            for name in registry.names() {
                println!("  {}", name);
            }
            Ok(())
        }

        Commands::ConfigExport { json_file } => {
            config
                .save(&json_file)
                .with_context(|| format!("Failed to write {:?}", json_file))?;
            println!("Config exported to {:?}", json_file);
            Ok(())
        }
    }
}

/// Defaults < config file < environment < CLI flags.
fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    config.apply_env();

    if cli.read_only {
        config.security.read_only = true;
    }
    if !cli.allow_collections.is_empty() {
        config.security.allowed_collections = cli.allow_collections.clone();
    }
    if cli.disable_auth {
        config.security.disable_auth = true;
    }
    if cli.disable_storage {
        config.security.disable_storage = true;
    }
    Ok(config)
}

fn build_dispatcher(config: &ServerConfig) -> Result<Dispatcher> {
    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry).map_err(|e| anyhow::anyhow!(e))?;

    let backend = RestBackend::from_config(config)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize the Firebase backend")?;

    Ok(Dispatcher::new(
        registry,
        Arc::new(backend),
        config.security.clone(),
        RateLimiter::new(config.rate_limit.clone()),
    ))
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}
