//! `mcplink`: query tool servers from the command line.

mod config;

use clap::{Parser, Subcommand};
use mcplink_client::{ConnectionPool, IntegrationService};
use mcplink_core::{init_tracing, LogFormat};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mcplink", about = "Query JSON-RPC tool servers", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "mcplink.toml")]
    config: PathBuf,

    /// Server to talk to (defaults to `default`, or the only configured one)
    #[arg(short, long)]
    server: Option<String>,

    /// Log output format: pretty or json
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the server answers
    Health,
    /// List the tools the server exposes
    Tools,
    /// List tables
    Tables,
    /// Describe a table's columns
    Describe {
        /// Table name
        table: String,
    },
    /// Run a read-only SQL statement
    Query {
        /// SQL statement
        sql: String,
    },
    /// Call any tool by name
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}", value_parser = parse_json_object)]
        args: Value,
    },
    /// Health of every configured server
    PoolHealth,
    /// Call a tool on every configured server
    Broadcast {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}", value_parser = parse_json_object)]
        args: Value,
    },
    /// Connection details of the selected server
    Info,
}

fn parse_json_object(raw: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("arguments must be a JSON object".to_string())
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let pool_config = config::load_pool_config(&cli.config)?;

    match cli.command {
        Commands::PoolHealth => {
            let pool = ConnectionPool::new(pool_config);
            report_connect_errors(pool.connect_all().await);
            let health = pool.health_check_all().await;
            pool.disconnect_all().await;
            print_json(&health)?;
            let unhealthy = health.values().filter(|ok| !**ok).count();
            if unhealthy > 0 {
                anyhow::bail!("{unhealthy} of {} server(s) unhealthy", health.len());
            }
        }
        Commands::Broadcast { tool, args } => {
            let pool = ConnectionPool::new(pool_config);
            report_connect_errors(pool.connect_all().await);
            let results = pool.broadcast(&tool, args).await;
            pool.disconnect_all().await;
            print_json(&results)?;
        }
        command => {
            let (name, endpoint) = config::select_server(&pool_config, cli.server.as_deref())?;
            info!(server = %name, url = %endpoint.url, "Using server");
            let service = IntegrationService::new(endpoint.clone())?;
            let result = run_single(&service, command).await;
            service.shutdown().await;
            result?;
        }
    }

    Ok(())
}

fn report_connect_errors(errors: Vec<(String, mcplink_core::McpLinkError)>) {
    for (server, error) in errors {
        warn!(server = %server, error = %error, "Server skipped");
    }
}

async fn run_single(service: &IntegrationService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Health => {
            let healthy = service.health_check().await;
            print_json(&serde_json::json!({ "healthy": healthy }))?;
            if !healthy {
                anyhow::bail!("server is unhealthy");
            }
        }
        Commands::Tools => {
            let client = service.ensure_connected().await?;
            let tools = client.get_available_tools();
            if tools.is_empty() {
                println!("No tools available.");
            } else {
                println!("Available tools:");
                for tool in &tools {
                    println!("  {} - {}", tool.name, tool.description);
                    for (param, schema) in &tool.parameters {
                        let kind = schema.get("type").and_then(Value::as_str).unwrap_or("any");
                        println!("    {param}: {kind}");
                    }
                }
                println!("\nTotal: {} tool(s)", tools.len());
            }
        }
        Commands::Tables => print_json(&service.list_entities().await?)?,
        Commands::Describe { table } => print_json(&service.describe(&table).await?)?,
        Commands::Query { sql } => print_json(&service.execute_query(&sql).await?)?,
        Commands::Call { tool, args } => print_json(&service.call_tool(&tool, args).await?)?,
        Commands::Info => print_json(&service.connection_info().await)?,
        Commands::PoolHealth | Commands::Broadcast { .. } => {
            anyhow::bail!("pool commands run against every configured server")
        }
    }
    Ok(())
}
