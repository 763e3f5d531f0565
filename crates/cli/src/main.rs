use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use bindery_api::ClientConfig;
use bindery_engine::{Api, CallArgs};
use bindery_registry::FieldKind;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Inspect and call Swagger 2.0 contracts.
#[derive(Parser, Debug)]
#[command(name = "bindery", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server binding table as JSON
    Routes {
        /// Path to the contract (YAML or JSON)
        contract: PathBuf,
    },
    /// Print the models declared by the contract
    Models { contract: PathBuf },
    /// Invoke a client binding
    Call {
        contract: PathBuf,
        /// Name declared by x-bind-client
        handler: String,
        /// Query parameter as key=value; repeat a key to send several values
        #[arg(long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
        /// JSON body, decoded into the operation's body model
        #[arg(long)]
        body: Option<String>,
        /// Print the request instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ClientConfig::load()?;

    match Cli::parse().command {
        Command::Routes { contract } => {
            let api = load_api(&contract, &config)?;
            println!("{}", serde_json::to_string_pretty(&api.binding_table())?);
        }
        Command::Models { contract } => {
            let api = load_api(&contract, &config)?;
            let models: Vec<_> = api.registry().models().collect();
            println!("{}", serde_json::to_string_pretty(&models)?);
        }
        Command::Call {
            contract,
            handler,
            query,
            body,
            dry_run,
        } => run_call(&load_api(&contract, &config)?, &handler, &query, body.as_deref(), dry_run).await?,
    }
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_api(path: &Path, config: &ClientConfig) -> Result<Api> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("contract")
        .to_string();
    Api::from_path(name, path, config)
}

async fn run_call(api: &Api, handler: &str, query: &[String], body: Option<&str>, dry_run: bool) -> Result<()> {
    let stub = api
        .stub(handler)
        .ok_or_else(|| anyhow!("contract '{}' has no client binding named '{handler}'", api.name()))?;

    let mut args = CallArgs::new();
    if !query.is_empty() {
        let kinds = |name: &str| {
            stub.endpoint()
                .schema
                .query_parameter(name)
                .map(|parameter| parameter.kind.clone())
        };
        args.named = parse_query_args(query, kinds)?;
    }
    if let Some(text) = body {
        let value: Value = serde_json::from_str(text).context("--body is not valid JSON")?;
        let model = stub
            .endpoint()
            .schema
            .body
            .as_ref()
            .map(|parameter| parameter.model.as_str())
            .ok_or_else(|| anyhow!("'{handler}' does not take a request body"))?;
        args = args.arg(api.json_to_model(&value, model).context("--body does not match the body model")?);
    }

    let caller = stub.invoke(args).with_context(|| format!("invoke '{handler}'"))?;
    if dry_run {
        println!("{}", serde_json::to_string_pretty(&caller.request().to_json())?);
        return Ok(());
    }

    debug!(handler = %handler, url = %caller.request().full_url(), "sending request");
    let reply = api
        .dispatcher()
        .call(caller)
        .await
        .with_context(|| format!("call '{handler}'"))?;
    let out = json!({
        "status": reply.status,
        "body": reply.to_json(api.registry())?,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Turns `key=value` pairs into named arguments, coercing each value by the
/// declared parameter kind. Repeated keys collect into an array.
fn parse_query_args<F>(pairs: &[String], kind_of: F) -> Result<Map<String, Value>>
where
    F: Fn(&str) -> Option<FieldKind>,
{
    let mut named = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("--query expects KEY=VALUE, got '{pair}'"))?;
        let kind = kind_of(key).unwrap_or(FieldKind::String);
        let value = coerce(raw, &kind).with_context(|| format!("--query {key}"))?;

        match named.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => *existing = Value::Array(vec![existing.take(), value]),
            None => {
                named.insert(key.to_string(), value);
            }
        }
    }
    Ok(named)
}

fn coerce(raw: &str, kind: &FieldKind) -> Result<Value> {
    let value = match kind {
        FieldKind::Integer => Value::from(raw.parse::<i64>().with_context(|| format!("'{raw}' is not an integer"))?),
        FieldKind::Number => {
            let number = raw.parse::<f64>().with_context(|| format!("'{raw}' is not a number"))?;
            serde_json::Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| anyhow!("'{raw}' is not a finite number"))?
        }
        FieldKind::Boolean => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => bail!("'{raw}' is not a boolean"),
        },
        FieldKind::Array(inner) => coerce(raw, inner)?,
        _ => Value::String(raw.to_string()),
    };
    Ok(value)
}
