use anyhow::Context;
use clap::{Parser, Subcommand};
use jpath::{Key, Query, Value};
use serde::Serialize;
use std::io::{stdin, Read};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Read and update JSON documents using jpath queries.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Pretty print JSON output.
    #[clap(long, global = true)]
    pretty: bool,

    /// Log level used when `RUST_LOG` is not set.
    #[clap(long, global = true, default_value = "warn")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the value at QUERY.
    Get {
        query: String,
        /// JSON document, or `-` to read it from stdin.
        json: Option<String>,
    },
    /// Write VALUE at QUERY and print the updated document.
    ///
    /// VALUE is parsed as JSON; anything that is not valid JSON is stored as a string.
    Set {
        query: String,
        value: String,
        /// JSON document, or `-` to read it from stdin.
        json: Option<String>,
    },
    /// Print one `{"key":..,"value":..}` line for every item a `[*]` query produces.
    Iter {
        query: String,
        /// JSON document, or `-` to read it from stdin.
        json: Option<String>,
    },
}

#[derive(Serialize)]
struct Item<'a> {
    key: Key<'a>,
    value: &'a Value,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Get { query, json } => {
            let query = Query::parse(query)?;
            let doc = read_document(json.as_deref())?;
            println!("{}", render(query.get(&doc)?, cli.pretty)?);
        }
        Command::Set { query, value, json } => {
            let query = Query::parse(query)?;
            let mut doc = read_document(json.as_deref())?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| {
                debug!(%value, "value is not JSON, storing it as a string");
                Value::String(value.clone())
            });
            query.set(&mut doc, value)?;
            println!("{}", render(&doc, cli.pretty)?);
        }
        Command::Iter { query, json } => {
            let query = Query::parse(query)?;
            let doc = read_document(json.as_deref())?;
            for (key, value) in query.iter_items(&doc)? {
                println!("{}", render(&Item { key, value }, cli.pretty)?);
            }
        }
    }
    Ok(())
}

fn read_document(arg: Option<&str>) -> anyhow::Result<Value> {
    let s = match arg {
        Some(s) if s != "-" => s.to_string(),
        _ => {
            if arg.is_none() && atty::is(atty::Stream::Stdin) {
                anyhow::bail!("no JSON document supplied, pass it as an argument or pipe it to stdin");
            }
            let mut s = String::new();
            stdin()
                .read_to_string(&mut s)
                .context("failed to read JSON from stdin")?;
            s
        }
    };
    serde_json::from_str(&s).context("invalid JSON document")
}

fn render<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(s)
}
