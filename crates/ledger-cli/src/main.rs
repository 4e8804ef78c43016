use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the minimal ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:5000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending pool
    Submit {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: u64,
    },
    /// Mine the next block
    Mine,
    /// Print the full chain
    Chain,
    /// List registered peers
    Peers,
    /// Register one or more peers
    Register {
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Deregister one or more peers
    Deregister {
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Adopt the longest valid chain among peers
    Resolve,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: u64,
}

#[derive(Serialize)]
struct Nodes {
    nodes: Vec<String>,
}

fn request(http: &Client, node: &str, cmd: Command) -> RequestBuilder {
    match cmd {
        Command::Submit {
            sender,
            recipient,
            amount,
        } => http
            .post(format!("{node}/transactions/new"))
            .json(&Tx {
                sender,
                recipient,
                amount,
            }),
        Command::Mine => http.get(format!("{node}/mine")),
        Command::Chain => http.get(format!("{node}/chain")),
        Command::Peers => http.get(format!("{node}/nodes")),
        Command::Register { nodes } => http
            .post(format!("{node}/nodes/register"))
            .json(&Nodes { nodes }),
        Command::Deregister { nodes } => http
            .post(format!("{node}/nodes/deregister"))
            .json(&Nodes { nodes }),
        Command::Resolve => http.get(format!("{node}/nodes/resolve")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/').to_string();
    let client = Client::new();

    let res = request(&client, &node, cli.cmd).send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
