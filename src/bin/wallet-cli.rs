use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "wallet-cli")]
#[command(about = "Operations CLI for the wallet engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "WALLET_ENGINE_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engine version, uptime and chain provider health
    Status,
    /// Jobs waiting per queue
    Queues,
    /// Failed withdrawals and payouts awaiting manual review
    Review,
    /// Show one transaction
    Transaction { id: Uuid },
    /// Copy payout hashes onto tournament entries that lack them
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Queues => client.get(format!("{}/admin/queues", base)),
        Commands::Review => client.get(format!("{}/admin/review", base)),
        Commands::Transaction { id } => client.get(format!("{}/admin/transactions/{}", base, id)),
        Commands::Reconcile => client.post(format!("{}/admin/reconcile", base)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
