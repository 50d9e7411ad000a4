use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "health-cli")]
#[command(about = "Management CLI for the health poller", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "HEALTH_POLLER_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall status and polling flags
    Status,
    /// Full consolidated health snapshot
    Health,
    /// Circuit breaker state per service
    Circuits,
    /// Force an immediate poll of one or all services
    Refresh {
        /// Service key; all services when omitted
        service: Option<String>,
    },
    /// Report host visibility
    Visibility {
        #[arg(value_enum)]
        state: Visibility,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Visibility {
    Visible,
    Hidden,
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

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Health => client.get(format!("{}/admin/health", cli.url)),
        Commands::Circuits => client.get(format!("{}/admin/circuits", cli.url)),
        Commands::Refresh { service: None } => client.post(format!("{}/admin/refresh", cli.url)),
        Commands::Refresh { service: Some(service) } => {
            client.post(format!("{}/admin/refresh/{}", cli.url, service))
        }
        Commands::Visibility { state } => client
            .post(format!("{}/admin/environment", cli.url))
            .json(&serde_json::json!({ "visible": matches!(state, Visibility::Visible) })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
