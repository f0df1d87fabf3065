use clap::Parser;
use mock_store::StoreSettings;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// In-memory row store for local development against the to-do client.
#[derive(Parser, Debug)]
#[command(name = "mock-store", version)]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Table to serve; repeat for several.
    #[arg(long = "table", default_value = "todos")]
    tables: Vec<String>,

    /// Require this key in the `apikey` header.
    #[arg(long, env = "TODO_STORE_KEY")]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, tables = ?args.tables, auth = args.api_key.is_some(), "listening");

    let mut settings = StoreSettings::default().with_tables(args.tables);
    settings.api_key = args.api_key;
    mock_store::run(listener, settings).await
}
