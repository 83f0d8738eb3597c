use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = service_broadcast::cli::Cli::parse();
    if let Err(e) = service_broadcast::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
