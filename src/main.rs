use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = mcpo_guard::cli::Cli::parse();
    if let Err(e) = mcpo_guard::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
