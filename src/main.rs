use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = tandem::cli::Cli::parse();
    if let Err(e) = tandem::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
