use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = junction::cli::Cli::parse();
    if let Err(e) = junction::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
