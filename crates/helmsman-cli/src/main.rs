#[tokio::main]
async fn main() {
    std::process::exit(helmsman_cli::run().await);
}
