#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file if present (for development convenience)
    // Silently ignore if not found - production uses system env vars
    let _ = dotenvy::dotenv();

    env_logger::init();

    if let Err(e) = consult_scribe::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
