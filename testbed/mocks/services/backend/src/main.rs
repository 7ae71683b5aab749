use gen_jewels_backend_mock::MockBackend;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = env::var("MOCK_BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    let username = env::var("MOCK_BACKEND_USER").unwrap_or_else(|_| "demo".to_string());
    let password = env::var("MOCK_BACKEND_PASSWORD").unwrap_or_else(|_| "demo".to_string());

    let backend = MockBackend::new()
        .with_user(&username, &password)
        .start_on(&addr)
        .await?;

    log::info!(
        "Gen Jewels mock backend running at {} (user '{}')",
        backend.url(),
        username
    );

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    Ok(())
}
