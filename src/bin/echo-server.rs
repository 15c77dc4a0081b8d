use gwconform::echo::{run_echo_server, EchoIdentity, DEFAULT_ECHO_PORT};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port = match std::env::var("ECHO_PORT") {
        Ok(value) => value.parse::<u16>().map_err(|e| {
            error!(value = %value, error = %e, "Invalid ECHO_PORT");
            e
        })?,
        Err(_) => DEFAULT_ECHO_PORT,
    };

    let identity = EchoIdentity::from_env();
    info!(port = port, "Starting echo backend");

    run_echo_server(port, identity).await?;
    Ok(())
}
