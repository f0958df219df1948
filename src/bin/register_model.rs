//! Logs the trained model file to the experiment tracker as a run artifact.

use delivery_eta::config::LogFormat;
use delivery_eta::logger::init_logger;
use delivery_eta::tracking::{register_model, TrackingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logger(LogFormat::Pretty);

    let config = TrackingConfig::from_env()?;
    if config.credentials.is_none() {
        tracing::warn!("DAGSHUB_USERNAME or DAGSHUB_TOKEN not set, sending unauthenticated requests");
    }

    let logged = register_model(&config).await?;

    println!(
        "Model logged successfully under experiment '{}' (run {}): {} -> {}",
        config.experiment_name,
        logged.run_id,
        config.model_path.display(),
        logged.artifact_path
    );
    Ok(())
}
