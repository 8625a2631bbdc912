use natecon_mailer::configuration::get_configuration;
use natecon_mailer::startup::Application;
use natecon_mailer::telemetry::get_subscriber;
use natecon_mailer::telemetry::init_subscriber;

/// Initialise telemetry, load config, and start the server
#[tokio::main] // requires tokio features: macros, rt-multi-thread
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("natecon-mailer", "info", std::io::stdout);
    init_subscriber(subscriber);

    let cfg = get_configuration()?;
    let app = Application::build(cfg).await?;
    tracing::info!(port = app.get_port(), "listening");
    app.run_until_stopped().await?;
    Ok(())
}
