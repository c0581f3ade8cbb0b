use clap::Parser;
use data_explorer::{app, config::Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!(
        "preview rows {}, cache capacity {}, upload limit {} MB",
        config.preview_rows,
        config.cache_capacity,
        config.max_upload_mb
    );

    // Start the web application
    app::run(config).await?;

    Ok(())
}
