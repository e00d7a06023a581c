use log::{error, info};
use std::process;
use yt_announcer::config::{init_logger, load_environment, Config};
use yt_announcer::services::discord::{DiscordAnnouncer, DiscordClient};
use yt_announcer::services::runner::Runner;
use yt_announcer::services::watermark::WatermarkStore;
use yt_announcer::services::youtube::SearchClient;

#[tokio::main]
async fn main() {
    load_environment();
    init_logger();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("{e:?}");
        process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let watermark_path = config.watermark_path()?;
    info!("Using watermark file {}", watermark_path.display());

    let discord = DiscordClient::from_config(&config).await?;
    let channel = discord.resolve_channel(&config.discord_channel_id).await?;
    let announcer = DiscordAnnouncer::new(discord.clone(), channel, &config.discord_user_id);

    let mut runner = Runner::new(
        SearchClient::from_config(&config),
        announcer,
        WatermarkStore::new(watermark_path),
        config.check_interval,
    );

    runner
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for SIGINT: {e}");
                std::future::pending::<()>().await;
            }
            info!("Received SIGINT. Shutting down gracefully...");
        })
        .await;

    discord.destroy();
    Ok(())
}
