use anyhow::Context as _;
use std::path::PathBuf;
use yoru_cli::{cli, commands, telemetry, AppContext};
use yoru_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::command().get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if matches.get_flag("log-json") {
        config.logging.json = true;
    }
    telemetry::init(config.logging.json);

    let ctx = AppContext::open(config).await?;
    ctx.auth.init().await;

    let result = commands::dispatch(&ctx, &matches).await;
    ctx.close().await;

    print!("{}", result?);
    Ok(())
}
