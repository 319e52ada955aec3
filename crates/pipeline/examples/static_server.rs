//! Serves a directory with precompressed variants.
//!
//! ```shell
//! cargo run --example static_server -- ./public
//! cargo run --example static_server -- --config server.toml
//! ```

use micro_pipeline::assets::{asset_pool, StaticFilter, StaticOptions};
use micro_pipeline::filter::BodyFilter;
use micro_pipeline::pool::PoolManager;
use micro_pipeline::{Router, Server, ServerConfig, ServerError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let mut args = std::env::args().skip(1);
    let config = match (args.next(), args.next()) {
        (Some(flag), Some(path)) if flag == "--config" => ServerConfig::from_file(path)?,
        (Some(root), _) => ServerConfig { static_files: Some(StaticOptions::new(root)), ..ServerConfig::default() },
        (None, _) => ServerConfig { static_files: Some(StaticOptions::new("./public")), ..ServerConfig::default() },
    };
    Server::init_logging(config.level());

    let manager = PoolManager::new();
    let pool = asset_pool(&manager, "static", config.pool.into())?;

    let filter = StaticFilter::new();
    if let Some(options) = &config.static_files {
        let count = filter.setup(options, &pool).await?;
        info!(count, "static files ready");
    }

    let mut router = Router::new();
    router.get("/_manifest", filter.manifest())?;
    router.get("/_manifest/:path...", filter.manifest_entry("path"))?;

    let server = Server::builder().config(&config)?.router(router).filter(BodyFilter).filter(filter).build();
    server.run_until(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    manager.terminate(pool).await;
    Ok(())
}
