use std::sync::Arc;

use taskrunner_core::{Config, TaskApi};
use taskrunner_ecs::EcsTaskApi;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub fn load_config() -> anyhow::Result<Config> {
    Ok(Config::load_default()?)
}

/// Create the ECS client from ambient AWS configuration plus the config
/// file's region override.
pub async fn create_client(config: &Config) -> Arc<dyn TaskApi> {
    Arc::new(EcsTaskApi::from_env(config.region.clone()).await)
}

/// A flag or the configured default cluster.
pub fn resolve_cluster(config: &Config, cluster: Option<String>) -> anyhow::Result<String> {
    cluster
        .or_else(|| config.defaults.cluster.clone())
        .ok_or_else(|| anyhow::anyhow!("no cluster given; pass --cluster or set defaults.cluster"))
}

/// Token cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling wait (launched tasks keep running)");
            child.cancel();
        }
    });
    token
}
