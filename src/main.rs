use anyhow::Context;
use onessa::{Config, run};

fn main() -> anyhow::Result<()> {
    // Loaded before the runtime exists so `worker_threads` can size it.
    let config = Config::load().context("Failed to load configuration")?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all().thread_name("onessa-worker");
    if config.general.worker_threads > 0 {
        builder.worker_threads(config.general.worker_threads);
    }

    builder
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(config))
}
