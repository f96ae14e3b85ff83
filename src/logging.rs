use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Takes precedence over `RUST_LOG`.
pub const ENV_LOG: &str = "STORYLOOM_LOG";

const DEFAULT_DIRECTIVES: &str = "info,reqwest=warn,hyper=warn";

/// Logs go to stderr; stdout carries command output and the IPC channel.
pub fn init() -> anyhow::Result<()> {
    let filter = match std::env::var(ENV_LOG) {
        Ok(directives) => EnvFilter::try_new(&directives)
            .with_context(|| format!("parse {ENV_LOG}: {directives}"))?,
        Err(_) => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))
            .context("build log filter")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
