use std::env;
use std::str::FromStr;

use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

const LONG_ENV_FILTER_VAR_NAME: &str = "DATALOADER_LOG_LEVEL";
const SHORT_ENV_FILTER_VAR_NAME: &str = "DL_LOG_LEVEL";

fn level_from_env() -> tracing::Level {
    env::var(LONG_ENV_FILTER_VAR_NAME)
        .or(env::var(SHORT_ENV_FILTER_VAR_NAME))
        .ok()
        .and_then(|v| tracing::Level::from_str(&v).ok())
        .unwrap_or(tracing::Level::INFO)
}

/// Compact subscriber for this crate's events, at the level set in
/// `DATALOADER_LOG_LEVEL` (or `DL_LOG_LEVEL`), INFO otherwise.
pub fn default_tracing() -> impl Subscriber {
    tracing_subscriber::fmt()
        .with_max_level(level_from_env())
        .compact()
        .finish()
        .with(default_filter_target())
}

pub fn default_filter_target<S: Subscriber>() -> impl Layer<S> {
    filter_fn(|metadata| metadata.target().starts_with("tailcall_dataloader"))
}
