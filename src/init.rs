use crate::handler::OpenSearchHandler;
use crate::layer::OpenSearchLayer;
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Subscriber setup around the handler.
///
/// **Fields**
/// - `max_level`: least severe level shipped to the store.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to the [`OpenSearchLayer`] so events are also printed
///   to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub max_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            max_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that ships events through
/// `handler`.
///
/// **Parameters**
/// - `handler`: shared [`OpenSearchHandler`]; keep a clone to call
///   [`OpenSearchHandler::close`] on shutdown.
/// - `config`: [`LayerConfig`] controlling level filtering and console
///   output.
///
/// **Errors**
///
/// Fails if a global subscriber has already been installed.
pub fn init_tracing_with_config(
    handler: Arc<OpenSearchHandler>,
    config: LayerConfig,
) -> Result<(), SetGlobalDefaultError> {
    let layer = OpenSearchLayer::with_max_level(handler, config.max_level);

    // The two subscriber shapes have different types, hence the branches.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(handler: Arc<OpenSearchHandler>) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(handler, LayerConfig::default())
}
