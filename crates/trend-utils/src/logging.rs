//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with the default directives
///
/// `RUST_LOG` overrides the default when set.
pub fn init_tracing() {
    init_tracing_with("info");
}

/// Initialize tracing with explicit fallback directives
pub fn init_tracing_with(default_directives: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directives)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
