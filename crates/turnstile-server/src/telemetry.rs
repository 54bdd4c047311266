//! Logging setup.
//!
//! Installs a `tracing` subscriber whose filter sits behind a reload layer,
//! so the console can switch trace logging on and off at runtime.

use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::{console::TraceControl, error::ServerError};

/// Handle for swapping the active log filter.
pub struct TraceSwitch {
    handle: reload::Handle<EnvFilter, Registry>,
    base: String,
}

impl TraceSwitch {
    /// Filter directives in effect when trace is off.
    pub fn base(&self) -> &str {
        &self.base
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str) -> Result<TraceSwitch, ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let base = filter.to_string();
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| ServerError::Internal(format!("failed to install logger: {e}")))?;

    Ok(TraceSwitch { handle, base })
}

impl TraceControl for TraceSwitch {
    fn set_trace(&self, enabled: bool) -> Result<(), ServerError> {
        let directives = if enabled { "trace" } else { self.base.as_str() };
        self.handle
            .reload(EnvFilter::new(directives))
            .map_err(|e| ServerError::Internal(format!("failed to reload log filter: {e}")))?;
        tracing::info!(filter = directives, "log filter changed");
        Ok(())
    }
}
