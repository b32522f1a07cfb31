//! Logging setup and user notification policy.
//!
//! Logs go to stderr since stdout carries the protocol. `RUFFLINK_LOG`
//! pins the filter; otherwise it starts at `warn` and follows the
//! `logLevel` setting.

use rufflink_core::settings::LogLevel;
use tower_lsp::lsp_types::MessageType;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

pub const LOG_ENV: &str = "RUFFLINK_LOG";
pub const SHOW_NOTIFICATION_ENV: &str = "LS_SHOW_NOTIFICATION";

/// Swaps the active filter when the `logLevel` setting changes.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogHandle {
    pub fn set_level(&self, level: LogLevel) {
        if self.pinned {
            return;
        }
        if let Err(err) = self.handle.reload(EnvFilter::new(level.as_filter())) {
            tracing::warn!(error = %err, "Failed to change log level");
        }
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle")
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

/// Install the global subscriber.
pub fn init() -> anyhow::Result<LogHandle> {
    let pinned = std::env::var_os(LOG_ENV).is_some();
    let filter = if pinned {
        EnvFilter::try_from_env(LOG_ENV)?
    } else {
        EnvFilter::new(LogLevel::Warning.as_filter())
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(LogHandle { handle, pinned })
}

/// When log messages also pop up in the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShowNotification {
    #[default]
    Off,
    OnError,
    OnWarning,
    Always,
}

impl ShowNotification {
    pub fn from_env() -> Self {
        std::env::var(SHOW_NOTIFICATION_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "onError" => ShowNotification::OnError,
            "onWarning" => ShowNotification::OnWarning,
            "always" => ShowNotification::Always,
            _ => ShowNotification::Off,
        }
    }

    /// Whether a message of type `kind` should be shown as a pop-up.
    pub fn shows(self, kind: MessageType) -> bool {
        match self {
            ShowNotification::Off => false,
            ShowNotification::OnError => kind == MessageType::ERROR,
            ShowNotification::OnWarning => {
                kind == MessageType::ERROR || kind == MessageType::WARNING
            }
            ShowNotification::Always => kind != MessageType::LOG,
        }
    }
}
