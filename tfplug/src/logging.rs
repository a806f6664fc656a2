//! Logging setup and per-RPC log events
//!
//! Providers log through `tracing`. The level follows Terraform's `TF_LOG`
//! convention so provider logs line up with the host's.

use crate::context::Context;
use crate::error::{Result, TfplugError};
use crate::types::{has_errors, Diagnostic};
use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level for provider logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Level from `TF_LOG`; unset or unrecognised values mean `Off`
    pub fn from_env() -> Self {
        std::env::var("TF_LOG")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(LogLevel::Off)
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl FromStr for LogLevel {
    type Err = TfplugError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "JSON" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "OFF" | "" => Ok(LogLevel::Off),
            other => Err(TfplugError::InvalidConfiguration(format!(
                "unknown log level {:?}",
                other
            ))),
        }
    }
}

/// Install a fmt subscriber filtered by `TF_LOG`. Safe to call more than
/// once; only the first call installs anything
pub fn init() {
    init_with_level(LogLevel::from_env());
}

pub fn init_with_level(level: LogLevel) {
    let filter = EnvFilter::new(level.directive());
    // Err means a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_test_writer())
        .with(filter)
        .try_init();
}

pub(crate) fn rpc_request(ctx: &Context) {
    tracing::debug!(
        tf_rpc = ctx.rpc(),
        tf_resource_type = ctx.resource_type(),
        tf_req_id = ctx.req_id(),
        "Received request"
    );
}

pub(crate) fn rpc_response(ctx: &Context, diagnostics: &[Diagnostic]) {
    if has_errors(diagnostics) {
        for diagnostic in diagnostics.iter().filter(|d| d.is_error()) {
            tracing::warn!(
                tf_rpc = ctx.rpc(),
                tf_resource_type = ctx.resource_type(),
                tf_req_id = ctx.req_id(),
                summary = %diagnostic.summary,
                detail = %diagnostic.detail,
                "Request returned error diagnostic"
            );
        }
    } else {
        tracing::debug!(
            tf_rpc = ctx.rpc(),
            tf_resource_type = ctx.resource_type(),
            tf_req_id = ctx.req_id(),
            diagnostics = diagnostics.len(),
            "Served request"
        );
    }
}
