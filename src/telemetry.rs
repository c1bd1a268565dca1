//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,studysheet=debug,studysheet_backend::export=trace").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets in use:
//! - `studysheet_backend` (state, routes, generation) and `studysheet_backend::export`
//! - `studysheet` (retry and rate-limit decisions inside the AI path)
//! - module paths such as `studysheet_backend::openai` for instrumented client calls
//!
//! Tower HTTP TraceLayer still adds per-request spans; this complements it.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str = "info,studysheet=debug,studysheet_backend=debug,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn filter_from(raw: Option<&str>) -> EnvFilter {
    raw.filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok();
    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_from(level.as_deref()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Separate arms: the two builders are different types.
    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Pretty => builder.init(),
    }
}
