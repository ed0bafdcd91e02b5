//! Tracing subscriber setup.

use chrono::{FixedOffset, Utc};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Log timestamps in the configured display offset.
#[derive(Debug, Clone, Copy)]
pub struct OffsetTimer(pub FixedOffset);

impl FormatTime for OffsetTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            Utc::now()
                .with_timezone(&self.0)
                .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

pub fn init(verbose: bool, json: bool, offset: FixedOffset) {
    let default = if verbose {
        "filingwatch=debug,filingwatch_scheduler=debug,filingwatch_gateway=debug,tower_http=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(OffsetTimer(offset))
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
