use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt::format::{Format, Writer},
    EnvFilter,
};

/// "DD Month - HH:MM:SS.micros" in local time.
struct CustomTimer;

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, writer: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} - {}", now.format("%d %B"), now.format("%H:%M:%S%.6f"))
    }
}

const QUIET_TARGETS: [&str; 3] = ["alloy_transport_http=warn", "hyper_util=warn", "reqwest=warn"];

/// Installs the global logger at `log_level`. `RUST_LOG` directives are
/// honoured on top of it. Does nothing if a logger is already installed.
pub fn setup_logger(log_level: LevelFilter) {
    let mut filter = EnvFilter::from_default_env().add_directive(log_level.into());
    // the RPC transport logs every retried request at info
    for directive in QUIET_TARGETS {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let format = Format::default().with_timer(CustomTimer).with_level(true).with_target(false);

    let subscriber =
        tracing_subscriber::fmt().with_env_filter(filter).event_format(format).finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn setup_info_logger() {
    setup_logger(LevelFilter::INFO);
}
