use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// One line per event: `LEVEL [HH:MM:SS.mmm] target: message`
pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let timestamp = Local::now().format("%H:%M:%S%.3f");

        let level = match *metadata.level() {
            tracing::Level::TRACE => "TRACE",
            tracing::Level::DEBUG => "DEBUG",
            tracing::Level::INFO => "INFO ",
            tracing::Level::WARN => "WARN ",
            tracing::Level::ERROR => "ERROR",
        };

        // Module path without the crate prefix keeps lines short
        let target = metadata
            .target()
            .strip_prefix("allure_relay::")
            .unwrap_or(metadata.target());

        write!(writer, "{} [{}] {}: ", level, timestamp, target)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. Everything goes to stderr: the worker's
/// stdout carries only its ready line.
pub fn init(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        "allure_relay=debug,warn"
    } else {
        "allure_relay=warn,error"
    };

    let _ = tracing_subscriber::fmt()
        .event_format(CustomFormatter)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
