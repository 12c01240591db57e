use std::{num::NonZeroU8, panic};

use paste_rtc_lib::settings::LogSettings;
use time::format_description::well_known::{iso8601, Iso8601};
use tracing::{error, Level};
use tracing_subscriber::{
    fmt::{time::LocalTime, writer::MakeWriterExt},
    prelude::__tracing_subscriber_SubscriberExt,
    EnvFilter, Layer,
};

const MY_CONFIG: iso8601::EncodedConfig = iso8601::Config::DEFAULT
    .set_time_precision(iso8601::TimePrecision::Second {
        decimal_digits: NonZeroU8::new(3),
    })
    .encode();

fn make_filter() -> EnvFilter {
    let level = if cfg!(debug_assertions) {
        "trace"
    } else {
        "info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={level},paste_rtc_lib={level}",
            env!("CARGO_CRATE_NAME")
        ))
    })
}

pub fn init_tracing(log: &LogSettings) {
    let default_layer = || {
        const WITH_FILE_PATH: bool = cfg!(debug_assertions);
        tracing_subscriber::fmt::layer()
            .compact()
            .with_file(WITH_FILE_PATH)
            .with_line_number(WITH_FILE_PATH)
            .with_target(!WITH_FILE_PATH)
            .with_thread_ids(true)
            .with_timer(LocalTime::new(Iso8601::<MY_CONFIG>))
    };
    let stdout_layer = default_layer().with_filter(make_filter());

    let result = match (log.dir(), log.file_name()) {
        (Some(dir), Some(file_name)) => {
            let writer = tracing_appender::rolling::never(dir, file_name);
            let writer = writer.with_max_level(Level::WARN);
            let file_layer = default_layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(make_filter());
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(stdout_layer.and_then(file_layer)),
            )
        }
        _ => tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(stdout_layer),
        ),
    };
    if let Err(err) = result {
        eprintln!("failed to install tracing subscriber: {}", err);
    }

    panic::set_hook(Box::new(|panic| error!("{}", panic)));
}
