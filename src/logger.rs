use chrono::{SecondsFormat, Utc};
use slog::{o, Drain, FnValue, Level, Logger, PushFnValue, Record};

/// Builds the root logger.
///
/// Emits one JSON object per line on stdout with `level`, `time` (RFC 3339 UTC)
/// and `msg` keys, plus whatever structured fields each log statement carries.
pub fn build_logger(debug: bool) -> Logger {
    let drain = slog_json::Json::new(std::io::stdout())
        .set_newlines(true)
        .set_flush(true)
        .add_key_value(o!(
            "msg" => PushFnValue(move |record: &Record, ser| ser.emit(record.msg())),
            "level" => FnValue(move |record: &Record| record.level().as_str()),
            "time" => PushFnValue(move |_: &Record, ser| {
                ser.emit(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            }),
        ))
        .build()
        .fuse();

    let drain = slog_async::Async::new(drain).build();

    let level = if debug { Level::Debug } else { Level::Info };
    let drain = drain.filter_level(level).fuse();

    Logger::root(drain, o!())
}

/// A logger that discards everything, for tests.
pub fn null_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}
