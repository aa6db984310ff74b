use log::SetLoggerError;

/// Environment variable holding the filter for the built-in logger, e.g. `BELTWAY_LOG=debug`.
pub const LOG_FILTER_ENV: &str = "BELTWAY_LOG";

/// Attempt to install an env_logger for the heap. Collections log once per cycle at `info`
/// level, and belt extents at `debug` level.
/// Does nothing if the "builtin_env_logger" feature is disabled, leaving the choice of logger
/// to the runtime.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::Builder::from_env(
                env_logger::Env::default().filter_or(LOG_FILTER_ENV, "info"),
            )
            .format_timestamp_micros()
            .try_init()
        } else {
            Ok(())
        }
    }
}
