use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    fmt, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{AppError, AppResult};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

const DEFAULT_LOG_DIRECTIVES: &str = "info,chewy::scheduler=debug,chewy::db=info";

/// Initialises tracing once for the process: console output always, plus a
/// daily-rolling file in `log_dir` when one is given. Subsequent calls are
/// no-ops.
pub fn init_logging(log_dir: Option<&Path>) -> AppResult<()> {
    LOGGER_INIT
        .get_or_try_init(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
                .map_err(|err| AppError::internal(format!("invalid log directives: {err}")))?;

            let registry = tracing_subscriber::registry().with(env_filter);

            if let Some(log_dir) = log_dir {
                std::fs::create_dir_all(log_dir)?;

                let file_appender = tracing_appender::rolling::daily(log_dir, "chewy.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                LOGGER_GUARD
                    .set(guard)
                    .map_err(|_| AppError::internal("logger already initialized"))?;

                registry
                    .with(
                        fmt::layer()
                            .with_writer(non_blocking)
                            .with_ansi(false)
                            .with_target(true)
                            .with_timer(UtcTime::rfc_3339()),
                    )
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_timer(UtcTime::rfc_3339()),
                    )
                    .init();
            } else {
                registry
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_timer(UtcTime::rfc_3339()),
                    )
                    .init();
            }

            Ok(())
        })
        .map(|_| ())
}
