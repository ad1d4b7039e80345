use crate::config::{DEFAULT_LOG_FILTER, LOGGING_ENABLED, LOG_ENV_OVERRIDE};
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<bool> = OnceCell::new();

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Включено ли логирование для этой сборки и окружения.
pub fn logging_enabled() -> bool {
    LOGGING_ENABLED || std::env::var_os(LOG_ENV_OVERRIDE).is_some()
}

/// Логирование с временными метками.
///
/// Повторный вызов ничего не делает. Возвращает, активен ли subscriber.
pub fn init() -> bool {
    *INIT.get_or_init(|| {
        if !logging_enabled() {
            return false;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
            .with_target(true)
            .try_init()
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let first = init();
        assert_eq!(init(), first);
    }
}
