use std::time::Duration;
use thiserror::Error;

use crate::events::SlotId;

#[derive(Error, Debug)]
pub enum SwitcherError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Слот {0} не настроен")]
    UnknownSlot(SlotId),

    #[error("Не удалось запустить {launcher}: {reason}")]
    Launch { launcher: String, reason: String },

    #[error("Ошибка бэкенда {backend}: {reason}")]
    Backend { backend: &'static str, reason: String },

    #[error("Таймаут ожидания окна с классом {window_class} ({}мс)", .elapsed.as_millis())]
    Timeout {
        window_class: String,
        elapsed: Duration,
    },

    #[error("Ожидание окна с классом {window_class} отменено")]
    Cancelled { window_class: String },

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl SwitcherError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(SwitcherError::DeviceNotFound(msg.into()))
    }

    pub fn backend(backend: &'static str, reason: impl Into<String>) -> Self {
        SwitcherError::Backend {
            backend,
            reason: reason.into(),
        }
    }

    pub fn launch(launcher: impl Into<String>, reason: impl Into<String>) -> Self {
        SwitcherError::Launch {
            launcher: launcher.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwitcherError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! wks_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::SwitcherError::DeviceNotFound(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::SwitcherError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::SwitcherError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::SwitcherError::Internal(format!($($arg)*))
    };
}
