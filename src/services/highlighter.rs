use crate::config::VisualIndicatorConfig;
use crate::events::WindowInfo;
use crate::services::window_system::WindowSystem;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Кратковременная подсветка окна после переключения.
/// Работает по принципу "выстрелил и забыл": ошибки только логируются
#[derive(Clone)]
pub struct Highlighter {
    system: Arc<dyn WindowSystem>,
    enabled: bool,
    duration: Duration,
}

impl Highlighter {
    pub fn new(system: Arc<dyn WindowSystem>, settings: &VisualIndicatorConfig) -> Self {
        Self {
            system,
            enabled: settings.enabled,
            duration: Duration::from_millis(settings.duration_ms),
        }
    }

    pub fn disabled(system: Arc<dyn WindowSystem>) -> Self {
        Self {
            system,
            enabled: false,
            duration: Duration::ZERO,
        }
    }

    pub fn flash(&self, window: &WindowInfo) {
        if !self.enabled {
            return;
        }

        if let Err(e) = self.system.set_attention(window, true) {
            debug!("Подсветка окна {} не удалась: {}", window.id, e);
            return;
        }

        // Вне runtime снять подсветку некому, окно останется помеченным до фокуса
        let Ok(handle) = Handle::try_current() else {
            debug!("Подсветка окна {} без runtime: сброс пропущен", window.id);
            return;
        };

        let system = self.system.clone();
        let window = window.clone();
        let duration = self.duration;
        handle.spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(e) = system.set_attention(&window, false) {
                debug!("Не удалось снять подсветку окна {}: {}", window.id, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::window_system::DryRunWindowSystem;

    #[tokio::test(start_paused = true)]
    async fn test_flash_sets_and_clears_attention() {
        let system = Arc::new(DryRunWindowSystem::new());
        let window = system.spawn_window("Term", "a");
        let highlighter = Highlighter::new(system.clone(), &VisualIndicatorConfig::default());

        highlighter.flash(&window);
        assert_eq!(system.attention_log(), vec![(window.id.clone(), true)]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            system.attention_log(),
            vec![(window.id.clone(), true), (window.id.clone(), false)]
        );
    }

    #[test]
    fn test_disabled_highlighter_does_nothing() {
        let system = Arc::new(DryRunWindowSystem::new());
        let window = system.spawn_window("Term", "a");

        Highlighter::disabled(system.clone()).flash(&window);
        assert!(system.attention_log().is_empty());
    }
}
