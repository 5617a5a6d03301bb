use crate::error::{Result, SwitcherError};
use crate::events::{WindowId, WindowInfo};
use parking_lot::RwLock;
use tracing::info;

use super::r#trait::{WindowActuator, WindowSource};

const BACKEND: &str = "dry-run";
/// Сколько последних активаций и переключений подсветки хранит журнал
const LOG_LIMIT: usize = 256;

#[derive(Default)]
struct SimulatedDesktop {
    windows: Vec<WindowInfo>,
    focused: Option<WindowId>,
    next_id: u64,
    activations: Vec<WindowId>,
    attention: Vec<(WindowId, bool)>,
    fail_next_activation: bool,
}

fn push_capped<T>(log: &mut Vec<T>, entry: T) {
    if log.len() >= LOG_LIMIT {
        log.drain(..=log.len() - LOG_LIMIT);
    }
    log.push(entry);
}

/// Эмуляция рабочего стола в памяти: окна появляются через DryRunLauncher
/// или вручную, активация только меняет фокус
#[derive(Default)]
pub struct DryRunWindowSystem {
    state: RwLock<SimulatedDesktop>,
}

impl DryRunWindowSystem {
    pub fn new() -> Self {
        info!("Инициализация DryRunWindowSystem");
        Self::default()
    }

    /// Создать обычное окно на активном рабочем столе
    pub fn spawn_window(&self, class: &str, title: &str) -> WindowInfo {
        let id = {
            let mut state = self.state.write();
            state.next_id += 1;
            WindowId::new(format!("dry-{}", state.next_id))
        };
        let window = WindowInfo::new(id).with_class(class).with_title(title);
        self.add_window(window.clone());
        window
    }

    pub fn add_window(&self, window: WindowInfo) {
        info!("Dry-run: появилось окно {}", window);
        self.state.write().windows.push(window);
    }

    pub fn close_window(&self, id: &WindowId) -> bool {
        let mut state = self.state.write();
        let before = state.windows.len();
        state.windows.retain(|w| &w.id != id);
        if state.focused.as_ref() == Some(id) {
            state.focused = None;
        }
        before != state.windows.len()
    }

    pub fn set_focused(&self, id: Option<WindowId>) {
        self.state.write().focused = id;
    }

    /// Последние успешные активации в порядке вызова
    pub fn activations(&self) -> Vec<WindowId> {
        self.state.read().activations.clone()
    }

    pub fn attention_log(&self) -> Vec<(WindowId, bool)> {
        self.state.read().attention.clone()
    }

    #[cfg(test)]
    pub fn fail_next_activation(&self) {
        self.state.write().fail_next_activation = true;
    }
}

impl WindowSource for DryRunWindowSystem {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.state.read().windows.clone())
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        Ok(self.state.read().focused.clone())
    }
}

impl WindowActuator for DryRunWindowSystem {
    fn activate(&self, window: &WindowInfo) -> Result<()> {
        let mut state = self.state.write();

        if std::mem::take(&mut state.fail_next_activation) {
            return Err(SwitcherError::backend(BACKEND, "имитация сбоя активации"));
        }
        if !state.windows.iter().any(|w| w.id == window.id) {
            return Err(SwitcherError::backend(
                BACKEND,
                format!("окно {} не существует", window.id),
            ));
        }

        info!("Dry-run: активируем окно {}", window);
        state.focused = Some(window.id.clone());
        push_capped(&mut state.activations, window.id.clone());
        Ok(())
    }

    fn set_attention(&self, window: &WindowInfo, on: bool) -> Result<()> {
        push_capped(&mut self.state.write().attention, (window.id.clone(), on));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawned_windows_keep_order() {
        let system = DryRunWindowSystem::new();
        let a = system.spawn_window("Term", "a");
        let b = system.spawn_window("Term", "b");
        system.spawn_window("Browser", "c");

        let terms = system.windows_for_class("Term").unwrap();
        assert_eq!(terms, vec![a, b]);
    }

    #[test]
    fn test_activate_moves_focus() {
        let system = DryRunWindowSystem::new();
        let window = system.spawn_window("Term", "a");

        system.activate(&window).unwrap();

        assert_eq!(system.focused_window().unwrap(), Some(window.id.clone()));
        assert_eq!(system.activations(), vec![window.id.clone()]);
    }

    #[test]
    fn test_activate_missing_window_fails() {
        let system = DryRunWindowSystem::new();
        let window = system.spawn_window("Term", "a");
        assert!(system.close_window(&window.id));

        assert!(system.activate(&window).is_err());
        assert!(system.activations().is_empty());
    }

    #[test]
    fn test_logs_keep_only_recent_entries() {
        let system = DryRunWindowSystem::new();
        let a = system.spawn_window("Term", "a");
        let b = system.spawn_window("Term", "b");

        for _ in 0..LOG_LIMIT {
            system.activate(&a).unwrap();
            system.set_attention(&a, true).unwrap();
        }
        system.activate(&b).unwrap();
        system.set_attention(&b, false).unwrap();

        let activations = system.activations();
        assert_eq!(activations.len(), LOG_LIMIT);
        assert_eq!(activations.last(), Some(&b.id));
        let attention = system.attention_log();
        assert_eq!(attention.len(), LOG_LIMIT);
        assert_eq!(attention.last(), Some(&(b.id.clone(), false)));
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let system = DryRunWindowSystem::new();
        let window = system.spawn_window("Term", "a");

        system.fail_next_activation();
        assert!(system.activate(&window).is_err());
        assert!(system.activate(&window).is_ok());
    }
}
