use crate::config::{Config, QuickSwitchScope};
use crate::error::{Result, SwitcherError};
use crate::events::{SlotId, WindowId, WindowInfo};
use crate::services::highlighter::Highlighter;
use crate::services::window_system::WindowSystem;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// История взаимодействия со слотом. Создаётся при первом переключении
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotHistory {
    /// Окно, которое было в фокусе до последнего переключения. Может быть уже закрыто
    pub last_focused: Option<WindowId>,
    pub cycle_index: Option<usize>,
}

/// Состояние движка: история слотов и таймеры быстрого переключения
#[derive(Debug, Default)]
pub struct EngineState {
    histories: HashMap<SlotId, SlotHistory>,
    last_hotkey: Option<Instant>,
    slot_hotkeys: HashMap<SlotId, Instant>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Результат одного вызова focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    NoWindows,
    AlreadyFocused,
    Activated(WindowId),
    /// Активация не удалась, история всё равно обновлена
    ActivationFailed(WindowId),
}

pub struct SlotCycler {
    config: Arc<Config>,
    system: Arc<dyn WindowSystem>,
    highlighter: Highlighter,
    state: EngineState,
}

impl SlotCycler {
    pub fn new(
        config: Arc<Config>,
        system: Arc<dyn WindowSystem>,
        highlighter: Highlighter,
        state: EngineState,
    ) -> Self {
        info!(
            "Инициализация SlotCycler (быстрое переключение {}мс, {:?})",
            config.settings.quick_switch_timeout_ms, config.settings.quick_switch_scope
        );
        Self {
            config,
            system,
            highlighter,
            state,
        }
    }

    pub fn history(&self, slot: SlotId) -> Option<&SlotHistory> {
        self.state.histories.get(&slot)
    }

    fn window_class(&self, slot: SlotId) -> Result<&str> {
        self.config
            .slot(slot)
            .map(|s| s.wm_class.as_str())
            .ok_or(SwitcherError::UnknownSlot(slot))
    }

    pub fn has_windows(&self, slot: SlotId) -> Result<bool> {
        let window_class = self.window_class(slot)?;
        Ok(!self.system.windows_for_class(window_class)?.is_empty())
    }

    pub fn focus(&mut self, slot: SlotId) -> Result<FocusOutcome> {
        self.focus_at(slot, Instant::now())
    }

    pub fn focus_at(&mut self, slot: SlotId, now: Instant) -> Result<FocusOutcome> {
        let window_class = self.window_class(slot)?.to_string();
        let is_quick = self.register_activation(slot, now);
        let windows = self.system.windows_for_class(&window_class)?;

        debug!(
            "Слот {}: {} окон класса {}, быстрое переключение: {}",
            slot,
            windows.len(),
            window_class,
            is_quick
        );

        if windows.is_empty() {
            debug!("Слот {}: окон нет", slot);
            return Ok(FocusOutcome::NoWindows);
        }

        let focused = match self.system.focused_window() {
            Ok(focused) => focused,
            Err(e) => {
                warn!("Не удалось узнать активное окно: {}", e);
                None
            }
        };
        let current = focused
            .as_ref()
            .and_then(|id| windows.iter().position(|w| &w.id == id));

        if windows.len() == 1 {
            if current.is_some() {
                debug!("Слот {}: единственное окно уже в фокусе", slot);
                return Ok(FocusOutcome::AlreadyFocused);
            }
            let window = &windows[0];
            let outcome = self.activate(window);
            self.history_mut(slot).last_focused = Some(window.id.clone());
            return Ok(outcome);
        }

        let Some(current) = current else {
            let window = &windows[0];
            let outcome = self.activate(window);
            let history = self.history_mut(slot);
            history.last_focused = Some(window.id.clone());
            history.cycle_index = Some(0);
            return Ok(outcome);
        };

        let next = if is_quick {
            successor(current, windows.len())
        } else {
            self.toggle_target(slot, &windows, current)
                .unwrap_or_else(|| successor(current, windows.len()))
        };

        let outcome = self.activate(&windows[next]);

        // Предыдущее окно становится целью следующего возврата
        let history = self.history_mut(slot);
        history.last_focused = Some(windows[current].id.clone());
        history.cycle_index = Some(next);

        Ok(outcome)
    }

    /// Сфокусировать только что появившееся окно слота, минуя выбор
    pub fn focus_new_window(&mut self, slot: SlotId, window: &WindowInfo) -> Result<FocusOutcome> {
        self.window_class(slot)?;
        let outcome = self.activate(window);
        self.history_mut(slot).last_focused = Some(window.id.clone());
        Ok(outcome)
    }

    /// Отметить нажатие и вернуть, было ли оно быстрым относительно предыдущего
    fn register_activation(&mut self, slot: SlotId, now: Instant) -> bool {
        let previous = match self.config.settings.quick_switch_scope {
            QuickSwitchScope::Global => self.state.last_hotkey.replace(now),
            QuickSwitchScope::Slot => self.state.slot_hotkeys.insert(slot, now),
        };

        previous.map_or(false, |previous| {
            now.saturating_duration_since(previous) < self.config.quick_switch_timeout()
        })
    }

    fn toggle_target(&self, slot: SlotId, windows: &[WindowInfo], current: usize) -> Option<usize> {
        let last = self.history(slot)?.last_focused.as_ref()?;
        if *last == windows[current].id {
            return None;
        }
        windows.iter().position(|w| &w.id == last)
    }

    fn history_mut(&mut self, slot: SlotId) -> &mut SlotHistory {
        self.state.histories.entry(slot).or_default()
    }

    fn activate(&self, window: &WindowInfo) -> FocusOutcome {
        match self.system.activate(window) {
            Ok(()) => {
                info!("Фокус на окне {}", window);
                self.highlighter.flash(window);
                FocusOutcome::Activated(window.id.clone())
            }
            Err(e) => {
                warn!("Не удалось активировать окно {}: {}", window, e);
                FocusOutcome::ActivationFailed(window.id.clone())
            }
        }
    }
}

fn successor(index: usize, len: usize) -> usize {
    (index + 1) % len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::window_system::{DryRunWindowSystem, WindowSource};
    use std::time::Duration;

    const QUICK: Duration = Duration::from_millis(100);
    const SLOW: Duration = Duration::from_millis(3000);

    fn slot(digit: u8) -> SlotId {
        SlotId::new(digit).unwrap()
    }

    fn config(scope: QuickSwitchScope) -> Config {
        let mut config = Config::default()
            .with_slot("1", "Firefox", "Firefox", "firefox.desktop")
            .with_slot("2", "Terminal", "Term", "term.desktop");
        config.settings.quick_switch_scope = scope;
        config
    }

    fn cycler_with(config: Config, system: &Arc<DryRunWindowSystem>) -> SlotCycler {
        SlotCycler::new(
            Arc::new(config),
            system.clone(),
            Highlighter::new(system.clone(), &Default::default()),
            EngineState::new(),
        )
    }

    fn setup(count: usize) -> (SlotCycler, Arc<DryRunWindowSystem>, Vec<WindowId>) {
        let system = Arc::new(DryRunWindowSystem::new());
        let ids = (0..count)
            .map(|i| system.spawn_window("Firefox", &format!("W{}", i)).id)
            .collect();
        (cycler_with(config(QuickSwitchScope::Global), &system), system, ids)
    }

    fn focused(system: &DryRunWindowSystem) -> Option<WindowId> {
        system.focused_window().unwrap()
    }

    #[test]
    fn test_single_focused_window_is_noop() {
        let (mut cycler, system, ids) = setup(1);
        system.set_focused(Some(ids[0].clone()));

        let outcome = cycler.focus_at(slot(1), Instant::now()).unwrap();

        assert_eq!(outcome, FocusOutcome::AlreadyFocused);
        assert!(system.activations().is_empty());
        assert!(cycler.history(slot(1)).is_none());
    }

    #[test]
    fn test_single_unfocused_window_is_activated() {
        let (mut cycler, _system, ids) = setup(1);

        let outcome = cycler.focus_at(slot(1), Instant::now()).unwrap();

        assert_eq!(outcome, FocusOutcome::Activated(ids[0].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().last_focused, Some(ids[0].clone()));
    }

    #[test]
    fn test_no_windows_is_silent() {
        let (mut cycler, system, _) = setup(0);

        let outcome = cycler.focus_at(slot(1), Instant::now()).unwrap();

        assert_eq!(outcome, FocusOutcome::NoWindows);
        assert!(system.activations().is_empty());
        assert!(!cycler.has_windows(slot(1)).unwrap());
    }

    #[test]
    fn test_focus_elsewhere_starts_at_first_window() {
        let (mut cycler, system, ids) = setup(3);
        let other = system.spawn_window("Term", "elsewhere");
        system.set_focused(Some(other.id));

        cycler.focus_at(slot(1), Instant::now()).unwrap();

        assert_eq!(focused(&system), Some(ids[0].clone()));
        let history = cycler.history(slot(1)).unwrap();
        assert_eq!(history.cycle_index, Some(0));
        assert_eq!(history.last_focused, Some(ids[0].clone()));
    }

    #[test]
    fn test_window_on_other_workspace_is_never_cycled_to() {
        let (mut cycler, system, ids) = setup(2);
        let hidden = WindowInfo::new(WindowId::new("dry-hidden"))
            .with_class("Firefox")
            .with_title("other desktop")
            .with_active_workspace(false);
        system.add_window(hidden.clone());
        system.set_focused(Some(ids[0].clone()));

        let listed = system.windows_for_class("Firefox").unwrap();
        assert!(listed.iter().all(|w| w.id != hidden.id));
        assert_eq!(listed.len(), 2);

        let start = Instant::now();
        for i in 0..4 {
            cycler.focus_at(slot(1), start + QUICK * i).unwrap();
        }
        assert!(!system.activations().contains(&hidden.id));
        assert_eq!(focused(&system), Some(ids[0].clone()));
    }

    #[test]
    fn test_two_windows_quick_switch_round_trip() {
        let (mut cycler, system, ids) = setup(2);
        system.set_focused(Some(ids[0].clone()));
        let t0 = Instant::now();

        cycler.focus_at(slot(1), t0).unwrap();
        assert_eq!(focused(&system), Some(ids[1].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().last_focused, Some(ids[0].clone()));

        cycler.focus_at(slot(1), t0 + QUICK).unwrap();
        assert_eq!(focused(&system), Some(ids[0].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().last_focused, Some(ids[1].clone()));
    }

    #[test]
    fn test_two_windows_slow_switch_matches_quick_outcome() {
        let (mut cycler, system, ids) = setup(2);
        system.set_focused(Some(ids[0].clone()));
        let t0 = Instant::now();

        cycler.focus_at(slot(1), t0).unwrap();
        cycler.focus_at(slot(1), t0 + SLOW).unwrap();

        assert_eq!(focused(&system), Some(ids[0].clone()));
    }

    #[test]
    fn test_three_windows_quick_switch_wraps_around() {
        let (mut cycler, system, ids) = setup(3);
        system.set_focused(Some(ids[0].clone()));
        let t0 = Instant::now();

        cycler.focus_at(slot(1), t0).unwrap();
        assert_eq!(focused(&system), Some(ids[1].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().cycle_index, Some(1));

        cycler.focus_at(slot(1), t0 + QUICK).unwrap();
        assert_eq!(focused(&system), Some(ids[2].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().cycle_index, Some(2));

        cycler.focus_at(slot(1), t0 + QUICK * 2).unwrap();
        assert_eq!(focused(&system), Some(ids[0].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().cycle_index, Some(0));

        assert_eq!(
            system.activations(),
            vec![ids[1].clone(), ids[2].clone(), ids[0].clone()]
        );
    }

    #[test]
    fn test_slow_switch_toggles_between_two_most_recent() {
        let (mut cycler, system, ids) = setup(3);
        system.set_focused(Some(ids[0].clone()));
        let t0 = Instant::now();

        cycler.focus_at(slot(1), t0).unwrap();
        assert_eq!(focused(&system), Some(ids[1].clone()));

        // Без быстрого переключения возвращаемся к A, а не идём к C
        cycler.focus_at(slot(1), t0 + SLOW).unwrap();
        assert_eq!(focused(&system), Some(ids[0].clone()));

        cycler.focus_at(slot(1), t0 + SLOW * 2).unwrap();
        assert_eq!(focused(&system), Some(ids[1].clone()));
    }

    #[test]
    fn test_closed_last_window_falls_back_to_successor() {
        let (mut cycler, system, ids) = setup(3);
        system.set_focused(Some(ids[0].clone()));
        let t0 = Instant::now();

        cycler.focus_at(slot(1), t0).unwrap();
        assert!(system.close_window(&ids[0]));

        let outcome = cycler.focus_at(slot(1), t0 + SLOW).unwrap();

        assert_eq!(outcome, FocusOutcome::Activated(ids[2].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().last_focused, Some(ids[1].clone()));
    }

    #[test]
    fn test_failed_activation_still_updates_history() {
        let (mut cycler, system, ids) = setup(2);
        system.set_focused(Some(ids[0].clone()));
        system.fail_next_activation();

        let outcome = cycler.focus_at(slot(1), Instant::now()).unwrap();

        assert_eq!(outcome, FocusOutcome::ActivationFailed(ids[1].clone()));
        assert_eq!(focused(&system), Some(ids[0].clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().last_focused, Some(ids[0].clone()));
        assert!(system.attention_log().is_empty());
    }

    #[test]
    fn test_successful_activation_flashes_window() {
        let (mut cycler, system, ids) = setup(2);
        system.set_focused(Some(ids[0].clone()));

        cycler.focus_at(slot(1), Instant::now()).unwrap();

        assert_eq!(system.attention_log(), vec![(ids[1].clone(), true)]);
    }

    #[test]
    fn test_unknown_slot_is_an_error() {
        let (mut cycler, _, _) = setup(1);

        let err = cycler.focus_at(slot(7), Instant::now()).unwrap_err();
        assert!(matches!(err, SwitcherError::UnknownSlot(s) if s == slot(7)));
        assert!(cycler.has_windows(slot(7)).is_err());
    }

    #[test]
    fn test_global_timer_couples_slots() {
        let (mut cycler, _, _) = setup(0);
        let t0 = Instant::now();

        assert!(!cycler.register_activation(slot(2), t0));
        assert!(cycler.register_activation(slot(1), t0 + QUICK));
        assert!(!cycler.register_activation(slot(1), t0 + QUICK + SLOW));
    }

    #[test]
    fn test_slot_timer_keeps_slots_independent() {
        let system = Arc::new(DryRunWindowSystem::new());
        let mut cycler = cycler_with(config(QuickSwitchScope::Slot), &system);
        let t0 = Instant::now();

        assert!(!cycler.register_activation(slot(2), t0));
        assert!(!cycler.register_activation(slot(1), t0 + QUICK));
        assert!(cycler.register_activation(slot(1), t0 + QUICK * 2));
    }

    #[test]
    fn test_timer_advances_even_without_windows() {
        let (mut cycler, system, ids) = setup(3);
        system.set_focused(Some(ids[1].clone()));
        let t0 = Instant::now();

        // Слот 2 пуст, но его нажатие делает следующее нажатие слота 1 быстрым
        assert_eq!(cycler.focus_at(slot(2), t0).unwrap(), FocusOutcome::NoWindows);
        cycler.history_mut(slot(1)).last_focused = Some(ids[0].clone());

        cycler.focus_at(slot(1), t0 + QUICK).unwrap();
        assert_eq!(focused(&system), Some(ids[2].clone()));
    }

    #[test]
    fn test_focus_new_window_records_history() {
        let (mut cycler, system, _) = setup(0);
        let window = system.spawn_window("Firefox", "fresh");

        let outcome = cycler.focus_new_window(slot(1), &window).unwrap();

        assert_eq!(outcome, FocusOutcome::Activated(window.id.clone()));
        assert_eq!(cycler.history(slot(1)).unwrap().last_focused, Some(window.id));
    }

    #[test]
    fn test_independent_engines_do_not_share_state() {
        let (mut first, system, ids) = setup(2);
        let second = cycler_with(config(QuickSwitchScope::Global), &system);
        system.set_focused(Some(ids[0].clone()));

        first.focus_at(slot(1), Instant::now()).unwrap();

        assert!(first.history(slot(1)).is_some());
        assert!(second.history(slot(1)).is_none());
    }
}
