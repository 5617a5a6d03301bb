use crate::config::{Config, Slot};
use crate::error::{Result, SwitcherError};
use crate::events::{HotkeyEvent, SlotId, WindowInfo};
use crate::services::cycler::SlotCycler;
use crate::services::launcher::Launcher;
use crate::services::window_waiter::{WaitCanceller, WindowWaiter};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Окно, дождавшееся после запуска приложения слота
#[derive(Debug)]
struct Arrival {
    slot: SlotId,
    window: WindowInfo,
}

/// Координатор: единственный владелец SlotCycler, поэтому история
/// слотов меняется строго последовательно
pub struct Dispatcher {
    config: Arc<Config>,
    cycler: SlotCycler,
    launcher: Arc<dyn Launcher>,
    waiter: WindowWaiter,
    pending: Arc<DashMap<u64, WaitCanceller>>,
    next_wait_id: u64,
    arrivals_tx: mpsc::UnboundedSender<Arrival>,
    arrivals_rx: mpsc::UnboundedReceiver<Arrival>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        cycler: SlotCycler,
        launcher: Arc<dyn Launcher>,
        waiter: WindowWaiter,
    ) -> Self {
        info!("Инициализация Dispatcher");
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();
        Self {
            config,
            cycler,
            launcher,
            waiter,
            pending: Arc::new(DashMap::new()),
            next_wait_id: 0,
            arrivals_tx,
            arrivals_rx,
        }
    }

    pub async fn run(
        mut self,
        mut hotkeys: mpsc::Receiver<HotkeyEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("Dispatcher запущен");

        loop {
            tokio::select! {
                event = hotkeys.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_hotkey(event) {
                            error!("Ошибка обработки {}: {}", event, e);
                        }
                    }
                    None => {
                        info!("Канал горячих клавиш закрыт");
                        break;
                    }
                },
                Some(arrival) = self.arrivals_rx.recv() => {
                    self.handle_arrival(arrival);
                }
                _ = stop.changed() => break,
            }
        }

        self.shutdown();
        info!("Dispatcher остановлен");
        Ok(())
    }

    /// Запуск + ожидание, если окон нет или запрошен новый экземпляр, иначе переключение
    pub fn handle_hotkey(&mut self, event: HotkeyEvent) -> Result<()> {
        let slot = self
            .config
            .slot(event.slot)
            .cloned()
            .ok_or(SwitcherError::UnknownSlot(event.slot))?;

        debug!("Горячая клавиша {} -> {}", event, slot.name);

        if event.force || !self.cycler.has_windows(slot.id)? {
            // Подписка раньше запуска: окно не должно появиться до неё
            let wait_id = self.start_wait(&slot);
            if let Err(e) = self.launcher.launch(&slot) {
                self.cancel_wait(wait_id);
                return Err(e);
            }
            return Ok(());
        }

        self.cycler.focus(slot.id).map(|outcome| {
            debug!("Слот {}: {:?}", slot.id, outcome);
        })
    }

    fn start_wait(&mut self, slot: &Slot) -> u64 {
        let timeout = self.config.window_wait_timeout();
        let handle = self.waiter.wait_for_window(&slot.wm_class, timeout);

        self.next_wait_id += 1;
        let wait_id = self.next_wait_id;
        self.pending.insert(wait_id, handle.canceller());

        let pending = self.pending.clone();
        let arrivals = self.arrivals_tx.clone();
        let slot_id = slot.id;
        let window_class = slot.wm_class.clone();
        let started = Instant::now();

        tokio::spawn(async move {
            match handle.result().await {
                Ok(window) => {
                    debug!("Слот {}: дождались окна {}", slot_id, window);
                    if arrivals.send(Arrival { slot: slot_id, window }).is_err() {
                        debug!("Dispatcher уже остановлен, окно слота {} не фокусируем", slot_id);
                    }
                }
                Err(SwitcherError::Cancelled { .. }) => {
                    debug!("Слот {}: ожидание окна {} отменено", slot_id, window_class);
                }
                Err(e) => {
                    error!(
                        "Слот {}: окно класса {} не появилось за {}мс: {}",
                        slot_id,
                        window_class,
                        started.elapsed().as_millis(),
                        e
                    );
                }
            }
            pending.remove(&wait_id);
        });

        wait_id
    }

    fn cancel_wait(&self, wait_id: u64) {
        if let Some((_, canceller)) = self.pending.remove(&wait_id) {
            canceller.cancel();
        }
    }

    fn handle_arrival(&mut self, arrival: Arrival) {
        match self.cycler.focus_new_window(arrival.slot, &arrival.window) {
            Ok(outcome) => debug!("Слот {}: новое окно {:?}", arrival.slot, outcome),
            Err(e) => warn!("Слот {}: не удалось сфокусировать новое окно: {}", arrival.slot, e),
        }
    }

    pub fn pending_waits(&self) -> usize {
        self.pending.len()
    }

    /// Отменить все незавершённые ожидания окон
    pub fn shutdown(&self) {
        let count = self.pending.len();
        if count > 0 {
            info!("Отменяем {} ожиданий окон", count);
        }
        for entry in self.pending.iter() {
            entry.value().cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cycler::EngineState;
    use crate::services::highlighter::Highlighter;
    use crate::services::launcher::{DesktopLauncher, DryRunLauncher};
    use crate::services::window_system::{DryRunWindowSystem, WindowSource};
    use crate::services::window_watcher::{WindowEventBus, WindowWatcher};
    use std::time::Duration;

    struct NoopLauncher;

    impl Launcher for NoopLauncher {
        fn launch(&self, _slot: &Slot) -> Result<()> {
            Ok(())
        }
    }

    /// Окно появляется сразу, ещё до возврата из launch
    struct InstantLauncher(Arc<DryRunWindowSystem>);

    impl Launcher for InstantLauncher {
        fn launch(&self, slot: &Slot) -> Result<()> {
            self.0.spawn_window(&slot.wm_class, "instant");
            Ok(())
        }
    }

    struct Harness {
        system: Arc<DryRunWindowSystem>,
        bus: WindowEventBus,
        stop: watch::Sender<bool>,
    }

    fn slot(digit: u8) -> SlotId {
        SlotId::new(digit).unwrap()
    }

    fn dispatcher(launcher: Option<Arc<dyn Launcher>>) -> (Dispatcher, Harness) {
        dispatcher_on(Arc::new(DryRunWindowSystem::new()), launcher)
    }

    fn dispatcher_on(
        system: Arc<DryRunWindowSystem>,
        launcher: Option<Arc<dyn Launcher>>,
    ) -> (Dispatcher, Harness) {
        let config = Arc::new(Config::default().with_slot("1", "Foo", "Foo", "foo.desktop"));
        let bus = WindowEventBus::new();
        let (stop, stop_rx) = watch::channel(false);

        let watcher = WindowWatcher::new(system.clone(), bus.clone(), Duration::from_millis(50));
        tokio::spawn(watcher.run(stop_rx));

        let launcher = launcher.unwrap_or_else(|| -> Arc<dyn Launcher> {
            Arc::new(DryRunLauncher::new(system.clone(), Duration::from_millis(200)))
        });
        let cycler = SlotCycler::new(
            config.clone(),
            system.clone(),
            Highlighter::disabled(system.clone()),
            EngineState::new(),
        );
        let waiter = WindowWaiter::new(bus.clone(), system.clone(), config.settle_delay());

        (
            Dispatcher::new(config, cycler, launcher, waiter),
            Harness { system, bus, stop },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_slot_launches_and_focuses_new_window() {
        let (dispatcher, harness) = dispatcher(None);
        let (hotkey_tx, hotkey_rx) = mpsc::channel(8);
        let task = tokio::spawn(dispatcher.run(hotkey_rx, harness.stop.subscribe()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        hotkey_tx.send(HotkeyEvent::new(slot(1), false)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let windows = harness.system.windows_for_class("Foo").unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(harness.system.activations(), vec![windows[0].id.clone()]);
        assert_eq!(harness.bus.subscriber_count(), 0);

        drop(hotkey_tx);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_windows_are_cycled_without_launch() {
        let (mut dispatcher, harness) = dispatcher(None);
        let a = harness.system.spawn_window("Foo", "a");
        let b = harness.system.spawn_window("Foo", "b");
        harness.system.set_focused(Some(a.id.clone()));

        dispatcher.handle_hotkey(HotkeyEvent::new(slot(1), false)).unwrap();

        assert_eq!(dispatcher.pending_waits(), 0);
        assert_eq!(harness.system.activations(), vec![b.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_launches_even_with_windows() {
        let (dispatcher, harness) = dispatcher(None);
        harness.system.spawn_window("Foo", "existing");
        let (hotkey_tx, hotkey_rx) = mpsc::channel(8);
        tokio::spawn(dispatcher.run(hotkey_rx, harness.stop.subscribe()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        hotkey_tx.send(HotkeyEvent::new(slot(1), true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let windows = harness.system.windows_for_class("Foo").unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(harness.system.activations(), vec![windows[1].id.clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_appearing_during_launch_is_focused() {
        let system = Arc::new(DryRunWindowSystem::new());
        let launcher: Arc<dyn Launcher> = Arc::new(InstantLauncher(system.clone()));
        let (dispatcher, harness) = dispatcher_on(system, Some(launcher));
        let existing = harness.system.spawn_window("Foo", "existing");
        let (hotkey_tx, hotkey_rx) = mpsc::channel(8);
        tokio::spawn(dispatcher.run(hotkey_rx, harness.stop.subscribe()));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        hotkey_tx.send(HotkeyEvent::new(slot(1), true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let windows = harness.system.windows_for_class("Foo").unwrap();
        assert_eq!(windows.len(), 2);
        assert_ne!(windows[1].id, existing.id);
        assert_eq!(harness.system.activations(), vec![windows[1].id.clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_slot_is_rejected() {
        let (mut dispatcher, harness) = dispatcher(None);

        let err = dispatcher.handle_hotkey(HotkeyEvent::new(slot(5), false)).unwrap_err();

        assert!(matches!(err, SwitcherError::UnknownSlot(_)));
        assert_eq!(dispatcher.pending_waits(), 0);
        assert_eq!(harness.bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_cancels_wait() {
        let launcher: Arc<dyn Launcher> = Arc::new(DesktopLauncher::with_data_dirs(Vec::new()));
        let (mut dispatcher, harness) = dispatcher(Some(launcher));

        let err = dispatcher.handle_hotkey(HotkeyEvent::new(slot(1), false)).unwrap_err();

        assert!(matches!(err, SwitcherError::Launch { .. }));
        assert_eq!(dispatcher.pending_waits(), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(harness.bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_and_is_forgotten() {
        let (mut dispatcher, harness) = dispatcher(Some(Arc::new(NoopLauncher)));

        dispatcher.handle_hotkey(HotkeyEvent::new(slot(1), false)).unwrap();
        assert_eq!(dispatcher.pending_waits(), 1);

        tokio::time::sleep(Duration::from_millis(5100)).await;

        assert_eq!(dispatcher.pending_waits(), 0);
        assert_eq!(harness.bus.subscriber_count(), 0);
        assert!(harness.system.activations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_waits() {
        let (mut dispatcher, harness) = dispatcher(Some(Arc::new(NoopLauncher)));

        dispatcher.handle_hotkey(HotkeyEvent::new(slot(1), false)).unwrap();
        dispatcher.handle_hotkey(HotkeyEvent::new(slot(1), true)).unwrap();
        assert_eq!(dispatcher.pending_waits(), 2);

        dispatcher.shutdown();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(dispatcher.pending_waits(), 0);
        assert_eq!(harness.bus.subscriber_count(), 0);
    }
}
