use crate::error::{Result, SwitcherError};
use crate::events::{WindowEvent, WindowId, WindowInfo};
use crate::services::window_system::WindowSystem;
use crate::services::window_watcher::{SubscriptionRecv, WindowEventBus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

/// Ожидание появления окна заданного класса
#[derive(Clone)]
pub struct WindowWaiter {
    bus: WindowEventBus,
    system: Arc<dyn WindowSystem>,
    settle_delay: Duration,
}

impl WindowWaiter {
    pub fn new(bus: WindowEventBus, system: Arc<dyn WindowSystem>, settle_delay: Duration) -> Self {
        Self {
            bus,
            system,
            settle_delay,
        }
    }

    /// Подписка оформляется до возврата, поэтому окно, появившееся сразу
    /// после вызова, не будет пропущено. Окна этого класса, открытые до вызова,
    /// запоминаются и ожидание не завершают. Должно вызываться внутри runtime
    pub fn wait_for_window(&self, window_class: &str, timeout: Duration) -> WaitHandle {
        let mut subscription = self.bus.subscribe();
        let existing = self.existing_windows(window_class);
        let cancel = Arc::new(Notify::new());
        let cancelled = cancel.clone();
        let window_class = window_class.to_string();
        let settle_delay = self.settle_delay;

        debug!("Ожидаем окно класса {} ({}мс)", window_class, timeout.as_millis());

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let deadline = started + timeout;

            let window = loop {
                tokio::select! {
                    _ = cancelled.notified() => {
                        return Err(SwitcherError::Cancelled { window_class });
                    }
                    _ = sleep_until(deadline) => {
                        return Err(SwitcherError::Timeout {
                            window_class,
                            elapsed: started.elapsed(),
                        });
                    }
                    received = subscription.recv() => match received {
                        SubscriptionRecv::Event(WindowEvent::Created(window))
                            if window.matches_class(&window_class)
                                && !existing.contains(&window.id) => break window,
                        SubscriptionRecv::Event(_) => {}
                        SubscriptionRecv::Lagged(skipped) => {
                            warn!("Пропущено {} событий окон при ожидании {}", skipped, window_class);
                        }
                        SubscriptionRecv::Closed => {
                            return Err(SwitcherError::ServiceUnavailable(
                                "шина событий окон закрыта".to_string(),
                            ));
                        }
                    },
                }
            };

            subscription.unsubscribe();
            debug!("Появилось окно {}, пауза {}мс", window, settle_delay.as_millis());

            tokio::select! {
                _ = cancelled.notified() => Err(SwitcherError::Cancelled { window_class }),
                _ = sleep(settle_delay) => Ok(window),
            }
        });

        WaitHandle { task, cancel }
    }
}

impl WindowWaiter {
    fn existing_windows(&self, window_class: &str) -> HashSet<WindowId> {
        match self.system.list_windows() {
            Ok(windows) => windows
                .into_iter()
                .filter(|w| w.matches_class(window_class))
                .map(|w| w.id)
                .collect(),
            Err(e) => {
                warn!("Не удалось получить окна класса {} перед ожиданием: {}", window_class, e);
                HashSet::new()
            }
        }
    }
}

/// Отмена ожидания, отделённая от WaitHandle
#[derive(Clone)]
pub struct WaitCanceller {
    cancel: Arc<Notify>,
}

impl WaitCanceller {
    pub fn cancel(&self) {
        // notify_one сохраняет разрешение, даже если задача ещё не дошла до select
        self.cancel.notify_one();
    }
}

pub struct WaitHandle {
    task: JoinHandle<Result<WindowInfo>>,
    cancel: Arc<Notify>,
}

impl WaitHandle {
    pub fn canceller(&self) -> WaitCanceller {
        WaitCanceller {
            cancel: self.cancel.clone(),
        }
    }

    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    /// Ровно один результат: окно, таймаут или отмена
    pub async fn result(self) -> Result<WindowInfo> {
        self.task
            .await
            .map_err(|e| SwitcherError::Internal(format!("задача ожидания окна упала: {}", e)))?
    }
}
