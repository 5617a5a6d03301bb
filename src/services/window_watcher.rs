use crate::error::Result;
use crate::events::{WindowEvent, WindowId, WindowInfo};
use crate::services::window_system::WindowSystem;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const BUS_CAPACITY: usize = 64;

/// Шина событий жизненного цикла окон
#[derive(Clone)]
pub struct WindowEventBus {
    sender: broadcast::Sender<WindowEvent>,
    subscribed: Arc<Notify>,
}

impl WindowEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            sender,
            subscribed: Arc::new(Notify::new()),
        }
    }

    /// Подписка активна, пока жив возвращённый guard. Будит простаивающий WindowWatcher
    pub fn subscribe(&self) -> WindowSubscription {
        let receiver = self.sender.subscribe();
        self.subscribed.notify_one();
        WindowSubscription { receiver }
    }

    async fn wait_for_subscriber(&self) {
        self.subscribed.notified().await;
    }

    /// Количество доставленных получателей (0, если никто не подписан)
    pub fn publish(&self, event: WindowEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WindowEventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub enum SubscriptionRecv {
    Event(WindowEvent),
    Lagged(u64),
    Closed,
}

/// Подписка на шину окон. Отписка происходит при drop
pub struct WindowSubscription {
    receiver: broadcast::Receiver<WindowEvent>,
}

impl WindowSubscription {
    pub async fn recv(&mut self) -> SubscriptionRecv {
        match self.receiver.recv().await {
            Ok(event) => SubscriptionRecv::Event(event),
            Err(RecvError::Lagged(skipped)) => SubscriptionRecv::Lagged(skipped),
            Err(RecvError::Closed) => SubscriptionRecv::Closed,
        }
    }

    pub fn unsubscribe(self) {}
}

/// Опрос оконной системы и публикация Created/Destroyed по разнице снимков.
/// Опрос идёт только пока на шине есть подписчики: без них watcher спит до
/// следующей подписки и начинает с нового начального снимка
pub struct WindowWatcher {
    source: Arc<dyn WindowSystem>,
    bus: WindowEventBus,
    polling_interval: Duration,
    known: HashSet<WindowId>,
    seeded: bool,
}

impl WindowWatcher {
    pub fn new(source: Arc<dyn WindowSystem>, bus: WindowEventBus, polling_interval: Duration) -> Self {
        info!("Инициализация WindowWatcher ({}мс)", polling_interval.as_millis());
        Self {
            source,
            bus,
            polling_interval,
            known: HashSet::new(),
            seeded: false,
        }
    }

    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = interval(self.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.bus.subscriber_count() == 0 {
                self.go_idle();
                tokio::select! {
                    _ = self.bus.wait_for_subscriber() => {}
                    _ = stop.changed() => break,
                }
            } else {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }
            }

            // Подписчик мог уйти, пока мы ждали
            if self.bus.subscriber_count() == 0 {
                continue;
            }

            self.poll().await;
            ticker.reset();
        }

        info!("WindowWatcher остановлен");
        Ok(())
    }

    async fn poll(&mut self) {
        let source = self.source.clone();
        match tokio::task::spawn_blocking(move || source.list_windows()).await {
            Ok(Ok(windows)) => {
                self.apply_snapshot(windows);
            }
            Ok(Err(e)) => warn!("Не удалось получить список окон: {}", e),
            Err(e) => warn!("Задача опроса окон завершилась аварийно: {}", e),
        }
    }

    fn go_idle(&mut self) {
        if self.seeded {
            debug!("WindowWatcher: подписчиков нет, опрос приостановлен");
            self.seeded = false;
            self.known.clear();
        }
    }

    /// Сравнить снимок с предыдущим. Начальный снимок после простоя
    /// публикуется целиком как Created: окна, появившиеся между подпиской
    /// и первым опросом, иначе потерялись бы. Подписчики сами отсекают окна,
    /// существовавшие до подписки
    fn apply_snapshot(&mut self, windows: Vec<WindowInfo>) -> Vec<WindowEvent> {
        let current: HashSet<WindowId> = windows.iter().map(|w| w.id.clone()).collect();
        let mut events = Vec::new();

        if !self.seeded {
            debug!("WindowWatcher: начальный снимок из {} окон", current.len());
        }

        for window in windows.into_iter().filter(|w| !self.known.contains(&w.id)) {
            events.push(WindowEvent::Created(window));
        }
        for id in self.known.iter().filter(|id| !current.contains(*id)) {
            events.push(WindowEvent::Destroyed(id.clone()));
        }

        self.seeded = true;
        self.known = current;

        for event in &events {
            debug!("Событие окна: {}", event);
            self.bus.publish(event.clone());
        }
        events
    }
}
