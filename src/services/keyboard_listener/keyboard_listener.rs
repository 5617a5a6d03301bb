use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::{Result, SwitcherError};
use crate::events::{HotkeyEvent, KeyCode, KeyEvent, KeyState};
use crate::services::keycode_map::KeycodeMap;
use crate::services::VirtualDevice;
use crate::utils::DeviceFinder;
use crate::wks_error;
use evdev::{Device, EventType, InputEvent};
use std::io::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::hotkey_matcher::{HotkeyMatcher, KeyAction};
use super::modifier_state::ModifierState;
use super::r#trait::KeyboardListenerTrait;

pub struct RealKeyboardListener {
    device: Device,
    virtual_device: VirtualDevice,
    modifier_state: ModifierState,
    matcher: HotkeyMatcher,
    hotkey_tx: mpsc::Sender<HotkeyEvent>,
    stop: Arc<AtomicBool>,
}

impl RealKeyboardListener {
    pub fn new(
        config: Arc<Config>,
        hotkey_tx: mpsc::Sender<HotkeyEvent>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        info!("Инициализация RealKeyboardListener");

        let virtual_device = VirtualDevice::new("Window Key Switcher Virtual Keyboard")?;

        let device_path = DeviceFinder::find_keyboard_device(&config.hotkeys.device_path)?;
        let mut device = Device::open(&device_path).map_err(|e| {
            wks_error!(device_not_found, "Не удалось открыть устройство {:?}: {}", device_path, e)
        })?;

        if let Err(e) = device.grab() {
            Self::log_grab_error(&device_path, &e);
            return Err(SwitcherError::Permission(format!(
                "Не удалось захватить устройство эксклюзивно: {}",
                e
            )));
        }
        info!(
            "Устройство {} ({:?}) захвачено эксклюзивно",
            device.name().unwrap_or("Unknown"),
            device_path
        );

        Ok(Self {
            device,
            virtual_device,
            modifier_state: ModifierState::new(),
            matcher: HotkeyMatcher::new(&config),
            hotkey_tx,
            stop,
        })
    }

    /// Чтение evdev блокирующее, поэтому слушатель живёт в своём потоке
    async fn run_impl(self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("keyboard-listener".to_string())
            .spawn(move || {
                let mut listener = self;
                let _ = done_tx.send(listener.event_loop());
            })?;

        done_rx
            .await
            .map_err(|_| wks_error!(internal, "Поток клавиатуры завершился аварийно"))?
    }

    fn event_loop(&mut self) -> Result<()> {
        info!("RealKeyboardListener запущен, начинаем чтение событий");

        while !self.stop.load(Ordering::Relaxed) {
            let events: Vec<InputEvent> = match self.device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) => {
                    error!("Ошибка чтения событий: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                    continue;
                }
            };

            for event in events {
                if let Err(e) = self.handle_event(event) {
                    error!("Ошибка обработки события: {}", e);
                }
            }
        }

        info!("RealKeyboardListener остановлен");
        Ok(())
    }

    fn handle_event(&mut self, event: InputEvent) -> Result<()> {
        // SYN и MSC не пробрасываем: виртуальное устройство синхронизирует каждую клавишу само
        if event.event_type() != EventType::KEY {
            return Ok(());
        }

        let Some(state) = KeyState::from_value(event.value()) else {
            return Ok(());
        };

        let key_code = KeyCode::new(event.code());
        if KeycodeMap::is_modifier(key_code) {
            self.modifier_state
                .update_key(evdev::KeyCode::new(event.code()), state);
        }
        let key_event = KeyEvent::new(
            key_code,
            state,
            self.modifier_state.to_modifiers(),
        );
        debug_if_enabled!("Событие клавиши: {}", key_event);

        match self.matcher.process(&key_event) {
            KeyAction::PassThrough => self.virtual_device.emit(key_event.key_code, state),
            KeyAction::Swallow => Ok(()),
            KeyAction::Hotkey(hotkey) => {
                info!("Горячая клавиша: {}", hotkey);
                if self.hotkey_tx.blocking_send(hotkey).is_err() {
                    warn!("Канал горячих клавиш закрыт, останавливаем слушатель");
                    self.stop.store(true, Ordering::Relaxed);
                }
                Ok(())
            }
        }
    }

    fn log_grab_error(device_path: &Path, e: &Error) {
        warn!("Не удалось захватить устройство {}: {}", device_path.display(), e);
        warn!("Добавьте пользователя в группу input: sudo usermod -a -G input $USER");
        warn!("и перезайдите в систему");
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for RealKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

impl Drop for RealKeyboardListener {
    fn drop(&mut self) {
        info!("Освобождение захваченного устройства");
        if let Err(e) = self.device.ungrab() {
            error!("Не удалось освободить устройство: {}", e);
        }
    }
}
