use crate::config::Config;
use crate::error::Result;
use crate::events::{HotkeyEvent, SlotId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::r#trait::KeyboardListenerTrait;

/// Dry-run: горячие клавиши вводятся строками в stdin (`3` или `3!` для нового экземпляра)
pub struct DryRunKeyboardListener {
    config: Arc<Config>,
    hotkey_tx: mpsc::Sender<HotkeyEvent>,
    stop: Arc<AtomicBool>,
}

impl DryRunKeyboardListener {
    pub fn new(config: Arc<Config>, hotkey_tx: mpsc::Sender<HotkeyEvent>, stop: Arc<AtomicBool>) -> Self {
        info!("Инициализация DryRunKeyboardListener");
        Self {
            config,
            hotkey_tx,
            stop,
        }
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим: введите номер слота (0-9), с '!' для нового экземпляра");
        for slot in self.config.configured_slots() {
            info!("  {} -> {} ({})", slot.id, slot.name, slot.wm_class);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while !self.stop.load(Ordering::Relaxed) {
            let Some(line) = lines.next_line().await? else {
                info!("stdin закрыт, DryRunKeyboardListener остановлен");
                break;
            };

            let Some(hotkey) = parse_command(&line) else {
                if !line.trim().is_empty() {
                    warn!("Непонятная команда '{}'", line.trim());
                }
                continue;
            };

            debug!("Dry-run: {}", hotkey);
            if self.hotkey_tx.send(hotkey).await.is_err() {
                break;
            }
        }

        Ok(())
    }
}

fn parse_command(line: &str) -> Option<HotkeyEvent> {
    let line = line.trim();
    let (digit, force) = match line.strip_suffix('!') {
        Some(digit) => (digit.trim(), true),
        None => (line, false),
    };
    SlotId::parse(digit).map(|slot| HotkeyEvent::new(slot, force))
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for DryRunKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
