use crate::config::Config;
use crate::error::Result;
use crate::events::HotkeyEvent;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Trait for hotkey sources that can run in different modes
#[async_trait::async_trait]
pub trait KeyboardListenerTrait {
    /// Run until the stop flag is raised or the hotkey channel closes
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate keyboard listener based on the dry_run flag
pub fn create_keyboard_listener(
    config: Arc<Config>,
    hotkey_tx: mpsc::Sender<HotkeyEvent>,
    stop: Arc<AtomicBool>,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            config, hotkey_tx, stop,
        )))
    } else {
        Ok(Box::new(super::keyboard_listener::RealKeyboardListener::new(
            config, hotkey_tx, stop,
        )?))
    }
}
