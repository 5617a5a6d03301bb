pub mod cycler;
pub mod dispatcher;
pub mod highlighter;
pub mod keyboard_listener;
pub mod keycode_map;
pub mod launcher;
pub mod virtual_device;
pub mod window_system;
pub mod window_waiter;
pub mod window_watcher;

pub use cycler::{EngineState, SlotCycler};
pub use dispatcher::Dispatcher;
pub use highlighter::Highlighter;
pub use keyboard_listener::create_keyboard_listener;
pub use launcher::{DesktopLauncher, DryRunLauncher, Launcher};
pub use virtual_device::VirtualDevice;
pub use window_system::{create_window_system, DryRunWindowSystem, WindowSystem};
pub use window_waiter::WindowWaiter;
pub use window_watcher::{WindowEventBus, WindowWatcher};
