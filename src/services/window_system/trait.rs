use crate::error::Result;
use crate::events::{WindowId, WindowInfo};

/// Trait for querying windows from the host window system.
/// Implementations are stateless: every call asks the host again.
pub trait WindowSource: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Check that the backend works in the current session
    fn probe(&self) -> Result<()>;

    /// All managed top-level windows, in host enumeration order
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// The window that currently has keyboard focus, if any
    fn focused_window(&self) -> Result<Option<WindowId>>;

    /// Normal windows of the given class on the active workspace, in host order
    fn windows_for_class(&self, window_class: &str) -> Result<Vec<WindowInfo>> {
        Ok(self
            .list_windows()?
            .into_iter()
            .filter(|w| w.on_active_workspace && w.matches_class(window_class))
            .collect())
    }
}

/// Trait for window side effects.
pub trait WindowActuator: Send + Sync {
    /// Bring the window to the foreground and give it keyboard focus
    fn activate(&self, window: &WindowInfo) -> Result<()>;

    /// Toggle the attention hint used as a transient highlight.
    /// Backends without such a hint do nothing.
    fn set_attention(&self, _window: &WindowInfo, _on: bool) -> Result<()> {
        Ok(())
    }
}

/// A full window system backend: queries and side effects.
pub trait WindowSystem: WindowSource + WindowActuator {}

impl<T: WindowSource + WindowActuator> WindowSystem for T {}
