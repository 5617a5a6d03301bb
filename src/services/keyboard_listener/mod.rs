mod dry_keyboard_listener;
mod hotkey_matcher;
mod keyboard_listener;
mod modifier_state;
mod r#trait;

pub use self::hotkey_matcher::{HotkeyMatcher, KeyAction};
pub use self::r#trait::{create_keyboard_listener, KeyboardListenerTrait};
