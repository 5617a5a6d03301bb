pub mod keyboard;
pub mod window;

pub use keyboard::{KeyCode, KeyEvent, KeyState, Modifiers};
pub use window::{WindowEvent, WindowGeometry, WindowId, WindowInfo, WindowType};

use std::fmt;

/// Номер слота горячей клавиши: одна цифра `0`-`9`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    /// Порядок слотов на клавиатуре: 1-9, затем 0
    pub const KEYBOARD_ORDER: [SlotId; 10] = [
        SlotId(1),
        SlotId(2),
        SlotId(3),
        SlotId(4),
        SlotId(5),
        SlotId(6),
        SlotId(7),
        SlotId(8),
        SlotId(9),
        SlotId(0),
    ];

    pub fn new(digit: u8) -> Option<Self> {
        (digit <= 9).then_some(Self(digit))
    }

    /// Разобрать идентификатор слота из строки вида "7"
    pub fn parse(value: &str) -> Option<Self> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_digit(10).and_then(|d| Self::new(d as u8)),
            _ => None,
        }
    }

    pub fn digit(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Срабатывание горячей клавиши слота
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyEvent {
    pub slot: SlotId,
    /// Принудительно запустить новый экземпляр приложения
    pub force: bool,
    pub timestamp: std::time::Instant,
}

impl HotkeyEvent {
    pub fn new(slot: SlotId, force: bool) -> Self {
        Self {
            slot,
            force,
            timestamp: std::time::Instant::now(),
        }
    }
}

impl fmt::Display for HotkeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.force {
            write!(f, "slot {} (force)", self.slot)
        } else {
            write!(f, "slot {}", self.slot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_parse() {
        assert_eq!(SlotId::parse("0"), SlotId::new(0));
        assert_eq!(SlotId::parse("9").map(|s| s.digit()), Some(9));
        assert!(SlotId::parse("10").is_none());
        assert!(SlotId::parse("a").is_none());
        assert!(SlotId::parse("").is_none());
        assert!(SlotId::new(10).is_none());
    }

    #[test]
    fn test_keyboard_order_ends_with_zero() {
        assert_eq!(SlotId::KEYBOARD_ORDER.first().map(|s| s.digit()), Some(1));
        assert_eq!(SlotId::KEYBOARD_ORDER.last().map(|s| s.digit()), Some(0));
    }

    #[test]
    fn test_hotkey_event_display() {
        let slot = SlotId::parse("3").unwrap();
        assert_eq!(HotkeyEvent::new(slot, false).to_string(), "slot 3");
        assert_eq!(HotkeyEvent::new(slot, true).to_string(), "slot 3 (force)");
    }
}
