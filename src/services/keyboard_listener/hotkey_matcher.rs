use crate::config::Config;
use crate::events::{HotkeyEvent, KeyCode, KeyEvent, KeyState, Modifiers, SlotId};
use crate::services::keycode_map::KeycodeMap;
use std::collections::HashSet;

/// Что сделать с событием клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    PassThrough,
    Swallow,
    Hotkey(HotkeyEvent),
}

/// Распознаёт `модификаторы + цифра` и `модификаторы + force + цифра`.
/// Набор модификаторов должен совпадать точно
pub struct HotkeyMatcher {
    slot_modifiers: Modifiers,
    force_modifiers: Modifiers,
    configured: HashSet<SlotId>,
    // Клавиши, нажатие которых перехвачено: их повтор и отпускание тоже не пропускаем
    swallowed: HashSet<KeyCode>,
}

impl HotkeyMatcher {
    pub fn new(config: &Config) -> Self {
        Self {
            slot_modifiers: config.slot_modifiers(),
            force_modifiers: config.force_modifiers(),
            configured: config.configured_slots().map(|slot| slot.id).collect(),
            swallowed: HashSet::new(),
        }
    }

    pub fn process(&mut self, event: &KeyEvent) -> KeyAction {
        match event.state {
            KeyState::Pressed => self.on_press(event),
            KeyState::Repeat if self.swallowed.contains(&event.key_code) => KeyAction::Swallow,
            KeyState::Released if self.swallowed.remove(&event.key_code) => KeyAction::Swallow,
            _ => KeyAction::PassThrough,
        }
    }

    fn on_press(&mut self, event: &KeyEvent) -> KeyAction {
        let Some(slot) = KeycodeMap::slot_for_key(event.key_code) else {
            return KeyAction::PassThrough;
        };
        if !self.configured.contains(&slot) {
            return KeyAction::PassThrough;
        }

        let force = if event.modifiers == self.force_modifiers {
            true
        } else if event.modifiers == self.slot_modifiers {
            false
        } else {
            return KeyAction::PassThrough;
        };

        self.swallowed.insert(event.key_code);
        KeyAction::Hotkey(HotkeyEvent::new(slot, force))
    }
}
