use crate::events::{KeyState, Modifiers};
use evdev::KeyCode;

/// Удерживаемые модификаторы. Левая и правая клавиши учитываются отдельно,
/// чтобы отпускание одной не сбрасывало модификатор, пока зажата другая
#[derive(Debug, Default)]
pub struct ModifierState {
    ctrl: [bool; 2],
    alt: [bool; 2],
    shift: [bool; 2],
    super_key: [bool; 2],
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_modifiers(&self) -> Modifiers {
        Modifiers {
            ctrl: self.ctrl.contains(&true),
            alt: self.alt.contains(&true),
            shift: self.shift.contains(&true),
            super_key: self.super_key.contains(&true),
        }
    }

    pub fn update_key(&mut self, key: KeyCode, state: KeyState) {
        let held = state != KeyState::Released;
        let slot = match key {
            KeyCode::KEY_LEFTCTRL => &mut self.ctrl[0],
            KeyCode::KEY_RIGHTCTRL => &mut self.ctrl[1],
            KeyCode::KEY_LEFTALT => &mut self.alt[0],
            KeyCode::KEY_RIGHTALT => &mut self.alt[1],
            KeyCode::KEY_LEFTSHIFT => &mut self.shift[0],
            KeyCode::KEY_RIGHTSHIFT => &mut self.shift[1],
            KeyCode::KEY_LEFTMETA => &mut self.super_key[0],
            KeyCode::KEY_RIGHTMETA => &mut self.super_key[1],
            _ => return,
        };
        *slot = held;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mut state = ModifierState::new();
        state.update_key(KeyCode::KEY_LEFTMETA, KeyState::Pressed);
        state.update_key(KeyCode::KEY_LEFTSHIFT, KeyState::Pressed);
        assert_eq!(state.to_modifiers(), Modifiers::new().with_super(true).with_shift(true));

        state.update_key(KeyCode::KEY_LEFTSHIFT, KeyState::Released);
        assert_eq!(state.to_modifiers(), Modifiers::new().with_super(true));
    }

    #[test]
    fn test_repeat_keeps_modifier_held() {
        let mut state = ModifierState::new();
        state.update_key(KeyCode::KEY_LEFTCTRL, KeyState::Pressed);
        state.update_key(KeyCode::KEY_LEFTCTRL, KeyState::Repeat);
        assert!(state.to_modifiers().ctrl);
    }

    #[test]
    fn test_both_sides_tracked_separately() {
        let mut state = ModifierState::new();
        state.update_key(KeyCode::KEY_LEFTMETA, KeyState::Pressed);
        state.update_key(KeyCode::KEY_RIGHTMETA, KeyState::Pressed);
        state.update_key(KeyCode::KEY_LEFTMETA, KeyState::Released);
        assert!(state.to_modifiers().super_key);

        state.update_key(KeyCode::KEY_A, KeyState::Pressed);
        state.update_key(KeyCode::KEY_RIGHTMETA, KeyState::Released);
        assert!(state.to_modifiers().is_empty());
    }
}
