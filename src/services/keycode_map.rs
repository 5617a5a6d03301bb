use crate::events::{KeyCode, SlotId};
use evdev::KeyCode as EvdevKey;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Соответствие цифр верхнего ряда и слотов
pub struct KeycodeMap;

static DIGIT_KEYS: Lazy<HashMap<u16, SlotId>> = Lazy::new(|| {
    let keys = [
        (EvdevKey::KEY_0, 0),
        (EvdevKey::KEY_1, 1),
        (EvdevKey::KEY_2, 2),
        (EvdevKey::KEY_3, 3),
        (EvdevKey::KEY_4, 4),
        (EvdevKey::KEY_5, 5),
        (EvdevKey::KEY_6, 6),
        (EvdevKey::KEY_7, 7),
        (EvdevKey::KEY_8, 8),
        (EvdevKey::KEY_9, 9),
    ];

    keys.into_iter()
        .filter_map(|(key, digit)| SlotId::new(digit).map(|slot| (key.code(), slot)))
        .collect()
});

static SLOT_KEYS: Lazy<HashMap<SlotId, u16>> =
    Lazy::new(|| DIGIT_KEYS.iter().map(|(&code, &slot)| (slot, code)).collect());

impl KeycodeMap {
    pub fn slot_for_key(key: KeyCode) -> Option<SlotId> {
        DIGIT_KEYS.get(&key.value()).copied()
    }

    pub fn key_for_slot(slot: SlotId) -> Option<KeyCode> {
        SLOT_KEYS.get(&slot).copied().map(KeyCode::new)
    }

    pub fn is_modifier(key: KeyCode) -> bool {
        matches!(
            EvdevKey::new(key.value()),
            EvdevKey::KEY_LEFTCTRL
                | EvdevKey::KEY_RIGHTCTRL
                | EvdevKey::KEY_LEFTALT
                | EvdevKey::KEY_RIGHTALT
                | EvdevKey::KEY_LEFTSHIFT
                | EvdevKey::KEY_RIGHTSHIFT
                | EvdevKey::KEY_LEFTMETA
                | EvdevKey::KEY_RIGHTMETA
        )
    }
}
