use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::{Modifiers, SlotId};

const CONFIG_RELATIVE_PATH: &str = "window-key-switcher/config.toml";
const ALLOWED_MODIFIERS: [&str; 4] = ["ctrl", "alt", "shift", "super"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub slots: BTreeMap<String, SlotConfig>,
    // Проверенная таблица слотов - не сериализуется, строится после загрузки
    #[serde(skip)]
    slot_index: BTreeMap<SlotId, Slot>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: "wks_rust=info".to_string(),
        }
    }
}

/// Область действия таймера быстрого переключения
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickSwitchScope {
    /// Один таймер на все слоты
    #[default]
    Global,
    /// Свой таймер у каждого слота
    Slot,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub quick_switch_timeout_ms: u64,
    pub quick_switch_scope: QuickSwitchScope,
    pub window_wait_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub visual_indicator: VisualIndicatorConfig,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            quick_switch_timeout_ms: 2000,
            quick_switch_scope: QuickSwitchScope::Global,
            window_wait_timeout_ms: 5000,
            settle_delay_ms: 100,
            visual_indicator: VisualIndicatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisualIndicatorConfig {
    pub enabled: bool,
    pub duration_ms: u64,
}

impl Default for VisualIndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub device_path: String,
    pub modifiers: Vec<String>,
    pub force_modifier: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            device_path: "auto".to_string(),
            modifiers: vec!["super".to_string()],
            force_modifier: "shift".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Auto,
    Wmctrl,
    Xdotool,
    Kdotool,
    Sway,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub backend: BackendKind,
    pub polling_interval_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            polling_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SlotConfig {
    pub name: String,
    pub wm_class: String,
    pub launcher: String,
}

/// Настроенный слот: неизменяем после загрузки конфигурации
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    pub wm_class: String,
    pub launcher: String,
}

impl Config {
    /// Путь по умолчанию: ~/.config/window-key-switcher/config.toml
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_RELATIVE_PATH)
    }

    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("WKS_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.build_slot_index();

        Ok(config)
    }

    /// Строит таблицу слотов для быстрого поиска по номеру
    pub fn build_slot_index(&mut self) {
        self.slot_index = self
            .slots
            .iter()
            .filter_map(|(key, slot)| {
                SlotId::parse(key).map(|id| {
                    (
                        id,
                        Slot {
                            id,
                            name: slot.name.clone(),
                            wm_class: slot.wm_class.clone(),
                            launcher: slot.launcher.clone(),
                        },
                    )
                })
            })
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация таймеров
        if self.settings.quick_switch_timeout_ms == 0 {
            anyhow::bail!("settings.quick_switch_timeout_ms должно быть больше 0");
        }

        if self.settings.window_wait_timeout_ms == 0 {
            anyhow::bail!("settings.window_wait_timeout_ms должно быть больше 0");
        }

        if self.settings.visual_indicator.duration_ms == 0 {
            anyhow::bail!("settings.visual_indicator.duration_ms должно быть больше 0");
        }

        if self.window.polling_interval_ms < 50 {
            anyhow::bail!("window.polling_interval_ms должно быть минимум 50");
        }

        // Валидация горячих клавиш
        if self.hotkeys.device_path.is_empty() {
            anyhow::bail!("hotkeys.device_path не может быть пустым (используйте \"auto\")");
        }

        for modifier in &self.hotkeys.modifiers {
            if !ALLOWED_MODIFIERS.contains(&modifier.as_str()) {
                anyhow::bail!("Неверный модификатор '{}' в hotkeys.modifiers", modifier);
            }
        }

        if !ALLOWED_MODIFIERS.contains(&self.hotkeys.force_modifier.as_str()) {
            anyhow::bail!(
                "Неверный модификатор '{}' в hotkeys.force_modifier",
                self.hotkeys.force_modifier
            );
        }

        if self.hotkeys.modifiers.contains(&self.hotkeys.force_modifier) {
            anyhow::bail!(
                "hotkeys.force_modifier '{}' уже входит в hotkeys.modifiers",
                self.hotkeys.force_modifier
            );
        }

        // Валидация слотов
        for (key, slot) in &self.slots {
            if SlotId::parse(key).is_none() {
                anyhow::bail!("Номер слота должен быть цифрой 0-9: slots.{}", key);
            }

            if slot.name.trim().is_empty() {
                anyhow::bail!("Не указано имя в slots.{}.name", key);
            }

            if slot.wm_class.is_empty() {
                anyhow::bail!("Не указан класс окна в slots.{}.wm_class", key);
            }

            if slot.launcher.is_empty() {
                anyhow::bail!("Не указан запускатель в slots.{}.launcher", key);
            }

            if !slot.launcher.ends_with(".desktop") {
                anyhow::bail!(
                    "Запускатель должен быть .desktop файлом: slots.{}.launcher = {}",
                    key,
                    slot.launcher
                );
            }
        }

        Ok(())
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slot_index.get(&id)
    }

    /// Настроенные слоты в порядке клавиатуры (1-9, 0)
    pub fn configured_slots(&self) -> impl Iterator<Item = &Slot> {
        SlotId::KEYBOARD_ORDER
            .iter()
            .filter_map(move |id| self.slot_index.get(id))
    }

    pub fn quick_switch_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.quick_switch_timeout_ms)
    }

    pub fn window_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.window_wait_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settings.settle_delay_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.window.polling_interval_ms)
    }

    /// Модификаторы обычной горячей клавиши слота
    pub fn slot_modifiers(&self) -> Modifiers {
        Modifiers::from_vec(&self.hotkeys.modifiers)
    }

    /// Модификаторы горячей клавиши принудительного запуска
    pub fn force_modifiers(&self) -> Modifiers {
        self.slot_modifiers().with_named(&self.hotkeys.force_modifier)
    }
}

#[cfg(test)]
impl Config {
    pub fn with_slot(mut self, key: &str, name: &str, wm_class: &str, launcher: &str) -> Self {
        self.slots.insert(
            key.to_string(),
            SlotConfig {
                name: name.to_string(),
                wm_class: wm_class.to_string(),
                launcher: launcher.to_string(),
            },
        );
        self.build_slot_index();
        self
    }
}
