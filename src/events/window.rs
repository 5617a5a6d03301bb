use serde::{Deserialize, Serialize};
use std::fmt;

/// Непрозрачный идентификатор окна, выданный оконной системой
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// X11 идентификаторы приходят в разных формах ("0x3a00007", "0x03a00007", "60817415"),
    /// приводим их к одному виду
    pub fn from_x11(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let value = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok()?,
            None => raw.parse::<u64>().ok()?,
        };
        Some(Self(format!("0x{:08x}", value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Тип окна. Слоты работают только с обычными окнами приложений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    Normal,
    Other,
}

/// Геометрия окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Информация об окне
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub class: String,
    pub window_type: WindowType,
    pub on_active_workspace: bool,
    pub pid: Option<u32>,
    pub geometry: Option<WindowGeometry>,
}

impl WindowInfo {
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            title: String::new(),
            class: String::new(),
            window_type: WindowType::Normal,
            on_active_workspace: true,
            pid: None,
            geometry: None,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    pub fn with_active_workspace(mut self, on_active_workspace: bool) -> Self {
        self.on_active_workspace = on_active_workspace;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Окно относится к классу: обычное окно с точным совпадением класса.
    /// Пустой класс не совпадает ни с чем
    pub fn matches_class(&self, window_class: &str) -> bool {
        !window_class.is_empty()
            && self.window_type == WindowType::Normal
            && self.class == window_class
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "{} \"{}\"", self.id, self.title)
        } else {
            write!(f, "{} \"{}\" ({})", self.id, self.title, self.class)
        }
    }
}

/// Событие жизненного цикла окна
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Created(WindowInfo),
    Destroyed(WindowId),
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowEvent::Created(window) => write!(f, "Created: {}", window),
            WindowEvent::Destroyed(id) => write!(f, "Destroyed: {}", id),
        }
    }
}
