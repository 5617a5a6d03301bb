use crate::error::Result;
use crate::events::{WindowGeometry, WindowId, WindowInfo};
use std::process::Command;
use tracing::debug;

use super::{command_stdout, x11_window_type};
use super::r#trait::{WindowActuator, WindowSource};

const BACKEND: &str = "wmctrl";

/// EWMH-бэкенд для X11: wmctrl + xprop
pub struct WmctrlBackend;

impl WmctrlBackend {
    pub fn new() -> Self {
        Self
    }

    fn wmctrl(args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("wmctrl");
        cmd.args(args);
        command_stdout(BACKEND, cmd)
    }

    fn current_desktop(&self) -> Result<Option<i64>> {
        let stdout = Self::wmctrl(&["-d"])?;
        Ok(parse_current_desktop(&stdout))
    }
}

impl WindowSource for WmctrlBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn probe(&self) -> Result<()> {
        Self::wmctrl(&["-m"]).map(|_| ())
    }

    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let current_desktop = self.current_desktop()?;
        let stdout = Self::wmctrl(&["-l", "-x", "-p", "-G"])?;

        let windows: Vec<WindowInfo> = stdout
            .lines()
            .filter_map(|line| parse_window_line(line, current_desktop))
            .map(|window| {
                let window_type = x11_window_type(BACKEND, window.id.as_str());
                window.with_type(window_type)
            })
            .collect();

        debug!("wmctrl: найдено {} окон (рабочий стол {:?})", windows.len(), current_desktop);
        Ok(windows)
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        let mut cmd = Command::new("xprop");
        cmd.args(["-root", "_NET_ACTIVE_WINDOW"]);
        let stdout = command_stdout(BACKEND, cmd)?;
        Ok(parse_active_window(&stdout))
    }
}

impl WindowActuator for WmctrlBackend {
    fn activate(&self, window: &WindowInfo) -> Result<()> {
        Self::wmctrl(&["-i", "-a", window.id.as_str()]).map(|_| ())
    }

    fn set_attention(&self, window: &WindowInfo, on: bool) -> Result<()> {
        let action = if on {
            "add,demands_attention"
        } else {
            "remove,demands_attention"
        };
        Self::wmctrl(&["-i", "-r", window.id.as_str(), "-b", action]).map(|_| ())
    }
}

/// Строка `wmctrl -d`, отмеченная `*`, - текущий рабочий стол
fn parse_current_desktop(stdout: &str) -> Option<i64> {
    stdout.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let index = parts.next()?;
        match parts.next() {
            Some("*") => index.parse().ok(),
            _ => None,
        }
    })
}

/// Разбор строки `wmctrl -lxpG`:
/// `<id> <desktop> <pid> <x> <y> <w> <h> <instance.Class> <host> <title...>`
fn parse_window_line(line: &str, current_desktop: Option<i64>) -> Option<WindowInfo> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 {
        return None;
    }

    let id = WindowId::from_x11(parts[0])?;
    let desktop: i64 = parts[1].parse().ok()?;
    let pid: u32 = parts[2].parse().ok()?;
    let geometry = WindowGeometry {
        x: parts[3].parse().ok()?,
        y: parts[4].parse().ok()?,
        width: parts[5].parse().ok()?,
        height: parts[6].parse().ok()?,
    };
    let class = split_wm_class(parts[7]);
    let title = parts[9..].join(" ");

    // -1 - окно "на всех рабочих столах"
    let on_active_workspace = desktop == -1 || current_desktop.map_or(true, |d| d == desktop);

    let mut window = WindowInfo::new(id)
        .with_class(class)
        .with_title(title)
        .with_active_workspace(on_active_workspace)
        .with_geometry(geometry);
    if pid != 0 {
        window = window.with_pid(pid);
    }
    Some(window)
}

/// wmctrl печатает WM_CLASS как `instance.Class`, и обе части могут содержать точки.
/// Если половины совпадают без учета регистра - берём вторую, иначе всё после последней точки
fn split_wm_class(raw: &str) -> String {
    let dots: Vec<usize> = raw.match_indices('.').map(|(i, _)| i).collect();

    for &i in &dots {
        let (instance, class) = (&raw[..i], &raw[i + 1..]);
        if instance.eq_ignore_ascii_case(class) {
            return class.to_string();
        }
    }

    match dots.last() {
        Some(&i) => raw[i + 1..].to_string(),
        None => raw.to_string(),
    }
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007`
fn parse_active_window(stdout: &str) -> Option<WindowId> {
    let raw = stdout.rsplit('#').next()?.trim();
    let raw = raw.split(',').next()?.trim();
    let id = WindowId::from_x11(raw)?;
    (id != WindowId::new("0x00000000")).then_some(id)
}
