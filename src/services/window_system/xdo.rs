use crate::error::Result;
use crate::events::{WindowId, WindowInfo, WindowType};
use std::collections::HashMap;
use std::process::Command;
use tracing::debug;

use super::{command_stdout, x11_window_type};
use super::r#trait::{WindowActuator, WindowSource};

/// Утилиты с xdotool-совместимым интерфейсом
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XdoProgram {
    /// X11
    Xdotool,
    /// KWin (X11 и Wayland) через скрипты KWin по DBus
    Kdotool,
}

impl XdoProgram {
    fn binary(&self) -> &'static str {
        match self {
            XdoProgram::Xdotool => "xdotool",
            XdoProgram::Kdotool => "kdotool",
        }
    }
}

/// Под sudo kdotool должен ходить в сессионную шину пользователя, а не root
fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = Command::new("id").args(["-u", &sudo_user]).output() {
                if let Ok(uid_str) = String::from_utf8(output.stdout) {
                    let runtime_dir = format!("/run/user/{}", uid_str.trim());

                    debug!("kdotool: окружение пользователя {} ({})", sudo_user, runtime_dir);
                    env_vars.insert(
                        "DBUS_SESSION_BUS_ADDRESS".to_string(),
                        format!("unix:path={}/bus", runtime_dir),
                    );
                    env_vars.insert("XDG_RUNTIME_DIR".to_string(), runtime_dir);
                    env_vars.insert("USER".to_string(), sudo_user);
                }
            }
        }
    }

    if let Ok(display) = std::env::var("DISPLAY") {
        env_vars.insert("DISPLAY".to_string(), display);
    }

    env_vars
}

// Свёрнутые окна не отображены, но остаются окнами слота, поэтому без --onlyvisible
const SEARCH_ALL_WINDOWS: [&str; 3] = ["search", "--class", "."];

/// Бэкенд поверх xdotool / kdotool. Идентификаторы окон передаются как есть
pub struct XdoBackend {
    program: XdoProgram,
}

impl XdoBackend {
    pub fn new(program: XdoProgram) -> Self {
        Self { program }
    }

    fn command(&self, args: &[&str]) -> Command {
        let binary = self.program.binary();

        let mut cmd = match (self.program, std::env::var("SUDO_USER")) {
            (XdoProgram::Kdotool, Ok(sudo_user)) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-E", "-u", &sudo_user, binary]);
                cmd
            }
            _ => Command::new(binary),
        };
        cmd.args(args);

        if self.program == XdoProgram::Kdotool {
            for (key, value) in build_env_overrides() {
                cmd.env(key, value);
            }
        }

        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        command_stdout(self.program.binary(), self.command(args))
    }

    /// kdotool отдаёт UUID окон KWin и не сообщает тип: такие окна считаются обычными
    fn window_type(&self, raw_id: &str) -> WindowType {
        match self.program {
            XdoProgram::Xdotool => x11_window_type(self.program.binary(), raw_id),
            XdoProgram::Kdotool => WindowType::Normal,
        }
    }

    /// Окна под управлением оконного менеджера, включая свёрнутые.
    /// Для X11 это `_NET_CLIENT_LIST`: search без --onlyvisible находит ещё
    /// и скрытые служебные окна приложений
    fn managed_window_ids(&self) -> Vec<String> {
        if self.program == XdoProgram::Xdotool {
            let mut cmd = Command::new("xprop");
            cmd.args(["-root", "_NET_CLIENT_LIST"]);
            match command_stdout(self.name(), cmd) {
                Ok(stdout) => return parse_client_list(&stdout),
                Err(e) => debug!("{}: _NET_CLIENT_LIST недоступен: {}", self.name(), e),
            }
        }

        // search завершается с ошибкой, если ничего не найдено
        match self.run(&SEARCH_ALL_WINDOWS) {
            Ok(stdout) => parse_id_list(&stdout),
            Err(e) => {
                debug!("{}: search ничего не вернул: {}", self.name(), e);
                Vec::new()
            }
        }
    }

    fn window_info(&self, raw_id: &str, current_desktop: Option<i64>) -> Result<WindowInfo> {
        let class = self.run(&["getwindowclassname", raw_id])?;
        let title = self.run(&["getwindowname", raw_id])?;

        // Не все сборки умеют get_desktop_for_window, тогда считаем окно видимым
        let desktop = self
            .run(&["get_desktop_for_window", raw_id])
            .ok()
            .and_then(|out| out.trim().parse::<i64>().ok());

        Ok(WindowInfo::new(WindowId::new(raw_id))
            .with_type(self.window_type(raw_id))
            .with_class(class.trim())
            .with_title(title.trim())
            .with_active_workspace(on_workspace(desktop, current_desktop)))
    }
}

impl WindowSource for XdoBackend {
    fn name(&self) -> &'static str {
        self.program.binary()
    }

    fn probe(&self) -> Result<()> {
        let active = self.run(&["getactivewindow"])?;
        debug!("{}: активное окно '{}'", self.name(), active.trim());
        Ok(())
    }

    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let current_desktop = self
            .run(&["get_desktop"])
            .ok()
            .and_then(|out| out.trim().parse::<i64>().ok());

        let ids = self.managed_window_ids();

        let mut windows = Vec::with_capacity(ids.len());
        for raw_id in ids {
            // Окно могло закрыться между search и запросом свойств
            match self.window_info(&raw_id, current_desktop) {
                Ok(window) => windows.push(window),
                Err(e) => debug!("{}: окно {} пропущено: {}", self.name(), raw_id, e),
            }
        }

        Ok(windows)
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        let stdout = self.run(&["getactivewindow"])?;
        Ok(parse_id_list(&stdout).into_iter().next().map(WindowId::new))
    }
}

impl WindowActuator for XdoBackend {
    fn activate(&self, window: &WindowInfo) -> Result<()> {
        self.run(&["windowactivate", window.id.as_str()]).map(|_| ())
    }

    fn set_attention(&self, window: &WindowInfo, on: bool) -> Result<()> {
        match self.program {
            XdoProgram::Xdotool => {
                let urgency = if on { "1" } else { "0" };
                self.run(&["set_window", "--urgency", urgency, window.id.as_str()])
                    .map(|_| ())
            }
            XdoProgram::Kdotool => Ok(()),
        }
    }
}

fn parse_id_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `_NET_CLIENT_LIST(WINDOW): window id # 0x3a00007, 0x3c00004`.
/// Идентификаторы переводятся в десятичный вид, как их печатает `xdotool getactivewindow`
fn parse_client_list(stdout: &str) -> Vec<String> {
    let Some((_, ids)) = stdout.split_once('#') else {
        return Vec::new();
    };

    ids.split(',')
        .filter_map(|raw| u64::from_str_radix(raw.trim().strip_prefix("0x")?, 16).ok())
        .filter(|&id| id != 0)
        .map(|id| id.to_string())
        .collect()
}

fn on_workspace(desktop: Option<i64>, current: Option<i64>) -> bool {
    match (desktop, current) {
        (Some(-1), _) => true,
        (Some(d), Some(c)) => d == c,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        let stdout = "60817415\n\n  62914567 \n";
        assert_eq!(parse_id_list(stdout), vec!["60817415", "62914567"]);

        let kde = "{4b0a8e1c-5b6f-4a21-9d0e-0c8c1c3e2f10}\n";
        assert_eq!(parse_id_list(kde).len(), 1);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_workspace_resolution() {
        assert!(on_workspace(Some(1), Some(1)));
        assert!(!on_workspace(Some(0), Some(1)));
        assert!(on_workspace(Some(-1), Some(1)));
        assert!(on_workspace(None, Some(1)));
        assert!(on_workspace(Some(3), None));
    }

    #[test]
    fn test_search_includes_unmapped_windows() {
        assert!(!SEARCH_ALL_WINDOWS.contains(&"--onlyvisible"));
        assert_eq!(SEARCH_ALL_WINDOWS, ["search", "--class", "."]);
    }

    #[test]
    fn test_parse_client_list() {
        let stdout = "_NET_CLIENT_LIST(WINDOW): window id # 0x3a00007, 0x3c00004, 0x0\n";
        assert_eq!(parse_client_list(stdout), vec!["60817415", "62914564"]);

        assert!(parse_client_list("_NET_CLIENT_LIST:  not found.\n").is_empty());
    }

    #[test]
    fn test_kdotool_windows_are_normal() {
        let backend = XdoBackend::new(XdoProgram::Kdotool);
        assert_eq!(
            backend.window_type("{4b0a8e1c-5b6f-4a21-9d0e-0c8c1c3e2f10}"),
            WindowType::Normal
        );
    }

    #[test]
    fn test_program_names() {
        assert_eq!(XdoBackend::new(XdoProgram::Xdotool).name(), "xdotool");
        assert_eq!(XdoBackend::new(XdoProgram::Kdotool).name(), "kdotool");
    }
}
