use crate::config::BackendKind;
use crate::error::{Result, SwitcherError};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::sway::SwayBackend;
use super::wmctrl::WmctrlBackend;
use super::xdo::{XdoBackend, XdoProgram};
use super::r#trait::WindowSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DesktopEnvironment {
    Sway,
    KdeWayland,
    Kde,
    Gnome,
    X11Generic,
    WaylandGeneric,
    Unknown,
}

fn detect_desktop_environment() -> DesktopEnvironment {
    if std::env::var_os("SWAYSOCK").is_some() {
        return DesktopEnvironment::Sway;
    }

    let wayland = std::env::var("XDG_SESSION_TYPE").map_or(false, |s| s == "wayland");

    if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
        match desktop.to_lowercase().as_str() {
            d if d.contains("kde") && wayland => return DesktopEnvironment::KdeWayland,
            d if d.contains("kde") => return DesktopEnvironment::Kde,
            d if d.contains("gnome") => return DesktopEnvironment::Gnome,
            _ => {}
        }
    }

    if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
        match session.as_str() {
            "wayland" => return DesktopEnvironment::WaylandGeneric,
            "x11" => return DesktopEnvironment::X11Generic,
            _ => {}
        }
    }

    if let Ok(output) = Command::new("pgrep").arg("-x").arg("kwin_wayland").output() {
        if !output.stdout.is_empty() {
            return DesktopEnvironment::KdeWayland;
        }
    }

    DesktopEnvironment::Unknown
}

/// Порядок проверки бэкендов для среды рабочего стола
fn probe_order(env: DesktopEnvironment) -> &'static [BackendKind] {
    match env {
        DesktopEnvironment::Sway => &[BackendKind::Sway],
        DesktopEnvironment::KdeWayland => &[BackendKind::Kdotool],
        DesktopEnvironment::Kde => &[BackendKind::Wmctrl, BackendKind::Kdotool, BackendKind::Xdotool],
        DesktopEnvironment::Gnome | DesktopEnvironment::X11Generic => {
            &[BackendKind::Wmctrl, BackendKind::Xdotool]
        }
        DesktopEnvironment::WaylandGeneric | DesktopEnvironment::Unknown => &[
            BackendKind::Sway,
            BackendKind::Kdotool,
            BackendKind::Wmctrl,
            BackendKind::Xdotool,
        ],
    }
}

fn build_backend(kind: BackendKind) -> Option<Arc<dyn WindowSystem>> {
    match kind {
        BackendKind::Auto => None,
        BackendKind::Wmctrl => Some(Arc::new(WmctrlBackend::new())),
        BackendKind::Xdotool => Some(Arc::new(XdoBackend::new(XdoProgram::Xdotool))),
        BackendKind::Kdotool => Some(Arc::new(XdoBackend::new(XdoProgram::Kdotool))),
        BackendKind::Sway => Some(Arc::new(SwayBackend::new())),
    }
}

/// Создать бэкенд оконной системы. Явно выбранный бэкенд не проверяется
/// заранее: его ошибки проявятся при первом обращении
pub fn create_window_system(kind: BackendKind) -> Result<Arc<dyn WindowSystem>> {
    if let Some(backend) = build_backend(kind) {
        info!("Бэкенд оконной системы задан в конфигурации: {}", backend.name());
        return Ok(backend);
    }

    let env = detect_desktop_environment();
    info!("Обнаружена среда рабочего стола: {:?}", env);

    for &candidate in probe_order(env) {
        let Some(backend) = build_backend(candidate) else {
            continue;
        };

        match backend.probe() {
            Ok(()) => {
                info!("Используем бэкенд {}", backend.name());
                return Ok(backend);
            }
            Err(e) => debug!("Бэкенд {} недоступен: {}", backend.name(), e),
        }
    }

    warn!("Ни один бэкенд оконной системы не работает в среде {:?}", env);
    Err(SwitcherError::ServiceUnavailable(format!(
        "нет рабочего бэкенда оконной системы для среды {:?}",
        env
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wayland_sessions_prefer_native_backends() {
        assert_eq!(probe_order(DesktopEnvironment::Sway), &[BackendKind::Sway]);
        assert_eq!(probe_order(DesktopEnvironment::KdeWayland), &[BackendKind::Kdotool]);
    }

    #[test]
    fn test_x11_sessions_start_with_wmctrl() {
        assert_eq!(probe_order(DesktopEnvironment::X11Generic)[0], BackendKind::Wmctrl);
        assert_eq!(probe_order(DesktopEnvironment::Gnome)[0], BackendKind::Wmctrl);
        assert!(probe_order(DesktopEnvironment::Unknown).len() > 2);
    }

    #[test]
    fn test_explicit_backend_is_not_probed() {
        let backend = create_window_system(BackendKind::Sway).unwrap();
        assert_eq!(backend.name(), "sway");
        assert!(build_backend(BackendKind::Auto).is_none());
    }
}
