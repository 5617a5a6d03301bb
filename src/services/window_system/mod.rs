//! WindowSystem service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for talking to the host
//! window system: enumerating windows (class/type/workspace/geometry depending on
//! platform), reporting the focused window and activating a window. It MUST NOT
//! contain any slot or cycling logic. All focus decisions are made exclusively by
//! SlotCycler.

mod auto_detect;
mod dry_run;
mod sway;
mod wmctrl;
mod xdo;
mod r#trait;

pub use self::auto_detect::create_window_system;
pub use self::dry_run::DryRunWindowSystem;
pub use self::r#trait::{WindowActuator, WindowSource, WindowSystem};

use crate::error::{Result, SwitcherError};
use crate::events::WindowType;
use std::process::Command;
use tracing::debug;

const NET_WM_TYPE_PREFIX: &str = "_NET_WM_WINDOW_TYPE_";

/// Выполнить команду бэкенда и вернуть stdout, если она завершилась успешно
pub(super) fn command_stdout(backend: &'static str, mut cmd: Command) -> Result<String> {
    let output = cmd.output().map_err(|e| {
        SwitcherError::backend(backend, format!("не удалось выполнить {:?}: {}", cmd, e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SwitcherError::backend(
            backend,
            format!("{:?} вернул ошибку: {}", cmd, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Тип X11-окна по `_NET_WM_WINDOW_TYPE`. Окно, которое не удалось опросить, считается обычным
pub(super) fn x11_window_type(backend: &'static str, raw_id: &str) -> WindowType {
    let mut cmd = Command::new("xprop");
    cmd.args(["-id", raw_id, "_NET_WM_WINDOW_TYPE"]);
    match command_stdout(backend, cmd) {
        Ok(stdout) => parse_net_wm_window_type(&stdout),
        Err(e) => {
            debug!("{}: тип окна {} неизвестен: {}", backend, raw_id, e);
            WindowType::Normal
        }
    }
}

/// Вывод `xprop -id <id> _NET_WM_WINDOW_TYPE`:
/// `_NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_DIALOG, _NET_WM_WINDOW_TYPE_NORMAL`
/// или `_NET_WM_WINDOW_TYPE:  not found.`
///
/// Решает первый стандартный атом (нестандартные вроде `_KDE_NET_WM_WINDOW_TYPE_OVERRIDE`
/// пропускаются). Без свойства окно обычное
pub(super) fn parse_net_wm_window_type(stdout: &str) -> WindowType {
    let Some((_, atoms)) = stdout.split_once('=') else {
        return WindowType::Normal;
    };

    let preferred = atoms
        .split(',')
        .map(str::trim)
        .find_map(|atom| atom.strip_prefix(NET_WM_TYPE_PREFIX));

    match preferred {
        None | Some("NORMAL") => WindowType::Normal,
        Some(_) => WindowType::Other,
    }
}
