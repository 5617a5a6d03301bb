use crate::error::{Result, SwitcherError};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

const INPUT_DIR: &str = "/dev/input";
const UINPUT_DEVICE: &str = "/dev/uinput";

/// Проверить доступ к клавиатуре и uinput до захвата устройства
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_access(Path::new(INPUT_DIR))?;
    check_uinput_access(Path::new(UINPUT_DEVICE))?;

    if is_root() {
        warn!("Приложение запущено от root. Для kdotool окружение будет взято у SUDO_USER");
    }

    info!("Проверка прав доступа завершена");
    Ok(())
}

fn check_input_access(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(SwitcherError::Permission(format!("{:?} не существует", dir)));
    }

    fs::read_dir(dir).map(|_| ()).map_err(|e| {
        SwitcherError::Permission(format!(
            "Нет доступа к {:?}: {}. {}",
            dir,
            e,
            setup_hint()
        ))
    })
}

fn check_uinput_access(device: &Path) -> Result<()> {
    if !device.exists() {
        return Err(SwitcherError::Permission(format!(
            "{:?} не существует, загрузите модуль: sudo modprobe uinput",
            device
        )));
    }

    let mode = fs::metadata(device)
        .map_err(|e| SwitcherError::Permission(format!("{:?}: {}", device, e)))?
        .permissions()
        .mode();

    if !shared_rw(mode) && !is_root() {
        return Err(SwitcherError::Permission(format!(
            "Нет прав на запись в {:?} (режим {:o}). {}",
            device,
            mode & 0o777,
            setup_hint()
        )));
    }

    Ok(())
}

/// Запись разрешена группе или всем
fn shared_rw(mode: u32) -> bool {
    mode & 0o060 == 0o060 || mode & 0o006 == 0o006
}

fn is_root() -> bool {
    std::env::var("USER").map_or(false, |user| user == "root")
}

pub fn setup_hint() -> &'static str {
    "Выполните: sudo usermod -a -G input,uinput $USER && sudo modprobe uinput, затем перезайдите"
}
