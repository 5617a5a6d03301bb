use crate::error::{Result, SwitcherError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BY_ID_DIR: &str = "/dev/input/by-id";
const INPUT_DIR: &str = "/dev/input";

pub struct DeviceFinder;

impl DeviceFinder {
    /// Явный путь из конфигурации или автопоиск при "auto"
    pub fn find_keyboard_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            if !path.exists() {
                return SwitcherError::device_not_found(format!(
                    "Указанное устройство не найдено: {:?}",
                    path
                ));
            }
            info!("Используется указанное устройство: {:?}", path);
            return Ok(path);
        }

        info!("Автопоиск клавиатуры...");

        if let Some(path) = Self::best_by_id()? {
            info!("Найдена клавиатура по ID: {:?}", path);
            return Ok(path);
        }

        if let Some(path) = Self::first_event_keyboard()? {
            info!("Найдена клавиатура среди event устройств: {:?}", path);
            return Ok(path);
        }

        SwitcherError::device_not_found(
            "Не удалось найти клавиатуру. Убедитесь, что пользователь в группе 'input'",
        )
    }

    /// /dev/input/by-id: *-event-kbd с наибольшим приоритетом
    fn best_by_id() -> Result<Option<PathBuf>> {
        let Some(entries) = Self::list_dir(Path::new(BY_ID_DIR))? else {
            return Ok(None);
        };

        let mut candidates: Vec<(u32, PathBuf)> = entries
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                by_id_priority(&name).map(|priority| (priority, path))
            })
            .filter(|(_, path)| has_slot_keys(path))
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(candidates.into_iter().next().map(|(_, path)| path))
    }

    fn first_event_keyboard() -> Result<Option<PathBuf>> {
        let Some(mut entries) = Self::list_dir(Path::new(INPUT_DIR))? else {
            return Ok(None);
        };
        entries.retain(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("event"))
        });
        entries.sort();

        Ok(entries.into_iter().find(|path| has_slot_keys(path)))
    }

    fn list_dir(dir: &Path) -> Result<Option<Vec<PathBuf>>> {
        if !dir.exists() {
            debug!("{:?} не существует", dir);
            return Ok(None);
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            SwitcherError::Permission(format!("Нет доступа к {:?}: {}", dir, e))
        })?;

        Ok(Some(entries.filter_map(|e| e.ok().map(|e| e.path())).collect()))
    }
}

/// Приоритет по имени ссылки в by-id. None - не клавиатура
fn by_id_priority(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    if !lower.contains("event") || lower.contains("mouse") {
        return None;
    }
    if lower.ends_with("-event-kbd") {
        Some(100)
    } else if lower.contains("keyboard") {
        Some(50)
    } else if lower.contains("kbd") {
        Some(10)
    } else {
        None
    }
}

/// Устройство умеет цифры верхнего ряда и Super: этого достаточно для горячих клавиш слотов
fn has_slot_keys(path: &Path) -> bool {
    let device = match evdev::Device::open(path) {
        Ok(device) => device,
        Err(e) => {
            debug!("Не удалось открыть {:?}: {}", path, e);
            return false;
        }
    };

    let name = device.name().unwrap_or("").to_lowercase();
    if ["mouse", "touchpad", "trackpoint"].iter().any(|m| name.contains(m)) {
        debug!("Пропускаем {:?} ({})", path, name);
        return false;
    }

    device.supported_keys().map_or(false, |keys| {
        keys.contains(evdev::KeyCode::KEY_1)
            && keys.contains(evdev::KeyCode::KEY_0)
            && keys.contains(evdev::KeyCode::KEY_LEFTMETA)
    })
}
