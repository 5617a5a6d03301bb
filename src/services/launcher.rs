use crate::config::Slot;
use crate::error::{Result, SwitcherError};
use crate::services::window_system::DryRunWindowSystem;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use xdg::BaseDirectories;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

const APPLICATIONS_DIR: &str = "applications";

/// Запуск приложения слота
pub trait Launcher: Send + Sync {
    fn launch(&self, slot: &Slot) -> Result<()>;
}

/// Где искать каталоги `applications`
enum DataDirs {
    /// $XDG_DATA_HOME, затем $XDG_DATA_DIRS
    Xdg,
    Fixed(Vec<PathBuf>),
}

/// Запуск по .desktop файлу (freedesktop Desktop Entry)
pub struct DesktopLauncher {
    data_dirs: DataDirs,
}

impl DesktopLauncher {
    pub fn new() -> Self {
        info!("Инициализация DesktopLauncher");
        Self {
            data_dirs: DataDirs::Xdg,
        }
    }

    pub fn with_data_dirs(data_dirs: Vec<PathBuf>) -> Self {
        debug!("Каталоги данных для .desktop файлов: {:?}", data_dirs);
        Self {
            data_dirs: DataDirs::Fixed(data_dirs),
        }
    }

    /// Абсолютный путь используется как есть, иначе ищем по каталогам applications
    fn resolve(&self, launcher: &str) -> Result<Option<PathBuf>> {
        let path = Path::new(launcher);
        if path.is_absolute() {
            return Ok(path.is_file().then(|| path.to_path_buf()));
        }

        let candidates = desktop_id_candidates(launcher);
        match &self.data_dirs {
            DataDirs::Xdg => {
                let xdg = BaseDirectories::new()
                    .map_err(|e| SwitcherError::launch(launcher, e.to_string()))?;
                Ok(candidates.iter().find_map(|relative| xdg.find_data_file(relative)))
            }
            DataDirs::Fixed(dirs) => Ok(candidates.iter().find_map(|relative| {
                dirs.iter()
                    .map(|dir| dir.join(relative))
                    .find(|candidate| candidate.is_file())
            })),
        }
    }
}

impl Default for DesktopLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for DesktopLauncher {
    fn launch(&self, slot: &Slot) -> Result<()> {
        info!("Запуск {} для слота {} через {}", slot.name, slot.id, slot.launcher);

        let path = self
            .resolve(&slot.launcher)?
            .ok_or_else(|| SwitcherError::launch(&slot.launcher, "desktop файл не найден"))?;

        let content = fs::read_to_string(&path)
            .map_err(|e| SwitcherError::launch(&slot.launcher, format!("{:?}: {}", path, e)))?;
        let entry = DesktopEntry::parse(&content);

        let exec = entry
            .exec
            .ok_or_else(|| SwitcherError::launch(&slot.launcher, "нет ключа Exec"))?;
        let command_line = remove_field_codes(&exec);
        debug!("Exec для {}: {}", slot.launcher, command_line);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = entry.path {
            cmd.current_dir(dir);
        }
        // Своя группа процессов: приложение переживёт Ctrl+C демона
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| SwitcherError::launch(&slot.launcher, e.to_string()))?;

        info!("{} запущен (pid {})", slot.name, child.id());

        // sh завершится сразу или вместе с приложением, забираем его статус
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Пути внутри каталога данных для desktop ID. ID кодирует подкаталоги
/// через `-`: `kde-foo.desktop` может лежать в `applications/kde/foo.desktop`.
/// Сначала точное имя, затем варианты с разбиением по `-` слева направо
fn desktop_id_candidates(desktop_id: &str) -> Vec<PathBuf> {
    let mut relative = vec![desktop_id.to_string()];
    expand_dashes(desktop_id, 0, &mut relative);

    relative
        .into_iter()
        .map(|name| Path::new(APPLICATIONS_DIR).join(name))
        .collect()
}

fn expand_dashes(name: &str, from: usize, out: &mut Vec<String>) {
    for (i, _) in name[from..].match_indices('-') {
        let split = from + i;
        if split == 0 {
            continue;
        }
        let nested = format!("{}/{}", &name[..split], &name[split + 1..]);
        out.push(nested.clone());
        expand_dashes(&nested, split + 1, out);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DesktopEntry {
    exec: Option<String>,
    path: Option<PathBuf>,
}

impl DesktopEntry {
    /// Читаем только группу [Desktop Entry], действия (Desktop Action) пропускаем
    fn parse(content: &str) -> Self {
        let mut in_main_section = false;
        let mut entry = DesktopEntry::default();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') {
                in_main_section = line == "[Desktop Entry]";
                continue;
            }

            if !in_main_section {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "Exec" => entry.exec = Some(value.trim().to_string()),
                    "Path" if !value.trim().is_empty() => {
                        entry.path = Some(PathBuf::from(value.trim()))
                    }
                    _ => {}
                }
            }
        }

        entry
    }
}

/// Убрать коды полей (%f, %U, ...) из Exec. `%%` превращается в `%`,
/// `%` без буквы после него остаётся как есть
fn remove_field_codes(exec: &str) -> String {
    let mut result = String::with_capacity(exec.len());
    let mut chars = exec.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('%') | None => result.push('%'),
            Some(next) if !next.is_ascii_alphabetic() => {
                result.push('%');
                result.push(next);
            }
            Some(_) => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dry-run: вместо процесса через паузу появляется эмулированное окно
pub struct DryRunLauncher {
    system: Arc<DryRunWindowSystem>,
    delay: Duration,
}

impl DryRunLauncher {
    pub fn new(system: Arc<DryRunWindowSystem>, delay: Duration) -> Self {
        info!("Инициализация DryRunLauncher");
        Self { system, delay }
    }
}

impl Launcher for DryRunLauncher {
    fn launch(&self, slot: &Slot) -> Result<()> {
        info!("Dry-run: запуск {} ({})", slot.name, slot.launcher);

        let system = self.system.clone();
        let class = slot.wm_class.clone();
        let title = format!("{} - dry_run", slot.name);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let delay = self.delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    system.spawn_window(&class, &title);
                });
            }
            Err(_) => {
                system.spawn_window(&class, &title);
            }
        }
        Ok(())
    }
}
