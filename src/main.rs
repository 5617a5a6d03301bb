use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

mod config;
mod error;
mod events;
mod services;
mod utils;

use config::{BackendKind, Config};
use services::{
    create_keyboard_listener, create_window_system, DesktopLauncher, Dispatcher,
    DryRunLauncher, DryRunWindowSystem, EngineState, Highlighter, Launcher, SlotCycler,
    WindowEventBus, WindowSystem, WindowWaiter, WindowWatcher,
};

const HOTKEY_CHANNEL_CAPACITY: usize = 32;
const DRY_RUN_LAUNCH_DELAY: Duration = Duration::from_millis(500);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "wks-rust")]
#[command(about = "Горячие клавиши слотов 0-9: запуск приложения или переключение между его окнами")]
struct Args {
    /// Путь к файлу конфигурации (по умолчанию ~/.config/window-key-switcher/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Режим сухого запуска: окна эмулируются, горячие клавиши читаются из stdin
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает logging.level)
    #[arg(long)]
    log_level: Option<String>,

    /// Бэкенд оконной системы (перекрывает window.backend)
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Проверить конфигурацию, вывести слоты и выйти
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    if let Some(backend) = args.backend {
        config.window.backend = backend;
    }

    init_tracing(
        args.log_level.as_deref(),
        &config.logging.level,
        &config.logging.filter,
        &config.logging.format,
    )?;

    info!("Запуск Window Key Switcher v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", config_path.display());

    if args.check_config {
        print_slot_table(&config);
        return Ok(());
    }

    if config.configured_slots().next().is_none() {
        warn!("В конфигурации нет ни одного слота, привязывать нечего");
    }

    if args.dry_run {
        warn!("Режим сухого запуска - окна и запуск приложений эмулируются");
    } else {
        utils::permissions::check_permissions()?;
    }

    let config = Arc::new(config);

    // Оконная система и запуск приложений
    let (system, launcher): (Arc<dyn WindowSystem>, Arc<dyn Launcher>) = if args.dry_run {
        let simulated = Arc::new(DryRunWindowSystem::new());
        let launcher: Arc<dyn Launcher> =
            Arc::new(DryRunLauncher::new(simulated.clone(), DRY_RUN_LAUNCH_DELAY));
        let system: Arc<dyn WindowSystem> = simulated;
        (system, launcher)
    } else {
        let system = create_window_system(config.window.backend)
            .context("Не удалось подключиться к оконной системе")?;
        let launcher: Arc<dyn Launcher> = Arc::new(DesktopLauncher::new());
        (system, launcher)
    };

    let bus = WindowEventBus::new();
    let watcher = WindowWatcher::new(system.clone(), bus.clone(), config.polling_interval());
    let highlighter = Highlighter::new(system.clone(), &config.settings.visual_indicator);
    let cycler = SlotCycler::new(config.clone(), system.clone(), highlighter, EngineState::new());
    let waiter = WindowWaiter::new(bus, system.clone(), config.settle_delay());
    let dispatcher = Dispatcher::new(config.clone(), cycler, launcher, waiter);

    let (hotkey_tx, hotkey_rx) = mpsc::channel(HOTKEY_CHANNEL_CAPACITY);
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_flag = Arc::new(AtomicBool::new(false));

    let keyboard_listener =
        create_keyboard_listener(config.clone(), hotkey_tx, stop_flag.clone(), args.dry_run)?;

    info!("Все компоненты инициализированы");

    let watcher_handle = tokio::spawn({
        let stop_rx = stop_rx.clone();
        async move {
            if let Err(e) = watcher.run(stop_rx).await {
                error!("Ошибка в WindowWatcher: {}", e);
            }
        }
    });
    let dispatcher_handle = tokio::spawn(async move {
        if let Err(e) = dispatcher.run(hotkey_rx, stop_rx).await {
            error!("Ошибка в Dispatcher: {}", e);
        }
    });
    let keyboard_handle = tokio::spawn(async move {
        if let Err(e) = keyboard_listener.run().await {
            error!("Ошибка в KeyboardListener: {}", e);
        }
    });

    info!("Все сервисы запущены");

    match signal::ctrl_c().await {
        Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
        Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
    }

    info!("Завершение работы...");

    stop_flag.store(true, Ordering::Relaxed);
    let _ = stop_tx.send(true);

    // Чтение evdev/stdin может висеть до следующего события
    keyboard_handle.abort();

    let shutdown_result = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = dispatcher_handle.await;
        let _ = watcher_handle.await;
        let _ = keyboard_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Window Key Switcher завершил работу");
    Ok(())
}

fn init_tracing(cli_level: Option<&str>, level: &str, filter: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directives = match cli_level {
        Some(level) => level.to_string(),
        None if filter.is_empty() => level.to_string(),
        None => format!("{},{}", level, filter),
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directives))?;
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}

fn print_slot_table(config: &Config) {
    println!("Конфигурация корректна. Слоты:");
    for slot in config.configured_slots() {
        println!(
            "  {}  {:<20} wm_class={:<24} launcher={}",
            slot.id, slot.name, slot.wm_class, slot.launcher
        );
    }
    println!(
        "Модификаторы: {} (новый экземпляр: {})",
        config.slot_modifiers(),
        config.force_modifiers()
    );
}
