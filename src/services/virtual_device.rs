use crate::error::Result;
use crate::events::{KeyCode, KeyState};
use crate::wks_error;
use tracing::{debug, info};

const EV_SYN: i32 = 0;
const EV_KEY: i32 = 1;

/// Виртуальная клавиатура uinput: через неё проходят все клавиши,
/// кроме перехваченных горячих клавиш слотов
pub struct VirtualDevice {
    device: uinput::Device,
    name: String,
}

impl VirtualDevice {
    pub fn new(name: &str) -> Result<Self> {
        info!("Создание виртуального устройства uinput '{}'", name);

        let device = uinput::default()?
            .name(name)?
            .event(uinput::event::Keyboard::All)?
            .create()?;

        info!("Виртуальное устройство '{}' создано", name);
        Ok(Self {
            device,
            name: name.to_string(),
        })
    }

    pub fn emit(&mut self, key: KeyCode, state: KeyState) -> Result<()> {
        let code = i32::from(key.value());

        self.device
            .write(EV_KEY, code, state.value())
            .map_err(|e| wks_error!(internal, "Не удалось отправить клавишу {}: {}", key, e))?;
        self.device
            .write(EV_SYN, 0, 0)
            .map_err(|e| wks_error!(internal, "Не удалось синхронизировать события: {}", e))?;

        debug!("{}: {} {:?}", self.name, key, state);
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        info!("Закрытие виртуального устройства '{}'", self.name);
    }
}
