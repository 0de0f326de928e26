//! Pump trigger sources
//!
//! The trigger is either a push button on a GPIO pin or, when the pin
//! cannot be opened, the keyboard. Key presses arrive as discrete events
//! with no key-up, so [`KeyDebounce`] infers a held key from presses that
//! keep arriving within a release timeout.

use crate::config::GpioConfig;
use crate::logging::get_logger;
use crate::machine::InputMode;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Anything that can report whether the pump trigger is held right now
///
/// Implementations must not block; the trigger loop calls this every few
/// milliseconds. The kiosk is shared across tasks, so sources must be
/// `Sync` as well.
pub trait InputSource: Send + Sync {
    fn read(&mut self) -> bool;
}

/// Press-and-hold from discrete key presses
#[derive(Debug, Clone)]
pub struct KeyDebounce {
    timeout: Duration,
    last_press: Option<Instant>,
}

impl KeyDebounce {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_press: None,
        }
    }

    pub fn press(&mut self, now: Instant) {
        self.last_press = Some(now);
    }

    /// Forget the current press immediately
    pub fn release(&mut self) {
        self.last_press = None;
    }

    /// Held until more than `timeout` has passed since the last press
    pub fn is_active(&self, now: Instant) -> bool {
        self.last_press
            .is_some_and(|at| now.saturating_duration_since(at) <= self.timeout)
    }
}

/// Keyboard-backed trigger; key events go through a [`KeyboardHandle`]
pub struct KeyboardInput {
    debounce: Arc<Mutex<KeyDebounce>>,
}

/// Cloneable sender side of the keyboard trigger
#[derive(Clone)]
pub struct KeyboardHandle {
    debounce: Arc<Mutex<KeyDebounce>>,
}

impl KeyboardInput {
    pub fn new(release_timeout: Duration) -> (Self, KeyboardHandle) {
        let debounce = Arc::new(Mutex::new(KeyDebounce::new(release_timeout)));
        (
            Self {
                debounce: Arc::clone(&debounce),
            },
            KeyboardHandle { debounce },
        )
    }
}

impl InputSource for KeyboardInput {
    fn read(&mut self) -> bool {
        self.debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_active(Instant::now())
    }
}

impl KeyboardHandle {
    /// Register a trigger key press (key-down or auto-repeat)
    pub fn press(&self) {
        self.debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .press(Instant::now());
    }

    pub fn release(&self) {
        self.debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
    }
}

/// Push button on a GPIO input with the internal pull resistor enabled
#[cfg(feature = "gpio")]
pub struct PinInput {
    pin: rppal::gpio::InputPin,
    active_low: bool,
}

#[cfg(feature = "gpio")]
impl PinInput {
    pub fn open(config: &GpioConfig) -> crate::error::Result<Self> {
        let gpio = rppal::gpio::Gpio::new()?;
        let pin = gpio.get(config.button_pin).map_err(|e| {
            crate::error::ForecourtError::gpio(format!("GPIO {}: {}", config.button_pin, e))
        })?;
        let pin = if config.active_low {
            pin.into_input_pullup()
        } else {
            pin.into_input_pulldown()
        };
        Ok(Self {
            pin,
            active_low: config.active_low,
        })
    }
}

#[cfg(feature = "gpio")]
impl InputSource for PinInput {
    fn read(&mut self) -> bool {
        if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        }
    }
}

/// Outcome of the startup trigger probe
pub struct TriggerSetup {
    pub source: Box<dyn InputSource>,
    pub mode: InputMode,
    /// Present only in keyboard mode
    pub keyboard: Option<KeyboardHandle>,
}

impl TriggerSetup {
    pub fn keyboard(release_timeout: Duration) -> Self {
        let (input, handle) = KeyboardInput::new(release_timeout);
        Self {
            source: Box::new(input),
            mode: InputMode::Keyboard,
            keyboard: Some(handle),
        }
    }
}

/// Open the trigger pin, falling back to keyboard mode if it is unavailable
///
/// Decided once at startup; a missing pin is never retried.
pub fn probe_trigger(config: &GpioConfig, key_release_timeout: Duration) -> TriggerSetup {
    let logger = get_logger("input");
    if !config.enabled {
        logger.info("GPIO disabled in configuration; using keyboard trigger");
        return TriggerSetup::keyboard(key_release_timeout);
    }

    #[cfg(feature = "gpio")]
    {
        match PinInput::open(config) {
            Ok(pin) => {
                logger.info(&format!(
                    "Pump trigger on GPIO {} ({})",
                    config.button_pin,
                    if config.active_low { "active-low" } else { "active-high" }
                ));
                TriggerSetup {
                    source: Box::new(pin),
                    mode: InputMode::Gpio,
                    keyboard: None,
                }
            }
            Err(e) => {
                logger.warn(&format!(
                    "GPIO unavailable ({}); running in keyboard mode",
                    e
                ));
                TriggerSetup::keyboard(key_release_timeout)
            }
        }
    }

    #[cfg(not(feature = "gpio"))]
    {
        logger.warn("Built without GPIO support; running in keyboard mode");
        TriggerSetup::keyboard(key_release_timeout)
    }
}
