//! Contactless card reader
//!
//! Payment cards are read through the narrow [`CardPresenceSource`]
//! contract. A missing or broken reader is a supported configuration: the
//! probe returns [`NoReader`] and payments can only be cancelled or reset
//! by hand.

use crate::config::RfidConfig;
use crate::error::{ForecourtError, Result};
use crate::logging::get_logger;
use std::time::Duration;

/// A card reader the card loop can poll
///
/// Calls may block on bus I/O; callers run them off the async executor and
/// bound them with a timeout.
pub trait CardPresenceSource: Send {
    /// Whether a card answered the last request
    fn is_present(&mut self) -> Result<bool>;

    /// Identifier of the card found by [`Self::is_present`]
    fn read_id(&mut self) -> Result<String>;

    /// Short name for logs
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool {
        true
    }

    /// Release the underlying hardware
    fn close(&mut self) {}
}

/// Stand-in used when no reader could be brought up
#[derive(Debug, Default)]
pub struct NoReader;

impl CardPresenceSource for NoReader {
    fn is_present(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn read_id(&mut self) -> Result<String> {
        Err(ForecourtError::rfid("No card reader available"))
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Upper-case hex bytes joined by `:`
pub fn format_uid(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Log a failed HLTA; the card may be picked up again once the cooldown ends
///
/// Returns whether the card was halted.
pub fn note_halt<E: std::fmt::Debug>(card_id: &str, outcome: std::result::Result<(), E>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            get_logger("card").debug(&format!("HLTA for card {} failed: {:?}", card_id, e));
            false
        }
    }
}

#[cfg(feature = "rfid")]
pub use mfrc522_reader::{Mfrc522Reader, open_mfrc522};

#[cfg(feature = "rfid")]
mod mfrc522_reader {
    use super::{CardPresenceSource, format_uid, note_halt};
    use crate::config::RfidConfig;
    use crate::error::{ForecourtError, Result};
    use mfrc522::comm::Interface;
    use mfrc522::comm::blocking::spi::SpiInterface;
    use mfrc522::{AtqA, Initialized, Mfrc522};
    use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};

    /// MFRC522 on the Raspberry Pi SPI bus
    pub struct Mfrc522Reader<C: Interface> {
        device: Option<Mfrc522<C, Initialized>>,
        pending: Option<AtqA>,
    }

    /// Open the reader on the configured SPI bus and chip select
    pub fn open_mfrc522(config: &RfidConfig) -> Result<Box<dyn CardPresenceSource>> {
        let spi = Spi::new(
            spi_bus(config.spi_bus)?,
            slave_select(config.chip_select)?,
            config.clock_hz,
            Mode::Mode0,
        )?;
        let itf = SpiInterface::new(SimpleHalSpiDevice::new(spi));
        let mut device = Mfrc522::new(itf)
            .init()
            .map_err(|e| ForecourtError::rfid(format!("MFRC522 init failed: {:?}", e)))?;

        // A floating bus reads back all zeros or all ones
        let version = device
            .version()
            .map_err(|e| ForecourtError::rfid(format!("MFRC522 version read failed: {:?}", e)))?;
        if version == 0x00 || version == 0xFF {
            return Err(ForecourtError::rfid(format!(
                "No MFRC522 responding on SPI{} CE{} (version 0x{:02X})",
                config.spi_bus, config.chip_select, version
            )));
        }

        Ok(Box::new(Mfrc522Reader {
            device: Some(device),
            pending: None,
        }))
    }

    impl<C> CardPresenceSource for Mfrc522Reader<C>
    where
        C: Interface + Send,
        C::Error: std::fmt::Debug,
    {
        fn is_present(&mut self) -> Result<bool> {
            let device = self
                .device
                .as_mut()
                .ok_or_else(|| ForecourtError::rfid("Reader closed"))?;
            // REQA times out when no card is in the field
            match device.new_card_present() {
                Ok(atqa) => {
                    self.pending = Some(atqa);
                    Ok(true)
                }
                Err(_) => {
                    self.pending = None;
                    Ok(false)
                }
            }
        }

        fn read_id(&mut self) -> Result<String> {
            let device = self
                .device
                .as_mut()
                .ok_or_else(|| ForecourtError::rfid("Reader closed"))?;
            let atqa = match self.pending.take() {
                Some(atqa) => atqa,
                None => device
                    .new_card_present()
                    .map_err(|e| ForecourtError::rfid(format!("No card in field: {:?}", e)))?,
            };
            let uid = device
                .select(&atqa)
                .map_err(|e| ForecourtError::rfid(format!("Card select failed: {:?}", e)))?;
            let id = format_uid(uid.as_bytes());
            // Halted cards stay silent until they leave the field
            note_halt(&id, device.hlta());
            Ok(id)
        }

        fn name(&self) -> &'static str {
            "mfrc522"
        }

        fn is_available(&self) -> bool {
            self.device.is_some()
        }

        fn close(&mut self) {
            self.pending = None;
            self.device = None;
        }
    }

    fn spi_bus(index: u8) -> Result<Bus> {
        Ok(match index {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            3 => Bus::Spi3,
            4 => Bus::Spi4,
            5 => Bus::Spi5,
            6 => Bus::Spi6,
            _ => {
                return Err(ForecourtError::validation(
                    "rfid.spi_bus",
                    format!("Unknown SPI bus {}", index),
                ));
            }
        })
    }

    fn slave_select(index: u8) -> Result<SlaveSelect> {
        Ok(match index {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            _ => {
                return Err(ForecourtError::validation(
                    "rfid.chip_select",
                    format!("Unsupported chip select {}", index),
                ));
            }
        })
    }
}

/// Run a reader initializer on the blocking pool, bounded by `limit`
///
/// A panic inside driver code comes back as a generic error and a hang as
/// a timeout.
pub async fn init_bounded<F>(init: F, limit: Duration) -> Result<Box<dyn CardPresenceSource>>
where
    F: FnOnce() -> Result<Box<dyn CardPresenceSource>> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(init);
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ForecourtError::generic(format!(
            "Card reader initialization panicked: {}",
            join_err
        ))),
        Err(_) => Err(ForecourtError::timeout(format!(
            "Card reader initialization exceeded {:?}",
            limit
        ))),
    }
}

/// Like [`init_bounded`], but any failure yields [`NoReader`]
pub async fn probe_with<F>(init: F, limit: Duration) -> Box<dyn CardPresenceSource>
where
    F: FnOnce() -> Result<Box<dyn CardPresenceSource>> + Send + 'static,
{
    let logger = get_logger("card");
    match init_bounded(init, limit).await {
        Ok(reader) => {
            logger.info(&format!("Card reader '{}' ready", reader.name()));
            reader
        }
        Err(e) => {
            logger.warn(&format!(
                "Card reader unavailable ({}); payments will be manual only",
                e
            ));
            Box::new(NoReader)
        }
    }
}

/// Bring up the configured reader once at startup
pub async fn probe_card_reader(config: &RfidConfig) -> Box<dyn CardPresenceSource> {
    if !config.enabled {
        get_logger("card").info("Card reader disabled in configuration; payments will be manual only");
        return Box::new(NoReader);
    }
    let limit = Duration::from_millis(config.init_timeout_ms);

    #[cfg(feature = "rfid")]
    {
        let config = config.clone();
        probe_with(
            move || open_mfrc522(&config),
            limit,
        )
        .await
    }

    #[cfg(not(feature = "rfid"))]
    {
        let _ = limit;
        get_logger("card").warn("Built without card reader support; payments will be manual only");
        Box::new(NoReader)
    }
}
