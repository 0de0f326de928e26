use crate::config::Config;
use crate::machine::PumpSnapshot;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Keys the kiosk reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    /// Trigger press in keyboard mode
    Space,
    /// Manual reset
    R,
    /// Quit
    Escape,
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A literal space is the key itself, not padding
        if s == " " {
            return Ok(Key::Space);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "space" => Ok(Key::Space),
            "r" => Ok(Key::R),
            "escape" | "esc" => Ok(Key::Escape),
            other => Err(format!("Unknown key '{}'", other)),
        }
    }
}

/// Commands accepted by the kiosk from the presentation layer and signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskCommand {
    Pay,
    Cancel,
    Reset,
    Key(Key),
    Exit,
}

/// Cloneable access to a running kiosk
#[derive(Clone)]
pub struct KioskHandle {
    pub(crate) commands: mpsc::UnboundedSender<KioskCommand>,
    pub(crate) snapshots: watch::Receiver<Arc<PumpSnapshot>>,
    pub(crate) config: Arc<Config>,
}

impl KioskHandle {
    /// Queue a command; returns false once the kiosk has stopped
    pub fn send(&self, cmd: KioskCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    pub fn snapshot(&self) -> Arc<PumpSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PumpSnapshot>> {
        self.snapshots.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
