use super::Kiosk;
use super::types::{Key, KioskCommand};
use std::ops::ControlFlow;

impl Kiosk {
    /// Apply one command; `Break` means the kiosk should shut down
    pub(crate) async fn handle_command(&mut self, cmd: KioskCommand) -> ControlFlow<()> {
        match cmd {
            KioskCommand::Pay => self.controller.pay().await,
            KioskCommand::Cancel => self.controller.cancel().await,
            KioskCommand::Reset | KioskCommand::Key(Key::R) => {
                if let Some(keyboard) = &self.keyboard {
                    keyboard.release();
                }
                self.controller.reset().await;
            }
            KioskCommand::Key(Key::Space) => match &self.keyboard {
                Some(keyboard) => keyboard.press(),
                None => self.logger.debug("Ignoring trigger key in GPIO mode"),
            },
            KioskCommand::Key(Key::Escape) | KioskCommand::Exit => {
                self.logger.info(&format!("Exit requested ({:?})", cmd));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
