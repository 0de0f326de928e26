//! Kiosk orchestration
//!
//! The [`PumpController`] is the only way into the state machine once the
//! kiosk runs: it holds the machine behind a mutex, publishes a snapshot
//! whenever something changed and turns [`Deferred`] tokens into sleeping
//! tasks. [`Kiosk`] wires the controller to the polling loops and to the
//! command channel fed by the web layer and signal handlers, and owns the
//! single shutdown path.

use crate::card::CardPresenceSource;
use crate::config::Config;
use crate::error::Result;
use crate::input::{InputSource, KeyboardHandle, TriggerSetup};
use crate::logging::{StructuredLogger, get_logger};
use crate::machine::{Deferred, PumpSnapshot, PumpStateMachine};
use crate::scheduler::{PollingScheduler, SharedReader};
use crate::session::PumpState;
use std::ops::ControlFlow;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

mod commands;
mod types;

pub use types::{Key, KioskCommand, KioskHandle};

/// How long shutdown waits for the polling loops and the reader
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Serialized access to the pump state machine
pub struct PumpController {
    machine: Mutex<PumpStateMachine>,
    snapshot_tx: watch::Sender<Arc<PumpSnapshot>>,
    deferred: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl PumpController {
    pub fn new(machine: PumpStateMachine) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(Arc::new(machine.snapshot()));
        Arc::new(Self {
            machine: Mutex::new(machine),
            snapshot_tx,
            deferred: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PumpSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<PumpSnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    pub async fn state(&self) -> PumpState {
        self.machine.lock().await.state()
    }

    pub async fn trigger(&self, active: bool) {
        self.apply(|m| m.on_trigger_edge(active)).await;
    }

    pub async fn pay(&self) {
        self.apply(PumpStateMachine::on_pay_requested).await;
    }

    pub async fn card_detected(self: &Arc<Self>, card_id: &str) {
        if let Some(token) = self.apply(|m| m.on_card_detected(card_id)).await {
            self.spawn_deferred(token);
        }
    }

    pub async fn cancel(self: &Arc<Self>) {
        if let Some(token) = self.apply(PumpStateMachine::on_cancel).await {
            self.spawn_deferred(token);
        }
    }

    pub async fn reset(&self) {
        self.apply(PumpStateMachine::on_reset_requested).await;
        // Superseded tasks would be dropped by the generation check anyway
        self.abort_deferred();
    }

    /// Cancel every pending deferred transition
    pub fn abort_deferred(&self) {
        let mut tasks = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    async fn apply<R>(&self, f: impl FnOnce(&mut PumpStateMachine) -> R) -> R {
        let mut machine = self.machine.lock().await;
        let before = machine.revision();
        let out = f(&mut *machine);
        if machine.revision() != before {
            self.snapshot_tx.send_replace(Arc::new(machine.snapshot()));
        }
        out
    }

    fn spawn_deferred(self: &Arc<Self>, token: Deferred) {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(token.delay).await;
            this.apply(|m| m.fire_deferred(token)).await;
        });
        let mut tasks = self.deferred.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

/// The running kiosk
pub struct Kiosk {
    config: Arc<Config>,
    controller: Arc<PumpController>,
    keyboard: Option<KeyboardHandle>,
    input: Option<Box<dyn InputSource>>,
    reader: SharedReader,
    commands_tx: mpsc::UnboundedSender<KioskCommand>,
    commands_rx: mpsc::UnboundedReceiver<KioskCommand>,
    shutdown_tx: watch::Sender<bool>,
    logger: StructuredLogger,
}

impl Kiosk {
    pub fn new(config: Config, trigger: TriggerSetup, reader: Box<dyn CardPresenceSource>) -> Self {
        let machine =
            PumpStateMachine::new(&config.pump, &config.timing).with_input_mode(trigger.mode);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            controller: PumpController::new(machine),
            keyboard: trigger.keyboard,
            input: Some(trigger.source),
            reader: Arc::new(std::sync::Mutex::new(reader)),
            commands_tx,
            commands_rx,
            shutdown_tx,
            logger: get_logger("kiosk"),
        }
    }

    pub fn handle(&self) -> KioskHandle {
        KioskHandle {
            commands: self.commands_tx.clone(),
            snapshots: self.controller.subscribe(),
            config: Arc::clone(&self.config),
        }
    }

    /// Run until an exit command arrives, then shut down and return the final totals
    pub async fn run(mut self) -> Result<PumpSnapshot> {
        let snapshot = self.controller.snapshot();
        self.logger.info(&format!(
            "Kiosk running in {} mode at {}",
            snapshot.input_mode.as_str(),
            snapshot.rate_label
        ));

        let scheduler = PollingScheduler::new(Arc::clone(&self.controller), &self.config.polling);
        let input = self.input.take();
        let tasks = input.map(|input| {
            scheduler.spawn(input, Arc::clone(&self.reader), self.shutdown_tx.subscribe())
        });

        loop {
            let Some(cmd) = self.commands_rx.recv().await else {
                break;
            };
            if let ControlFlow::Break(()) = self.handle_command(cmd).await {
                break;
            }
        }

        self.logger.info("Shutting down");
        let _ = self.shutdown_tx.send(true);
        if let Some(tasks) = tasks
            && !tasks.stop_within(SHUTDOWN_GRACE).await
        {
            self.logger.warn("Polling loops did not stop in time; aborted");
        }
        self.controller.abort_deferred();
        self.close_reader().await;

        let final_snapshot = (*self.controller.snapshot()).clone();
        println!("{}", final_snapshot.final_totals());
        self.logger.info(&format!(
            "Final totals: {:.2} L, {}",
            final_snapshot.litres, final_snapshot.amount_label
        ));
        Ok(final_snapshot)
    }

    async fn close_reader(&self) {
        let reader = Arc::clone(&self.reader);
        let close = tokio::task::spawn_blocking(move || {
            // A read stuck on the bus keeps the lock; leave that reader alone
            if let Ok(mut reader) = reader.try_lock() {
                reader.close();
            }
        });
        if tokio::time::timeout(SHUTDOWN_GRACE, close).await.is_err() {
            self.logger.warn("Card reader did not close in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::NoReader;
    use crate::config::{PumpConfig, TimingConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn controller() -> Arc<PumpController> {
        PumpController::new(PumpStateMachine::with_rng(
            &PumpConfig::default(),
            &TimingConfig::default(),
            StdRng::seed_from_u64(3),
        ))
    }

    async fn await_payment(c: &Arc<PumpController>) {
        for _ in 0..10 {
            c.trigger(true).await;
        }
        c.trigger(false).await;
        c.pay().await;
        assert_eq!(c.state().await, PumpState::AwaitingPayment);
    }

    #[tokio::test(start_paused = true)]
    async fn payment_success_returns_to_idle_after_three_seconds() {
        let c = controller();
        await_payment(&c).await;
        c.card_detected("DE:AD:BE:EF").await;
        assert_eq!(c.snapshot().state, PumpState::PaymentSuccess);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(c.state().await, PumpState::PaymentSuccess);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let s = c.snapshot();
        assert_eq!(s.state, PumpState::Idle);
        assert_eq!(s.litres, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_applies_reset_after_grace() {
        let c = controller();
        await_payment(&c).await;
        c.cancel().await;
        let s = c.snapshot();
        assert_eq!(s.state, PumpState::Idle);
        assert!(s.reset_pending);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let s = c.snapshot();
        assert!(!s.reset_pending);
        assert_eq!(s.litres, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_reset_prevents_late_return() {
        let c = controller();
        await_payment(&c).await;
        c.card_detected("AA:BB:CC:DD").await;
        c.reset().await;
        let session = c.snapshot().session_id.clone();
        c.trigger(true).await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        let s = c.snapshot();
        assert_eq!(s.session_id, session);
        assert_eq!(s.state, PumpState::Pumping);
        assert!(s.litres > 0.0);
    }

    #[tokio::test]
    async fn snapshot_published_only_on_change() {
        let c = controller();
        let rx = c.subscribe();
        c.trigger(false).await;
        assert!(!rx.has_changed().unwrap());
        c.trigger(true).await;
        assert!(rx.has_changed().unwrap());
    }

    fn keyboard_kiosk() -> Kiosk {
        Kiosk::new(
            Config::default(),
            TriggerSetup::keyboard(Duration::from_millis(150)),
            Box::new(NoReader),
        )
    }

    #[test]
    fn run_future_can_be_spawned() {
        fn assert_send<T: Send>(_: &T) {}
        let run = keyboard_kiosk().run();
        assert_send(&run);
    }

    #[tokio::test(start_paused = true)]
    async fn exit_command_returns_final_totals() {
        let kiosk = Kiosk::new(
            Config::default(),
            TriggerSetup::keyboard(Duration::from_millis(150)),
            Box::new(NoReader),
        );
        let handle = kiosk.handle();
        let run = tokio::spawn(kiosk.run());

        assert!(handle.send(KioskCommand::Key(Key::Space)));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(handle.send(KioskCommand::Key(Key::Escape)));

        let final_snapshot = run.await.unwrap().unwrap();
        assert!(final_snapshot.litres > 0.0);
        assert!(!handle.send(KioskCommand::Pay));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_key_clears_keyboard_press() {
        let kiosk = Kiosk::new(
            Config::default(),
            TriggerSetup::keyboard(Duration::from_millis(150)),
            Box::new(NoReader),
        );
        let handle = kiosk.handle();
        let mut snapshots = handle.subscribe();
        let run = tokio::spawn(kiosk.run());

        handle.send(KioskCommand::Key(Key::Space));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.send(KioskCommand::Key(Key::R));
        tokio::time::sleep(Duration::from_millis(30)).await;

        let s = snapshots.borrow_and_update().clone();
        assert_eq!(s.state, PumpState::Idle);
        assert_eq!(s.litres, 0.0);

        handle.send(KioskCommand::Exit);
        run.await.unwrap().unwrap();
    }
}
