//! Polling loops feeding the pump state machine
//!
//! Two independent fixed-interval loops: the trigger loop samples the
//! [`InputSource`] every few milliseconds, the card loop asks the card
//! reader for a card only while the payment screen is up. Card reads run on
//! the blocking pool under a timeout so a wedged SPI bus looks like "no
//! card" instead of stalling the kiosk.

use crate::card::CardPresenceSource;
use crate::config::PollingConfig;
use crate::error::{ForecourtError, Result};
use crate::input::InputSource;
use crate::kiosk::PumpController;
use crate::logging::get_logger;
use crate::session::PumpState;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};

/// Card reader shared between the card loop and shutdown
pub type SharedReader = Arc<Mutex<Box<dyn CardPresenceSource>>>;

/// Minimum spacing between two accepted card detections
#[derive(Debug, Clone)]
pub struct CardCooldown {
    window: Duration,
    last: Option<Instant>,
}

impl CardCooldown {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|at| now.saturating_duration_since(at) >= self.window)
    }

    /// Record `now` if the window has passed; false means the detection is suppressed
    pub fn try_accept(&mut self, now: Instant) -> bool {
        if self.ready(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}

/// Join handles of the spawned loops
pub struct SchedulerTasks {
    trigger: JoinHandle<()>,
    card: Option<JoinHandle<()>>,
}

impl SchedulerTasks {
    pub async fn join(&mut self) {
        let _ = (&mut self.trigger).await;
        if let Some(card) = self.card.as_mut() {
            let _ = card.await;
        }
    }

    pub fn abort(&self) {
        self.trigger.abort();
        if let Some(card) = &self.card {
            card.abort();
        }
    }

    /// Wait up to `grace` for the loops to stop, aborting them past that
    ///
    /// Returns false when the loops had to be aborted.
    pub async fn stop_within(mut self, grace: Duration) -> bool {
        if tokio::time::timeout(grace, self.join()).await.is_ok() {
            return true;
        }
        self.abort();
        false
    }
}

pub struct PollingScheduler {
    controller: Arc<PumpController>,
    trigger_interval: Duration,
    card_interval: Duration,
    card_cooldown: Duration,
    card_read_timeout: Duration,
}

impl PollingScheduler {
    pub fn new(controller: Arc<PumpController>, polling: &PollingConfig) -> Self {
        Self {
            controller,
            trigger_interval: polling.trigger_interval(),
            card_interval: polling.card_interval(),
            card_cooldown: polling.card_cooldown(),
            card_read_timeout: polling.card_read_timeout(),
        }
    }

    /// Start both loops; they stop once `shutdown` turns true
    ///
    /// The card loop is skipped entirely when the reader is unavailable.
    pub fn spawn(
        &self,
        input: Box<dyn InputSource>,
        reader: SharedReader,
        shutdown: watch::Receiver<bool>,
    ) -> SchedulerTasks {
        let trigger = tokio::spawn(run_trigger_loop(
            Arc::clone(&self.controller),
            input,
            self.trigger_interval,
            shutdown.clone(),
        ));

        let available = reader
            .lock()
            .map(|r| r.is_available())
            .unwrap_or(false);
        let card = if available {
            Some(tokio::spawn(run_card_loop(
                Arc::clone(&self.controller),
                reader,
                CardLoopTiming {
                    period: self.card_interval,
                    cooldown: self.card_cooldown,
                    read_timeout: self.card_read_timeout,
                },
                shutdown,
            )))
        } else {
            get_logger("scheduler").info("No card reader; payments will be manual only");
            None
        };

        SchedulerTasks { trigger, card }
    }
}

/// Timings for [`run_card_loop`]
#[derive(Debug, Clone, Copy)]
pub struct CardLoopTiming {
    pub period: Duration,
    pub cooldown: Duration,
    pub read_timeout: Duration,
}

fn stop_requested(
    changed: std::result::Result<(), watch::error::RecvError>,
    rx: &watch::Receiver<bool>,
) -> bool {
    changed.is_err() || *rx.borrow()
}

/// Sample the trigger every `period` and feed it to the machine
pub async fn run_trigger_loop(
    controller: Arc<PumpController>,
    mut input: Box<dyn InputSource>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let logger = get_logger("scheduler");
    logger.debug(&format!("Trigger loop started ({:?})", period));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let active = input.read();
                controller.trigger(active).await;
            }
            res = shutdown.changed() => {
                if stop_requested(res, &shutdown) {
                    break;
                }
            }
        }
    }
    logger.debug("Trigger loop stopped");
}

/// Look for a card every `timing.period` while payment is awaited
pub async fn run_card_loop(
    controller: Arc<PumpController>,
    reader: SharedReader,
    timing: CardLoopTiming,
    mut shutdown: watch::Receiver<bool>,
) {
    let logger = get_logger("scheduler");
    logger.debug(&format!("Card loop started ({:?})", timing.period));
    let mut ticker = interval(timing.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cooldown = CardCooldown::new(timing.cooldown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if controller.state().await != PumpState::AwaitingPayment
                    || !cooldown.ready(Instant::now())
                {
                    continue;
                }
                match read_card(&reader, timing.read_timeout).await {
                    Ok(Some(card_id)) if cooldown.try_accept(Instant::now()) => {
                        logger.info(&format!("Card detected: {}", card_id));
                        controller.card_detected(&card_id).await;
                    }
                    Ok(_) => {}
                    Err(ForecourtError::Timeout { message }) => logger.warn(&message),
                    Err(e) => logger.debug(&format!("Card read failed: {}", e)),
                }
            }
            res = shutdown.changed() => {
                if stop_requested(res, &shutdown) {
                    break;
                }
            }
        }
    }
    logger.debug("Card loop stopped");
}

/// One bounded presence check plus UID read
///
/// `Ok(None)` means no card this tick, including an empty identifier or a
/// reader still held by an earlier stuck read. Driver errors, panics and
/// timeouts come back as errors; callers treat them as no card.
pub async fn read_card(reader: &SharedReader, limit: Duration) -> Result<Option<String>> {
    let reader = Arc::clone(reader);
    let task = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
        let mut reader = match reader.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            // An earlier read is still stuck on the bus
            Err(TryLockError::WouldBlock) => return Ok(None),
        };
        if !reader.is_present()? {
            return Ok(None);
        }
        reader.read_id().map(Some)
    });

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(read)) => Ok(read?.filter(|id| !id.trim().is_empty())),
        Ok(Err(join_err)) => Err(ForecourtError::generic(format!(
            "Card read panicked: {}",
            join_err
        ))),
        Err(_) => Err(ForecourtError::timeout(format!(
            "Card read exceeded {:?}; treating as no card",
            limit
        ))),
    }
}
