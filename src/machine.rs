//! Pump state machine
//!
//! [`PumpStateMachine`] owns the single [`PumpSession`] and applies every
//! event that can change it: trigger ticks, pay/cancel/reset requests and
//! card detections. It is a plain synchronous type; callers serialize
//! access (the kiosk keeps it behind a mutex) and own all timers.
//!
//! Delayed transitions are not run here. Operations that need one return a
//! [`Deferred`] token carrying a delay and the generation it was issued in.
//! The caller sleeps and hands the token back to
//! [`PumpStateMachine::fire_deferred`], which drops it when any reset has
//! happened since.

use crate::config::{PumpConfig, TimingConfig};
use crate::display::{self, DisplayReading};
use crate::logging::{StructuredLogger, get_logger};
use crate::pricing::PriceRange;
use crate::session::{PumpSession, PumpState, Receipt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the pump trigger is being sourced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Physical button on a GPIO pin
    Gpio,
    /// Keyboard fallback with timeout-based release
    Keyboard,
}

impl InputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Gpio => "gpio",
            InputMode::Keyboard => "keyboard",
        }
    }
}

/// Transition to run once a delay has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Leave the payment success screen and start a new sale
    ReturnToIdle,
    /// Apply the session reset that follows a cancelled payment
    ApplyCancelReset,
}

/// A scheduled transition, valid only for the generation it was issued in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deferred {
    pub action: DeferredAction,
    pub delay: Duration,
    pub generation: u64,
}

/// Immutable view of the machine for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpSnapshot {
    pub timestamp: String,
    pub session_id: String,
    pub state: PumpState,
    pub litres: f64,
    pub amount: f64,
    pub price_per_litre: f64,
    pub pay_enabled: bool,
    /// A cancel was accepted and its reset has not been applied yet
    pub reset_pending: bool,
    pub last_card_id: Option<String>,
    pub receipt: Option<Receipt>,
    pub input_mode: InputMode,
    pub currency_symbol: String,
    pub litres_display: DisplayReading,
    pub amount_display: DisplayReading,
    pub amount_label: String,
    pub rate_label: String,
}

impl PumpSnapshot {
    /// Totals block printed on shutdown
    pub fn final_totals(&self) -> String {
        format!(
            "Final totals:\n  Litres: {:.2} L\n  Amount: {}",
            self.litres,
            display::money_label(&self.currency_symbol, self.amount)
        )
    }
}

pub struct PumpStateMachine {
    session: PumpSession,
    prices: PriceRange,
    increment_rate: f64,
    currency_symbol: String,
    payment_success_delay: Duration,
    cancel_grace_delay: Duration,
    input_mode: InputMode,
    reset_pending: bool,
    generation: u64,
    revision: u64,
    rng: StdRng,
    logger: StructuredLogger,
}

impl PumpStateMachine {
    pub fn new(pump: &PumpConfig, timing: &TimingConfig) -> Self {
        Self::with_rng(pump, timing, StdRng::from_entropy())
    }

    /// Build with a caller-supplied generator for reproducible prices
    pub fn with_rng(pump: &PumpConfig, timing: &TimingConfig, mut rng: StdRng) -> Self {
        let prices = PriceRange::from_config(pump);
        let session = PumpSession::new(prices.roll_with(&mut rng));
        let logger = get_logger("machine");
        logger.for_session(&session.id).info(&format!(
            "New pump session at {}",
            display::rate_label(&pump.currency_symbol, session.price_per_litre)
        ));
        Self {
            session,
            prices,
            increment_rate: pump.increment_rate,
            currency_symbol: pump.currency_symbol.clone(),
            payment_success_delay: timing.payment_success(),
            cancel_grace_delay: timing.cancel_grace(),
            input_mode: InputMode::Gpio,
            reset_pending: false,
            generation: 0,
            revision: 0,
            rng,
            logger,
        }
    }

    pub fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    pub fn state(&self) -> PumpState {
        self.session.state
    }

    /// Bumped on every observable change; lets callers skip redundant publishes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Pay gate: anything but pumping, with something to pay for
    pub fn pay_enabled(&self) -> bool {
        self.session.state != PumpState::Pumping && self.session.amount > 0.0
    }

    /// Apply one trigger sample
    pub fn on_trigger_edge(&mut self, active: bool) {
        if self.reset_pending {
            return;
        }
        match (self.session.state, active) {
            (PumpState::Idle, true) => {
                self.session.state = PumpState::Pumping;
                self.session.accrue(self.increment_rate);
                self.touch();
                self.session_logger().info("Pumping started");
            }
            (PumpState::Pumping, true) => {
                self.session.accrue(self.increment_rate);
                self.touch();
            }
            (PumpState::Pumping, false) => {
                self.session.state = PumpState::Idle;
                self.touch();
                self.session_logger().info(&format!(
                    "Pumping stopped at {:.2} L, {}",
                    self.session.litres,
                    display::money_label(&self.currency_symbol, self.session.amount)
                ));
            }
            // Idle and released is the resting case; payment screens ignore the trigger
            _ => {}
        }
    }

    /// Open the payment screen if the pay action is enabled
    pub fn on_pay_requested(&mut self) {
        if self.reset_pending || self.session.state != PumpState::Idle || !self.pay_enabled() {
            self.drop_event("pay");
            return;
        }
        self.session.state = PumpState::AwaitingPayment;
        self.touch();
        self.session_logger().info(&format!(
            "Awaiting payment of {}",
            display::money_label(&self.currency_symbol, self.session.amount)
        ));
    }

    /// Accept a card on the payment screen
    pub fn on_card_detected(&mut self, card_id: &str) -> Option<Deferred> {
        if self.session.state != PumpState::AwaitingPayment {
            self.drop_event("card");
            return None;
        }
        let card_id = card_id.trim();
        if card_id.is_empty() {
            self.session_logger().debug("Ignoring card read with empty identifier");
            return None;
        }

        self.session.state = PumpState::PaymentSuccess;
        let receipt = self.session.record_payment(card_id).clone();
        self.touch();
        self.session_logger().info(&format!(
            "Payment accepted: card={} amount={} litres={:.2} rate={}",
            receipt.card_id,
            display::money_label(&self.currency_symbol, receipt.amount),
            receipt.litres,
            display::rate_label(&self.currency_symbol, receipt.price_per_litre)
        ));
        Some(self.schedule(DeferredAction::ReturnToIdle, self.payment_success_delay))
    }

    /// Leave the payment screen now and reset after the grace delay
    pub fn on_cancel(&mut self) -> Option<Deferred> {
        if self.session.state != PumpState::AwaitingPayment {
            self.drop_event("cancel");
            return None;
        }
        self.session.state = PumpState::Idle;
        self.reset_pending = true;
        self.touch();
        self.session_logger().info("Payment cancelled");
        Some(self.schedule(DeferredAction::ApplyCancelReset, self.cancel_grace_delay))
    }

    /// Force a fresh sale from any state
    pub fn on_reset_requested(&mut self) {
        self.generation += 1;
        self.session_logger()
            .info(&format!("Manual reset from {}", self.session.state));
        self.reset_session();
    }

    /// Run a deferred transition if nothing has superseded it
    ///
    /// Returns whether the transition was applied.
    pub fn fire_deferred(&mut self, token: Deferred) -> bool {
        if token.generation != self.generation {
            self.logger.debug(&format!(
                "Dropping stale {:?} (generation {} != {})",
                token.action, token.generation, self.generation
            ));
            return false;
        }
        let applies = match token.action {
            DeferredAction::ReturnToIdle => self.session.state == PumpState::PaymentSuccess,
            DeferredAction::ApplyCancelReset => self.reset_pending,
        };
        if !applies {
            return false;
        }
        self.generation += 1;
        self.reset_session();
        true
    }

    pub fn snapshot(&self) -> PumpSnapshot {
        let s = &self.session;
        PumpSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id: s.id.clone(),
            state: s.state,
            litres: s.litres,
            amount: s.amount,
            price_per_litre: s.price_per_litre,
            pay_enabled: self.pay_enabled(),
            reset_pending: self.reset_pending,
            last_card_id: s.last_card_id.clone(),
            receipt: s.receipt.clone(),
            input_mode: self.input_mode,
            currency_symbol: self.currency_symbol.clone(),
            litres_display: display::reading(s.litres),
            amount_display: display::reading(s.amount),
            amount_label: display::money_label(&self.currency_symbol, s.amount),
            rate_label: display::rate_label(&self.currency_symbol, s.price_per_litre),
        }
    }

    fn schedule(&mut self, action: DeferredAction, delay: Duration) -> Deferred {
        self.generation += 1;
        Deferred {
            action,
            delay,
            generation: self.generation,
        }
    }

    fn reset_session(&mut self) {
        let price = self.prices.roll_with(&mut self.rng);
        self.session.reset(price);
        self.reset_pending = false;
        self.touch();
        self.session_logger().info(&format!(
            "New pump session at {}",
            display::rate_label(&self.currency_symbol, price)
        ));
    }

    fn drop_event(&self, event: &str) {
        self.session_logger().debug(&format!(
            "Ignoring {} event in state {}{}",
            event,
            self.session.state,
            if self.reset_pending { " (reset pending)" } else { "" }
        ));
    }

    fn session_logger(&self) -> StructuredLogger {
        self.logger.for_session(&self.session.id)
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
