//! Pump session data
//!
//! A single [`PumpSession`] exists for the lifetime of the kiosk. It is
//! reset in place after a payment, a cancellation or a manual reset, and
//! is only ever mutated by the pump state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the pump is in its sale cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpState {
    /// Waiting for the trigger or for the customer to pay
    Idle,
    /// Trigger held, litres accruing
    Pumping,
    /// Payment screen shown, totals frozen
    AwaitingPayment,
    /// Card accepted, success screen shown until the auto-return
    PaymentSuccess,
}

impl PumpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpState::Idle => "Idle",
            PumpState::Pumping => "Pumping",
            PumpState::AwaitingPayment => "AwaitingPayment",
            PumpState::PaymentSuccess => "PaymentSuccess",
        }
    }
}

impl std::fmt::Display for PumpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a completed card payment, held in memory until the next reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub card_id: String,
    pub litres: f64,
    pub amount: f64,
    pub price_per_litre: f64,
    pub paid_at: DateTime<Utc>,
}

/// The mutable sale in progress
#[derive(Debug, Clone)]
pub struct PumpSession {
    /// Identifier used to correlate log lines for one sale
    pub id: String,
    pub litres: f64,
    /// Always `litres * price_per_litre`; never set on its own
    pub amount: f64,
    pub price_per_litre: f64,
    pub state: PumpState,
    pub last_card_id: Option<String>,
    pub receipt: Option<Receipt>,
}

impl PumpSession {
    pub fn new(price_per_litre: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            litres: 0.0,
            amount: 0.0,
            price_per_litre,
            state: PumpState::Idle,
            last_card_id: None,
            receipt: None,
        }
    }

    /// Add litres and recompute the amount from them
    pub fn accrue(&mut self, litres: f64) {
        self.litres += litres;
        self.amount = self.litres * self.price_per_litre;
    }

    /// Start a fresh sale in place at a new price
    pub fn reset(&mut self, price_per_litre: f64) {
        self.id = uuid::Uuid::new_v4().to_string();
        self.litres = 0.0;
        self.amount = 0.0;
        self.price_per_litre = price_per_litre;
        self.state = PumpState::Idle;
        self.last_card_id = None;
        self.receipt = None;
    }

    /// Record a successful card payment against the current totals
    pub fn record_payment(&mut self, card_id: &str) -> &Receipt {
        self.last_card_id = Some(card_id.to_string());
        self.receipt.insert(Receipt {
            card_id: card_id.to_string(),
            litres: self.litres,
            amount: self.amount,
            price_per_litre: self.price_per_litre,
            paid_at: Utc::now(),
        })
    }
}
