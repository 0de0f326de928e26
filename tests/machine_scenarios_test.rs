use forecourt::config::{PumpConfig, TimingConfig};
use forecourt::kiosk::PumpController;
use forecourt::machine::PumpStateMachine;
use forecourt::session::PumpState;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

fn controller() -> Arc<PumpController> {
    let machine = PumpStateMachine::with_rng(
        &PumpConfig::default(),
        &TimingConfig::default(),
        StdRng::seed_from_u64(42),
    );
    PumpController::new(machine)
}

async fn pump_ticks(ctl: &PumpController, ticks: usize) {
    for _ in 0..ticks {
        ctl.trigger(true).await;
    }
    ctl.trigger(false).await;
}

#[tokio::test(start_paused = true)]
async fn full_sale_returns_to_idle_after_success_screen() {
    let ctl = controller();
    pump_ticks(&ctl, 200).await;
    let pumped = ctl.snapshot();
    assert_eq!(pumped.state, PumpState::Idle);
    assert!(pumped.pay_enabled);
    assert!((pumped.litres - 0.30).abs() < 1e-9);

    ctl.pay().await;
    assert_eq!(ctl.state().await, PumpState::AwaitingPayment);

    ctl.card_detected("04:A1:B2:C3").await;
    let paid = ctl.snapshot();
    assert_eq!(paid.state, PumpState::PaymentSuccess);
    let receipt = paid.receipt.clone().unwrap();
    assert_eq!(receipt.card_id, "04:A1:B2:C3");
    assert!((receipt.litres - 0.30).abs() < 1e-9);

    tokio::time::sleep(Duration::from_millis(2999)).await;
    assert_eq!(ctl.state().await, PumpState::PaymentSuccess);

    tokio::time::sleep(Duration::from_millis(2)).await;
    let fresh = ctl.snapshot();
    assert_eq!(fresh.state, PumpState::Idle);
    assert_eq!(fresh.litres, 0.0);
    assert_ne!(fresh.session_id, pumped.session_id);
    assert!(fresh.price_per_litre >= 1.40 && fresh.price_per_litre <= 1.60);
}

#[tokio::test(start_paused = true)]
async fn manual_reset_supersedes_pending_return() {
    let ctl = controller();
    pump_ticks(&ctl, 10).await;
    ctl.pay().await;
    ctl.card_detected("AA:BB").await;

    ctl.reset().await;
    let after_reset = ctl.snapshot();
    assert_eq!(after_reset.state, PumpState::Idle);

    // Start a new sale inside the old success window
    ctl.trigger(true).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let snap = ctl.snapshot();
    assert_eq!(snap.state, PumpState::Pumping);
    assert_eq!(snap.session_id, after_reset.session_id);
}

#[tokio::test(start_paused = true)]
async fn cancel_blocks_input_until_grace_elapses() {
    let ctl = controller();
    pump_ticks(&ctl, 10).await;
    ctl.pay().await;
    ctl.cancel().await;

    let cancelled = ctl.snapshot();
    assert_eq!(cancelled.state, PumpState::Idle);
    assert!(cancelled.reset_pending);
    assert!(cancelled.litres > 0.0);

    // Trigger and pay are ignored while the reset is pending
    ctl.trigger(true).await;
    ctl.pay().await;
    assert_eq!(ctl.state().await, PumpState::Idle);

    tokio::time::sleep(Duration::from_millis(101)).await;
    let reset = ctl.snapshot();
    assert!(!reset.reset_pending);
    assert_eq!(reset.litres, 0.0);

    ctl.trigger(true).await;
    assert_eq!(ctl.state().await, PumpState::Pumping);
}

#[tokio::test(start_paused = true)]
async fn events_outside_their_state_change_nothing() {
    let ctl = controller();
    let before = ctl.snapshot();

    ctl.pay().await;
    ctl.card_detected("AA").await;
    ctl.cancel().await;

    let after = ctl.snapshot();
    assert!(Arc::ptr_eq(&before, &after), "no snapshot should be published");
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_each_transition() {
    let ctl = controller();
    let mut rx = ctl.subscribe();

    ctl.trigger(true).await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().state, PumpState::Pumping);

    ctl.trigger(false).await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().state, PumpState::Idle);

    ctl.pay().await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().state, PumpState::AwaitingPayment);
}
