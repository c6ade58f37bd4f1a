//! The elapsed-time governor.
//!
//! Counts recording time in one-second ticks and lets the flow stop the
//! recorder when the step's cap is reached, exactly as if the user had
//! pressed stop. Like the countdown gate it owns at most one pending timer;
//! the flow schedules the next tick (or doesn't) in response to each one, so
//! cancellation can never leave a stray tick behind.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::flow::FlowEvent;

pub struct ElapsedGovernor {
    events: mpsc::Sender<FlowEvent>,
    pending: Option<JoinHandle<()>>,
}

impl ElapsedGovernor {
    pub fn new(events: mpsc::Sender<FlowEvent>) -> Self {
        Self {
            events,
            pending: None,
        }
    }

    /// Arms a single tick one second from now, replacing any pending tick.
    pub fn schedule(&mut self) {
        self.cancel();
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = events.send(FlowEvent::GovernorTick).await;
        }));
    }

    /// Aborts the pending tick, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for ElapsedGovernor {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tick_arrives_after_one_second() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut governor = ElapsedGovernor::new(tx);

        governor.schedule();

        let event = rx.recv().await.expect("tick");
        assert!(matches!(event, FlowEvent::GovernorTick));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_future_ticks() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut governor = ElapsedGovernor::new(tx);

        governor.schedule();
        governor.cancel();

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(waited.is_err(), "tick should have been aborted");
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_each_tick_yields_a_steady_cadence() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut governor = ElapsedGovernor::new(tx);

        // The flow schedules the next tick in response to each one.
        for _ in 0..3 {
            governor.schedule();
            let event = rx.recv().await.expect("tick");
            assert!(matches!(event, FlowEvent::GovernorTick));
        }

        let extra = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(extra.is_err(), "no tick without a reschedule");
    }
}
