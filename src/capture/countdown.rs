//! The countdown gate.
//!
//! Recording never starts on the click itself — a visible countdown runs
//! first, and only its completion starts the recorder. The gate owns at most
//! one pending one-second timer; each tick is fed back into the flow as a
//! [`FlowEvent::CountdownTick`], and the flow decides whether to schedule the
//! next one. Rescheduling aborts the previous timer, so a restarted countdown
//! can never receive a tick from its former run.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::flow::FlowEvent;

pub struct CountdownGate {
    events: mpsc::Sender<FlowEvent>,
    pending: Option<JoinHandle<()>>,
}

impl CountdownGate {
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
            let _ = events.send(FlowEvent::CountdownTick).await;
        }));
    }

    /// Aborts the pending tick, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for CountdownGate {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scheduled_tick_arrives_after_one_second() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut gate = CountdownGate::new(tx);

        gate.schedule();

        let event = rx.recv().await.expect("tick");
        assert!(matches!(event, FlowEvent::CountdownTick));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tick_never_arrives() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut gate = CountdownGate::new(tx);

        gate.schedule();
        gate.cancel();

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(waited.is_err(), "tick should have been aborted");
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_pending_tick() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut gate = CountdownGate::new(tx);

        gate.schedule();
        gate.schedule();

        // Exactly one tick: the first timer was aborted by the second.
        rx.recv().await.expect("tick");
        let extra = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(extra.is_err(), "only one tick should arrive");
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_tick() {
        let (tx, mut rx) = mpsc::channel(8);
        {
            let mut gate = CountdownGate::new(tx);
            gate.schedule();
        }

        assert!(rx.recv().await.is_none(), "sender dropped without a tick");
    }
}
