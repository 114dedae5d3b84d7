//! Cooperative stop/pause control plane for an in-flight run.
//!
//! The engine observes the control channel only at batch boundaries: an
//! in-flight batch write is always allowed to complete, so the destination can
//! never be left correlated with a half-written batch and an already-advanced
//! checkpoint.

use tokio::sync::watch;

/// Requested state of an in-flight run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Keep processing batches.
    Run,
    /// Park at the next batch boundary until resumed or stopped.
    Pause,
    /// Stop at the next batch boundary, persisting the last advanced
    /// checkpoint.
    Stop,
}

/// Transmitter side of the run control channel.
#[derive(Debug, Clone)]
pub struct RunControl(watch::Sender<ControlState>);

impl RunControl {
    /// Requests the run to pause at the next batch boundary.
    pub fn pause(&self) {
        // Infallible send, so pausing works even before the run subscribes.
        self.0.send_replace(ControlState::Pause);
    }

    /// Resumes a paused run. This is the only path out of a pause.
    pub fn resume(&self) {
        self.0.send_replace(ControlState::Run);
    }

    /// Requests the run to stop at the next batch boundary.
    pub fn stop(&self) {
        self.0.send_replace(ControlState::Stop);
    }

    /// Creates a new control receiver subscription.
    pub fn subscribe(&self) -> RunControlRx {
        self.0.subscribe()
    }
}

/// Receiver side of the run control channel.
pub type RunControlRx = watch::Receiver<ControlState>;

/// Creates a new run control channel, starting in [`ControlState::Run`].
pub fn create_run_control() -> (RunControl, RunControlRx) {
    let (tx, rx) = watch::channel(ControlState::Run);
    (RunControl(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn control_states_propagate_to_receivers() {
        let (control, mut rx) = create_run_control();
        assert_eq!(*rx.borrow_and_update(), ControlState::Run);

        control.pause();
        assert_eq!(*rx.borrow_and_update(), ControlState::Pause);

        control.resume();
        assert_eq!(*rx.borrow_and_update(), ControlState::Run);

        control.stop();
        assert_eq!(*rx.borrow_and_update(), ControlState::Stop);
    }

    #[tokio::test]
    async fn pause_before_subscription_is_visible() {
        let (control, _rx) = create_run_control();
        control.pause();

        let mut late = control.subscribe();
        assert_eq!(*late.borrow_and_update(), ControlState::Pause);
    }
}
