//! MembershipCoordinator - Issues enter / exit / change-stop.
//!
//! Each action is one correlated request that resolves exactly once to an
//! [`ActionOutcome`]. Connectivity problems, timeouts and server rejections
//! all become unsuccessful outcomes; nothing here returns an error.
//!
//! # Single pending action
//!
//! At most one action is outstanding per coordinator. This is a client-side
//! discipline only; the server does not enforce it. A second action while
//! one is pending resolves immediately with "another action is in progress"
//! and sends nothing.
//!
//! # Position resync
//!
//! Every action that reached the server is followed by exactly one position
//! refresh, sequenced after the action's reply, whether it succeeded or not.
//! The busy flag stays raised until that refresh has completed. No action is
//! retried automatically.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::foundation::StopId;
use crate::domain::queue::{ActionKind, ActionOutcome, ExitReason};
use crate::ports::{ChannelError, QueueChannel};

use super::notices::{Notice, Notifier};
use super::position::PositionResolver;

/// Message of the outcome returned while another action is pending.
pub const BUSY_MESSAGE: &str = "another action is in progress";

/// Message of the outcome returned by `enter` while already queued.
pub const ALREADY_QUEUED_MESSAGE: &str = "already in a queue";

pub struct MembershipCoordinator {
    channel: Arc<dyn QueueChannel>,
    position: Arc<PositionResolver>,
    notifier: Notifier,
    busy: watch::Sender<bool>,
}

/// Lowers the busy flag when the action completes or is dropped.
struct BusyGuard<'a> {
    busy: &'a watch::Sender<bool>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.send_replace(false);
    }
}

impl MembershipCoordinator {
    pub fn new(
        channel: Arc<dyn QueueChannel>,
        position: Arc<PositionResolver>,
        notifier: Notifier,
    ) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            channel,
            position,
            notifier,
            busy,
        }
    }

    /// True while an action (and its position refresh) is outstanding.
    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    pub fn watch_busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    /// Join the queue at `stop_id`.
    ///
    /// Refused locally when the resolved position already says "in a queue".
    pub async fn enter(&self, stop_id: StopId) -> ActionOutcome {
        let Some(_busy) = self.begin() else {
            return self.reject(ActionKind::Enter, BUSY_MESSAGE);
        };
        if self.position.snapshot().position.in_queue {
            return self.reject(ActionKind::Enter, ALREADY_QUEUED_MESSAGE);
        }
        if !self.channel.status().is_connected {
            return self.not_connected(ActionKind::Enter);
        }

        info!(%stop_id, "entering queue");
        let result = self.channel.enter(stop_id).await;
        self.finish(ActionKind::Enter, result).await
    }

    /// Leave the current queue. `reason` is mandatory.
    pub async fn exit(&self, reason: ExitReason, observations: Option<String>) -> ActionOutcome {
        let Some(_busy) = self.begin() else {
            return self.reject(ActionKind::Exit, BUSY_MESSAGE);
        };
        if !self.channel.status().is_connected {
            return self.not_connected(ActionKind::Exit);
        }

        info!(%reason, "leaving queue");
        let result = self.channel.exit(reason, observations).await;
        self.finish(ActionKind::Exit, result).await
    }

    /// Leave the current queue and join `new_stop_id` as one server-side step.
    ///
    /// Whatever the outcome, the position is refreshed afterward so the view
    /// follows whichever membership the server ended up with.
    pub async fn change_stop(
        &self,
        new_stop_id: StopId,
        observations: Option<String>,
    ) -> ActionOutcome {
        let Some(_busy) = self.begin() else {
            return self.reject(ActionKind::ChangeStop, BUSY_MESSAGE);
        };
        if !self.channel.status().is_connected {
            return self.not_connected(ActionKind::ChangeStop);
        }

        info!(%new_stop_id, "changing stop");
        let result = self.channel.change_stop(new_stop_id, observations).await;
        self.finish(ActionKind::ChangeStop, result).await
    }

    fn begin(&self) -> Option<BusyGuard<'_>> {
        let acquired = self.busy.send_if_modified(|busy| {
            if *busy {
                return false;
            }
            *busy = true;
            true
        });
        acquired.then_some(BusyGuard { busy: &self.busy })
    }

    fn reject(&self, action: ActionKind, message: &str) -> ActionOutcome {
        warn!(%action, reason = message, "action refused");
        self.notifier.publish(Notice::ActionRejected {
            action,
            message: message.to_string(),
        });
        ActionOutcome::failed(message)
    }

    fn not_connected(&self, action: ActionKind) -> ActionOutcome {
        let outcome = ActionOutcome::not_connected();
        self.publish_failure(action, &outcome);
        outcome
    }

    fn publish_failure(&self, action: ActionKind, outcome: &ActionOutcome) {
        let message = outcome.display_message().unwrap_or_default();
        warn!(%action, reason = %message, "action failed");
        self.notifier
            .publish(Notice::ActionRejected { action, message });
    }

    async fn finish(
        &self,
        action: ActionKind,
        result: Result<ActionOutcome, ChannelError>,
    ) -> ActionOutcome {
        let reached_server = !matches!(
            result,
            Err(ChannelError::NotConnected) | Err(ChannelError::Closed)
        );
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(ChannelError::NotConnected) | Err(ChannelError::Closed) => {
                ActionOutcome::not_connected()
            }
            Err(e) => ActionOutcome::failed(e.to_string()),
        };

        if outcome.success {
            info!(%action, "action succeeded");
        } else {
            self.publish_failure(action, &outcome);
        }

        if reached_server {
            if let Err(e) = self.position.refresh().await {
                warn!(%action, error = %e, "position refresh after action failed");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{stop, stop_id, Call, MockQueueChannel};
    use crate::domain::queue::MyPosition;
    use std::time::Duration;

    struct Fixture {
        mock: Arc<MockQueueChannel>,
        position: Arc<PositionResolver>,
        coordinator: Arc<MembershipCoordinator>,
        notices: tokio::sync::broadcast::Receiver<Notice>,
    }

    fn fixture(mock: MockQueueChannel) -> Fixture {
        let mock = Arc::new(mock);
        let position = Arc::new(PositionResolver::new(mock.clone()));
        let notifier = Notifier::default();
        let notices = notifier.subscribe();
        let coordinator = Arc::new(MembershipCoordinator::new(
            mock.clone(),
            position.clone(),
            notifier,
        ));
        Fixture {
            mock,
            position,
            coordinator,
            notices,
        }
    }

    fn position_calls(mock: &MockQueueChannel) -> usize {
        mock.count(|c| *c == Call::MyPosition)
    }

    #[tokio::test]
    async fn successful_enter_refreshes_position() {
        let f = fixture(MockQueueChannel::connected());
        f.mock
            .set_position(MyPosition::at(stop(5, "Toquepala"), 3, 3));

        let outcome = f.coordinator.enter(stop_id(5)).await;

        assert_eq!(outcome, ActionOutcome::succeeded());
        assert_eq!(
            f.mock.calls(),
            vec![Call::Enter(stop_id(5)), Call::MyPosition]
        );
        let state = f.position.snapshot();
        assert!(state.position.is_at(stop_id(5)));
        assert_eq!(state.position.position, Some(3));
        assert!(!f.coordinator.is_busy());
    }

    #[tokio::test]
    async fn rejected_action_still_refreshes_and_notifies() {
        let mut f = fixture(MockQueueChannel::connected());
        f.mock.push_outcome(Ok(ActionOutcome::failed("stop is full")));

        let outcome = f.coordinator.enter(stop_id(5)).await;

        assert_eq!(outcome, ActionOutcome::failed("stop is full"));
        assert_eq!(position_calls(&f.mock), 1);
        assert_eq!(
            f.notices.try_recv().unwrap(),
            Notice::ActionRejected {
                action: ActionKind::Enter,
                message: "stop is full".to_string()
            }
        );
    }

    #[tokio::test]
    async fn disconnected_actions_fail_without_sending() {
        let f = fixture(MockQueueChannel::disconnected());

        let enter = f.coordinator.enter(stop_id(5)).await;
        let exit = f.coordinator.exit(ExitReason::ShiftEnd, None).await;
        let change = f.coordinator.change_stop(stop_id(7), None).await;

        for outcome in [enter, exit, change] {
            assert_eq!(outcome, ActionOutcome::not_connected());
        }
        assert!(f.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn enter_refused_while_already_queued() {
        let mut f = fixture(MockQueueChannel::connected());
        f.mock
            .set_position(MyPosition::at(stop(5, "Toquepala"), 1, 1));
        f.position.refresh().await.unwrap();
        f.mock.clear_calls();

        let outcome = f.coordinator.enter(stop_id(7)).await;

        assert_eq!(outcome, ActionOutcome::failed(ALREADY_QUEUED_MESSAGE));
        assert!(f.mock.calls().is_empty());
        assert!(matches!(
            f.notices.try_recv().unwrap(),
            Notice::ActionRejected {
                action: ActionKind::Enter,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn second_action_while_busy_is_refused() {
        let f = fixture(MockQueueChannel::connected());
        let gate = f.mock.gate_actions();

        let c = f.coordinator.clone();
        let first = tokio::spawn(async move { c.exit(ExitReason::ServiceTaken, None).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.coordinator.is_busy());

        let second = f.coordinator.change_stop(stop_id(7), None).await;
        assert_eq!(second, ActionOutcome::failed(BUSY_MESSAGE));

        gate.notify_one();
        assert!(first.await.unwrap().success);
        assert!(!f.coordinator.is_busy());
        assert_eq!(f.mock.count(|c| matches!(c, Call::ChangeStop(..))), 0);
    }

    #[tokio::test]
    async fn change_stop_refreshes_even_on_failure() {
        let f = fixture(MockQueueChannel::connected());
        f.mock
            .push_outcome(Ok(ActionOutcome::failed("target stop inactive")));

        let outcome = f
            .coordinator
            .change_stop(stop_id(7), Some("closer".to_string()))
            .await;

        assert!(!outcome.success);
        assert_eq!(
            f.mock.calls(),
            vec![
                Call::ChangeStop(stop_id(7), Some("closer".to_string())),
                Call::MyPosition
            ]
        );
    }

    #[tokio::test]
    async fn timeout_becomes_failed_outcome() {
        let f = fixture(MockQueueChannel::connected());
        f.mock
            .push_outcome(Err(ChannelError::Timeout(Duration::from_secs(10))));

        let outcome = f.coordinator.exit(ExitReason::Emergency, None).await;

        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("no reply"));
        assert_eq!(position_calls(&f.mock), 1);
        assert!(!f.coordinator.is_busy());
    }

    #[tokio::test]
    async fn connection_lost_mid_request_still_attempts_refresh() {
        let f = fixture(MockQueueChannel::connected());
        f.mock.push_outcome(Err(ChannelError::ConnectionLost));

        let outcome = f.coordinator.enter(stop_id(5)).await;

        assert!(!outcome.success);
        assert_eq!(position_calls(&f.mock), 1);
    }

    #[tokio::test]
    async fn exit_sends_reason_and_observations() {
        let f = fixture(MockQueueChannel::connected());

        f.coordinator
            .exit(
                ExitReason::Other("vehicle_breakdown".to_string()),
                Some("flat tyre".to_string()),
            )
            .await;

        assert_eq!(
            f.mock.calls()[0],
            Call::Exit(
                ExitReason::Other("vehicle_breakdown".to_string()),
                Some("flat tyre".to_string())
            )
        );
    }
}
