use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    errors::{BookingError, BookingResult},
    repositories::{
        booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway, video_provider::VideoProvider,
    },
    value_objects::{
        enums::{
            notification_types::NotificationType, payment_statuses::PaymentStatus,
            payout_statuses::SessionPayoutStatus,
        },
        notifications::NotificationModel,
    },
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Side effect recorded inside a transaction and run once it has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(NotificationModel),
    Refund {
        booking_id: Uuid,
        intent_ref: String,
        amount_minor: i64,
        reason: String,
    },
    Capture {
        session_id: Uuid,
    },
    EndRoom {
        session_id: Uuid,
        room_ref: String,
    },
    FetchRecording {
        session_id: Uuid,
        room_ref: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    effects: Vec<Effect>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn notify(&mut self, notification: NotificationModel) {
        self.effects.push(Effect::Notify(notification));
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}

/// Runs outbox effects against the external collaborators.
///
/// Failures never undo the committed state. They are logged and, for payments,
/// recorded as a sub-status on the booking or session.
pub struct EffectRunner<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    store: Arc<S>,
    payments: Arc<P>,
    video: Arc<V>,
    notifier: Arc<N>,
}

impl<S, P, V, N> Clone for EffectRunner<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            payments: Arc::clone(&self.payments),
            video: Arc::clone(&self.video),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<S, P, V, N> EffectRunner<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, payments: Arc<P>, video: Arc<V>, notifier: Arc<N>) -> Self {
        Self {
            store,
            payments,
            video,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn payments(&self) -> &Arc<P> {
        &self.payments
    }

    pub fn video(&self) -> &Arc<V> {
        &self.video
    }

    pub async fn flush(&self, outbox: Outbox) {
        for effect in outbox.effects {
            match effect {
                Effect::Notify(notification) => self.notify(notification).await,
                Effect::Refund {
                    booking_id,
                    intent_ref,
                    amount_minor,
                    reason,
                } => {
                    self.refund(booking_id, &intent_ref, amount_minor, &reason)
                        .await
                }
                Effect::Capture { session_id } => {
                    if let Err(err) = self.capture_session(session_id).await {
                        error!(%session_id, error = ?err, "outbox: capture bookkeeping failed");
                    }
                }
                Effect::EndRoom {
                    session_id,
                    room_ref,
                } => {
                    if let Err(err) = self.video.end_room(&room_ref).await {
                        warn!(%session_id, %room_ref, error = ?err, "outbox: failed to end meeting room");
                    }
                }
                Effect::FetchRecording {
                    session_id,
                    room_ref,
                } => self.fetch_recording(session_id, &room_ref).await,
            }
        }
    }

    async fn notify(&self, notification: NotificationModel) {
        let user_id = notification.user_id;
        let notification_type = notification.notification_type;
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(
                %user_id,
                %notification_type,
                error = ?err,
                "outbox: notification dropped"
            );
        }
    }

    /// Captures the payment of a completed session and records the payout sub-status.
    ///
    /// Only sessions whose payout is still PENDING or FAILED are captured. The session is
    /// claimed as CAPTURING before the gateway call, so concurrent attempts skip it.
    pub async fn capture_session(&self, session_id: Uuid) -> BookingResult<SessionPayoutStatus> {
        const CAPTURABLE: [SessionPayoutStatus; 2] =
            [SessionPayoutStatus::Pending, SessionPayoutStatus::Failed];

        let now = Utc::now();
        let claim = self.store.run_in_transaction(|tx| {
            let session = tx
                .find_session_for_update(session_id)?
                .ok_or_else(|| BookingError::not_found("live_session", session_id))?;
            let current = session.payout_status()?;
            if !CAPTURABLE.contains(&current) {
                return Ok(Err(current));
            }

            let Some(intent_ref) = session.payment_intent_ref else {
                tx.transition_session_payout_status(
                    session_id,
                    &CAPTURABLE,
                    SessionPayoutStatus::NotApplicable,
                    now,
                )?;
                return Ok(Err(SessionPayoutStatus::NotApplicable));
            };

            if !tx.transition_session_payout_status(
                session_id,
                &CAPTURABLE,
                SessionPayoutStatus::Capturing,
                now,
            )? {
                return Ok(Err(SessionPayoutStatus::Capturing));
            }
            Ok(Ok(intent_ref))
        })?;

        let intent_ref = match claim {
            Ok(intent_ref) => intent_ref,
            Err(status) => {
                info!(%session_id, payout_status = %status, "outbox: capture not attempted");
                return Ok(status);
            }
        };

        let next = match self.payments.capture(&intent_ref).await {
            Ok(outcome) if outcome.success => {
                info!(
                    %session_id,
                    amount_minor = outcome.amount_minor,
                    "outbox: payment captured"
                );
                SessionPayoutStatus::Eligible
            }
            Ok(_) => {
                warn!(%session_id, "outbox: capture declined by gateway");
                SessionPayoutStatus::Failed
            }
            Err(err) => {
                error!(%session_id, error = ?err, "outbox: capture request failed");
                SessionPayoutStatus::Failed
            }
        };

        let recorded = self.store.run_in_transaction(|tx| {
            Ok(tx.transition_session_payout_status(
                session_id,
                &[SessionPayoutStatus::Capturing],
                next,
                Utc::now(),
            )?)
        })?;
        if !recorded {
            warn!(%session_id, payout_status = %next, "outbox: capture claim was released before recording");
        }

        Ok(next)
    }

    async fn refund(&self, booking_id: Uuid, intent_ref: &str, amount_minor: i64, reason: &str) {
        let result = self.payments.refund(intent_ref, amount_minor, reason).await;
        let now = Utc::now();

        let recorded = self.store.run_in_transaction(|tx| {
            let Some(mut booking) = tx.find_booking_for_update(booking_id)? else {
                return Ok(None);
            };
            let expected = booking.status()?;

            let status = match &result {
                Ok(outcome) => {
                    booking.refunded_amount_minor += outcome.amount_minor;
                    if booking.refunded_amount_minor >= booking.effective_price_minor() {
                        PaymentStatus::Refunded
                    } else {
                        PaymentStatus::PartiallyRefunded
                    }
                }
                Err(_) => PaymentStatus::RefundFailed,
            };
            booking.payment_status = status.as_str().to_string();
            booking.updated_at = now;

            if !tx.update_booking(&booking, expected)? {
                return Err(BookingError::Conflict(format!(
                    "booking {booking_id} changed while recording refund"
                )));
            }
            Ok(Some(booking))
        });

        match (result, recorded) {
            (Ok(outcome), Ok(Some(booking))) => {
                info!(
                    %booking_id,
                    refund_id = %outcome.refund_id,
                    amount_minor = outcome.amount_minor,
                    "outbox: refund issued"
                );
                self.notify(NotificationModel::new(
                    booking.consumer_id,
                    NotificationType::RefundIssued,
                    "Refund issued",
                    format!(
                        "A refund of {} {} is on its way.",
                        outcome.amount_minor, booking.currency
                    ),
                    json!({ "booking_id": booking_id, "refund_id": outcome.refund_id }),
                ))
                .await;
            }
            (Err(err), _) => {
                error!(%booking_id, error = ?err, "outbox: refund request failed");
            }
            (Ok(_), Ok(None)) => {
                warn!(%booking_id, "outbox: refunded booking no longer exists");
            }
            (Ok(outcome), Err(err)) => {
                error!(
                    %booking_id,
                    refund_id = %outcome.refund_id,
                    db_error = ?err,
                    "outbox: refund issued but not recorded"
                );
            }
        }
    }

    async fn fetch_recording(&self, session_id: Uuid, room_ref: &str) {
        let url = match self.video.get_recording(room_ref).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                info!(%session_id, "outbox: no recording available yet");
                return;
            }
            Err(err) => {
                warn!(%session_id, error = ?err, "outbox: failed to fetch recording");
                return;
            }
        };

        let now = Utc::now();
        let result = self.store.run_in_transaction(|tx| {
            let Some(mut session) = tx.find_session_for_update(session_id)? else {
                return Ok(());
            };
            let expected = session.status()?;
            session.recording_url = Some(url);
            session.updated_at = now;
            tx.update_session(&session, expected)?;
            Ok(())
        });

        if let Err(err) = result {
            error!(%session_id, db_error = ?err, "outbox: failed to store recording url");
        }
    }
}

#[cfg(test)]
mod tests {
    use crates::domain::{
        repositories::{
            notification_dispatcher::MockNotificationDispatcher,
            payment_gateway::MockPaymentGateway, video_provider::MockVideoProvider,
        },
        value_objects::payments::{CaptureOutcome, RefundOutcome},
    };

    use super::*;
    use crate::usecases::test_support::{Fixture, runner};

    #[tokio::test]
    async fn capture_without_intent_is_not_applicable() {
        let fixture = Fixture::new();
        let session = fixture.completed_session(None);

        let runner = runner(
            &fixture,
            MockPaymentGateway::new(),
            MockVideoProvider::new(),
            MockNotificationDispatcher::new(),
        );
        let status = runner.capture_session(session.id).await.unwrap();

        assert_eq!(status, SessionPayoutStatus::NotApplicable);
        assert_eq!(
            fixture.session(session.id).payout_status,
            SessionPayoutStatus::NotApplicable.as_str()
        );
    }

    #[tokio::test]
    async fn failed_capture_marks_payout_failed() {
        let fixture = Fixture::new();
        let session = fixture.completed_session(Some("pi_1"));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_capture()
            .returning(|_| Box::pin(async move { Err(anyhow::anyhow!("gateway down")) }));

        let runner = runner(
            &fixture,
            payments,
            MockVideoProvider::new(),
            MockNotificationDispatcher::new(),
        );
        let status = runner.capture_session(session.id).await.unwrap();

        assert_eq!(status, SessionPayoutStatus::Failed);
    }

    #[tokio::test]
    async fn capture_is_skipped_once_eligible() {
        let fixture = Fixture::new();
        let session = fixture.completed_session(Some("pi_1"));

        let mut payments = MockPaymentGateway::new();
        payments.expect_capture().times(1).returning(|_| {
            Box::pin(async move {
                Ok(CaptureOutcome {
                    success: true,
                    amount_minor: 5000,
                })
            })
        });

        let runner = runner(
            &fixture,
            payments,
            MockVideoProvider::new(),
            MockNotificationDispatcher::new(),
        );
        assert_eq!(
            runner.capture_session(session.id).await.unwrap(),
            SessionPayoutStatus::Eligible
        );
        assert_eq!(
            runner.capture_session(session.id).await.unwrap(),
            SessionPayoutStatus::Eligible
        );
    }

    #[tokio::test]
    async fn racing_captures_hit_the_gateway_once() {
        let fixture = Fixture::new();
        let session = fixture.completed_session(Some("pi_race"));

        let mut payments = MockPaymentGateway::new();
        payments.expect_capture().times(1).returning(|_| {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(CaptureOutcome {
                    success: true,
                    amount_minor: 5000,
                })
            })
        });

        let runner = runner(
            &fixture,
            payments,
            MockVideoProvider::new(),
            MockNotificationDispatcher::new(),
        );
        let first = runner.clone();
        let second = runner.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.capture_session(session.id).await }),
            tokio::spawn(async move { second.capture_session(session.id).await }),
        );
        let mut outcomes = vec![a.unwrap().unwrap(), b.unwrap().unwrap()];
        outcomes.sort_by_key(|status| status.as_str());

        assert_eq!(
            outcomes,
            vec![SessionPayoutStatus::Capturing, SessionPayoutStatus::Eligible]
        );
        assert_eq!(
            fixture.session(session.id).payout_status,
            SessionPayoutStatus::Eligible.as_str()
        );
    }

    #[tokio::test]
    async fn partial_refund_is_recorded_and_announced() {
        let fixture = Fixture::new();
        let booking = fixture.paid_booking("pi_9", 10_000);

        let mut payments = MockPaymentGateway::new();
        payments.expect_refund().returning(|_, amount, _| {
            Box::pin(async move {
                Ok(RefundOutcome {
                    refund_id: "re_1".to_string(),
                    amount_minor: amount,
                })
            })
        });
        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_notify()
            .withf(|n| n.notification_type == NotificationType::RefundIssued)
            .times(1)
            .returning(|_| Box::pin(async move { Ok(()) }));

        let mut outbox = Outbox::new();
        outbox.push(Effect::Refund {
            booking_id: booking.id,
            intent_ref: "pi_9".to_string(),
            amount_minor: 5_000,
            reason: "cancelled".to_string(),
        });
        runner(&fixture, payments, MockVideoProvider::new(), notifier).flush(outbox).await;

        let stored = fixture.booking(booking.id);
        assert_eq!(stored.refunded_amount_minor, 5_000);
        assert_eq!(
            stored.payment_status,
            PaymentStatus::PartiallyRefunded.as_str()
        );
    }

    #[tokio::test]
    async fn refund_failure_is_recorded_as_sub_status() {
        let fixture = Fixture::new();
        let booking = fixture.paid_booking("pi_9", 10_000);

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_refund()
            .returning(|_, _, _| Box::pin(async move { Err(anyhow::anyhow!("card expired")) }));

        let mut outbox = Outbox::new();
        outbox.push(Effect::Refund {
            booking_id: booking.id,
            intent_ref: "pi_9".to_string(),
            amount_minor: 10_000,
            reason: "cancelled".to_string(),
        });
        runner(
            &fixture,
            payments,
            MockVideoProvider::new(),
            MockNotificationDispatcher::new(),
        )
            .flush(outbox)
            .await;

        assert_eq!(
            fixture.booking(booking.id).payment_status,
            PaymentStatus::RefundFailed.as_str()
        );
    }
}
