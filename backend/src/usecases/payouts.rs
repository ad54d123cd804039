use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::payouts::InstructorPayoutEntity,
    errors::{BookingError, BookingResult},
    repositories::{
        booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway, video_provider::VideoProvider,
    },
    scheduling::payout_aggregator,
    value_objects::{
        clamp_limit,
        enums::{
            notification_types::NotificationType,
            payout_statuses::{PayoutBatchStatus, SessionPayoutStatus},
        },
        notifications::NotificationModel,
        payouts::{PayoutDetailsModel, PayoutListFilter, PayoutRunReport, PayoutSettlementModel},
    },
};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::usecases::outbox::{EffectRunner, Outbox};

fn payout_notification(
    payout: &InstructorPayoutEntity,
    notification_type: NotificationType,
    title: &str,
    message: String,
) -> NotificationModel {
    NotificationModel::new(
        payout.instructor_id,
        notification_type,
        title,
        message,
        json!({
            "payout_id": payout.id,
            "net_amount_minor": payout.net_amount_minor,
            "currency": payout.currency,
            "status": payout.status,
        }),
    )
}

pub struct PayoutUseCase<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    store: Arc<S>,
    effects: EffectRunner<S, P, V, N>,
}

impl<S, P, V, N> PayoutUseCase<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    pub fn new(effects: EffectRunner<S, P, V, N>) -> Self {
        Self {
            store: Arc::clone(effects.store()),
            effects,
        }
    }

    /// Batches the instructor's eligible sessions into one payout in PROCESSING.
    pub async fn aggregate(
        &self,
        instructor_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<PayoutDetailsModel> {
        let (details, outbox) = self.store.run_in_transaction(|tx| {
            let eligible = tx.list_payout_eligible_sessions(instructor_id)?;
            let batch = payout_aggregator::build_batch(instructor_id, &eligible, now)?;

            tx.insert_payout(&batch.payout, &batch.sessions)?;
            let session_ids: Vec<Uuid> = batch.sessions.iter().map(|s| s.session_id).collect();
            tx.set_sessions_payout_status(&session_ids, SessionPayoutStatus::Processing, now)?;

            let mut outbox = Outbox::new();
            outbox.notify(payout_notification(
                &batch.payout,
                NotificationType::PayoutCreated,
                "Payout on its way",
                format!(
                    "A payout of {} {} for {} sessions is being processed.",
                    batch.payout.net_amount_minor, batch.payout.currency, batch.payout.session_count
                ),
            ));

            Ok((
                PayoutDetailsModel {
                    payout: batch.payout,
                    sessions: batch.sessions,
                },
                outbox,
            ))
        })?;

        info!(
            payout_id = %details.payout.id,
            %instructor_id,
            sessions = details.payout.session_count,
            net_amount_minor = details.payout.net_amount_minor,
            "payouts: batch created"
        );
        self.effects.flush(outbox).await;
        Ok(details)
    }

    /// Batches every instructor with eligible sessions, one transaction each.
    pub async fn aggregate_all(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> BookingResult<PayoutRunReport> {
        let instructors = self
            .store
            .run_in_transaction(|tx| Ok(tx.list_instructors_with_eligible_sessions(limit)?))?;

        let mut report = PayoutRunReport {
            instructors: instructors.len(),
            ..Default::default()
        };
        for instructor_id in instructors {
            match self.aggregate(instructor_id, now).await {
                Ok(_) => report.created += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(%instructor_id, error = ?err, "payouts: failed to batch instructor");
                }
            }
        }
        Ok(report)
    }

    /// `instructor_scope` limits the listing to one instructor; `None` lists every payout.
    pub fn list(
        &self,
        instructor_scope: Option<Uuid>,
        mut filter: PayoutListFilter,
    ) -> BookingResult<Vec<InstructorPayoutEntity>> {
        if instructor_scope.is_some() {
            filter.instructor_id = instructor_scope;
        }
        filter.limit = Some(clamp_limit(filter.limit));

        self.store
            .run_in_transaction(|tx| Ok(tx.list_payouts(&filter)?))
            .inspect_err(|err| {
                error!(db_error = ?err, "payouts: failed to list payouts");
            })
    }

    pub fn get(
        &self,
        instructor_scope: Option<Uuid>,
        payout_id: Uuid,
    ) -> BookingResult<PayoutDetailsModel> {
        let details = self.store.run_in_transaction(|tx| {
            let payout = tx
                .find_payout(payout_id)?
                .ok_or_else(|| BookingError::not_found("instructor_payout", payout_id))?;
            let sessions = tx.list_payout_sessions(payout_id)?;
            Ok(PayoutDetailsModel { payout, sessions })
        })?;

        if instructor_scope.is_some_and(|id| id != details.payout.instructor_id) {
            return Err(BookingError::Forbidden(
                "payout belongs to another instructor".to_string(),
            ));
        }
        Ok(details)
    }

    /// Applies the payout provider's verdict. A failed batch hands its sessions back
    /// to the eligible pool.
    pub async fn settle(
        &self,
        payout_id: Uuid,
        model: PayoutSettlementModel,
        now: DateTime<Utc>,
    ) -> BookingResult<InstructorPayoutEntity> {
        if !model.status.is_settled() {
            return Err(BookingError::BadRequest(format!(
                "cannot settle a payout as {}",
                model.status
            )));
        }

        let (payout, outbox) = self.store.run_in_transaction(|tx| {
            let mut payout = tx
                .find_payout_for_update(payout_id)?
                .ok_or_else(|| BookingError::not_found("instructor_payout", payout_id))?;
            let current = payout.status()?;
            if current.is_settled() {
                return Err(BookingError::invalid_transition(
                    "instructor_payout",
                    current,
                    model.status,
                ));
            }

            let session_ids: Vec<Uuid> = tx
                .list_payout_sessions(payout_id)?
                .into_iter()
                .map(|row| row.session_id)
                .collect();
            let session_status = match model.status {
                PayoutBatchStatus::Paid => SessionPayoutStatus::Paid,
                _ => SessionPayoutStatus::Eligible,
            };
            tx.set_sessions_payout_status(&session_ids, session_status, now)?;

            payout.status = model.status.as_str().to_string();
            payout.provider_reference = model
                .provider_reference
                .clone()
                .or(payout.provider_reference.take());
            payout.failure_reason = model.failure_reason.clone();
            payout.settled_at = Some(now);
            tx.update_payout(&payout)?;

            let mut outbox = Outbox::new();
            let message = match model.status {
                PayoutBatchStatus::Paid => format!(
                    "Your payout of {} {} was paid.",
                    payout.net_amount_minor, payout.currency
                ),
                _ => format!(
                    "Your payout failed: {}",
                    model
                        .failure_reason
                        .as_deref()
                        .unwrap_or("no reason given")
                ),
            };
            outbox.notify(payout_notification(
                &payout,
                NotificationType::PayoutSettled,
                "Payout update",
                message,
            ));
            Ok((payout, outbox))
        })?;

        info!(%payout_id, status = %payout.status, "payouts: batch settled");
        self.effects.flush(outbox).await;
        Ok(payout)
    }
}
