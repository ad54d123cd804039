use crate::{
    axum_http::error_responses::{AppError, AppResult},
    usecases::{bookings::BookingUseCase, outbox::EffectRunner},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use crates::{
    domain::{
        repositories::{
            booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
            payment_gateway::PaymentGateway, video_provider::VideoProvider,
        },
        value_objects::settings::BookingSettings,
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::{info, warn};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub struct WebhookState<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    bookings: BookingUseCase<S, P, V, N>,
    stripe: Arc<StripeClient>,
}

pub fn routes<S, P, V, N>(
    effects: EffectRunner<S, P, V, N>,
    settings: BookingSettings,
    stripe: Arc<StripeClient>,
) -> Router
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let state = WebhookState {
        bookings: BookingUseCase::new(effects, settings),
        stripe,
    };

    Router::new()
        .route("/stripe", post(stripe_webhook::<S, P, V, N>))
        .with_state(Arc::new(state))
}

pub async fn stripe_webhook<S, P, V, N>(
    State(state): State<Arc<WebhookState<S, P, V, N>>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing stripe-signature header".to_string()))?;

    let now = Utc::now();
    let event = state
        .stripe
        .verify_webhook_signature(&body, signature, now.timestamp())
        .map_err(|err| {
            warn!(error = %err, "webhooks: stripe signature rejected");
            AppError::BadRequest("invalid webhook signature".to_string())
        })?;

    info!(event_id = ?event.id, event_type = %event.type_, "webhooks: stripe event received");

    let payment_event = StripeClient::payment_event(&event)
        .map_err(|err| AppError::BadRequest(format!("unreadable payment event: {err}")))?;
    let outcome = state
        .bookings
        .handle_payment_event(payment_event, now)
        .await?;

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use tower::ServiceExt;

    use super::*;
    use crate::usecases::test_support::{Fixture, quiet_notifier, runner};
    use crates::domain::repositories::{
        payment_gateway::MockPaymentGateway, video_provider::MockVideoProvider,
    };

    const WEBHOOK_SECRET: &str = "whsec_router_test";

    fn app() -> Router {
        let fixture = Fixture::new();
        let effects = runner(
            &fixture,
            MockPaymentGateway::new(),
            MockVideoProvider::new(),
            quiet_notifier(),
        );
        let stripe = StripeClient::new("sk_test".to_string(), WEBHOOK_SECRET.to_string());
        routes(effects, BookingSettings::default(), Arc::new(stripe))
    }

    fn sign(payload: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload.as_bytes());
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn request(payload: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/stripe");
        if let Some(signature) = signature {
            builder = builder.header(STRIPE_SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    const CREATED_EVENT: &str = r#"{
        "id": "evt_router",
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_router" } }
    }"#;

    #[tokio::test]
    async fn missing_or_forged_signatures_are_bad_requests() {
        let missing = app().oneshot(request(CREATED_EVENT, None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let forged = app()
            .oneshot(request(
                CREATED_EVENT,
                Some("t=1,v1=deadbeef".to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(forged.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_events_outside_the_payment_flow_are_acknowledged() {
        let response = app()
            .oneshot(request(CREATED_EVENT, Some(sign(CREATED_EVENT))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["handled"], false);
    }
}
