use std::sync::Arc;

use anyhow::Result;
use crates::{
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::booking_store::BookingPostgres,
        },
        meetings::video_room_client::VideoRoomClient,
        notifications::NotificationChannel,
    },
    payments::stripe_client::StripeClient,
};
use tracing::info;

use crate::{
    config::config_model::{Notifications, Stripe, Video},
    usecases::outbox::EffectRunner,
};

/// Effect runner backed by the production collaborators.
pub type LiveEffects = EffectRunner<BookingPostgres, StripeClient, VideoRoomClient, NotificationChannel>;

pub fn stripe_client(stripe: &Stripe) -> Arc<StripeClient> {
    Arc::new(StripeClient::new(
        stripe.secret_key.clone(),
        stripe.webhook_secret.clone(),
    ))
}

/// Must run inside a tokio runtime when a notification webhook is configured.
pub fn live_effects(
    db_pool: Arc<PgPoolSquad>,
    stripe: Arc<StripeClient>,
    video: &Video,
    notifications: &Notifications,
) -> Result<LiveEffects> {
    let store = BookingPostgres::new(db_pool);
    let video_client = VideoRoomClient::new(&video.api_url, video.api_key.clone())?;
    let notifier = NotificationChannel::from_config(notifications.webhook_url.as_deref())?;
    info!(
        webhook_notifications = notifications.webhook_url.is_some(),
        "wiring: collaborators ready"
    );

    Ok(EffectRunner::new(
        Arc::new(store),
        stripe,
        Arc::new(video_client),
        Arc::new(notifier),
    ))
}
