use anyhow::Result;
use backend::{
    usecases::{bookings::BookingUseCase, payouts::PayoutUseCase},
    wiring,
};
use crates::infra::db::postgres::postgres_connection;
use std::sync::Arc;
use tracing::{error, info};
use worker::{
    axum_http::{self, routers::internal_jobs::InternalJobsState},
    config, services,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let effects = wiring::live_effects(
        Arc::new(postgres_pool),
        wiring::stripe_client(&dotenvy_env.stripe),
        &dotenvy_env.video,
        &dotenvy_env.notifications,
    )?;

    let bookings = Arc::new(BookingUseCase::new(effects.clone(), dotenvy_env.booking));
    let payouts = Arc::new(PayoutUseCase::new(effects));
    let schedule = dotenvy_env.schedule;

    let expiry_loop = tokio::spawn(services::expiry_sweep::run(
        Arc::clone(&bookings),
        schedule.expiry_interval_secs,
        schedule.expiry_batch_size,
    ));

    let payout_loop = tokio::spawn(services::payout_batches::run(
        Arc::clone(&payouts),
        schedule.payout_interval_secs,
        schedule.payout_batch_limit,
    ));

    let jobs = InternalJobsState {
        token: dotenvy_env.internal.token.clone(),
        schedule,
        bookings,
        payouts,
    };
    let server = tokio::spawn(axum_http::http_serve::start(
        dotenvy_env.worker_server.clone(),
        jobs,
    ));

    tokio::select! {
        result = expiry_loop => result??,
        result = payout_loop => result??,
        result = server => result??,
    };
    Ok(())
}
