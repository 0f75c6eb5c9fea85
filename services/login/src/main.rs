//! Login Service binary.
//!
//! Wires the OTP engine, its collaborators, and the shared verification
//! chain into one HTTP service.

use anyhow::Context;
use login_service::api::{self, AppState};
use login_service::config::Config;
use login_service::mail::HttpOtpMailer;
use login_service::members::HttpMemberDirectory;
use login_service::otp::OtpEngine;
use login_service::storage::{MemoryOtpStore, OtpStore, RedisOtpStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use verein_auth::{KeySetCache, SessionIssuer, TokenVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("starting login service");

    let config = Config::from_env().context("loading configuration")?;

    let store: Arc<dyn OtpStore> = match config.redis_url.as_deref() {
        Some(url) => {
            let store = RedisOtpStore::connect(url)
                .await
                .context("connecting to redis")?;
            info!("otp store: redis");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set; passcodes are stored in process memory");
            Arc::new(MemoryOtpStore::new())
        }
    };

    let directory = HttpMemberDirectory::new(
        config.member_directory_url.clone(),
        config.auth.internal_api_key.clone(),
    )?;
    let mailer = HttpOtpMailer::new(
        config.mailer_url.clone(),
        config.auth.internal_api_key.clone(),
    )?;

    let keys = Arc::new(KeySetCache::new(&config.auth)?);
    keys.warm().await;

    let engine = OtpEngine::new(
        store,
        Arc::new(directory),
        Arc::new(mailer),
        SessionIssuer::new(&config.auth),
    )
    .with_ttl(config.otp_ttl)
    .with_max_attempts(config.otp_max_attempts);

    let state = Arc::new(AppState {
        engine,
        verifier: TokenVerifier::new(&config.auth, keys),
    });

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .context("binding listener")?;
    let addr = listener.local_addr().context("reading listener address")?;
    info!(%addr, "login service listening");

    api::serve(listener, app).await.context("serving")?;

    info!("login service stopped");
    Ok(())
}
