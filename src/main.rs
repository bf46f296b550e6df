use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as TokenDuration;
use domain::{AuthFlow, FlowSettings, RedisSessionStore, TokenIssuer};
use federation_auth::http::HttpClientBuilder;
use federation_auth::oauth::providers::esignet::{self, EsignetConfig};
use federation_auth::oauth::ClientAssertionSigner;
use federation_auth::session::{MemoryStore, SessionStore};
use log::*;
use service::config::{Config, SessionBackend};
use service::logging::Logger;

pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

/// How often expired records are swept from the in-memory session store.
const MEMORY_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting up adVouch auth server [{}]",
        config.runtime_env()
    );

    let missing = config.missing_required();
    if !missing.is_empty() {
        error!("Missing required configuration: {}", missing.join(", "));
        std::process::exit(1);
    }

    let app_state = match build_app_state(config).await {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = web::init_server(app_state).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

async fn build_app_state(config: Config) -> Result<web::AppState> {
    let esignet_config = esignet_config(&config)?;
    let signer = client_assertion_signer(&config, &esignet_config)?;

    let http_client = HttpClientBuilder::new()
        .with_timeout(Duration::from_secs(config.upstream_timeout_secs))
        .with_user_agent(format!("advouch-auth/{}", env!("CARGO_PKG_VERSION")))
        .build()?;
    let provider = esignet::Provider::new(esignet_config, http_client);

    let issuer = TokenIssuer::load_or_generate(
        &config.signing_key_path,
        config.persist_generated_signing_key,
        &config.token_issuer,
    )?;
    if let Some(path) = config.public_key_path() {
        issuer.write_public_key(path)?;
        info!("Wrote token verification key to {path}");
    }

    let settings = FlowSettings::try_from(&config)?;
    let store = session_store(&config).await?;

    let flow = AuthFlow::new(
        Arc::new(provider),
        signer,
        Arc::new(issuer),
        store,
        settings,
    );

    Ok(web::AppState::new(config, Arc::new(flow)))
}

fn esignet_config(config: &Config) -> Result<EsignetConfig> {
    let required = |value: Option<&str>, name: &str| {
        value
            .map(str::to_string)
            .ok_or_else(|| format!("{name} is not configured"))
    };

    Ok(EsignetConfig {
        client_id: required(config.client_id(), "CLIENT_ID")?,
        authorization_endpoint: required(
            config.authorization_endpoint(),
            "AUTHORIZATION_ENDPOINT",
        )?,
        token_endpoint: required(config.token_endpoint(), "TOKEN_ENDPOINT")?,
        userinfo_endpoint: required(config.userinfo_endpoint(), "USERINFO_ENDPOINT")?,
        client_assertion_type: config.client_assertion_type.clone(),
        scope: config.oauth_scope.clone(),
    })
}

/// The JWK takes precedence over the PEM file when both are configured.
fn client_assertion_signer(
    config: &Config,
    esignet_config: &EsignetConfig,
) -> Result<ClientAssertionSigner> {
    let ttl = i64::try_from(config.client_assertion_ttl_secs)
        .ok()
        .and_then(TokenDuration::try_seconds)
        .ok_or("CLIENT_ASSERTION_TTL_SECS is out of range")?;

    let signer = match (
        config.fayda_oauth_private_key(),
        config.client_private_key_path(),
    ) {
        (Some(jwk), _) => ClientAssertionSigner::from_jwk_base64(
            jwk,
            &esignet_config.client_id,
            &esignet_config.token_endpoint,
            ttl,
        )?,
        (None, Some(path)) => {
            let pem = fs::read_to_string(path)
                .map_err(|e| format!("failed to read client private key {path}: {e}"))?;
            ClientAssertionSigner::from_pem(
                &pem,
                &esignet_config.client_id,
                &esignet_config.token_endpoint,
                ttl,
            )?
        }
        (None, None) => return Err("no client assertion key is configured".into()),
    };

    info!(
        "Client assertions will be signed for client {}",
        signer.client_id()
    );
    Ok(signer)
}

async fn session_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    match config.session_backend {
        SessionBackend::Redis => {
            let connection = service::init_session_store(config).await?;
            info!("Session store connected to Redis");
            Ok(Arc::new(RedisSessionStore::new(connection)))
        }
        SessionBackend::Memory => {
            warn!("Using the in-memory session store; sessions are lost on restart");
            let store = MemoryStore::new();
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(MEMORY_CLEANUP_INTERVAL);
                loop {
                    interval.tick().await;
                    let removed = sweeper.cleanup_expired();
                    if removed > 0 {
                        debug!("Removed {removed} expired sessions");
                    }
                }
            });
            Ok(Arc::new(store))
        }
    }
}
