use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use migration::{Migrator, MigratorTrait};
use school_admin::app::{AppOptions, create_app};
use school_admin::cache::LookupCache;
use school_admin::config::{APP_CONFIG, Collections};
use school_admin::identity::{HttpIdentityClient, IdentityService, LocalIdentityService};
use school_admin::state::AppState;
use school_admin::store::{DocumentStore, LocalBlobStore, SeaOrmDocumentStore};
use school_admin::utils::tracing::init_standard_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    init_standard_tracing(env!("CARGO_CRATE_NAME"), &APP_CONFIG.log_level);

    tracing::info!("Starting application...");

    let collections = Collections::from_config(&APP_CONFIG).context("Invalid collection configuration")?;

    tokio::fs::create_dir_all(&APP_CONFIG.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload folder {}", APP_CONFIG.upload_dir))?;

    let db = sea_orm::Database::connect(&APP_CONFIG.database_url)
        .await
        .context("Failed to connect to database")?;
    Migrator::up(&db, None).await.context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let store: Arc<dyn DocumentStore> = Arc::new(SeaOrmDocumentStore::new(db));
    let cache = Arc::new(LookupCache::new(store.clone(), collections.clone()));
    let local_identity = Arc::new(LocalIdentityService::new(
        store.clone(),
        &collections.user,
        &APP_CONFIG.student_email_domain,
    ));
    let identity: Arc<dyn IdentityService> = match &APP_CONFIG.identity_url {
        Some(url) => {
            tracing::info!(identity_url = %url, "Using remote identity service");
            Arc::new(HttpIdentityClient::new(url))
        }
        None => local_identity.clone(),
    };

    for (kind, result) in cache.refresh_all().await {
        match result {
            Ok(count) => tracing::info!(kind = %kind, count, "Loaded lookup cache"),
            Err(_) => tracing::warn!(kind = %kind, "Starting with an empty lookup cache"),
        }
    }

    let state = AppState {
        store,
        cache,
        identity,
        local_identity,
        blobs: Arc::new(LocalBlobStore::new(&APP_CONFIG.upload_dir, &APP_CONFIG.public_base_url)),
        collections,
        attachment_bucket: APP_CONFIG.attachment_bucket_id.clone(),
        app_env: APP_CONFIG.app_env.clone(),
    };
    let app = create_app(
        state,
        &AppOptions {
            swagger_enabled: APP_CONFIG.swagger_enabled,
            cors_allowed_origins: APP_CONFIG.cors_allowed_origins.clone(),
            upload_dir: Some(PathBuf::from(&APP_CONFIG.upload_dir)),
        },
    );

    let http_address = format!("0.0.0.0:{}", APP_CONFIG.port);
    tracing::info!("HTTP server listening on {}", &http_address);

    let listener = tokio::net::TcpListener::bind(&http_address)
        .await
        .with_context(|| format!("Failed to bind {}", http_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server error")?;

    Ok(())
}
