//! Folio application library.
//!
//! Wires the authors and books modules onto the folio kernel: connects the
//! document store, applies module migrations and serves the HTTP API.

pub mod modules;
pub mod utils;

use anyhow::Context;
use axum::Router;
use folio_db::Database;
use folio_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Store handle and module registry ready to serve.
pub struct App {
    pub db: Database,
    pub registry: ModuleRegistry,
}

impl App {
    /// Connect to the store, register modules and apply pending migrations.
    pub async fn prepare(settings: &Settings) -> anyhow::Result<Self> {
        let db = Database::connect(&settings.database.connect_options())
            .await
            .context("failed to connect to the document store")?;

        let registry = modules::register_all(&db);
        let applied = db
            .apply_migrations(&registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, modules = registry.module_count(), "store schema ready");

        Ok(Self { db, registry })
    }

    /// Router with every module mounted, as served by [`App::serve`].
    pub fn router(&self, settings: &Settings) -> Router {
        folio_http::build_router(&self.registry, settings)
    }

    /// Run the module lifecycle around the HTTP server until shutdown.
    pub async fn serve(self, settings: &Settings) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings,
            db: &self.db,
        };
        self.registry.init_modules(&ctx).await?;
        self.registry.start_modules(&ctx).await?;

        let served = folio_http::start_server(&self.registry, settings).await;

        self.registry.stop_modules().await?;
        self.db.shutdown().await;
        served
    }
}

/// Apply pending migrations and exit. Returns how many were applied.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = Database::connect(&settings.database.connect_options())
        .await
        .context("failed to connect to the document store")?;
    let registry = modules::register_all(&db);
    let applied = db
        .apply_migrations(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    db.shutdown().await;
    Ok(applied)
}

/// Prepare and serve with the given settings.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = settings.environment.as_str(),
        db = %folio_db::client::sanitize_uri(&settings.database.uri),
        "folio starting"
    );
    App::prepare(&settings).await?.serve(&settings).await
}
