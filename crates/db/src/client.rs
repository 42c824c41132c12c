//! SurrealDB connection management.
//!
//! The protocol is picked from the URI scheme (`ws://`, `http://`, `mem://`).

use std::sync::Arc;

use anyhow::Context;
use surrealdb::{engine::any::Any, Surreal};

use crate::error::StoreResult;

/// Connection parameters for [`Database::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub uri: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectOptions {
    /// Fresh in-memory database, used by tests and local development.
    pub fn in_memory() -> Self {
        Self {
            uri: "mem://".to_string(),
            namespace: "folio".to_string(),
            database: "test".to_string(),
            username: None,
            password: None,
        }
    }
}

/// Shared handle to the document store. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    client: Arc<Surreal<Any>>,
}

impl Database {
    /// Open the connection, sign in when credentials are set, and select the
    /// namespace and database.
    pub async fn connect(options: &ConnectOptions) -> StoreResult<Self> {
        let uri = sanitize_uri(&options.uri);
        tracing::debug!(target: "folio-db", %uri, "connecting to document store");

        let client = surrealdb::engine::any::connect(options.uri.as_str())
            .await
            .with_context(|| format!("failed to connect to document store at '{uri}'"))?;

        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            client
                .signin(surrealdb::opt::auth::Root {
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .with_context(|| format!("failed to authenticate with '{uri}'"))?;
        }

        client
            .use_ns(options.namespace.as_str())
            .use_db(options.database.as_str())
            .await
            .with_context(|| {
                format!(
                    "failed to select namespace '{}' / database '{}'",
                    options.namespace, options.database
                )
            })?;

        tracing::info!(
            target: "folio-db",
            %uri,
            namespace = %options.namespace,
            database = %options.database,
            "document store connected"
        );

        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub(crate) fn client(&self) -> &Surreal<Any> {
        &self.client
    }

    /// Invalidate the session shared by every clone of this handle, then
    /// release it. The socket itself closes once the last clone is dropped;
    /// clones still alive fail their next authenticated query.
    pub async fn shutdown(self) {
        if let Err(err) = self.client.invalidate().await {
            tracing::warn!(target: "folio-db", error = %err, "failed to invalidate store session");
        }
        let remaining = Arc::strong_count(&self.client).saturating_sub(1);
        drop(self);
        tracing::info!(target: "folio-db", remaining, "document store handle released");
    }
}

/// Strip credentials from a connection URI before logging it.
pub fn sanitize_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &uri[..scheme_end + 3], &uri[at..])
        }
        _ => uri.to_string(),
    }
}
