//! Router builder for the folio HTTP server

use axum::{
    http::{HeaderName, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use crate::error::{attach_request_path, AppError, ErrorBody};
use crate::MakeRequestUuid;
use folio_kernel::ModuleRegistry;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
    prefix: String,
}

impl RouterBuilder {
    /// Create a new router builder; routes are mounted under `/{prefix}`
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            router: Router::new(),
            prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("/{prefix}")
            },
        }
    }

    /// Add a route under the prefix
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        let full_path = format!("{}{}", self.prefix, path);
        self.router = self.router.route(&full_path, route);
        self
    }

    /// Mount a module's router under `/{prefix}/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("{}/{}", self.prefix, module_name);
        self.router = self.router.nest(&api_path, module_router);
        self
    }

    /// Answer unmatched routes, and unsupported methods on known routes,
    /// with a 404 envelope. Call after every route is mounted.
    pub fn with_fallback(mut self) -> Self {
        self.router = self
            .router
            .method_not_allowed_fallback(unmatched_route)
            .fallback(unmatched_route);
        self
    }

    /// Fill the request path into error envelopes
    pub fn with_error_paths(mut self) -> Self {
        self.router = self.router.layer(middleware::from_fn(attach_request_path));
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware
    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Add request ID middleware; the id is echoed on the response
    pub fn with_request_id(mut self) -> Self {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(SetRequestIdLayer::new(header, MakeRequestUuid));
        self
    }

    /// Add timeout middleware; a timed out request gets a 408 envelope.
    /// Call before [`RouterBuilder::with_error_paths`] so the envelope
    /// carries the request path.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_millis(timeout_ms),
            ))
            .layer(middleware::map_response(envelope_timeout));
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merge_openapi(&self.prefix, registry);

        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "merged OpenAPI document is invalid, serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("Folio API")
                            .version(env!("CARGO_PKG_VERSION"))
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

async fn unmatched_route(method: Method, uri: Uri) -> impl IntoResponse {
    AppError::not_found(format!("Cannot {} {}", method, uri.path()))
}

async fn envelope_timeout(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT
        && response.extensions().get::<ErrorBody>().is_none()
    {
        return ErrorBody::new(StatusCode::REQUEST_TIMEOUT, "Request timeout").into_response();
    }
    response
}

fn merge_openapi(prefix: &str, registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Folio API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Authors and books catalogue"
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "statusCode": { "type": "integer" },
            "message": { "type": "string" },
            "error": { "type": "string" },
            "errors": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "field": { "type": "string" },
                        "message": { "type": "string" }
                    },
                    "required": ["field", "message"]
                }
            },
            "timestamp": { "type": "string", "format": "date-time" },
            "path": { "type": "string" }
        },
        "required": ["statusCode", "message", "timestamp", "path"]
    });

    openapi_spec["components"]["schemas"]["Pagination"] = serde_json::json!({
        "type": "object",
        "properties": {
            "page": { "type": "integer" },
            "limit": { "type": "integer" },
            "totalPages": { "type": "integer" },
            "totalItems": { "type": "integer" }
        },
        "required": ["page", "limit", "totalPages", "totalItems"]
    });

    openapi_spec["paths"][format!("{prefix}/health")] = serde_json::json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "Server is running",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "status": { "type": "string" },
                                    "message": { "type": "string" },
                                    "timestamp": { "type": "string" },
                                    "version": { "type": "string" },
                                    "uptime": { "type": "number" }
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                let suffix = if path == "/" { "" } else { path.as_str() };
                let prefixed_path = format!("{}/{}{}", prefix, module.name(), suffix);
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        for section in ["schemas", "responses"] {
            let Some(entries) = module_spec
                .get("components")
                .and_then(|c| c.get(section))
                .and_then(|s| s.as_object())
            else {
                continue;
            };
            for (name, definition) in entries {
                openapi_spec["components"][section][name] = definition.clone();
            }
        }
    }

    openapi_spec
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new("api")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn routes_are_prefixed() {
        let router = RouterBuilder::new("/library/")
            .route("/ping", get(|| async { axum::Json(serde_json::json!({"pong": true})) }))
            .build();

        let (status, json) = send(router, "GET", "/library/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["pong"], true);
    }

    #[tokio::test]
    async fn module_mounting() {
        let module_router = Router::new().route("/", get(|| async { "module" }));

        let router = RouterBuilder::new("api")
            .mount_module("shelves", module_router)
            .build();

        let response = router
            .oneshot(Request::builder().uri("/api/shelves").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unmatched_routes_get_an_envelope_with_path() {
        let router = RouterBuilder::new("api")
            .with_fallback()
            .with_error_paths()
            .build();

        let (status, json) = send(router, "DELETE", "/api/nowhere?x=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Cannot DELETE /api/nowhere");
        assert_eq!(json["error"], "Not Found");
        assert_eq!(json["path"], "/api/nowhere?x=1");
    }

    #[tokio::test]
    async fn unsupported_method_gets_the_same_envelope() {
        let router = RouterBuilder::new("api")
            .mount_module(
                "shelves",
                Router::new().route("/{id}", get(|| async { "shelf" })),
            )
            .with_fallback()
            .with_error_paths()
            .build();

        let (status, json) = send(router, "PUT", "/api/shelves/abc").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Cannot PUT /api/shelves/abc");
        assert_eq!(json["path"], "/api/shelves/abc");
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_an_envelope() {
        let router = RouterBuilder::new("api")
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    "late"
                }),
            )
            .with_timeout(20)
            .with_error_paths()
            .build();

        let (status, json) = send(router, "GET", "/api/slow").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json["statusCode"], 408);
        assert_eq!(json["message"], "Request timeout");
        assert_eq!(json["path"], "/api/slow");
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let router = RouterBuilder::new("api")
            .route("/ping", get(|| async { "pong" }))
            .with_request_id()
            .with_tracing()
            .with_cors()
            .with_timeout(5000)
            .build();

        let response = router
            .oneshot(Request::builder().uri("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn openapi_includes_health_and_error_schema() {
        let registry = ModuleRegistry::new();
        let spec = merge_openapi("/api", &registry);

        assert!(spec["paths"].get("/api/health").is_some());
        assert!(spec["components"]["schemas"].get("ErrorResponse").is_some());
    }
}
