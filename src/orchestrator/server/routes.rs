//! HTTP routing for `.bundle` and `.map` requests.

use crate::orchestrator::compose::{BundleRequest, Composer};
use crate::orchestrator::error::RequestError;
use crate::orchestrator::readiness::ReadinessGate;
use axum::{
    Router,
    extract::{Path, RawQuery, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;

/// Script media type for `.bundle` responses.
pub const SCRIPT_CONTENT_TYPE: &str = "application/javascript";

/// JSON media type for `.map` responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Requested artifact, derived from the path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Artifact {
    Bundle,
    SourceMap,
}

impl Artifact {
    /// Splits `index.ios.bundle` into (`index.ios`, `Bundle`).
    pub(crate) fn parse(path: &str) -> Option<(&str, Self)> {
        let path = path.trim_start_matches('/');
        let parsed = match path.strip_suffix(".bundle") {
            Some(entry) => Some((entry, Self::Bundle)),
            None => path.strip_suffix(".map").map(|entry| (entry, Self::SourceMap)),
        };
        parsed.filter(|(entry, _)| !entry.is_empty())
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match &self {
            RequestError::UnknownPlatform(_) => StatusCode::BAD_REQUEST,
            RequestError::Backend { .. } | RequestError::Transport { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RequestError::MalformedSourceMap(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Builds the router. Every request first waits on `gate`.
pub(crate) fn router(composer: Arc<Composer>, gate: ReadinessGate) -> Router {
    Router::new()
        .route("/*path", get(serve_artifact))
        .layer(middleware::from_fn_with_state(gate, wait_for_ready))
        .with_state(composer)
}

async fn wait_for_ready(State(gate): State<ReadinessGate>, request: Request, next: Next) -> Response {
    match gate.wait().await {
        Ok(()) => next.run(request).await,
        Err(e) => {
            let error = RequestError::from(e);
            log::error!("{} {}: {}", request.method(), request.uri(), error);
            error.into_response()
        }
    }
}

async fn serve_artifact(
    State(composer): State<Arc<Composer>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some((entry, artifact)) = Artifact::parse(&path) else {
        return (StatusCode::NOT_FOUND, format!("/{} not found", path)).into_response();
    };

    let result = match BundleRequest::resolve(composer.config(), entry, query.as_deref()) {
        Ok(request) => match artifact {
            Artifact::Bundle => composer
                .bundle(&request)
                .await
                .map(|body| ([(header::CONTENT_TYPE, SCRIPT_CONTENT_TYPE)], body)),
            Artifact::SourceMap => composer
                .source_map(&request)
                .await
                .map(|body| ([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body)),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response.into_response(),
        Err(e) => {
            log::error!("GET /{}: {}", path, e);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::error::{GateError, MalformedSourceMap};

    #[test]
    fn parses_artifact_paths() {
        assert_eq!(
            Artifact::parse("index.ios.bundle"),
            Some(("index.ios", Artifact::Bundle))
        );
        assert_eq!(
            Artifact::parse("/index.android.map"),
            Some(("index.android", Artifact::SourceMap))
        );
        assert_eq!(Artifact::parse("favicon.ico"), None);
        assert_eq!(Artifact::parse(".bundle"), None);
    }

    #[test]
    fn maps_errors_to_statuses() {
        assert_eq!(
            RequestError::UnknownPlatform("web".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RequestError::Backend {
                url: "http://localhost:8081/index.ios.bundle".into(),
                status: 500,
                body: "boom".into(),
            }
            .into_response()
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RequestError::from(MalformedSourceMap("bad".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RequestError::from(GateError::Stopped)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
