use std::future::Future;
use std::pin::Pin;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use inference_core::{Capability, Identity};

use crate::errors::AppError;
use crate::AppState;

/// Verifies the bearer token (if present) against the configured `AuthGate`
/// and inserts the resulting `Identity` into request extensions. Does not
/// itself reject unauthenticated requests; routes that need a capability
/// layer `require_capability` on top.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(&request) {
        match state.runtime.auth_gate.verify(&token).await {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
            }
            Err(e) => return AppError::from(e).into_response(),
        }
    }

    next.run(request).await
}

/// Route layer requiring a specific capability. Must run after
/// `auth_middleware`, which populates the `Identity` extension.
pub fn require_capability(
    capability: Capability,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send + Sync + 'static
{
    move |request: Request, next: Next| Box::pin(check_capability(request, next, capability.clone()))
}

async fn check_capability(request: Request, next: Next, capability: Capability) -> Response {
    let identity = match request.extensions().get::<Identity>() {
        Some(identity) => identity,
        None => {
            return AppError::new(
                axum::http::StatusCode::UNAUTHORIZED,
                "a bearer token is required for this endpoint",
            )
            .into_response();
        }
    };

    if !identity.has(&capability) {
        return AppError::new(
            axum::http::StatusCode::FORBIDDEN,
            format!("capability {capability:?} required"),
        )
        .into_response();
    }

    next.run(request).await
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|s| s.to_string())
}
