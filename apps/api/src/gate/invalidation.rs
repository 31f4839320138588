use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::cache::ResponseCache;

fn is_mutation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Middleware for administrative routes: any mutating request flushes the
/// whole response cache before the handler runs and again before the
/// response leaves, so a write-back racing the mutation cannot outlive it.
pub async fn invalidate_on_mutation(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if !is_mutation(request.method()) {
        return next.run(request).await;
    }
    cache.invalidate_all().await;
    let response = next.run(request).await;
    cache.invalidate_all().await;
    response
}
