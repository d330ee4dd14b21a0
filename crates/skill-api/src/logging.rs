use std::time::Instant;

use axum::{
    body::HttpBody,
    extract::Request,
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Logs the start and completion of every request.
///
/// Everything logged downstream of this layer runs inside a `request` span
/// carrying the request id. The response is returned as produced.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let span = info_span!("request", %request_id);

    async move {
        let start = Instant::now();
        info!(%method, %path, "request started");

        let res = next.run(req).await;

        info!(
            %method,
            %path,
            status = res.status().as_u16(),
            bytes = response_size(&res),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        res
    }
    .instrument(span)
    .await
}

/// Body length as it will go over the wire, when known up front.
fn response_size(res: &Response) -> u64 {
    let hint = res.body().size_hint();
    hint.exact()
        .or_else(|| {
            res.headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or_else(|| hint.lower())
}
