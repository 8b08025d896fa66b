//! HTTP front end for `declare web <port>`.
//!
//! axum accepts connections on the tokio runtime, but route bodies can only
//! run on the evaluator. Every request is queued on a channel; the evaluator
//! loop takes them one at a time, dispatches, and answers over a oneshot.

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::{Json, Router};
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::{Any, CorsLayer};

use super::web::WebCapability;
use crate::error::RuntimeError;
use crate::interpreter::Evaluator;
use crate::value::Value;

/// Requests allowed to wait for the evaluator before senders back off.
const QUEUE_DEPTH: usize = 64;

type Reply = (u16, serde_json::Value);

struct Incoming {
    method: String,
    path: String,
    body: String,
    reply: oneshot::Sender<Reply>,
}

/// Serve until Ctrl+C or until a handler fails.
pub(super) async fn serve(
    web: &WebCapability,
    evaluator: &mut Evaluator,
    host: &str,
    port: u16,
) -> Result<(), RuntimeError> {
    let (queue, mut requests) = mpsc::channel::<Incoming>(QUEUE_DEPTH);

    // CORS: permissive, scripts are served for local use
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = Router::new().fallback(forward).layer(cors).with_state(queue);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RuntimeError::capability("web", format!("cannot listen on {}: {}", addr, e)))?;
    tracing::info!(%addr, routes = web.routes().len(), "serving routes");
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let result = loop {
        tokio::select! {
            incoming = requests.recv() => {
                let Some(Incoming { method, path, body, reply }) = incoming else {
                    break Ok(());
                };
                let outcome = web.dispatch(evaluator, &method, &path, request_body(&body)).await;
                let (answer, failure) = match outcome {
                    Ok(Some(response)) => ((response.status, response.body.to_json()), None),
                    Ok(None) => (
                        (404, serde_json::json!({"error": format!("no route for {} {}", method, path)})),
                        None,
                    ),
                    Err(e) => ((500, serde_json::json!({"error": e.to_string()})), Some(e)),
                };
                // The client may have disconnected; nothing to do then.
                let _ = reply.send(answer);
                if let Some(e) = failure {
                    tracing::error!(error = %e, %method, %path, "route handler failed");
                    break Err(e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
                break Ok(());
            }
        }
    };

    server.abort();
    tracing::info!("server shut down");
    result
}

/// JSON bodies become values; anything else is passed through as text.
fn request_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::text(raw),
    }
}

async fn forward(
    State(queue): State<mpsc::Sender<Incoming>>,
    method: Method,
    uri: Uri,
    body: String,
) -> HttpResponse {
    let (reply, answer) = oneshot::channel();
    let incoming = Incoming {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        body,
        reply,
    };
    if queue.send(incoming).await.is_err() {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "interpreter has stopped").into_response();
    }
    match answer.await {
        Ok((status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response(),
        Err(_) => json_error(StatusCode::SERVICE_UNAVAILABLE, "interpreter has stopped").into_response(),
    }
}

fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}
