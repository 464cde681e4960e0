//! HTTP front end: `/calculator` and `/supported`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::calculator::Calculator;
use crate::catalog::Supported;
use crate::config::Config;
use crate::render;
use crate::types::{CalculationRequest, OutputFormat, ResponseMessage};

pub struct AppState {
    pub calculator: Calculator,
    pub default_output: OutputFormat,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/calculator", get(calculate).post(calculate))
        .route("/supported", get(supported))
        .with_state(state)
}

pub async fn serve(cfg: &Config, calculator: Calculator) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        calculator,
        default_output: cfg.default_output,
    });
    let listener = TcpListener::bind(cfg.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "dbcalc listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutdown signal received");
}

async fn supported(State(state): State<Arc<AppState>>) -> Json<Supported> {
    Json(state.calculator.supported())
}

async fn calculate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return rejected("empty request body", state.default_output);
    }
    let mut request: CalculationRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(err) => return rejected(&format!("cannot decode request: {err}"), state.default_output),
    };
    let requested_output = request
        .output
        .as_deref()
        .and_then(|o| o.parse::<OutputFormat>().ok())
        .unwrap_or(state.default_output);
    request.output.get_or_insert_with(|| state.default_output.as_str().to_string());

    match state.calculator.calculate(&request) {
        Ok(calc) => match render::render(&calc, calc.incoming.output) {
            Ok(text) => text_response(StatusCode::OK, calc.incoming.output, text),
            Err(err) => internal(&err.to_string()),
        },
        Err(err) if err.is_user_error() => rejected(&err.to_string(), requested_output),
        Err(err) => {
            error!(code = err.code(), "calculation failed: {err}");
            internal(&format!("{}: {err}", err.code()))
        }
    }
}

fn rejected(detail: &str, format: OutputFormat) -> Response {
    warn!("rejected request: {detail}");
    let message = ResponseMessage::invalid_request(detail);
    match render::error_envelope(&message, format) {
        Ok(text) => text_response(StatusCode::OK, format, text),
        Err(err) => internal(&err.to_string()),
    }
}

fn internal(detail: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, detail.to_string()).into_response()
}

fn text_response(status: StatusCode, format: OutputFormat, body: String) -> Response {
    let content_type = match format {
        OutputFormat::Json => "application/json",
        OutputFormat::Human => "text/plain; charset=utf-8",
    };
    (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
}
