//! HTTP API
//!
//! Thin translation layer: reads come from serializer snapshots, writes are
//! submitted as commands and wait for their acknowledgement.

use crate::color::{Color, ColorInput};
use crate::command::{Ack, Command};
use crate::controller::ControllerHandle;
use crate::error::ControllerError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub controller: ControllerHandle,
}

/// Controller error as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub ControllerError);

impl From<ControllerError> for ApiError {
    fn from(e: ControllerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, body) = match self.0 {
            ControllerError::OutOfRange { .. } | ControllerError::InvalidValue(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ControllerError::NotFound { available, .. } => (
                StatusCode::NOT_FOUND,
                json!({ "error": message, "available_scenes": available }),
            ),
            ControllerError::Superseded { .. } => {
                (StatusCode::CONFLICT, json!({ "error": message }))
            }
            ControllerError::SubmissionTimeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, json!({ "error": message }))
            }
            ControllerError::ChannelClosed => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message }))
            }
        };
        debug!(status = status.as_u16(), error = %message, "Request rejected");
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Unwrap a JSON body; malformed or mistyped bodies are `InvalidValue`
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ControllerError::InvalidValue(rejection.body_text()).into())
}

#[derive(Debug, Serialize)]
pub struct LedView {
    pub index: usize,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hex: String,
}

impl LedView {
    fn new(index: usize, color: Color) -> Self {
        Self {
            index,
            r: color.r,
            g: color.g,
            b: color.b,
            hex: color.to_hex(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StripView {
    pub count: usize,
    pub brightness: f32,
    pub scene: Option<String>,
    pub leds: Vec<LedView>,
}

#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub status: &'static str,
    pub seq: u64,
}

impl From<Ack> for WriteResponse {
    fn from(ack: Ack) -> Self {
        Self {
            status: "ok",
            seq: ack.seq,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScenesView {
    pub scenes: Vec<String>,
    pub current_scene: Option<String>,
    pub animated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BrightnessBody {
    pub brightness: f32,
}

pub fn router(controller: ControllerHandle) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/leds", get(get_leds).put(set_all))
        .route("/api/leds/:index", get(get_led).put(set_led))
        .route("/api/scenes", get(list_scenes))
        .route("/api/scenes/:name", post(activate_scene))
        .route("/api/brightness", get(get_brightness).put(set_brightness))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { controller })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "led-controller" }))
}

async fn get_leds(State(state): State<AppState>) -> Json<StripView> {
    let snapshot = state.controller.snapshot();
    Json(StripView {
        count: snapshot.len(),
        brightness: snapshot.brightness(),
        scene: state
            .controller
            .active_scene()
            .map(|active| active.name().to_string()),
        leds: snapshot
            .leds()
            .iter()
            .enumerate()
            .map(|(i, c)| LedView::new(i, *c))
            .collect(),
    })
}

async fn get_led(State(state): State<AppState>, Path(index): Path<usize>) -> ApiResult<LedView> {
    let color = state.controller.snapshot().get(index)?;
    Ok(Json(LedView::new(index, color)))
}

async fn set_led(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    payload: Result<Json<ColorInput>, JsonRejection>,
) -> ApiResult<WriteResponse> {
    let color = Color::try_from(body(payload)?)?;
    let ack = state
        .controller
        .submit(Command::SetLed { index, color })
        .await?;
    Ok(Json(ack.into()))
}

async fn set_all(
    State(state): State<AppState>,
    payload: Result<Json<ColorInput>, JsonRejection>,
) -> ApiResult<WriteResponse> {
    let color = Color::try_from(body(payload)?)?;
    let ack = state.controller.submit(Command::SetAll(color)).await?;
    Ok(Json(ack.into()))
}

async fn list_scenes(State(state): State<AppState>) -> Json<ScenesView> {
    let active = state.controller.active_scene();
    Json(ScenesView {
        scenes: state.controller.library().names(),
        current_scene: active.as_ref().map(|a| a.name().to_string()),
        animated: active.map(|a| a.is_animated()).unwrap_or(false),
    })
}

async fn activate_scene(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<serde_json::Value> {
    let ack = state
        .controller
        .submit(Command::ActivateScene(name.clone()))
        .await?;
    Ok(Json(json!({ "status": "ok", "scene": name, "seq": ack.seq })))
}

async fn get_brightness(State(state): State<AppState>) -> Json<BrightnessBody> {
    Json(BrightnessBody {
        brightness: state.controller.snapshot().brightness(),
    })
}

async fn set_brightness(
    State(state): State<AppState>,
    payload: Result<Json<BrightnessBody>, JsonRejection>,
) -> ApiResult<WriteResponse> {
    let brightness = body(payload)?.brightness;
    let ack = state
        .controller
        .submit(Command::SetBrightness(brightness))
        .await?;
    Ok(Json(ack.into()))
}
