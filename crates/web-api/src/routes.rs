use std::collections::HashMap;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use application::NewUser;
use domain::{DirectMessage, PublicMessage, ServerFrame, User, UserId, Username};

use crate::{error::ApiError, state::AppState, ws_connection::ChatConnection};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadPayload {
    sender_id: i64,
    receiver_id: i64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(register_user))
        .route("/api/login", post(login_user))
        .route("/api/messages", get(list_messages))
        .route(
            "/api/messages/direct/{user1}/{user2}",
            get(list_direct_messages),
        )
        .route(
            "/api/messages/direct/user/{user_id}",
            get(list_user_direct_messages),
        )
        .route("/api/messages/direct/read", post(mark_direct_read))
        .route("/api/messages/unread/{user_id}", get(unread_counts))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let username = Username::parse(payload.username)?;
    if payload.password.len() < 6 {
        return Err(ApiError::bad_request(
            "password must be at least 6 characters",
        ));
    }
    let password = state.hasher.hash(&payload.password).await?;
    let user = state
        .store
        .create_user(NewUser {
            username,
            password,
            email: payload.email,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .verifier
        .verify(&payload.username, &payload.password)
        .await?;
    Ok(Json(user))
}

async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicMessage>>, ApiError> {
    Ok(Json(state.store.list_public_messages().await?))
}

async fn list_direct_messages(
    State(state): State<AppState>,
    Path((user1, user2)): Path<(i64, i64)>,
) -> Result<Json<Vec<DirectMessage>>, ApiError> {
    let messages = state
        .store
        .list_direct_messages(UserId(user1), UserId(user2))
        .await?;
    Ok(Json(messages))
}

/// 某个用户收发的全部私信，不限定对端。
async fn list_user_direct_messages(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<DirectMessage>>, ApiError> {
    let messages = state
        .store
        .list_direct_messages_for_user(UserId(user_id))
        .await?;
    Ok(Json(messages))
}

/// 标记 sender -> receiver 的全部私信已读，并在线通知发送方。
async fn mark_direct_read(
    State(state): State<AppState>,
    Json(payload): Json<MarkReadPayload>,
) -> Result<StatusCode, ApiError> {
    let sender_id = UserId(payload.sender_id);
    let receiver_id = UserId(payload.receiver_id);
    state.store.mark_read(sender_id, receiver_id).await?;
    state
        .broadcaster
        .deliver_to(
            sender_id,
            ServerFrame::MessagesRead {
                sender_id,
                receiver_id,
            },
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn unread_counts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<HashMap<String, u64>>, ApiError> {
    let counts = state.store.unread_counts(UserId(user_id)).await?;
    // JSON 对象的键必须是字符串
    Ok(Json(
        counts
            .into_iter()
            .map(|(sender, count)| (sender.to_string(), count))
            .collect(),
    ))
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| ChatConnection::new(state).run(socket))
}
