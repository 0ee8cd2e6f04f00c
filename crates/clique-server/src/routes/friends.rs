//! Friend requests and friendships.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use clique_store::{FriendRequestOutcome, PublicUser, RequestPeer};

use crate::auth::current_user;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Deserialize)]
pub(crate) struct CreateFriendRequest {
    receiver_mail: String,
}

#[derive(Deserialize)]
pub(crate) struct AddFriend {
    sender_mail: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FriendRequestResponse {
    /// `"pending"` when the request awaits the receiver, `"accepted"`
    /// when it met a crossing request and both users are friends now.
    status: &'static str,
    sender_mail: String,
    receiver_mail: String,
}

pub(crate) async fn create_friend_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateFriendRequest>,
) -> Result<(StatusCode, Json<FriendRequestResponse>), ApiError> {
    let user = current_user(&headers, &state).await?;

    let mut db = state.db.lock().await;
    let outcome = db.send_friend_request(&user.mail, &req.receiver_mail)?;

    let status = match outcome {
        FriendRequestOutcome::Pending(_) => "pending",
        FriendRequestOutcome::BecameFriends => "accepted",
    };
    info!(
        sender = %user.mail,
        receiver = %req.receiver_mail,
        status,
        "friend request"
    );

    Ok((
        StatusCode::CREATED,
        Json(FriendRequestResponse {
            status,
            sender_mail: user.mail,
            receiver_mail: req.receiver_mail,
        }),
    ))
}

pub(crate) async fn add_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddFriend>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let mut db = state.db.lock().await;
    db.accept_friend_request(&user.mail, &req.sender_mail)?;
    info!(accepter = %user.mail, requester = %req.sender_mail, "friend request accepted");

    Ok(Json(serde_json::json!({ "accepted": true })))
}

pub(crate) async fn decline_friend_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(mail): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.decline_friend_request(&user.mail, &mail)?;

    Ok(Json(serde_json::json!({ "declined": true })))
}

pub(crate) async fn cancel_friend_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(mail): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.cancel_sent_request(&user.mail, &mail)?;

    Ok(Json(serde_json::json!({ "cancelled": true })))
}

pub(crate) async fn remove_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(mail): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.remove_friendship(&user.mail, &mail)?;
    info!(user = %user.mail, friend = %mail, "friendship removed");

    Ok(Json(serde_json::json!({ "removed": true })))
}

pub(crate) async fn pending_friend_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RequestPeer>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    Ok(Json(db.list_pending_requests(&user.mail)?))
}

pub(crate) async fn sent_friend_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RequestPeer>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    Ok(Json(db.list_sent_requests(&user.mail)?))
}

pub(crate) async fn user_friends(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    Ok(Json(db.list_friends(&user.mail)?))
}
