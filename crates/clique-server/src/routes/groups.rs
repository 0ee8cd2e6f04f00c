//! Group management: creation, membership, ownership hand-off.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use clique_store::{Group, MemberRemoval, PublicUser};

use crate::auth::current_user;
use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Deserialize)]
pub(crate) struct CreateGroup {
    name: String,
}

#[derive(Deserialize)]
pub(crate) struct AddGroupMembers {
    member_mails: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct MemberRemovalResponse {
    removed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_owner: Option<String>,
    group_deleted: bool,
}

pub(crate) async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateGroup>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let user = current_user(&headers, &state).await?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("group name must not be empty".to_string()));
    }

    let mut db = state.db.lock().await;
    let group = db.create_group(name, &user.mail)?;
    info!(group_id = group.id, owner = %user.mail, "group created");

    Ok((StatusCode::CREATED, Json(group)))
}

pub(crate) async fn add_group_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
    Json(req): Json<AddGroupMembers>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;
    if req.member_mails.is_empty() {
        return Err(ApiError::BadRequest("no members given".to_string()));
    }

    let mut db = state.db.lock().await;
    db.get_group(group_id)?;
    require_member(&db, group_id, &user.mail)?;

    let added = db.add_members(group_id, &req.member_mails)?;
    info!(group_id, added, by = %user.mail, "group members added");

    Ok(Json(serde_json::json!({ "added": added })))
}

pub(crate) async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((group_id, member_mail)): Path<(i64, String)>,
) -> Result<Json<MemberRemovalResponse>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let mut db = state.db.lock().await;
    db.get_group(group_id)?;
    require_member(&db, group_id, &user.mail)?;

    let outcome = db.remove_member(group_id, &member_mail)?;
    info!(group_id, member = %member_mail, ?outcome, "group member removed");

    let (new_owner, group_deleted) = match outcome {
        MemberRemoval::Left => (None, false),
        MemberRemoval::OwnershipTransferred { new_owner } => (Some(new_owner), false),
        MemberRemoval::GroupDeleted => (None, true),
    };

    Ok(Json(MemberRemovalResponse {
        removed: member_mail,
        new_owner,
        group_deleted,
    }))
}

pub(crate) async fn remove_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let mut db = state.db.lock().await;
    let group = db.get_group(group_id)?;
    if group.owner_mail != user.mail {
        return Err(ApiError::Forbidden(
            "only the group owner can delete the group".to_string(),
        ));
    }

    db.delete_group(group_id)?;
    info!(group_id, owner = %user.mail, "group deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub(crate) async fn user_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Group>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    Ok(Json(db.list_user_groups(&user.mail)?))
}

pub(crate) async fn mutual_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(friend_mail): Path<String>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.get_user(&friend_mail)?;
    if !db.are_friends(&user.mail, &friend_mail)? {
        return Err(ApiError::Forbidden(
            "mutual groups are only visible between friends".to_string(),
        ));
    }

    Ok(Json(db.mutual_groups(&user.mail, &friend_mail)?))
}

pub(crate) async fn group_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.get_group(group_id)?;
    require_member(&db, group_id, &user.mail)?;

    Ok(Json(db.list_group_members(group_id)?))
}

/// Membership gate shared by every group-scoped route.
pub(crate) fn require_member(
    db: &clique_store::Database,
    group_id: i64,
    mail: &str,
) -> Result<(), ApiError> {
    if !db.is_member(group_id, mail)? {
        return Err(ApiError::Forbidden(
            "only group members can access the group".to_string(),
        ));
    }
    Ok(())
}
