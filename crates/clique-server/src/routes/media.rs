//! Media inside groups: shared links with previews, uploaded images,
//! tag proposals, tag search.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use clique_shared::tagging;
use clique_store::{Media, MediaPatch, NewMedia, SearchMode};

use crate::auth::current_user;
use crate::error::ApiError;
use crate::preview::LinkPreview;
use crate::routes::groups::require_member;
use crate::routes::AppState;

#[derive(Deserialize)]
pub(crate) struct ContentQuery {
    search_term: Option<String>,
    /// Tolerates small typos in the search term when set.
    #[serde(default)]
    fuzzy: bool,
}

#[derive(Deserialize)]
pub(crate) struct AddLink {
    group_id: i64,
    name: String,
    link: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct DeleteMediaQuery {
    media_id: i64,
}

#[derive(Deserialize)]
pub(crate) struct ProposeTagsRequest {
    name: String,
    #[serde(default)]
    is_image: bool,
    #[serde(default)]
    link: String,
}

/// List a group's media, optionally filtered by a tag search term.
pub(crate) async fn group_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<i64>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<Media>>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let db = state.db.lock().await;
    db.get_group(group_id)?;
    require_member(&db, group_id, &user.mail)?;

    let mode = if query.fuzzy {
        SearchMode::Fuzzy
    } else {
        SearchMode::Substring
    };
    let media = db.list_group_media(group_id, query.search_term.as_deref(), mode)?;
    Ok(Json(media))
}

/// Share a link in a group. The media row is committed first; the preview
/// is best-effort and arrives in `preview_link` when it worked out.
pub(crate) async fn add_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddLink>,
) -> Result<(StatusCode, Json<Media>), ApiError> {
    let user = current_user(&headers, &state).await?;

    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("media name must not be empty".to_string()));
    }
    if req.link.trim().is_empty() {
        return Err(ApiError::BadRequest("link must not be empty".to_string()));
    }

    let (group, mut media) = {
        let mut db = state.db.lock().await;
        let group = db.get_group(req.group_id)?;
        require_member(&db, req.group_id, &user.mail)?;

        let media = db.create_media(
            &NewMedia {
                group_id: req.group_id,
                name: req.name.trim().to_string(),
                is_image: false,
                link: req.link.trim().to_string(),
                uploaded_by: user.mail.clone(),
            },
            &req.tags,
        )?;
        (group, media)
    };
    info!(media_id = media.id, group_id = group.id, by = %user.mail, "link shared");

    // preview generation happens outside the database lock and never
    // fails the request
    match state.preview.generate(&media.link).await {
        Ok(LinkPreview::ExternalUrl(url)) => {
            media = patch_preview(&state, media.id, url).await?;
        }
        Ok(LinkPreview::Image(bytes)) => {
            let key = format!("{}_preview", media.id);
            match state
                .object_store
                .upload(&group.name, &key, bytes, "image/png")
                .await
            {
                Ok(url) => media = patch_preview(&state, media.id, url).await?,
                Err(e) => warn!(media_id = media.id, error = %e, "preview upload failed"),
            }
        }
        Err(e) => warn!(media_id = media.id, error = %e, "preview generation failed"),
    }

    Ok((StatusCode::CREATED, Json(media)))
}

async fn patch_preview(state: &AppState, media_id: i64, url: String) -> Result<Media, ApiError> {
    let mut db = state.db.lock().await;
    let media = db.update_media(
        media_id,
        &MediaPatch {
            preview_link: Some(url),
            ..Default::default()
        },
    )?;
    Ok(media)
}

/// Upload an image into a group.
///
/// Multipart fields: `group_id`, `name`, the binary `image`, and any
/// number of repeated `tags` fields. The row only survives if the binary
/// lands in the object store; a failed upload rolls the row back and the
/// client gets a 502.
pub(crate) async fn add_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Media>), ApiError> {
    let user = current_user(&headers, &state).await?;

    let mut group_id: Option<i64> = None;
    let mut name: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut image: Option<Vec<u8>> = None;
    let mut content_type = "application/octet-stream".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "group_id" => {
                let text = read_text_field(field).await?;
                group_id = Some(text.trim().parse().map_err(|_| {
                    ApiError::BadRequest("group_id must be an integer".to_string())
                })?);
            }
            "name" => name = Some(read_text_field(field).await?),
            "tags" => {
                let text = read_text_field(field).await?;
                if !text.trim().is_empty() {
                    tags.push(text.trim().to_string());
                }
            }
            "image" => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("unreadable image field: {e}"))
                })?;
                image = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let group_id =
        group_id.ok_or_else(|| ApiError::BadRequest("missing group_id field".to_string()))?;
    let name = name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing name field".to_string()))?;
    let image = image.ok_or_else(|| ApiError::BadRequest("missing image field".to_string()))?;

    // size gate comes before anything is persisted
    let limit = state.config.max_image_bytes;
    if image.len() >= limit {
        return Err(ApiError::PayloadTooLarge {
            size: image.len(),
            limit,
        });
    }

    let (group, media) = {
        let mut db = state.db.lock().await;
        let group = db.get_group(group_id)?;
        require_member(&db, group_id, &user.mail)?;

        let media = db.create_media(
            &NewMedia {
                group_id,
                name: name.trim().to_string(),
                is_image: true,
                link: String::new(),
                uploaded_by: user.mail.clone(),
            },
            &tags,
        )?;
        (group, media)
    };

    let upload = state
        .object_store
        .upload(&group.name, &media.id.to_string(), image, &content_type)
        .await;

    let public_url = match upload {
        Ok(url) => url,
        Err(e) => {
            // the binary never made it; take the row back out
            let mut db = state.db.lock().await;
            if let Err(cleanup) = db.delete_media(media.id) {
                tracing::error!(
                    media_id = media.id,
                    error = %cleanup,
                    "failed to roll back media row after upload failure"
                );
            }
            return Err(e);
        }
    };

    let media = {
        let mut db = state.db.lock().await;
        db.update_media(
            media.id,
            &MediaPatch {
                image_key: Some(public_url.clone()),
                // images are their own preview
                preview_link: Some(public_url),
                ..Default::default()
            },
        )?
    };
    info!(media_id = media.id, group_id, by = %user.mail, "image uploaded");

    Ok((StatusCode::CREATED, Json(media)))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable multipart field: {e}")))
}

/// Remove one media entry. Stored binaries go first; if the object store
/// refuses, the row stays so the reference is not lost.
pub(crate) async fn delete_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteMediaQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &state).await?;

    let (group, media) = {
        let db = state.db.lock().await;
        let media = db.get_media(query.media_id)?;
        let group = db.get_group(media.group_id)?;
        require_member(&db, media.group_id, &user.mail)?;
        (group, media)
    };

    if media.is_image {
        state
            .object_store
            .delete(&group.name, &media.id.to_string())
            .await?;
    } else if !media.preview_link.is_empty() {
        // a 404 from the store is fine: external previews (e.g. YouTube
        // thumbnails) never had an object of their own
        state
            .object_store
            .delete(&group.name, &format!("{}_preview", media.id))
            .await?;
    }

    let mut db = state.db.lock().await;
    db.delete_media(media.id)?;
    info!(media_id = media.id, group_id = group.id, by = %user.mail, "media deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Suggest tags for a media entry from its name and link, without storing
/// anything.
pub(crate) async fn propose_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProposeTagsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    current_user(&headers, &state).await?;

    let tags = tagging::propose_tags(&req.name, req.is_image, &req.link);
    Ok(Json(serde_json::json!({ "proposed_tags": tags })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{bearer, login_as, state};

    /// Logged-in owner plus a group, ready for content.
    async fn group_fixture(state_: &AppState) -> (String, clique_store::Group) {
        let token = login_as(state_, "abc@gmail.com", "Dominik").await;
        let group = {
            let mut db = state_.db.lock().await;
            db.create_group("ski trip", "abc@gmail.com").unwrap()
        };
        (token, group)
    }

    async fn seed_link(state_: &AppState, group_id: i64, name: &str, tags: &[&str]) -> Media {
        let mut db = state_.db.lock().await;
        db.create_media(
            &NewMedia {
                group_id,
                name: name.to_string(),
                is_image: false,
                link: format!("https://example.com/{name}"),
                uploaded_by: "abc@gmail.com".to_string(),
            },
            &tags.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn group_content_lists_in_insertion_order() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;
        seed_link(&state_, group.id, "bike fall", &["funny", "bike"]).await;
        seed_link(&state_, group.id, "trail map", &["travel"]).await;

        let media = group_content(
            State(state_.clone()),
            bearer(&token),
            Path(group.id),
            Query(ContentQuery {
                search_term: None,
                fuzzy: false,
            }),
        )
        .await
        .unwrap();

        assert_eq!(media.0.len(), 2);
        assert_eq!(media.0[0].name, "bike fall");
        assert_eq!(media.0[1].name, "trail map");
    }

    #[tokio::test]
    async fn search_term_filters_by_tag() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;
        seed_link(&state_, group.id, "bike fall", &["funny", "bike"]).await;
        seed_link(&state_, group.id, "trail map", &["travel"]).await;

        let media = group_content(
            State(state_.clone()),
            bearer(&token),
            Path(group.id),
            Query(ContentQuery {
                search_term: Some("FUN".to_string()),
                fuzzy: false,
            }),
        )
        .await
        .unwrap();

        assert_eq!(media.0.len(), 1);
        assert_eq!(media.0[0].name, "bike fall");
    }

    #[tokio::test]
    async fn fuzzy_search_forgives_typos() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;
        seed_link(&state_, group.id, "trail map", &["travel"]).await;

        let media = group_content(
            State(state_.clone()),
            bearer(&token),
            Path(group.id),
            Query(ContentQuery {
                search_term: Some("travle".to_string()),
                fuzzy: true,
            }),
        )
        .await
        .unwrap();

        assert_eq!(media.0.len(), 1);
    }

    #[tokio::test]
    async fn nonmember_cannot_read_group_content() {
        let state_ = state();
        let (_token, group) = group_fixture(&state_).await;
        let ewa = login_as(&state_, "ewa@example.com", "Ewa").await;

        let err = group_content(
            State(state_.clone()),
            bearer(&ewa),
            Path(group.id),
            Query(ContentQuery {
                search_term: None,
                fuzzy: false,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn add_link_requires_membership() {
        let state_ = state();
        let (_token, group) = group_fixture(&state_).await;
        let ewa = login_as(&state_, "ewa@example.com", "Ewa").await;

        let err = add_link(
            State(state_.clone()),
            bearer(&ewa),
            Json(AddLink {
                group_id: group.id,
                name: "sneaky".to_string(),
                link: "https://example.com".to_string(),
                tags: vec![],
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn add_link_stores_youtube_thumbnail_without_network() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;

        let (status, media) = add_link(
            State(state_.clone()),
            bearer(&token),
            Json(AddLink {
                group_id: group.id,
                name: "concert clip".to_string(),
                link: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                tags: vec!["music".to_string()],
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            media.0.preview_link,
            "https://img.youtube.com/vi/dQw4w9WgXcQ/0.jpg"
        );
        assert_eq!(media.0.tags, vec!["music"]);
    }

    #[tokio::test]
    async fn add_link_survives_unreachable_preview_service() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;

        // nothing listens on the configured preview port; the share must
        // still land, just without a preview
        let (status, media) = add_link(
            State(state_.clone()),
            bearer(&token),
            Json(AddLink {
                group_id: group.id,
                name: "article".to_string(),
                link: "https://example.com/article".to_string(),
                tags: vec![],
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert!(media.0.preview_link.is_empty());
    }

    #[tokio::test]
    async fn delete_link_media_removes_the_row() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;
        let media = seed_link(&state_, group.id, "bike fall", &["funny"]).await;

        delete_media(
            State(state_.clone()),
            bearer(&token),
            Query(DeleteMediaQuery { media_id: media.id }),
        )
        .await
        .unwrap();

        let listing = group_content(
            State(state_.clone()),
            bearer(&token),
            Path(group.id),
            Query(ContentQuery {
                search_term: None,
                fuzzy: false,
            }),
        )
        .await
        .unwrap();
        assert!(listing.0.is_empty());
    }

    #[tokio::test]
    async fn deleting_missing_media_is_not_found() {
        let state_ = state();
        let (token, _group) = group_fixture(&state_).await;

        let err = delete_media(
            State(state_.clone()),
            bearer(&token),
            Query(DeleteMediaQuery { media_id: 4242 }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("media")));
    }

    /// Assemble a real multipart request body and run it through the
    /// extractor, the same way axum would.
    async fn multipart_fixture(group_id: i64, name: &str, image: &[u8]) -> Multipart {
        use axum::extract::FromRequest;

        let mut body = Vec::new();
        for (field, value) in [("group_id", group_id.to_string()), ("name", name.to_string())] {
            body.extend_from_slice(
                format!(
                    "--fixture\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            b"--fixture\r\nContent-Disposition: form-data; name=\"image\"; filename=\"pic.png\"\r\nContent-Type: image/png\r\n\r\n",
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n--fixture--\r\n");

        let mut request = axum::http::Request::builder()
            .header("content-type", "multipart/form-data; boundary=fixture")
            .body(axum::body::Body::from(body))
            .unwrap();
        // the router grants every request this body cap; without it the
        // extractor's implicit 2 MB default cuts off a maximum-size image
        // before the handler's own size check can answer
        axum::extract::DefaultBodyLimit::max(crate::routes::MAX_BODY_BYTES).apply(&mut request);
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn add_image_rejects_oversize_payload_before_persisting() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;

        let oversize = vec![0u8; state_.config.max_image_bytes];
        let multipart = multipart_fixture(group.id, "big pic", &oversize).await;

        let err = add_image(State(state_.clone()), bearer(&token), multipart)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { .. }));

        let listing = group_content(
            State(state_.clone()),
            bearer(&token),
            Path(group.id),
            Query(ContentQuery {
                search_term: None,
                fuzzy: false,
            }),
        )
        .await
        .unwrap();
        assert!(listing.0.is_empty());
    }

    #[tokio::test]
    async fn add_image_rolls_back_when_the_store_is_down() {
        let state_ = state();
        let (token, group) = group_fixture(&state_).await;

        // nothing listens on the object store port, so the upload fails
        // after the row was written; the row must not survive that
        let multipart = multipart_fixture(group.id, "summit", b"\x89PNG fake").await;
        let err = add_image(State(state_.clone()), bearer(&token), multipart)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));

        let listing = group_content(
            State(state_.clone()),
            bearer(&token),
            Path(group.id),
            Query(ContentQuery {
                search_term: None,
                fuzzy: false,
            }),
        )
        .await
        .unwrap();
        assert!(listing.0.is_empty());
    }

    #[tokio::test]
    async fn add_image_requires_the_image_field() {
        use axum::extract::FromRequest;

        let state_ = state();
        let (token, group) = group_fixture(&state_).await;

        let body = format!(
            "--fixture\r\nContent-Disposition: form-data; name=\"group_id\"\r\n\r\n{}\r\n--fixture--\r\n",
            group.id
        );
        let request = axum::http::Request::builder()
            .header("content-type", "multipart/form-data; boundary=fixture")
            .body(axum::body::Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let err = add_image(State(state_.clone()), bearer(&token), multipart)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn propose_tags_combines_name_and_platform() {
        let state_ = state();
        let (token, _group) = group_fixture(&state_).await;

        let response = propose_tags(
            State(state_.clone()),
            bearer(&token),
            Json(ProposeTagsRequest {
                name: "Funny Bike Fall".to_string(),
                is_image: false,
                link: "https://www.tiktok.com/@someone/video/123".to_string(),
            }),
        )
        .await
        .unwrap();

        let tags = response.0["proposed_tags"].as_array().unwrap();
        let tags: Vec<&str> = tags.iter().map(|t| t.as_str().unwrap()).collect();
        assert_eq!(tags, vec!["funny", "bike", "fall", "tiktok"]);
    }
}
