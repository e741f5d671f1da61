//! HTTP surface of the board.
//!
//! | method | path                   | body / query            |
//! |--------|------------------------|-------------------------|
//! | GET    | `/{kind}`              |                         |
//! | POST   | `/{kind}`              | clip or message json    |
//! | DELETE | `/{kind}?id=<id>`      | credentials in headers  |
//! | GET    | `/clips/{id}/preview`  |                         |
//! | POST   | `/messages/{id}/image` | multipart `file` field  |
use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use memorial_core::{
    auth::DeleteCredentials,
    constant::{ADMIN_HEADER, IMAGE_FIELD, OWNER_HEADER},
    post::{ClipSubmission, ImageUpload, MessageSubmission, PostContent, PublicPost},
    service::CreatedPost,
    video::{Preview, PreviewResolver},
    MemorialError, ResourceType,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{board::BoardHandle, ServerError};

type ApiResult<T> = Result<Json<T>, ServerError>;

#[derive(Debug, Clone)]
pub struct AppState {
    pub board: BoardHandle,
    pub previews: PreviewResolver,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub items: Vec<PublicPost>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub created: CreatedPost,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachResponse {
    pub ok: bool,
    pub message: PublicPost,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/:kind",
            get(list_posts).post(create_post).delete(delete_post),
        )
        .route("/clips/:id/preview", get(clip_preview))
        .route("/messages/:id/image", post(attach_image))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_posts(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<ListResponse> {
    let kind: ResourceType = kind.parse()?;
    let items = state.board.list(kind).await?;
    Ok(Json(ListResponse { items }))
}

async fn create_post(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> ApiResult<CreateResponse> {
    let kind: ResourceType = kind.parse()?;
    let created = match kind {
        ResourceType::Clip => {
            state
                .board
                .create_clip(parse_body::<ClipSubmission>(&body)?)
                .await?
        }
        ResourceType::Message => {
            state
                .board
                .create_message(parse_body::<MessageSubmission>(&body)?)
                .await?
        }
    };
    Ok(Json(CreateResponse { ok: true, created }))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
    headers: HeaderMap,
) -> ApiResult<OkResponse> {
    let kind: ResourceType = kind.parse()?;
    let Query(query) = query.map_err(|e| MemorialError::invalid_request(e.body_text()))?;
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| MemorialError::invalid_request("Missing id"))?;
    state
        .board
        .delete(kind, id, delete_credentials(&headers))
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn clip_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Preview> {
    let post = state.board.get(ResourceType::Clip, id).await?;
    let preview = match &post.content {
        PostContent::Clip {
            video_reference, ..
        } => state.previews.resolve(video_reference).await,
        PostContent::Message { .. } => Preview::unavailable(),
    };
    Ok(Json(preview))
}

/// Only the message's own credential, sent in `x-delete-token`, may attach a
/// picture. A missing `file` field is reported after the credential check.
async fn attach_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<AttachResponse> {
    let owner = delete_credentials(&headers)
        .owner
        .ok_or_else(|| MemorialError::invalid_request("id and x-delete-token required"))?;
    let mut multipart = multipart.map_err(|e| MemorialError::invalid_request(e.body_text()))?;
    let upload = read_image_field(&mut multipart).await?.unwrap_or_default();
    let message = state.board.attach_image(id, owner, upload).await?;
    Ok(Json(AttachResponse { ok: true, message }))
}

/// The first file in the `file` field; other fields are skipped.
async fn read_image_field(multipart: &mut Multipart) -> Result<Option<ImageUpload>, MemorialError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        MemorialError::invalid_request(format!("Invalid form data: {}", e.body_text()))
    };
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_form)?;
        return Ok(Some(ImageUpload {
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, MemorialError> {
    serde_json::from_slice(body)
        .map_err(|e| MemorialError::invalid_request(format!("Invalid request body: {e}")))
}

/// Owner credential from `x-delete-token`; admin secret from
/// `x-admin-password`, else from a bearer `Authorization` header.
fn delete_credentials(headers: &HeaderMap) -> DeleteCredentials {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    };
    let bearer = || {
        header(AUTHORIZATION.as_str()).and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .map(|token| token.trim().to_string())
        })
    };
    DeleteCredentials {
        owner: header(OWNER_HEADER),
        admin: header(ADMIN_HEADER).or_else(bearer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_delete_credentials_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(delete_credentials(&headers).owner.is_none());

        headers.insert(OWNER_HEADER, HeaderValue::from_static("abcd"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        let creds = delete_credentials(&headers);
        assert_eq!(creds.owner.as_deref(), Some("abcd"));
        assert_eq!(creds.admin.as_deref(), Some("s3cret"));

        headers.insert(ADMIN_HEADER, HeaderValue::from_static("other"));
        assert_eq!(delete_credentials(&headers).admin.as_deref(), Some("other"));
    }

    #[test]
    fn test_blank_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static("  "));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let creds = delete_credentials(&headers);
        assert!(creds.owner.is_none());
        assert!(creds.admin.is_none());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = parse_body::<MessageSubmission>(br#"{"body":"hi","adminToken":"x"}"#)
            .unwrap_err();
        assert!(err.is_validation());
        let ok = parse_body::<ClipSubmission>(br#"{"title":"t","url":"AbcDefGhiJkl123"}"#)
            .unwrap();
        assert_eq!(ok.video_reference, "AbcDefGhiJkl123");
    }
}
