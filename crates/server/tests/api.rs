use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use memorial_core::{
    credential::AdminCredential, service::PostService, store::MemoryStore,
    video::PreviewResolver,
};
use serde_json::{json, Value};
use server::{
    board::spawn_board,
    routes::{router, AppState},
};
use std::time::Duration;
use tower::ServiceExt;

const ADMIN: &str = "admin-secret";
const SLUG: &str = "AbcDefGhiJkl123";

fn app() -> Router {
    let service = PostService::new(Box::new(MemoryStore::new()), AdminCredential::new(ADMIN));
    let (board, _task) = spawn_board(service);
    // nothing listens on the discard port, so oEmbed always fails over
    let previews = PreviewResolver::new(Duration::from_secs(1), "localhost")
        .unwrap()
        .with_oembed_endpoint("http://127.0.0.1:9/oembed");
    router(AppState { board, previews })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn delete(app: &Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut request = Request::builder().method(Method::DELETE).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    send(app, request.body(Body::empty()).unwrap()).await
}

const BOUNDARY: &str = "memorial-boundary";

/// A form with one `file` field holding `bytes`.
fn image_form(content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"me.png\"\r\n\
        Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn attach(
    app: &Router,
    id: &str,
    credential: Option<&str>,
    form: Vec<u8>,
) -> (StatusCode, Value) {
    let mut request = Request::post(format!("/messages/{id}/image")).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(credential) = credential {
        request = request.header("x-delete-token", credential);
    }
    send(app, request.body(Body::from(form)).unwrap()).await
}

async fn new_message(app: &Router, body: &str) -> (String, String) {
    let (status, created) = post(app, "/messages", json!({ "body": body })).await;
    assert_eq!(status, StatusCode::OK);
    (
        created["item"]["id"].as_str().unwrap().to_string(),
        created["ownerCredential"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn create_clip_is_listed_without_credential() {
    let app = app();
    let (status, created) = post(
        &app,
        "/clips",
        json!({ "title": "Funny moment", "videoReference": SLUG }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["ok"], true);
    assert_eq!(created["item"]["title"], "Funny moment");
    assert!(created["item"]["createdAt"].is_string());
    let credential = created["ownerCredential"].as_str().unwrap();
    assert_eq!(credential.len(), 32);
    assert!(credential.chars().all(|c| c.is_ascii_hexdigit()));

    let (status, listed) = get(&app, "/clips").await;
    assert_eq!(status, StatusCode::OK);
    let items = listed["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], created["item"]["id"]);
    assert_eq!(items[0]["videoReference"], SLUG);
    assert!(items[0].get("ownerCredential").is_none());
    assert!(!listed.to_string().contains(credential));
}

#[tokio::test]
async fn messages_list_newest_first_and_default_author() {
    let app = app();
    let (first, _) = new_message(&app, "Miss you").await;
    let (status, second) = post(
        &app,
        "/messages",
        json!({ "name": "Sam", "body": "See you soon" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = get(&app, "/messages").await;
    let items = listed["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], second["item"]["id"]);
    assert_eq!(items[0]["authorDisplayName"], "Sam");
    assert_eq!(items[1]["id"], first.as_str());
    assert_eq!(items[1]["authorDisplayName"], "Anonymous");
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let app = app();
    let cases = [
        ("/clips", json!({ "title": "", "videoReference": SLUG })),
        ("/clips", json!({ "title": "Title", "videoReference": "   " })),
        ("/clips", json!({ "title": "Title" })),
        ("/messages", json!({ "body": " \n " })),
        ("/messages", json!({ "body": "hi", "adminToken": "x" })),
        ("/messages", json!({ "body": "x".repeat(1001) })),
    ];
    for (uri, body) in cases {
        let (status, error) = post(&app, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error["ok"], false);
        assert!(error["error"].is_string());
    }

    let request = Request::post("/messages")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, clips) = get(&app, "/clips").await;
    let (_, messages) = get(&app, "/messages").await;
    assert!(clips["items"].as_array().unwrap().is_empty());
    assert!(messages["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn owner_deletes_own_post_once() {
    let app = app();
    let (id, credential) = new_message(&app, "first").await;
    let (other_id, _) = new_message(&app, "second").await;

    // a credential only opens its own post
    let (status, body) = delete(
        &app,
        &format!("/messages?id={other_id}"),
        &[("x-delete-token", credential.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["ok"], false);

    let uri = format!("/messages?id={id}");
    let (status, body) = delete(&app, &uri, &[("x-delete-token", credential.as_str())]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let (status, _) = delete(&app, &uri, &[("x-delete-token", credential.as_str())]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = get(&app, "/messages").await;
    let items = listed["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], other_id.as_str());
}

#[tokio::test]
async fn delete_without_credentials_or_id() {
    let app = app();
    let (id, _) = new_message(&app, "keep me").await;

    let (status, _) = delete(&app, &format!("/messages?id={id}"), &[]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = delete(&app, "/messages", &[("x-delete-token", "abc")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = delete(&app, "/messages?id=404", &[("x-admin-password", ADMIN)]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_can_delete_any_post() {
    let app = app();
    let (first, _) = new_message(&app, "one").await;
    let (second, _) = new_message(&app, "two").await;

    let (status, _) = delete(
        &app,
        &format!("/messages?id={first}"),
        &[("x-admin-password", "not-it")],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = delete(
        &app,
        &format!("/messages?id={first}"),
        &[("x-admin-password", ADMIN)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let bearer = format!("Bearer {ADMIN}");
    let (status, _) = delete(
        &app,
        &format!("/messages?id={second}"),
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = get(&app, "/messages").await;
    assert!(listed["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let app = app();
    let (status, body) = get(&app, "/photos").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);

    let (status, _) = post(&app, "/photos", json!({ "body": "hi" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(&app, "/photos?id=1", &[("x-admin-password", ADMIN)]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clip_preview_falls_back_to_asset_thumbnail() {
    let app = app();
    let (_, created) = post(
        &app,
        "/clips",
        json!({ "title": "Funny moment", "url": format!("https://clips.twitch.tv/{SLUG}") }),
    )
    .await;
    let id = created["item"]["id"].as_str().unwrap();

    let (status, preview) = get(&app, &format!("/clips/{id}/preview")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["available"], true);
    assert_eq!(
        preview["thumbnailUrl"],
        format!("https://clips-media-assets2.twitch.tv/{SLUG}-preview-480x272.jpg")
    );
    assert!(preview["embedUrl"]
        .as_str()
        .unwrap()
        .contains(&format!("clip={SLUG}")));

    let (status, _) = get(&app, "/clips/404/preview").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unresolvable_clip_has_no_preview() {
    let app = app();
    let (_, created) = post(
        &app,
        "/clips",
        json!({ "title": "Somewhere else", "videoReference": "https://example.com/" }),
    )
    .await;
    let id = created["item"]["id"].as_str().unwrap();

    let (status, preview) = get(&app, &format!("/clips/{id}/preview")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview, json!({ "available": false }));
}

#[tokio::test]
async fn repeated_query_id_is_a_json_error() {
    let app = app();
    let admin = [("x-admin-password", ADMIN)];
    let (status, body) = delete(&app, "/messages?id=1&id=2", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn owner_attaches_image_to_message() {
    let app = app();
    let (id, credential) = new_message(&app, "with a picture").await;
    let png = [0x89, 0x50, 0x4e, 0x47];

    let form = image_form("image/png", &png);
    let (status, body) = attach(&app, &id, Some(credential.as_str()), form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["message"]["id"], id.as_str());
    assert_eq!(body["message"]["body"], "with a picture");
    assert_eq!(body["message"]["imageUrl"], "data:image/png;base64,iVBORw==");
    assert!(body["message"].get("ownerCredential").is_none());
    assert!(!body.to_string().contains(&credential));

    let (_, listed) = get(&app, "/messages").await;
    assert_eq!(listed["items"][0]["imageUrl"], "data:image/png;base64,iVBORw==");
}

#[tokio::test]
async fn image_attach_is_owner_only() {
    let app = app();
    let (id, _) = new_message(&app, "mine").await;
    let (_, other_credential) = new_message(&app, "theirs").await;
    let png = [0x89, 0x50, 0x4e, 0x47];

    let (status, body) = attach(
        &app,
        &id,
        Some(other_credential.as_str()),
        image_form("image/png", &png),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["ok"], false);

    // the admin secret does not open it either
    let (status, _) = attach(&app, &id, Some(ADMIN), image_form("image/png", &png)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let form = image_form("image/png", &png);
    let (status, _) = attach(&app, "404", Some(other_credential.as_str()), form).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = attach(&app, &id, None, image_form("image/png", &png)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);

    let (_, listed) = get(&app, "/messages").await;
    assert!(listed["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|item| item.get("imageUrl").is_none()));
}

#[tokio::test]
async fn image_attach_rejects_bad_uploads() {
    let app = app();
    let (id, credential) = new_message(&app, "mine").await;

    let (status, body) = attach(
        &app,
        &id,
        Some(credential.as_str()),
        image_form("text/plain", b"not a picture"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);

    let form = image_form("image/png", b"");
    let (status, _) = attach(&app, &id, Some(credential.as_str()), form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // not a form at all
    let request = Request::post(format!("/messages/{id}/image"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-delete-token", credential.as_str())
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}
