//! HTTP handlers for the scrapper's five endpoints.
//!
//! Grounded on `borg_server::{AppState, routes}`'s state-sharing and
//! handler-per-route layout; error-to-status mapping follows the crate's
//! `StorageError` taxonomy, serialized as `APIErrorResponse`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use scrapper_core::error::StorageError;
use scrapper_core::models::{
    APIErrorResponse, AddLinkRequest, LinkUpdate, ListLinksResponse, RemoveLinkRequest,
    MSG_ALREADY_EXISTS,
};

use crate::AppState;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let message = message.into();
    let body = APIErrorResponse {
        description: message.clone(),
        code: code.to_string(),
        exception_name: code.to_string(),
        exception_message: message,
        stacktrace: Vec::new(),
    };
    (status, Json(body)).into_response()
}

pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    match state.storage.create_chat(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "chat registered", "id": id })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    match state.storage.chat_exists(id).await {
        Ok(false) => {
            return error_response(StatusCode::NOT_FOUND, "ChatNotFound", "chat not found")
        }
        Err(e) => return e.into_response(),
        Ok(true) => {}
    }

    match state.storage.delete_chat(id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LinksQuery {
    #[serde(rename = "Tg-Chat-Id")]
    pub tg_chat_id: Option<i64>,
}

pub async fn get_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinksQuery>,
) -> Response {
    let Some(chat_id) = query.tg_chat_id else {
        return error_response(StatusCode::BAD_REQUEST, "BadRequest", "missing Tg-Chat-Id");
    };

    match state.storage.chat_exists(chat_id).await {
        Ok(false) => {
            return error_response(StatusCode::NOT_FOUND, "ChatNotFound", "chat not found")
        }
        Err(e) => return e.into_response(),
        Ok(true) => {}
    }

    match state.storage.get_links(chat_id).await {
        Ok(links) => {
            let size = links.len();
            (StatusCode::OK, Json(ListLinksResponse { links, size })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn add_link(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinksQuery>,
    Json(body): Json<AddLinkRequest>,
) -> Response {
    let Some(chat_id) = query.tg_chat_id else {
        return error_response(StatusCode::BAD_REQUEST, "BadRequest", "missing Tg-Chat-Id");
    };

    match state
        .storage
        .add_link(chat_id, &body.link, &body.tags, &body.filters)
        .await
    {
        Ok(()) => {
            (StatusCode::OK, Json(serde_json::json!({ "link": body.link }))).into_response()
        }
        Err(StorageError::LinkAlreadyExists) => {
            let update = LinkUpdate {
                id: 0,
                url: body.link.clone(),
                description: MSG_ALREADY_EXISTS.to_string(),
                tg_chat_ids: vec![chat_id],
            };
            let _ = state.bot_client.send_update(&update).await;
            (StatusCode::OK, Json(serde_json::json!({ "link": body.link }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn remove_link(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinksQuery>,
    Json(body): Json<RemoveLinkRequest>,
) -> Response {
    let Some(chat_id) = query.tg_chat_id else {
        return error_response(StatusCode::BAD_REQUEST, "BadRequest", "missing Tg-Chat-Id");
    };

    match state.storage.remove_link(chat_id, &body.link).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{delete, get, post};
    use axum::Router;
    use scrapper_core::storage::MemoryLinkStorage;
    use scrapper_core::BotClient;
    use tower::ServiceExt;

    use super::*;

    fn test_app() -> Router {
        let storage: Arc<dyn scrapper_core::LinkStorage> = Arc::new(MemoryLinkStorage::new());
        let bot_client = Arc::new(BotClient::new(reqwest::Client::new(), "http://127.0.0.1:0"));
        let config = Arc::new(scrapper_core::Config {
            telegram_bot_api_token: String::new(),
            telegram_bot_host: String::new(),
            stackoverflow_api_key: String::new(),
            github_api_key: String::new(),
            bot_host: String::new(),
            scrapper_host: String::new(),
            database_url: String::new(),
            link_service: scrapper_core::LinkServiceKind::Memory,
            migrations_path: String::new(),
            batch: 10,
            number_of_workers: 1,
        });
        let state = Arc::new(AppState {
            storage,
            bot_client,
            config,
        });

        Router::new()
            .route("/tg-chat/:id", post(create_chat))
            .route("/tg-chat/:id", delete(delete_chat))
            .route("/links", get(get_links))
            .route("/links", post(add_link))
            .route("/links", delete(remove_link))
            .with_state(state)
    }

    #[tokio::test]
    async fn full_subscribe_list_remove_flow() {
        let app = test_app();

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tg-chat/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/links?Tg-Chat-Id=42")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"link": "https://github.com/rust-lang/rust/issues"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/links?Tg-Chat-Id=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/links?Tg-Chat-Id=42")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"link": "https://github.com/rust-lang/rust/issues"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_links_for_unknown_chat_is_not_found() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/links?Tg-Chat-Id=999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
