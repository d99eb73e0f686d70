//! Article resources over JSON:API
//!
//! List, fetch and create `node--article` resources through `ApiClient`, so
//! every call gets bearer/CSRF interception and 401 recovery.

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{Error, Result};

pub const ARTICLES_PATH: &str = "/jsonapi/node/article";

const JSON_API: &str = "application/vnd.api+json";
const BODY_FORMAT: &str = "basic_html";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: ArticleAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ArticleAttributes {
    #[serde(default)]
    pub title: String,
    /// RFC 3339 timestamp as sent by the backend
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub body: Option<ArticleBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ArticleBody {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub processed: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Deserialize)]
struct Collection {
    #[serde(default)]
    data: Vec<Article>,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    data: Option<Article>,
}

fn json_api() -> HeaderValue {
    HeaderValue::from_static(JSON_API)
}

fn json_api_get(path: String) -> ApiRequest {
    ApiRequest::get(path).header(ACCEPT, json_api())
}

pub async fn list_articles(client: &ApiClient) -> Result<Vec<Article>> {
    let collection: Collection = client.send_json(json_api_get(ARTICLES_PATH.into())).await?;
    Ok(collection.data)
}

/// Fetch one article. The id is sent as a single path segment.
pub async fn get_article(client: &ApiClient, id: &str) -> Result<Article> {
    if matches!(id, "" | "." | "..") {
        return Err(Error::NotFound(String::from("Article not found")));
    }
    let path = format!("{ARTICLES_PATH}/{}", urlencoding::encode(id));
    let document: Document = client.send_json(json_api_get(path)).await?;
    document
        .data
        .ok_or_else(|| Error::NotFound(String::from("Article not found")))
}

/// JSON:API payload for a new article.
pub fn article_payload(title: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "type": "node--article",
            "attributes": {
                "title": title,
                "body": {
                    "value": body,
                    "format": BODY_FORMAT
                }
            }
        }
    })
}

/// Create an article.
///
/// Without a stored access token, a client credentials token is acquired
/// first. 422, 403 and 401 responses map to user-facing errors.
pub async fn create_article(client: &ApiClient, title: &str, body: &str) -> Result<Article> {
    if client.store().access_token().await.is_none() {
        warn!("no access token available, attempting to acquire one");
        client.recovery().acquire_fallback().await.map_err(|e| {
            warn!(error = %e, "failed to acquire token for article creation");
            Error::MissingCredential(String::from(
                "Authentication token required to create articles",
            ))
        })?;
    }

    let request = ApiRequest::post(ARTICLES_PATH)
        .header(CONTENT_TYPE, json_api())
        .header(ACCEPT, json_api())
        .json(article_payload(title, body));

    let document: Document = client.send_json(request).await.map_err(|e| match e.status() {
        Some(422) => Error::InvalidArticle(String::from(
            "Invalid article data format. Please check your input.",
        )),
        Some(403) => {
            Error::PermissionDenied(String::from("You do not have permission to create articles."))
        }
        Some(401) => {
            Error::AuthenticationFailed(String::from("Authentication failed. Please log in again."))
        }
        _ => e,
    })?;

    let article = document
        .data
        .ok_or_else(|| Error::Decode(String::from("create response did not contain data")))?;
    info!(id = %article.id, "article created");
    Ok(article)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cms_auth::{AuthConfig, AuthService, TokenStore};
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        let store = Arc::new(TokenStore::in_memory());
        let http = reqwest::Client::new();
        let auth = AuthService::new(
            http.clone(),
            AuthConfig::new(server.uri(), "http://127.0.0.1:8765"),
            Arc::clone(&store),
        );
        ApiClient::new(http, server.uri(), store, Arc::new(auth))
    }

    #[tokio::test]
    async fn list_reads_data_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jsonapi/node/article"))
            .and(header("Accept", "application/vnd.api+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "1",
                    "attributes": {
                        "title": "Hello",
                        "created": "2024-01-01T00:00:00Z",
                        "body": {"summary": "Hi"}
                    }
                }]
            })))
            .mount(&server)
            .await;

        let articles = list_articles(&client(&server)).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].id, "1");
        assert_eq!(articles[0].attributes.title, "Hello");
        let body = articles[0].attributes.body.as_ref().unwrap();
        assert_eq!(body.summary.as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn get_without_data_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jsonapi/node/article/missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let result = get_article(&client(&server), "missing").await;

        match result {
            Err(Error::NotFound(msg)) => assert_eq!(msg, "Article not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_returns_single_article() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jsonapi/node/article/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "abc", "attributes": {"title": "Detail"}}
            })))
            .mount(&server)
            .await;

        let article = get_article(&client(&server), "abc").await.unwrap();

        assert_eq!(article.attributes.title, "Detail");
        assert!(article.attributes.body.is_none());
    }

    #[tokio::test]
    async fn get_sends_id_as_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "x", "attributes": {"title": "Escaped"}}
            })))
            .mount(&server)
            .await;
        let client = client(&server);

        get_article(&client, "a/b?c").await.unwrap();
        get_article(&client, "../../../user/1?_format=json")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url.path(), "/jsonapi/node/article/a%2Fb%3Fc");
        assert_eq!(requests[0].url.query(), None);
        assert!(requests[1].url.path().starts_with("/jsonapi/node/article/"));
        assert_eq!(requests[1].url.query(), None);
    }

    #[tokio::test]
    async fn dot_segment_ids_are_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = client(&server);

        for id in ["", ".", ".."] {
            let result = get_article(&client, id).await;
            assert!(matches!(result, Err(Error::NotFound(_))), "id {id:?}");
        }
    }

    #[tokio::test]
    async fn create_sends_json_api_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonapi/node/article"))
            .and(header("Content-Type", "application/vnd.api+json"))
            .and(header("Authorization", "Bearer at_1"))
            .and(body_json(serde_json::json!({
                "data": {
                    "type": "node--article",
                    "attributes": {
                        "title": "T",
                        "body": {"value": "B", "format": "basic_html"}
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "new-1", "attributes": {"title": "T"}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server);
        client.store().set_tokens("at_1", None).await.unwrap();

        let article = create_article(&client, "T", "B").await.unwrap();

        assert_eq!(article.id, "new-1");
    }

    #[tokio::test]
    async fn create_forbidden_is_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonapi/node/article"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let client = client(&server);
        client.store().set_tokens("at_1", None).await.unwrap();

        let result = create_article(&client, "T", "B").await;

        match result {
            Err(Error::PermissionDenied(msg)) => {
                assert_eq!(msg, "You do not have permission to create articles.")
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_unprocessable_is_invalid_article() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonapi/node/article"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;
        let client = client(&server);
        client.store().set_tokens("at_1", None).await.unwrap();

        let result = create_article(&client, "", "B").await;

        assert!(matches!(result, Err(Error::InvalidArticle(_))));
    }

    #[tokio::test]
    async fn create_unauthorized_after_recovery_is_authentication_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonapi/node/article"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_cc"
            })))
            .mount(&server)
            .await;
        let client = client(&server);
        client.store().set_tokens("at_1", None).await.unwrap();

        let result = create_article(&client, "T", "B").await;

        match result {
            Err(Error::AuthenticationFailed(msg)) => {
                assert_eq!(msg, "Authentication failed. Please log in again.")
            }
            other => panic!("expected AuthenticationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_without_token_acquires_one_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_cc"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/jsonapi/node/article"))
            .and(header("Authorization", "Bearer at_cc"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "new-2", "attributes": {"title": "T"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let article = create_article(&client(&server), "T", "B").await.unwrap();

        assert_eq!(article.id, "new-2");
    }

    #[tokio::test]
    async fn create_without_obtainable_token_is_missing_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/jsonapi/node/article"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let result = create_article(&client(&server), "T", "B").await;

        match result {
            Err(Error::MissingCredential(msg)) => {
                assert_eq!(msg, "Authentication token required to create articles")
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }
}
