//! HTTP bindings for the LocalLens REST endpoints.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, ClientResult};
use crate::models::{
    AuthResponse, Comment, CommentResponse, CommentsResponse, CreatePostResponse, CreatedPost,
    ErrorResponse, FeedResponse, LikeResponse, LoginRequest, NewComment, Position, Post, PostId,
    RegisterRequest,
};
use crate::session::SessionHandle;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, session: SessionHandle) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Attach the current bearer token, read from the session at send time.
    /// Without a session the request goes out as-is and the server decides.
    async fn protected(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.session.token().await {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => {
                tracing::debug!("No session token, sending {} unauthenticated", path);
                builder
            }
        }
    }

    // --- Auth ---

    pub async fn register(&self, req: &RegisterRequest<'_>) -> ClientResult<AuthResponse> {
        let response = self.public(Method::POST, "/register").json(req).send().await?;
        decode(response).await
    }

    pub async fn login(&self, req: &LoginRequest<'_>) -> ClientResult<AuthResponse> {
        let response = self.public(Method::POST, "/login").json(req).send().await?;
        decode(response).await
    }

    // --- Posts ---

    pub async fn feed(&self, position: Position) -> ClientResult<Vec<Post>> {
        let response = self
            .protected(Method::GET, "/feed")
            .await
            .query(&[
                ("latitude", position.latitude),
                ("longitude", position.longitude),
            ])
            .send()
            .await?;
        let body: FeedResponse = decode(response).await?;
        Ok(body.posts)
    }

    pub async fn create_post(&self, form: reqwest::multipart::Form) -> ClientResult<CreatedPost> {
        let response = self
            .protected(Method::POST, "/posts")
            .await
            .multipart(form)
            .send()
            .await?;
        let body: CreatePostResponse = decode(response).await?;
        Ok(body.post)
    }

    pub async fn like(&self, post_id: PostId) -> ClientResult<LikeResponse> {
        let path = format!("/posts/{}/like", post_id);
        let response = self.protected(Method::POST, &path).await.send().await?;
        decode(response).await
    }

    pub async fn unlike(&self, post_id: PostId) -> ClientResult<LikeResponse> {
        let path = format!("/posts/{}/unlike", post_id);
        let response = self.protected(Method::DELETE, &path).await.send().await?;
        decode(response).await
    }

    // --- Comments ---

    pub async fn comments(&self, post_id: PostId) -> ClientResult<Vec<Comment>> {
        let path = format!("/posts/{}/comments", post_id);
        let response = self.protected(Method::GET, &path).await.send().await?;
        let body: CommentsResponse = decode(response).await?;
        Ok(body.comments)
    }

    pub async fn add_comment(&self, post_id: PostId, text: &str) -> ClientResult<Comment> {
        let path = format!("/posts/{}/comments", post_id);
        let response = self
            .protected(Method::POST, &path)
            .await
            .json(&NewComment { text })
            .send()
            .await?;
        let body: CommentResponse = decode(response).await?;
        Ok(body.comment)
    }
}

/// Decode a success body, or turn a non-2xx into `ClientError::Network`
/// carrying the server's `error` message when it sent one.
async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_default();
    tracing::debug!("Request failed with {}: {}", status, message);
    Err(ClientError::server(status, message))
}
