//! Location-keyed feed.
//!
//! The synchronizer owns the in-memory post list for one feed view. Every
//! successful fetch replaces the whole list in server order; a failed fetch
//! keeps whatever was there and records an error state that is distinct
//! from an empty result.
//!
//! Fetches may overlap. Each one takes a sequence number when issued and a
//! response only lands if nothing newer has landed first, so the list always
//! reflects the most recently issued request that completed.
//!
//! Each held post has exactly one like controller. Reads overlay the
//! controller's displayed pair onto the post, and a reload reseeds idle
//! controllers from the server while leaving pending ones alone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::geolocation::GeolocationGate;
use crate::interaction::{LikeSnapshot, PostInteractionController};
use crate::models::{Position, Post, PostId};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load feed. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum FeedStatus {
    /// Nothing requested yet.
    Idle,
    Loading,
    /// Last fetch succeeded; the list may legitimately be empty.
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub posts: Vec<Post>,
    pub status: FeedStatus,
    pub position: Option<Position>,
}

impl FeedSnapshot {
    pub fn is_empty_result(&self) -> bool {
        self.status == FeedStatus::Ready && self.posts.is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        match self.status {
            FeedStatus::Failed(ref msg) => Some(msg),
            _ => None,
        }
    }
}

struct FeedState {
    posts: Vec<Post>,
    controllers: HashMap<PostId, Arc<PostInteractionController>>,
    status: FeedStatus,
    position: Option<Position>,
    applied_seq: u64,
}

impl FeedState {
    /// `post` with its like fields taken from its controller.
    async fn with_like_state(&self, post: &Post) -> Post {
        let mut post = post.clone();
        if let Some(controller) = self.controllers.get(&post.id) {
            let shown = controller.displayed().await;
            post.user_liked = shown.liked;
            post.like_count = shown.count;
        }
        post
    }

    async fn visible_posts(&self) -> Vec<Post> {
        let mut posts = Vec::with_capacity(self.posts.len());
        for post in &self.posts {
            posts.push(self.with_like_state(post).await);
        }
        posts
    }
}

pub struct FeedSynchronizer {
    api: ApiClient,
    gate: Arc<GeolocationGate>,
    state: Mutex<FeedState>,
    issued: AtomicU64,
    refresh: Option<mpsc::UnboundedSender<PostId>>,
}

impl FeedSynchronizer {
    pub fn new(api: ApiClient, gate: Arc<GeolocationGate>) -> Self {
        Self {
            api,
            gate,
            state: Mutex::new(FeedState {
                posts: Vec::new(),
                controllers: HashMap::new(),
                status: FeedStatus::Idle,
                position: None,
                applied_seq: 0,
            }),
            issued: AtomicU64::new(0),
            refresh: None,
        }
    }

    /// Forward the refresh signal of every like controller this feed hands out.
    pub fn with_refresh_signal(mut self, tx: mpsc::UnboundedSender<PostId>) -> Self {
        self.refresh = Some(tx);
        self
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().await;
        FeedSnapshot {
            posts: state.visible_posts().await,
            status: state.status.clone(),
            position: state.position,
        }
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.state.lock().await.visible_posts().await
    }

    pub async fn status(&self) -> FeedStatus {
        self.state.lock().await.status.clone()
    }

    pub async fn position(&self) -> Option<Position> {
        self.state.lock().await.position
    }

    pub async fn post(&self, id: PostId) -> Option<Post> {
        let state = self.state.lock().await;
        match state.posts.iter().find(|p| p.id == id) {
            Some(post) => Some(state.with_like_state(post).await),
            None => None,
        }
    }

    /// The like controller owned by this feed for a held post. Every call
    /// for the same post returns the same controller.
    pub async fn interaction(&self, id: PostId) -> Option<Arc<PostInteractionController>> {
        self.state.lock().await.controllers.get(&id).cloned()
    }

    fn controller_for(&self, post: &Post) -> Arc<PostInteractionController> {
        let controller = PostInteractionController::for_post(post, self.api.clone());
        Arc::new(match self.refresh {
            Some(ref tx) => controller.with_refresh_signal(tx.clone()),
            None => controller,
        })
    }

    /// Acquire a fix through the gate, then load around it.
    pub async fn start(&self) -> ClientResult<Vec<Post>> {
        self.state.lock().await.status = FeedStatus::Loading;

        match self.gate.acquire().await {
            Ok(position) => self.load(position).await,
            Err(e) => {
                tracing::warn!("Feed cannot load without a position: {}", e);
                self.state.lock().await.status = FeedStatus::Failed(e.to_string());
                Err(ClientError::from(e))
            }
        }
    }

    /// Fetch the posts near `position` and make them the local list.
    pub async fn load(&self, position: Position) -> ClientResult<Vec<Post>> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().await;
            state.position = Some(position);
            state.status = FeedStatus::Loading;
        }
        tracing::debug!("Feed request #{} at {}", seq, position);

        let result = self.api.feed(position).await;

        let mut state = self.state.lock().await;
        if seq < state.applied_seq {
            tracing::debug!(
                "Discarding feed response #{} (#{} already applied)",
                seq,
                state.applied_seq
            );
            return match result {
                Ok(_) => Ok(state.visible_posts().await),
                Err(e) => Err(e),
            };
        }
        state.applied_seq = seq;

        match result {
            Ok(posts) => {
                tracing::info!("Feed loaded: {} posts near {}", posts.len(), position);
                let mut controllers = HashMap::with_capacity(posts.len());
                for post in &posts {
                    let controller = match state.controllers.remove(&post.id) {
                        Some(existing) => {
                            existing.reseed(LikeSnapshot::of(post)).await;
                            existing
                        }
                        None => self.controller_for(post),
                    };
                    controllers.insert(post.id, controller);
                }
                state.controllers = controllers;
                state.posts = posts;
                state.status = FeedStatus::Ready;
                Ok(state.visible_posts().await)
            }
            Err(e) => {
                tracing::warn!("Failed to load feed: {}", e);
                state.status = FeedStatus::Failed(LOAD_FAILED_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    /// Repeat the last load, or start over if no position is known yet.
    pub async fn refresh(&self) -> ClientResult<Vec<Post>> {
        let position = self.state.lock().await.position;
        match position {
            Some(position) => self.load(position).await,
            None => self.start().await,
        }
    }
}
