// Optimistic like/unlike with rollback.
use tokio::sync::{mpsc, Mutex};

use crate::api::ApiClient;
use crate::models::{Post, PostId};

/// The like-related pair shown for a post. Kept consistent: toggling
/// always moves `liked` and `count` together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub liked: bool,
    pub count: u32,
}

impl LikeSnapshot {
    pub fn new(liked: bool, count: u32) -> Self {
        Self { liked, count }
    }

    pub fn of(post: &Post) -> Self {
        Self::new(post.user_liked, post.like_count)
    }

    pub fn toggled(self) -> Self {
        if self.liked {
            Self::new(false, self.count.saturating_sub(1))
        } else {
            Self::new(true, self.count.saturating_add(1))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

/// Per-post state machine: `Idle → Pending → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    Idle(LikeSnapshot),
    /// Request in flight; `optimistic` is displayed, `previous` restored on failure.
    Pending {
        previous: LikeSnapshot,
        optimistic: LikeSnapshot,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("{0}")]
    InvalidTransition(String),
}

impl LikeState {
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Idle(_) => "Idle",
            Self::Pending { .. } => "Pending",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// What the user currently sees.
    pub fn displayed(&self) -> LikeSnapshot {
        match self {
            Self::Idle(snapshot) => *snapshot,
            Self::Pending { optimistic, .. } => *optimistic,
        }
    }

    /// Transition: Idle → Pending. Returns the request to issue.
    pub fn begin_toggle(self) -> Result<(Self, LikeAction), InteractionError> {
        match self {
            Self::Idle(previous) => {
                let action = if previous.liked {
                    LikeAction::Unlike
                } else {
                    LikeAction::Like
                };
                Ok((
                    Self::Pending {
                        previous,
                        optimistic: previous.toggled(),
                    },
                    action,
                ))
            }
            other => Err(InteractionError::InvalidTransition(format!(
                "Cannot toggle from {} state",
                other.state_name()
            ))),
        }
    }

    /// Transition: Pending → Idle, keeping the optimistic value.
    pub fn confirm(self) -> Result<Self, InteractionError> {
        match self {
            Self::Pending { optimistic, .. } => Ok(Self::Idle(optimistic)),
            other => Err(InteractionError::InvalidTransition(format!(
                "Cannot confirm from {} state",
                other.state_name()
            ))),
        }
    }

    /// Transition: Pending → Idle, restoring the pre-toggle value.
    pub fn roll_back(self) -> Result<Self, InteractionError> {
        match self {
            Self::Pending { previous, .. } => Ok(Self::Idle(previous)),
            other => Err(InteractionError::InvalidTransition(format!(
                "Cannot roll back from {} state",
                other.state_name()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Server accepted; the optimistic value is final.
    Confirmed(LikeSnapshot),
    /// Server rejected; the pre-toggle value is back.
    RolledBack(LikeSnapshot),
    /// A toggle was already pending; nothing happened.
    Ignored,
}

pub struct PostInteractionController {
    post_id: PostId,
    api: ApiClient,
    state: Mutex<LikeState>,
    refresh: Option<mpsc::UnboundedSender<PostId>>,
}

impl PostInteractionController {
    pub fn new(post_id: PostId, initial: LikeSnapshot, api: ApiClient) -> Self {
        Self {
            post_id,
            api,
            state: Mutex::new(LikeState::Idle(initial)),
            refresh: None,
        }
    }

    pub fn for_post(post: &Post, api: ApiClient) -> Self {
        Self::new(post.id, LikeSnapshot::of(post), api)
    }

    /// Notify `tx` with the post id after each confirmed toggle.
    pub fn with_refresh_signal(mut self, tx: mpsc::UnboundedSender<PostId>) -> Self {
        self.refresh = Some(tx);
        self
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub async fn state(&self) -> LikeState {
        *self.state.lock().await
    }

    pub async fn displayed(&self) -> LikeSnapshot {
        self.state.lock().await.displayed()
    }

    /// Adopt fresh server values, unless a toggle is in flight.
    pub(crate) async fn reseed(&self, snapshot: LikeSnapshot) {
        let mut state = self.state.lock().await;
        if !state.is_pending() {
            *state = LikeState::Idle(snapshot);
        }
    }

    pub async fn toggle(&self) -> ToggleOutcome {
        let action = {
            let mut state = self.state.lock().await;
            match state.begin_toggle() {
                Ok((next, action)) => {
                    *state = next;
                    action
                }
                Err(e) => {
                    tracing::debug!("Post {}: toggle ignored: {}", self.post_id, e);
                    return ToggleOutcome::Ignored;
                }
            }
        };
        tracing::debug!("Post {}: {:?} sent optimistically", self.post_id, action);

        // The lock is released while the request is in flight
        let result = match action {
            LikeAction::Like => self.api.like(self.post_id).await,
            LikeAction::Unlike => self.api.unlike(self.post_id).await,
        };

        let mut state = self.state.lock().await;
        match result {
            Ok(response) => {
                *state = settle(*state, LikeState::confirm);
                tracing::debug!(
                    "Post {}: {:?} confirmed (server count {})",
                    self.post_id,
                    action,
                    response.like_count
                );
                if let Some(ref tx) = self.refresh {
                    let _ = tx.send(self.post_id);
                }
                ToggleOutcome::Confirmed(state.displayed())
            }
            Err(e) => {
                *state = settle(*state, LikeState::roll_back);
                tracing::warn!("Failed to toggle like on post {}: {}", self.post_id, e);
                ToggleOutcome::RolledBack(state.displayed())
            }
        }
    }
}

/// Apply a Pending → Idle transition. Only the toggling task settles, so
/// the state is always Pending here; anything else is left untouched.
fn settle(
    state: LikeState,
    transition: fn(LikeState) -> Result<LikeState, InteractionError>,
) -> LikeState {
    transition(state).unwrap_or_else(|e| {
        tracing::error!("Like state out of sync: {}", e);
        state
    })
}
