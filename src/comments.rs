use tokio::sync::Mutex;

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::{Comment, PostId};

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The server's canonical comment, now at the end of the thread.
    Posted(Comment),
    /// Another submission on this thread is still pending.
    Suppressed,
}

#[derive(Default)]
struct Thread {
    comments: Vec<Comment>,
    draft: String,
    submitting: bool,
}

/// Comments for a single post. Append-only from the client's side.
pub struct CommentThreadController {
    post_id: PostId,
    api: ApiClient,
    thread: Mutex<Thread>,
}

impl CommentThreadController {
    pub fn new(post_id: PostId, api: ApiClient) -> Self {
        Self {
            post_id,
            api,
            thread: Mutex::new(Thread::default()),
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.thread.lock().await.comments.clone()
    }

    pub async fn len(&self) -> usize {
        self.thread.lock().await.comments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Text of the last submission that did not go through.
    pub async fn draft(&self) -> String {
        self.thread.lock().await.draft.clone()
    }

    pub async fn is_submitting(&self) -> bool {
        self.thread.lock().await.submitting
    }

    /// Fetch the thread. On failure the local sequence is left as it was.
    pub async fn load(&self) -> ClientResult<Vec<Comment>> {
        match self.api.comments(self.post_id).await {
            Ok(comments) => {
                tracing::debug!("Loaded {} comments for post {}", comments.len(), self.post_id);
                let mut thread = self.thread.lock().await;
                thread.comments = comments.clone();
                Ok(comments)
            }
            Err(e) => {
                tracing::warn!("Failed to load comments for post {}: {}", self.post_id, e);
                Err(e)
            }
        }
    }

    pub async fn post(&self, text: &str) -> ClientResult<Submission> {
        if text.trim().is_empty() {
            return Err(ClientError::validation("Comment cannot be empty"));
        }

        {
            let mut thread = self.thread.lock().await;
            if thread.submitting {
                tracing::debug!("Post {}: comment already submitting", self.post_id);
                return Ok(Submission::Suppressed);
            }
            thread.submitting = true;
            thread.draft = text.to_string();
        }

        let result = self.api.add_comment(self.post_id, text).await;

        let mut thread = self.thread.lock().await;
        thread.submitting = false;
        match result {
            Ok(comment) => {
                thread.comments.push(comment.clone());
                thread.draft.clear();
                Ok(Submission::Posted(comment))
            }
            Err(e) => {
                tracing::warn!("Failed to add comment to post {}: {}", self.post_id, e);
                Err(e)
            }
        }
    }
}
