//! Request quota enforcement for forum clients.

use crate::{Document, DocumentVersion, ForumClient, MessageTarget};
use async_trait::async_trait;
use drbot_core::{EventKind, Page, PageRequest, UserId};
use drbot_error::ForumResult;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default forum quota in requests per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Wraps a [`ForumClient`] so every call first waits for a GCRA permit.
///
/// # Examples
///
/// ```
/// use drbot_interface::{ForumClient, MemoryForum, ThrottledForum};
///
/// let forum = ThrottledForum::new(MemoryForum::new("DrBot"), 60);
/// assert_eq!(forum.account_name(), "DrBot");
/// ```
#[derive(Clone)]
pub struct ThrottledForum<F> {
    inner: F,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl<F: ForumClient> ThrottledForum<F> {
    /// Wrap `inner` with a per-minute request quota; zero disables throttling.
    pub fn new(inner: F, requests_per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_minute)
            .map(|n| Arc::new(RateLimiter::direct(Quota::per_minute(n))));
        Self { inner, limiter }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl<F: ForumClient> ForumClient for ThrottledForum<F> {
    async fn fetch_recent(&self, kind: EventKind, page: &PageRequest) -> ForumResult<Page> {
        self.acquire().await;
        self.inner.fetch_recent(kind, page).await
    }

    async fn post_message(
        &self,
        target: &MessageTarget,
        subject: &str,
        body: &str,
    ) -> ForumResult<()> {
        self.acquire().await;
        self.inner.post_message(target, subject, body).await
    }

    async fn ban(
        &self,
        user: &UserId,
        reason: &str,
        duration_days: Option<u32>,
    ) -> ForumResult<()> {
        self.acquire().await;
        self.inner.ban(user, reason, duration_days).await
    }

    async fn read_document(&self, path: &str) -> ForumResult<Option<Document>> {
        self.acquire().await;
        self.inner.read_document(path).await
    }

    async fn write_document(
        &self,
        path: &str,
        content: &str,
        expected: Option<DocumentVersion>,
    ) -> ForumResult<DocumentVersion> {
        self.acquire().await;
        self.inner.write_document(path, content, expected).await
    }

    fn account_name(&self) -> &str {
        self.inner.account_name()
    }
}
