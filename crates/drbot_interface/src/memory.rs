//! In-memory forum for tests and dry runs.

use crate::{Document, DocumentVersion, ForumClient, MessageTarget};
use async_trait::async_trait;
use drbot_core::{EventKind, Page, PageRequest, RawItem, UserId};
use drbot_error::{ForumError, ForumErrorKind, ForumResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A ban the forum was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    /// Banned user
    pub user: UserId,
    /// Ban reason
    pub reason: String,
    /// Duration, `None` for permanent
    pub duration_days: Option<u32>,
}

/// A message the forum was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient
    pub target: MessageTarget,
    /// Subject line
    pub subject: String,
    /// Body
    pub body: String,
}

#[derive(Debug, Default)]
struct ForumState {
    // Oldest first; listings are served reversed
    listings: HashMap<EventKind, Vec<RawItem>>,
    fetch_failures: HashMap<EventKind, VecDeque<ForumErrorKind>>,
    fetch_calls: HashMap<EventKind, usize>,
    bans: Vec<BanRecord>,
    failing_bans: HashSet<UserId>,
    messages: Vec<SentMessage>,
    failing_messages: bool,
    documents: HashMap<String, Document>,
    injected_conflicts: HashMap<String, usize>,
    document_writes: HashMap<String, usize>,
}

/// Deterministic forum held entirely in memory.
///
/// Listings are scripted with [`push_item`](Self::push_item); fetch failures,
/// ban failures and document write conflicts can be injected. Clones share
/// state, so a test can keep one handle while the host owns another.
///
/// # Examples
///
/// ```
/// use drbot_interface::{ForumClient, MemoryForum};
///
/// let forum = MemoryForum::new("DrBot");
/// assert_eq!(forum.account_name(), "DrBot");
/// assert!(forum.bans().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryForum {
    account: String,
    state: Arc<Mutex<ForumState>>,
}

impl MemoryForum {
    /// Create an empty forum where the host acts as `account`.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            state: Arc::new(Mutex::new(ForumState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ForumState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item as the newest of its listing.
    pub fn push_item(&self, kind: EventKind, item: RawItem) {
        self.state().listings.entry(kind).or_default().push(item);
    }

    /// Make the next `count` fetches of `kind` fail with `error`.
    pub fn fail_next_fetches(&self, kind: EventKind, count: usize, error: ForumErrorKind) {
        let mut state = self.state();
        let queue = state.fetch_failures.entry(kind).or_default();
        for _ in 0..count {
            queue.push_back(error.clone());
        }
    }

    /// Number of fetches made against `kind`, failed ones included.
    pub fn fetch_calls(&self, kind: EventKind) -> usize {
        self.state().fetch_calls.get(&kind).copied().unwrap_or(0)
    }

    /// Make every ban of `user` fail.
    pub fn fail_bans_for(&self, user: impl Into<UserId>) {
        self.state().failing_bans.insert(user.into());
    }

    /// Make every message fail.
    pub fn fail_messages(&self, fail: bool) {
        self.state().failing_messages = fail;
    }

    /// Bans performed so far, failed attempts excluded.
    pub fn bans(&self) -> Vec<BanRecord> {
        self.state().bans.clone()
    }

    /// Messages sent so far.
    pub fn messages(&self) -> Vec<SentMessage> {
        self.state().messages.clone()
    }

    /// Current content of a document.
    pub fn document(&self, path: &str) -> Option<Document> {
        self.state().documents.get(path).cloned()
    }

    /// Successful writes to a document.
    pub fn document_writes(&self, path: &str) -> usize {
        self.state().document_writes.get(path).copied().unwrap_or(0)
    }

    /// Edit a document as another party would, bumping its revision.
    pub fn external_edit(&self, path: &str, content: impl Into<String>) -> DocumentVersion {
        let mut state = self.state();
        let version = state
            .documents
            .get(path)
            .map(|doc| doc.version.next())
            .unwrap_or_else(|| DocumentVersion::new(1));
        state.documents.insert(
            path.to_string(),
            Document {
                content: content.into(),
                version,
            },
        );
        version
    }

    /// Make the next `count` writes to `path` lose against a concurrent edit.
    ///
    /// Each injected conflict bumps the remote revision right before the
    /// conditional write is checked, keeping the content unchanged.
    pub fn inject_conflicts(&self, path: &str, count: usize) {
        *self
            .state()
            .injected_conflicts
            .entry(path.to_string())
            .or_default() += count;
    }
}

#[async_trait]
impl ForumClient for MemoryForum {
    async fn fetch_recent(&self, kind: EventKind, page: &PageRequest) -> ForumResult<Page> {
        let mut state = self.state();
        *state.fetch_calls.entry(kind).or_default() += 1;

        if let Some(error) = state
            .fetch_failures
            .get_mut(&kind)
            .and_then(|queue| queue.pop_front())
        {
            return Err(ForumError::new(error));
        }

        let newest_first: Vec<&RawItem> = state
            .listings
            .get(&kind)
            .map(|items| items.iter().rev().collect())
            .unwrap_or_default();

        let start = match &page.after {
            Some(cursor) => match newest_first.iter().position(|item| item.id() == cursor) {
                Some(index) => index + 1,
                None => newest_first.len(),
            },
            None => 0,
        };
        let limit = page.limit.max(1);
        let items: Vec<RawItem> = newest_first
            .iter()
            .skip(start)
            .take(limit)
            .map(|item| (*item).clone())
            .collect();
        let after = if start + items.len() < newest_first.len() {
            items.last().map(|item| item.id().clone())
        } else {
            None
        };

        Ok(Page { items, after })
    }

    async fn post_message(
        &self,
        target: &MessageTarget,
        subject: &str,
        body: &str,
    ) -> ForumResult<()> {
        let mut state = self.state();
        if state.failing_messages {
            return Err(ForumError::new(ForumErrorKind::Permanent(
                "message delivery disabled".to_string(),
            )));
        }
        state.messages.push(SentMessage {
            target: target.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn ban(
        &self,
        user: &UserId,
        reason: &str,
        duration_days: Option<u32>,
    ) -> ForumResult<()> {
        let mut state = self.state();
        if state.failing_bans.contains(user) {
            return Err(ForumError::new(ForumErrorKind::BanFailed {
                user: user.to_string(),
                reason: "user cannot be banned".to_string(),
            }));
        }
        state.bans.push(BanRecord {
            user: user.clone(),
            reason: reason.to_string(),
            duration_days,
        });
        Ok(())
    }

    async fn read_document(&self, path: &str) -> ForumResult<Option<Document>> {
        Ok(self.state().documents.get(path).cloned())
    }

    async fn write_document(
        &self,
        path: &str,
        content: &str,
        expected: Option<DocumentVersion>,
    ) -> ForumResult<DocumentVersion> {
        let mut state = self.state();

        let pending = state.injected_conflicts.get(path).copied().unwrap_or(0);
        if pending > 0 {
            state.injected_conflicts.insert(path.to_string(), pending - 1);
            let bumped = match state.documents.get_mut(path) {
                Some(doc) => {
                    doc.version = doc.version.next();
                    doc.version
                }
                None => {
                    let version = DocumentVersion::new(1);
                    state.documents.insert(
                        path.to_string(),
                        Document {
                            content: String::new(),
                            version,
                        },
                    );
                    version
                }
            };
            tracing::debug!(path, version = %bumped, "Injected concurrent edit");
        }

        let current = state.documents.get(path).map(|doc| doc.version);
        if current != expected {
            return Err(ForumError::new(ForumErrorKind::VersionConflict {
                path: path.to_string(),
                expected: expected.map(|v| v.get()),
                found: current.map(|v| v.get()),
            }));
        }

        let version = current
            .map(|v| v.next())
            .unwrap_or_else(|| DocumentVersion::new(1));
        state.documents.insert(
            path.to_string(),
            Document {
                content: content.to_string(),
                version,
            },
        );
        *state.document_writes.entry(path.to_string()).or_default() += 1;
        Ok(version)
    }

    fn account_name(&self) -> &str {
        &self.account
    }
}
