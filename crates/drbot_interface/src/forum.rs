//! Forum API collaborator.

use async_trait::async_trait;
use drbot_core::{EventKind, Page, PageRequest, UserId};
use drbot_error::ForumResult;
use serde::{Deserialize, Serialize};

/// Opaque revision token of a remote document.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct DocumentVersion(u64);

impl DocumentVersion {
    /// Create a version token.
    pub fn new(version: u64) -> Self {
        Self(version)
    }

    /// Raw revision number.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The revision after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// A remote document with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Full text content
    pub content: String,
    /// Revision token for conditional writes
    pub version: DocumentVersion,
}

/// Recipient of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum MessageTarget {
    /// The forum's moderator team (modmail)
    #[display("moderators")]
    Moderators,
    /// A single user
    #[display("user {}", _0)]
    User(UserId),
    /// Reply into an existing modmail conversation
    #[display("conversation {}", _0)]
    Conversation(String),
}

/// Everything the host needs from the forum.
///
/// Implementations own authentication, quotas and raw HTTP. Errors report
/// whether they are worth retrying through
/// [`RetryableError`](drbot_error::RetryableError).
#[async_trait]
pub trait ForumClient: Send + Sync {
    /// Fetch one page of the listing for `kind`, newest first.
    async fn fetch_recent(&self, kind: EventKind, page: &PageRequest) -> ForumResult<Page>;

    /// Send a message.
    async fn post_message(
        &self,
        target: &MessageTarget,
        subject: &str,
        body: &str,
    ) -> ForumResult<()>;

    /// Ban a user; `None` duration is permanent.
    async fn ban(&self, user: &UserId, reason: &str, duration_days: Option<u32>)
    -> ForumResult<()>;

    /// Read a document, `None` when it does not exist.
    async fn read_document(&self, path: &str) -> ForumResult<Option<Document>>;

    /// Write a document if its current revision equals `expected`
    /// (`None` = the document must not exist yet).
    ///
    /// Fails with `ForumErrorKind::VersionConflict` otherwise.
    async fn write_document(
        &self,
        path: &str,
        content: &str,
        expected: Option<DocumentVersion>,
    ) -> ForumResult<DocumentVersion>;

    /// Account the host acts as.
    fn account_name(&self) -> &str;
}
