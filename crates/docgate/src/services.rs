//! External collaborators of the access dispatcher.
//!
//! The general permission evaluator, the file-lock service and the crawl
//! strategy source live outside this crate. They are consumed through these
//! traits and injected once at construction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docgate_core::{GnsPath, PermBits, PrincipalId};

/// How the requesting party authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorType {
    /// A named user account.
    Realname,
    /// A holder of an anonymous link.
    Anonymous,
    /// An application or system account.
    App,
}

/// An already-authenticated requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// User, link or app id.
    pub id: PrincipalId,
    /// How `id` authenticated.
    pub visitor_type: VisitorType,
}

impl Subject {
    /// A named user.
    pub fn user(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            visitor_type: VisitorType::Realname,
        }
    }

    /// An anonymous-link visitor.
    pub fn anonymous(link_id: impl Into<PrincipalId>) -> Self {
        Self {
            id: link_id.into(),
            visitor_type: VisitorType::Anonymous,
        }
    }

    /// An application account.
    pub fn app(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            visitor_type: VisitorType::App,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Outcome of a permission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    /// All requested bits are granted.
    Granted,
    /// At least one requested bit is missing or denied.
    Denied,
    /// The subject's classification level is below the object's.
    CsfRestricted,
    /// The object does not exist.
    NotFound,
}

impl EvalStatus {
    /// Whether access is granted.
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

impl fmt::Display for EvalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::CsfRestricted => "csf restricted",
            Self::NotFound => "not found",
        };
        f.write_str(s)
    }
}

/// The general permission evaluator.
///
/// It resolves custom-permission overlays, inherited denies, group
/// membership and classification gating; this crate only builds the request
/// and interprets the status.
#[async_trait]
pub trait PermissionEvaluator: Send + Sync {
    /// Evaluate whether `subject` holds every bit of `bits` on `path`.
    async fn check_permission(
        &self,
        subject: &Subject,
        path: &GnsPath,
        bits: PermBits,
    ) -> anyhow::Result<EvalStatus>;
}

/// Releases file locks after destructive operations.
#[async_trait]
pub trait FileLockService: Send + Sync {
    /// Release the lock on exactly `path`.
    async fn delete(&self, path: &GnsPath) -> anyhow::Result<()>;

    /// Release every lock on `path` and its subtree.
    async fn delete_subtree(&self, path: &GnsPath) -> anyhow::Result<()>;
}

/// Answers whether a file-crawl strategy covers a user and path.
#[async_trait]
pub trait CrawlStrategySource: Send + Sync {
    /// Whether a crawl strategy row matches `user_id` on `path`.
    async fn has_crawl_strategy(&self, user_id: &PrincipalId, path: &GnsPath)
        -> anyhow::Result<bool>;
}

/// A crawl source with no strategies configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCrawlStrategies;

#[async_trait]
impl CrawlStrategySource for NoCrawlStrategies {
    async fn has_crawl_strategy(&self, _: &PrincipalId, _: &GnsPath) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// The external services, bundled for injection.
#[derive(Clone)]
pub struct Services {
    /// General permission evaluator.
    pub evaluator: Arc<dyn PermissionEvaluator>,
    /// File-lock service.
    pub locks: Arc<dyn FileLockService>,
    /// Crawl strategy source.
    pub crawl: Arc<dyn CrawlStrategySource>,
}

impl Services {
    /// Bundle an evaluator and a lock service, with no crawl strategies.
    pub fn new(evaluator: Arc<dyn PermissionEvaluator>, locks: Arc<dyn FileLockService>) -> Self {
        Self {
            evaluator,
            locks,
            crawl: Arc::new(NoCrawlStrategies),
        }
    }

    /// Replace the crawl strategy source.
    pub fn with_crawl(mut self, crawl: Arc<dyn CrawlStrategySource>) -> Self {
        self.crawl = crawl;
        self
    }
}
