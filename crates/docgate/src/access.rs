//! Access-control enforcement for file operations.
//!
//! Every operation kind maps to exactly one [`Predicate`]. Checks are
//! one-shot: a request is either allowed or refused with an
//! [`AuthzError`] carrying the operation, path and subject. Destructive
//! operations additionally map to a [`Cleanup`] run once the operation has
//! completed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use docgate_core::{GnsPath, PermBits};
use docgate_store::{CustomPermStore, OwnerStore};

use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::services::{EvalStatus, Services, Subject, VisitorType};

/// A file operation subject to access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessOp {
    ListFileVersion,
    ListDir,
    GetDir,
    RecycleFile,
    RecycleDir,
    DeleteFile,
    DeleteDir,
    SetRecyclePolicy,
    ListRecycleBinDir,
    SetCsfLevel,
    QuarantineAppeal,
    SetDocDue,
    CopyFile,
    GetFile,
    PreviewFile,
    GetFileMeta,
    GetAttr,
    SetTag,
}

/// How an operation is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Always allowed at this layer.
    None,
    /// The evaluator must grant the bits.
    Bits(PermBits),
    /// As [`Predicate::Bits`], but refusal is a download denial.
    BitsOrRaise(PermBits),
    /// The subject must own the path or an ancestor.
    Owner,
    /// As [`Predicate::Bits`], unless a crawl strategy exempts the subject.
    BitsWithCrawlExemption(PermBits),
}

/// Records removed once an operation has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Nothing to remove.
    None,
    /// Records on exactly the path.
    Exact,
    /// Records on the path and its subtree.
    Subtree,
}

impl AccessOp {
    /// Every operation kind.
    pub const ALL: [AccessOp; 18] = [
        AccessOp::ListFileVersion,
        AccessOp::ListDir,
        AccessOp::GetDir,
        AccessOp::RecycleFile,
        AccessOp::RecycleDir,
        AccessOp::DeleteFile,
        AccessOp::DeleteDir,
        AccessOp::SetRecyclePolicy,
        AccessOp::ListRecycleBinDir,
        AccessOp::SetCsfLevel,
        AccessOp::QuarantineAppeal,
        AccessOp::SetDocDue,
        AccessOp::CopyFile,
        AccessOp::GetFile,
        AccessOp::PreviewFile,
        AccessOp::GetFileMeta,
        AccessOp::GetAttr,
        AccessOp::SetTag,
    ];

    /// The predicate guarding this operation.
    pub fn predicate(self) -> Predicate {
        use AccessOp::*;
        match self {
            ListFileVersion => Predicate::BitsWithCrawlExemption(PermBits::DISPLAY),
            ListDir | GetDir => Predicate::None,
            RecycleFile | RecycleDir | DeleteFile | DeleteDir | SetRecyclePolicy
            | ListRecycleBinDir | SetCsfLevel | QuarantineAppeal | SetDocDue => Predicate::Owner,
            CopyFile => Predicate::Bits(PermBits::DISPLAY | PermBits::READ),
            GetFile | PreviewFile => Predicate::BitsOrRaise(PermBits::READ),
            GetFileMeta | GetAttr => Predicate::Bits(PermBits::DISPLAY),
            SetTag => Predicate::Bits(PermBits::EDIT),
        }
    }

    /// The cleanup run after this operation completes.
    pub fn cleanup(self) -> Cleanup {
        match self {
            AccessOp::RecycleFile | AccessOp::DeleteFile => Cleanup::Exact,
            AccessOp::RecycleDir | AccessOp::DeleteDir => Cleanup::Subtree,
            _ => Cleanup::None,
        }
    }

    /// The operation name, e.g. `"recycle-dir"`.
    pub fn as_str(self) -> &'static str {
        use AccessOp::*;
        match self {
            ListFileVersion => "list-file-version",
            ListDir => "list-dir",
            GetDir => "get-dir",
            RecycleFile => "recycle-file",
            RecycleDir => "recycle-dir",
            DeleteFile => "delete-file",
            DeleteDir => "delete-dir",
            SetRecyclePolicy => "set-recycle-policy",
            ListRecycleBinDir => "list-recycle-bin-dir",
            SetCsfLevel => "set-csf-level",
            QuarantineAppeal => "quarantine-appeal",
            SetDocDue => "set-doc-due",
            CopyFile => "copy-file",
            GetFile => "get-file",
            PreviewFile => "preview-file",
            GetFileMeta => "get-file-meta",
            GetAttr => "get-attr",
            SetTag => "set-tag",
        }
    }
}

impl fmt::Display for AccessOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a post-operation cleanup removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Custom permission records deleted.
    pub perms_deleted: u64,
    /// Owner records deleted.
    pub owners_deleted: u64,
    /// Whether the lock service was asked to release locks.
    pub locks_released: bool,
}

/// Dispatches access checks and post-operation cleanup.
pub struct AccessController<S> {
    store: Arc<S>,
    services: Services,
    config: AuthzConfig,
}

impl<S> Clone for AccessController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            services: self.services.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: OwnerStore + CustomPermStore> AccessController<S> {
    /// Create a controller.
    pub fn new(store: Arc<S>, services: Services, config: AuthzConfig) -> Self {
        Self {
            store,
            services,
            config,
        }
    }

    /// Whether `subject` is the data-exchange system principal. Only an app
    /// visitor carrying that id qualifies.
    pub fn is_data_exchange(&self, subject: &Subject) -> bool {
        subject.visitor_type == VisitorType::App
            && subject.id == self.config.data_exchange_principal
    }

    /// Authorize `op` on `path` for `subject`.
    #[tracing::instrument(skip(self, subject, path), fields(subject = %subject, path = %path))]
    pub async fn check_access(&self, subject: &Subject, path: &GnsPath, op: AccessOp) -> Result<()> {
        if self.is_data_exchange(subject) {
            tracing::debug!("data-exchange principal bypasses checks");
            return Ok(());
        }

        match op.predicate() {
            Predicate::None => Ok(()),
            Predicate::Owner => {
                if self.store.is_owner(path, &subject.id).await? {
                    Ok(())
                } else {
                    Err(self.denied(subject, path, op, "not an owner".to_string()))
                }
            }
            Predicate::Bits(bits) => self.require_bits(subject, path, op, bits).await,
            Predicate::BitsOrRaise(bits) => {
                let status = self.evaluate(subject, path, bits).await?;
                if status.is_granted() {
                    Ok(())
                } else {
                    tracing::warn!(%status, "download denied");
                    Err(AuthzError::DownloadDenied {
                        op,
                        path: path.clone(),
                        subject: subject.id.clone(),
                        status,
                    })
                }
            }
            Predicate::BitsWithCrawlExemption(bits) => {
                if self.crawl_exempt(subject, path).await? {
                    tracing::debug!("crawl strategy exemption");
                    return Ok(());
                }
                self.require_bits(subject, path, op, bits).await
            }
        }
    }

    /// Remove the records left behind by a completed `op` on `path`.
    #[tracing::instrument(skip(self, path), fields(path = %path))]
    pub async fn on_access_finished(&self, op: AccessOp, path: &GnsPath) -> Result<CleanupReport> {
        let report = match op.cleanup() {
            Cleanup::None => return Ok(CleanupReport::default()),
            Cleanup::Exact => {
                let perms_deleted = self.store.delete_custom_perm_by_file_id(path).await?;
                let owners_deleted = self.store.delete_owner_by_file_id(path).await?;
                self.services
                    .locks
                    .delete(path)
                    .await
                    .map_err(|e| AuthzError::LockService(format!("{:#}", e)))?;
                CleanupReport {
                    perms_deleted,
                    owners_deleted,
                    locks_released: true,
                }
            }
            Cleanup::Subtree => {
                let perms_deleted = self.store.delete_custom_perm_by_dir_id(path).await?;
                let owners_deleted = self.store.delete_owner_by_dir_id(path).await?;
                self.services
                    .locks
                    .delete_subtree(path)
                    .await
                    .map_err(|e| AuthzError::LockService(format!("{:#}", e)))?;
                CleanupReport {
                    perms_deleted,
                    owners_deleted,
                    locks_released: true,
                }
            }
        };

        tracing::info!(
            perms = report.perms_deleted,
            owners = report.owners_deleted,
            "post-operation cleanup"
        );
        Ok(report)
    }

    /// Whether `subject` may edit `path`.
    pub async fn has_edit_permission(&self, subject: &Subject, path: &GnsPath) -> Result<bool> {
        if self.is_data_exchange(subject) {
            return Ok(true);
        }
        Ok(self
            .evaluate(subject, path, PermBits::EDIT)
            .await?
            .is_granted())
    }

    async fn require_bits(
        &self,
        subject: &Subject,
        path: &GnsPath,
        op: AccessOp,
        bits: PermBits,
    ) -> Result<()> {
        let status = self.evaluate(subject, path, bits).await?;
        if status.is_granted() {
            Ok(())
        } else {
            Err(self.denied(subject, path, op, format!("{:?} {}", bits, status)))
        }
    }

    async fn evaluate(&self, subject: &Subject, path: &GnsPath, bits: PermBits) -> Result<EvalStatus> {
        self.services
            .evaluator
            .check_permission(subject, path, bits)
            .await
            .map_err(|e| AuthzError::Evaluator(format!("{:#}", e)))
    }

    async fn crawl_exempt(&self, subject: &Subject, path: &GnsPath) -> Result<bool> {
        if subject.visitor_type != VisitorType::Realname || !self.config.file_crawl_enabled {
            return Ok(false);
        }
        self.services
            .crawl
            .has_crawl_strategy(&subject.id, path)
            .await
            .map_err(|e| AuthzError::Evaluator(format!("{:#}", e)))
    }

    fn denied(&self, subject: &Subject, path: &GnsPath, op: AccessOp, reason: String) -> AuthzError {
        tracing::warn!(%reason, "access denied");
        AuthzError::AccessDenied {
            op,
            path: path.clone(),
            subject: subject.id.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_op_has_a_name() {
        let names: std::collections::HashSet<&str> =
            AccessOp::ALL.iter().map(|op| op.as_str()).collect();
        assert_eq!(names.len(), AccessOp::ALL.len());
    }

    #[test]
    fn test_dispatch_table() {
        assert_eq!(
            AccessOp::ListFileVersion.predicate(),
            Predicate::BitsWithCrawlExemption(PermBits::DISPLAY)
        );
        assert_eq!(AccessOp::GetDir.predicate(), Predicate::None);
        assert_eq!(AccessOp::SetDocDue.predicate(), Predicate::Owner);
        assert_eq!(
            AccessOp::CopyFile.predicate(),
            Predicate::Bits(PermBits::DISPLAY | PermBits::READ)
        );
        assert_eq!(
            AccessOp::PreviewFile.predicate(),
            Predicate::BitsOrRaise(PermBits::READ)
        );
        assert_eq!(AccessOp::GetAttr.predicate(), Predicate::Bits(PermBits::DISPLAY));
        assert_eq!(AccessOp::SetTag.predicate(), Predicate::Bits(PermBits::EDIT));

        let owner_ops = AccessOp::ALL
            .iter()
            .filter(|op| op.predicate() == Predicate::Owner)
            .count();
        assert_eq!(owner_ops, 9);
    }

    #[test]
    fn test_cleanup_table() {
        assert_eq!(AccessOp::RecycleFile.cleanup(), Cleanup::Exact);
        assert_eq!(AccessOp::DeleteDir.cleanup(), Cleanup::Subtree);
        let with_cleanup = AccessOp::ALL
            .iter()
            .filter(|op| op.cleanup() != Cleanup::None)
            .count();
        assert_eq!(with_cleanup, 4);
    }

    #[test]
    fn test_op_serde_names_match_display() {
        for op in AccessOp::ALL {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op));
        }
    }
}
