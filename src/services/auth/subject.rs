use async_trait::async_trait;

/// Resolves the subject named by a verified token's identity claim.
///
/// Implemented by the host (user repository, directory service, ...).
#[async_trait]
pub trait SubjectLookup: Send + Sync {
    type Subject: Send;

    async fn find_by_uid(&self, uid: &str) -> Option<Self::Subject>;
}
