use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{LookupError, PolicyStats, RuleBook, RuleRepository};
use crate::{
    authz::{PolicyError, Rule},
    models::Repository,
};

/// Rules loaded from a YAML file.
///
/// Each lookup reads from an immutable snapshot. [`reload`] builds a new
/// snapshot from the file and swaps it in only if the whole file is valid.
///
/// [`reload`]: RuleRepository::reload
pub struct FileRuleRepository {
    path: PathBuf,
    book: RwLock<Arc<RuleBook>>,
}

impl FileRuleRepository {
    /// Read and validate the rules file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref().to_path_buf();
        let book = read_book(&path).await?;

        tracing::info!(
            path = %path.display(),
            repositories = book.repository_count(),
            rules = book.rule_count(),
            "Loaded authorization rules"
        );

        Ok(Self {
            path,
            book: RwLock::new(Arc::new(book)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current snapshot.
    pub fn book(&self) -> Arc<RuleBook> {
        self.book.read().clone()
    }
}

async fn read_book(path: &Path) -> Result<RuleBook, PolicyError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    RuleBook::from_yaml(&contents)
}

#[async_trait]
impl RuleRepository for FileRuleRepository {
    async fn rules_for(&self, repository: &Repository) -> Result<Arc<[Rule]>, LookupError> {
        Ok(self.book.read().rules_for(repository))
    }

    async fn reload(&self) -> Result<bool, PolicyError> {
        let book = read_book(&self.path).await.inspect_err(|e| {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Rejected rules file; keeping previous rules"
            );
        })?;

        tracing::info!(
            path = %self.path.display(),
            repositories = book.repository_count(),
            rules = book.rule_count(),
            "Reloaded authorization rules"
        );
        *self.book.write() = Arc::new(book);
        Ok(true)
    }

    fn stats(&self) -> PolicyStats {
        PolicyStats::from(self.book.read().as_ref())
    }
}
