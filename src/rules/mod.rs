//! Rule repositories: where the per-repository authorization rules come from.
//!
//! Supports two sources:
//! - Inline rules from the configuration file ([`StaticRuleRepository`])
//! - A YAML rules file, re-read on demand ([`FileRuleRepository`])

mod book;
mod file;

use std::sync::Arc;

use async_trait::async_trait;
pub use book::RuleBook;
pub use file::FileRuleRepository;
use serde::Serialize;
use thiserror::Error;

use crate::{
    authz::{PolicyError, Rule},
    config::RulesConfig,
    models::Repository,
};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("rule source unavailable: {0}")]
    Unavailable(String),
}

/// Size of the loaded policy, for health reporting and startup logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PolicyStats {
    pub repositories: usize,
    pub rules: usize,
}

impl From<&RuleBook> for PolicyStats {
    fn from(book: &RuleBook) -> Self {
        Self {
            repositories: book.repository_count(),
            rules: book.rule_count(),
        }
    }
}

/// Source of the rules that govern a repository.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Rules for `repository`. A repository with no configured rules yields
    /// an empty list, which denies every request.
    async fn rules_for(&self, repository: &Repository) -> Result<Arc<[Rule]>, LookupError>;

    /// Re-read the rule source. Returns `Ok(false)` for sources that cannot
    /// change. On error the previously loaded rules stay in effect.
    async fn reload(&self) -> Result<bool, PolicyError> {
        Ok(false)
    }

    /// Counts for the rules currently in effect.
    fn stats(&self) -> PolicyStats {
        PolicyStats::default()
    }
}

/// Rules fixed at startup.
#[derive(Debug, Default)]
pub struct StaticRuleRepository {
    book: RuleBook,
}

impl StaticRuleRepository {
    pub fn new(book: RuleBook) -> Self {
        Self { book }
    }

    pub fn book(&self) -> &RuleBook {
        &self.book
    }
}

#[async_trait]
impl RuleRepository for StaticRuleRepository {
    async fn rules_for(&self, repository: &Repository) -> Result<Arc<[Rule]>, LookupError> {
        Ok(self.book.rules_for(repository))
    }

    fn stats(&self) -> PolicyStats {
        PolicyStats::from(&self.book)
    }
}

/// Build the configured rule repository, validating every rule.
///
/// Returns the repository along with the book it loaded, so callers can
/// report what was configured.
pub async fn from_config(
    config: &RulesConfig,
) -> Result<(Arc<dyn RuleRepository>, Arc<RuleBook>), PolicyError> {
    match config {
        RulesConfig::File(file) => {
            let repository = FileRuleRepository::load(&file.path).await?;
            let book = repository.book();
            let repository: Arc<dyn RuleRepository> = Arc::new(repository);
            Ok((repository, book))
        }
        RulesConfig::Inline(inline) => {
            let book = RuleBook::from_documents(&inline.repositories)?;
            let repository: Arc<dyn RuleRepository> =
                Arc::new(StaticRuleRepository::new(book.clone()));
            Ok((repository, Arc::new(book)))
        }
    }
}
