//! Help article domain model.
//!
//! # Responsibility
//! - Define the persisted article record and its identifier-less draft form.
//! - Define the article/group association pair.
//!
//! # Invariants
//! - `title` must contain at least one non-whitespace character.
//! - `keywords` and `reference_links` keep caller order; duplicates are
//!   preserved as given.

use super::group::GroupId;
use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Store-assigned article identifier.
pub type ArticleId = i64;

/// Article content without an identifier, used for inserts.
///
/// Callers never choose identifiers; the repository assigns one on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub header: String,
    pub title: String,
    pub short_description: String,
    pub keywords: Vec<String>,
    pub body: String,
    pub reference_links: Vec<String>,
}

impl ArticleDraft {
    /// Creates a draft with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)
    }

    /// Attaches a store-assigned identifier.
    pub fn into_article(self, id: ArticleId) -> Article {
        Article {
            id,
            header: self.header,
            title: self.title,
            short_description: self.short_description,
            keywords: self.keywords,
            body: self.body,
            reference_links: self.reference_links,
        }
    }
}

/// Persisted help article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub header: String,
    pub title: String,
    pub short_description: String,
    pub keywords: Vec<String>,
    pub body: String,
    pub reference_links: Vec<String>,
}

impl Article {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)
    }

    /// Returns the article content without its identifier.
    pub fn to_draft(&self) -> ArticleDraft {
        ArticleDraft {
            header: self.header.clone(),
            title: self.title.clone(),
            short_description: self.short_description.clone(),
            keywords: self.keywords.clone(),
            body: self.body.clone(),
            reference_links: self.reference_links.clone(),
        }
    }
}

/// One article/group link. A pair appears at most once in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Association {
    pub article_id: ArticleId,
    pub group_id: GroupId,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyArticleTitle);
    }
    Ok(())
}
