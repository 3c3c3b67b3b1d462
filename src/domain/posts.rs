//! The persisted blog post record and the editable field set.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Category assigned to fresh drafts.
pub const DEFAULT_CATEGORY: &str = "Relacje i związki";

/// A blog post as stored in the `blogs` collection.
///
/// `id` is the application-level identifier. It is generated once at creation and is
/// distinct from the backing store's own document handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub excerpt: String,
    pub main_image: Option<String>,
    pub html_content: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub published: bool,
}

impl Post {
    pub fn fields(&self) -> PostFields {
        PostFields {
            title: self.title.clone(),
            slug: self.slug.clone(),
            category: self.category.clone(),
            excerpt: self.excerpt.clone(),
            main_image: self.main_image.clone(),
            html_content: self.html_content.clone(),
        }
    }
}

/// Operator-editable subset of a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub excerpt: String,
    pub main_image: Option<String>,
    pub html_content: String,
}

impl Default for PostFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            slug: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            excerpt: String::new(),
            main_image: None,
            html_content: String::new(),
        }
    }
}

impl PostFields {
    /// Excerpt written on publish: the title stands in for an empty excerpt.
    pub fn publish_excerpt(&self) -> String {
        if self.excerpt.is_empty() {
            self.title.clone()
        } else {
            self.excerpt.clone()
        }
    }

    /// Names of required fields that are still blank.
    ///
    /// The list only drives a hint on the page; publishing is never blocked by it.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_empty() {
            missing.push("title");
        }
        if self.html_content.is_empty() {
            missing.push("htmlContent");
        }
        if self.main_image.is_none() {
            missing.push("mainImage");
        }
        missing
    }
}

/// Full field set written when a post is created. Timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostDocument {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub excerpt: String,
    pub main_image: Option<String>,
    pub html_content: String,
    pub published: bool,
}

impl NewPostDocument {
    pub fn publish(id: String, fields: &PostFields) -> Self {
        Self {
            id,
            title: fields.title.clone(),
            slug: fields.slug.clone(),
            category: fields.category.clone(),
            excerpt: fields.publish_excerpt(),
            main_image: fields.main_image.clone(),
            html_content: fields.html_content.clone(),
            published: true,
        }
    }
}

/// Fields merged onto an existing document on update. `id` and `createdAt` are never part
/// of the payload; `updatedAt` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMergeUpdate {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub excerpt: String,
    pub main_image: Option<String>,
    pub html_content: String,
    pub published: bool,
}

impl PostMergeUpdate {
    pub fn publish(fields: &PostFields) -> Self {
        Self {
            title: fields.title.clone(),
            slug: fields.slug.clone(),
            category: fields.category.clone(),
            excerpt: fields.publish_excerpt(),
            main_image: fields.main_image.clone(),
            html_content: fields.html_content.clone(),
            published: true,
        }
    }
}
