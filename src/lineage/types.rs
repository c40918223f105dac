//! Lineage records carried by pages

use crate::workspace::PageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a page was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineageSource {
    /// Authored directly
    #[default]
    User,
    Chat,
    Page,
    Crosstab,
    ObjectNode,
}

impl std::fmt::Display for LineageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::Chat => "chat",
            Self::Page => "page",
            Self::Crosstab => "crosstab",
            Self::ObjectNode => "objectNode",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for LineageSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "chat" => Ok(Self::Chat),
            "page" => Ok(Self::Page),
            "crosstab" => Ok(Self::Crosstab),
            "objectNode" | "object-node" => Ok(Self::ObjectNode),
            _ => Err(format!("unknown lineage source: {}", s)),
        }
    }
}

/// Provenance of one page
///
/// `source_page_id` may name a page that no longer exists; readers treat
/// such a page as a lineage root. `generated_page_ids` may likewise hold
/// ids of deleted pages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLineage {
    #[serde(default)]
    pub source: LineageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page_id: Option<PageId>,
    /// Free-form description of what was derived (prompt, node name, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    #[serde(default)]
    pub generated_page_ids: Vec<PageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl PageLineage {
    /// True when this page records no source page
    pub fn is_root(&self) -> bool {
        self.source_page_id.is_none()
    }
}

/// How a derived page came about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationContext {
    pub source: LineageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl DerivationContext {
    pub fn new(source: LineageSource) -> Self {
        Self { source, context: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl Default for DerivationContext {
    fn default() -> Self {
        Self::new(LineageSource::Page)
    }
}
