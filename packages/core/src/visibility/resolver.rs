//! Resource Resolution
//!
//! Menu items may point at external entities (pages, products, categories)
//! instead of literal URLs. A [`ResourceResolver`] answers whether such an
//! entity still exists; [`Resolutions`] records the answers for one read so
//! the cascade filter itself stays synchronous and pure.

use crate::models::{LinkTarget, MenuItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Reference to an externally resolved entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// The resource an item links to, if any
    pub fn of(item: &MenuItem) -> Option<Self> {
        match &item.link {
            Some(LinkTarget::Resource {
                resource_type,
                resource_id,
                ..
            }) => Some(Self::new(resource_type, resource_id)),
            _ => None,
        }
    }
}

/// What the resolver knows about an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedResource {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub is_deleted_or_invalid: bool,
}

/// Looks up externally managed entities referenced by menu items
///
/// `Ok(None)` means the entity does not exist. Errors are never surfaced to
/// menu readers; see [`Resolutions::collect`].
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn resolve(&self, reference: &ResourceRef) -> Result<Option<ResolvedResource>>;
}

/// Entry of a resources file read by [`StaticResourceResolver::load`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceEntry {
    #[serde(rename = "type")]
    resource_type: String,
    id: String,
    #[serde(flatten)]
    resolved: ResolvedResource,
}

/// Resolver backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct StaticResourceResolver {
    resources: HashMap<ResourceRef, ResolvedResource>,
}

impl StaticResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: ResourceRef, resolved: ResolvedResource) -> Self {
        self.resources.insert(reference, resolved);
        self
    }

    /// Parse a JSON array of `{ type, id, name, slug, isDeletedOrInvalid? }`
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<ResourceEntry> =
            serde_json::from_str(json).context("Failed to parse resources JSON")?;
        let resources = entries
            .into_iter()
            .map(|e| (ResourceRef::new(e.resource_type, e.id), e.resolved))
            .collect();
        Ok(Self { resources })
    }

    /// Load resources from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read resources file {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceResolver for StaticResourceResolver {
    async fn resolve(&self, reference: &ResourceRef) -> Result<Option<ResolvedResource>> {
        Ok(self.resources.get(reference).cloned())
    }
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Available,
    Missing,
    Invalid,
    /// The resolver failed; handled like `Missing`
    Failed(String),
}

impl Resolution {
    pub fn is_available(&self) -> bool {
        matches!(self, Resolution::Available)
    }
}

/// Resolution outcomes for every resource referenced by one read
///
/// References that were never collected count as missing.
#[derive(Debug, Clone, Default)]
pub struct Resolutions {
    outcomes: HashMap<ResourceRef, Resolution>,
}

impl Resolutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every distinct resource referenced by `items`, once each
    ///
    /// Resolver errors are logged and recorded as [`Resolution::Failed`];
    /// they never fail the read.
    pub async fn collect(resolver: &dyn ResourceResolver, items: &[MenuItem]) -> Self {
        let mut outcomes = HashMap::new();

        for reference in items.iter().filter_map(ResourceRef::of) {
            if outcomes.contains_key(&reference) {
                continue;
            }
            let outcome = match resolver.resolve(&reference).await {
                Ok(Some(resolved)) if resolved.is_deleted_or_invalid => Resolution::Invalid,
                Ok(Some(_)) => Resolution::Available,
                Ok(None) => Resolution::Missing,
                Err(e) => {
                    tracing::warn!(
                        resource_type = %reference.resource_type,
                        resource_id = %reference.resource_id,
                        "Resource resolution failed, treating as missing: {:#}",
                        e
                    );
                    Resolution::Failed(e.to_string())
                }
            };
            outcomes.insert(reference, outcome);
        }

        tracing::debug!("Resolved {} distinct menu resources", outcomes.len());
        Self { outcomes }
    }

    pub fn insert(&mut self, reference: ResourceRef, resolution: Resolution) {
        self.outcomes.insert(reference, resolution);
    }

    pub fn get(&self, reference: &ResourceRef) -> Option<&Resolution> {
        self.outcomes.get(reference)
    }

    pub fn is_available(&self, reference: &ResourceRef) -> bool {
        self.get(reference).is_some_and(Resolution::is_available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FailingResolver;

    #[async_trait]
    impl ResourceResolver for FailingResolver {
        async fn resolve(&self, _reference: &ResourceRef) -> Result<Option<ResolvedResource>> {
            anyhow::bail!("catalog service unavailable")
        }
    }

    fn linked(resource_id: &str) -> MenuItem {
        let mut item = MenuItem::new_leaf("t", "p", resource_id, Utc::now());
        item.link = Some(LinkTarget::Resource {
            resource_type: "page".to_string(),
            resource_id: resource_id.to_string(),
            fallback_url: None,
        });
        item
    }

    fn resolved(deleted: bool) -> ResolvedResource {
        ResolvedResource {
            name: "Page".to_string(),
            slug: "page".to_string(),
            is_deleted_or_invalid: deleted,
        }
    }

    #[tokio::test]
    async fn test_collect_classifies_outcomes() {
        let resolver = StaticResourceResolver::new()
            .with(ResourceRef::new("page", "1"), resolved(false))
            .with(ResourceRef::new("page", "2"), resolved(true));
        let items = vec![linked("1"), linked("2"), linked("3"), linked("1")];

        let resolutions = Resolutions::collect(&resolver, &items).await;
        assert_eq!(
            resolutions.get(&ResourceRef::new("page", "1")),
            Some(&Resolution::Available)
        );
        assert_eq!(
            resolutions.get(&ResourceRef::new("page", "2")),
            Some(&Resolution::Invalid)
        );
        assert_eq!(
            resolutions.get(&ResourceRef::new("page", "3")),
            Some(&Resolution::Missing)
        );
    }

    #[tokio::test]
    async fn test_collect_swallows_resolver_errors() {
        let resolutions = Resolutions::collect(&FailingResolver, &[linked("1")]).await;
        let outcome = resolutions.get(&ResourceRef::new("page", "1"));
        assert!(matches!(outcome, Some(Resolution::Failed(_))));
        assert!(!resolutions.is_available(&ResourceRef::new("page", "1")));
    }

    #[test]
    fn test_static_resolver_from_json() {
        let resolver = StaticResourceResolver::from_json(
            r#"[
                {"type": "page", "id": "about", "name": "About", "slug": "about"},
                {"type": "product", "id": "9", "name": "Old", "slug": "old", "isDeletedOrInvalid": true}
            ]"#,
        )
        .unwrap();
        assert_eq!(resolver.len(), 2);
        assert!(StaticResourceResolver::from_json("{").is_err());
    }
}
