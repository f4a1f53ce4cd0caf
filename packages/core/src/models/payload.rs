//! Client Payload Types
//!
//! Request-boundary shapes for menu operations. Everything a client submits
//! lands in one of these types and is validated into the stored
//! representation (`ItemContent`, `ContentUpdate`) before the tree is touched.
//!
//! The three-way visibility presentation (`always_show`, `always_hide`,
//! `schedule`) only exists here; stored items always carry a [`Visibility`].

use crate::models::menu_item::{validate_slug, LinkTarget, ValidationError, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Presentation of an item's visibility at the request/response boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VisibilityMode {
    AlwaysShow,
    AlwaysHide,
    #[serde(rename_all = "camelCase")]
    Schedule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hide_at: Option<DateTime<Utc>>,
    },
}

impl From<VisibilityMode> for Visibility {
    fn from(mode: VisibilityMode) -> Self {
        match mode {
            VisibilityMode::AlwaysShow => Visibility::shown(),
            VisibilityMode::AlwaysHide => Visibility::hidden(),
            VisibilityMode::Schedule {
                display_at,
                hide_at,
            } => Visibility::scheduled(display_at, hide_at),
        }
    }
}

impl From<&Visibility> for VisibilityMode {
    fn from(vis: &Visibility) -> Self {
        if !vis.is_active {
            VisibilityMode::AlwaysHide
        } else if vis.display_at.is_some() || vis.hide_at.is_some() {
            VisibilityMode::Schedule {
                display_at: vis.display_at,
                hide_at: vis.hide_at,
            }
        } else {
            VisibilityMode::AlwaysShow
        }
    }
}

/// Reference to an externally resolved entity, as submitted by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "id")]
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
}

impl From<ResourceLink> for LinkTarget {
    fn from(link: ResourceLink) -> Self {
        LinkTarget::Resource {
            resource_type: link.resource_type,
            resource_id: link.resource_id,
            fallback_url: link.fallback_url,
        }
    }
}

/// Content fields of one item as submitted by a client
///
/// `url` and `resource` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityMode>,
}

/// Validated content of one item, ready to be written into a tree
#[derive(Debug, Clone, PartialEq)]
pub struct ItemContent {
    pub name: String,
    pub link: Option<LinkTarget>,
    pub visibility: Visibility,
}

impl ItemFields {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validate the submitted fields into stored content
    pub fn validate(&self) -> Result<ItemContent, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }

        let link = link_from_parts(self.url.clone(), self.resource.clone())?;

        let visibility: Visibility = self
            .visibility
            .clone()
            .map(Visibility::from)
            .unwrap_or_default();
        visibility.validate()?;

        Ok(ItemContent {
            name: name.to_string(),
            link,
            visibility,
        })
    }
}

fn link_from_parts(
    url: Option<String>,
    resource: Option<ResourceLink>,
) -> Result<Option<LinkTarget>, ValidationError> {
    let link = match (url, resource) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::ConflictingLink(
                "url and resource cannot both be set".to_string(),
            ))
        }
        (Some(url), None) => Some(LinkTarget::Url { url }),
        (None, Some(resource)) => Some(LinkTarget::from(resource)),
        (None, None) => None,
    };
    if let Some(link) = &link {
        link.validate()?;
    }
    Ok(link)
}

/// Parameters for creating one item under a parent
///
/// `parent_id = None` attaches the item directly under the tree root.
/// `position = None` appends after the last sibling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemParams {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// Parameters for creating a new tree (its root item)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTreeParams {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

impl CreateTreeParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        validate_slug(&self.slug)?;
        if self.max_depth == Some(0) {
            return Err(ValidationError::InvalidMaxDepth(
                "maxDepth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deserialize a field into the double-Option pattern
///
/// - Missing field → None (don't update)
/// - null → Some(None) (clear)
/// - value → Some(Some(value)) (set)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Sparse, non-structural update of one item
///
/// Only provided fields change. `url`/`resource` use the double-Option
/// pattern: `null` clears the link. `slug` and `max_depth` only apply to a
/// tree root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub url: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub resource: Option<Option<ResourceLink>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
}

/// Validated form of [`ItemUpdate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentUpdate {
    pub name: Option<String>,
    pub link: Option<Option<LinkTarget>>,
    pub visibility: Option<Visibility>,
    pub slug: Option<String>,
    pub max_depth: Option<u32>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.resource.is_none()
            && self.visibility.is_none()
            && self.slug.is_none()
            && self.max_depth.is_none()
    }

    pub fn validate(&self) -> Result<ContentUpdate, ValidationError> {
        let name = match &self.name {
            Some(name) if name.trim().is_empty() => {
                return Err(ValidationError::MissingField("name".to_string()))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        let link = match (&self.url, &self.resource) {
            (None, None) => None,
            (Some(Some(_)), Some(Some(_))) => {
                return Err(ValidationError::ConflictingLink(
                    "url and resource cannot both be set".to_string(),
                ))
            }
            (Some(Some(url)), _) => link_from_parts(Some(url.clone()), None)?.map(Some),
            (_, Some(Some(resource))) => link_from_parts(None, Some(resource.clone()))?.map(Some),
            // Explicit null on either side with nothing set clears the link
            _ => Some(None),
        };

        let visibility = match &self.visibility {
            Some(mode) => {
                let vis = Visibility::from(mode.clone());
                vis.validate()?;
                Some(vis)
            }
            None => None,
        };

        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if self.max_depth == Some(0) {
            return Err(ValidationError::InvalidMaxDepth(
                "maxDepth must be at least 1".to_string(),
            ));
        }

        Ok(ContentUpdate {
            name,
            link,
            visibility,
            slug: self.slug.clone(),
            max_depth: self.max_depth,
        })
    }
}

/// One entry of a batch reorder request
///
/// `parent_id = None` places the item directly under the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderEntry {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub position: u32,
}

/// One node of a client-submitted tree used for a subtree rebuild
///
/// Entries carrying an `id` update the existing item; entries without one
/// create a new item. Order inside `children` is the new sibling order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: ItemFields,
    #[serde(default)]
    pub children: Vec<ClientNode>,
}

impl ClientNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            fields: ItemFields::named(name),
            children: Vec::new(),
        }
    }

    pub fn existing(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: ItemFields::named(name),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ClientNode>) -> Self {
        self.children = children;
        self
    }
}

/// Validate every node of a client forest and return the validated content
/// in depth-first order, together with the forest's height (1 for a flat list)
pub fn validate_forest(forest: &[ClientNode]) -> Result<(Vec<ItemContent>, u32), ValidationError> {
    let mut contents = Vec::new();
    let mut seen = HashSet::new();
    let mut height = 0;
    let mut stack: Vec<(&ClientNode, u32)> = forest.iter().rev().map(|n| (n, 1)).collect();

    while let Some((node, level)) = stack.pop() {
        if let Some(id) = &node.id {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::DuplicateId(id.clone()));
            }
        }
        contents.push(node.fields.validate()?);
        height = height.max(level);
        stack.extend(node.children.iter().rev().map(|c| (c, level + 1)));
    }

    Ok((contents, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visibility_mode_round_trip_through_stored_form() {
        let mode: VisibilityMode = serde_json::from_value(json!({
            "mode": "schedule",
            "displayAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        let vis = Visibility::from(mode.clone());
        assert!(vis.is_active);
        assert!(vis.hide_at.is_none());
        assert_eq!(VisibilityMode::from(&vis), mode);

        assert_eq!(
            VisibilityMode::from(&Visibility::hidden()),
            VisibilityMode::AlwaysHide
        );
    }

    #[test]
    fn test_fields_reject_both_link_kinds() {
        let fields: ItemFields = serde_json::from_value(json!({
            "name": "Docs",
            "url": "/docs",
            "resource": { "type": "page", "id": "1" }
        }))
        .unwrap();
        assert!(matches!(
            fields.validate(),
            Err(ValidationError::ConflictingLink(_))
        ));
    }

    #[test]
    fn test_fields_require_name() {
        let fields = ItemFields::named("   ");
        assert_eq!(
            fields.validate(),
            Err(ValidationError::MissingField("name".to_string()))
        );
    }

    #[test]
    fn test_update_null_url_clears_link() {
        let update: ItemUpdate = serde_json::from_value(json!({ "url": null })).unwrap();
        let validated = update.validate().unwrap();
        assert_eq!(validated.link, Some(None));

        let untouched: ItemUpdate = serde_json::from_value(json!({ "name": "x" })).unwrap();
        assert_eq!(untouched.validate().unwrap().link, None);
    }

    #[test]
    fn test_client_node_flattened_fields() {
        let node: ClientNode = serde_json::from_value(json!({
            "id": "a",
            "name": "A",
            "url": "/a",
            "children": [{ "name": "B" }]
        }))
        .unwrap();
        assert_eq!(node.fields.url.as_deref(), Some("/a"));
        assert_eq!(node.children.len(), 1);
        assert!(node.children[0].id.is_none());
    }

    #[test]
    fn test_validate_forest_height_and_duplicates() {
        let forest = vec![
            ClientNode::new("A").with_children(vec![ClientNode::new("A1")
                .with_children(vec![ClientNode::new("A1a")])]),
            ClientNode::new("B"),
        ];
        let (contents, height) = validate_forest(&forest).unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(height, 3);

        let dup = vec![ClientNode::existing("x", "X"), ClientNode::existing("x", "Y")];
        assert_eq!(
            validate_forest(&dup),
            Err(ValidationError::DuplicateId("x".to_string()))
        );
    }
}
