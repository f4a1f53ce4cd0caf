//! Request and response bodies
//!
//! Items leave the server as [`ItemView`]s: the stored visibility is shown as
//! a [`VisibilityMode`] and the link as either `url` or `resource`.

use chrono::{DateTime, Utc};
use menutree_core::models::{
    ClientNode, LinkTarget, MenuItem, ReorderEntry, ResourceLink, TreeNode, VisibilityMode,
};
use menutree_core::tree::RebuildSummary;
use serde::{Deserialize, Serialize};

/// One menu item as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub tree_id: String,
    pub parent_id: Option<String>,
    pub position: u32,
    pub depth: u32,
    pub range_start: i64,
    pub range_end: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceLink>,
    pub visibility: VisibilityMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Present only in tree-shaped output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ItemView>>,
}

impl From<MenuItem> for ItemView {
    fn from(item: MenuItem) -> Self {
        let visibility = VisibilityMode::from(&item.visibility);
        let (url, resource) = match item.link {
            Some(LinkTarget::Url { url }) => (Some(url), None),
            Some(LinkTarget::Resource {
                resource_type,
                resource_id,
                fallback_url,
            }) => (
                None,
                Some(ResourceLink {
                    resource_type,
                    resource_id,
                    fallback_url,
                }),
            ),
            None => (None, None),
        };
        let (slug, max_depth) = match item.menu {
            Some(meta) => (Some(meta.slug), Some(meta.max_depth)),
            None => (None, None),
        };

        Self {
            id: item.id,
            tree_id: item.tree_id,
            parent_id: item.parent_id,
            position: item.position,
            depth: item.depth,
            range_start: item.range_start,
            range_end: item.range_end,
            name: item.name,
            url,
            resource,
            visibility,
            slug,
            max_depth,
            created_at: item.created_at,
            modified_at: item.modified_at,
            children: None,
        }
    }
}

impl From<TreeNode> for ItemView {
    fn from(node: TreeNode) -> Self {
        let mut view = ItemView::from(node.item);
        view.children = Some(node.children.into_iter().map(ItemView::from).collect());
        view
    }
}

/// Output shape of a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Flat,
    #[default]
    Tree,
}

/// Query parameters of listing endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub shape: Shape,
    /// Evaluation instant for visibility (RFC 3339); now when absent
    pub as_of: Option<DateTime<Utc>>,
}

/// Items of one tree, flat (pre-order) or nested
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub tree_id: String,
    pub shape: Shape,
    pub nodes: Vec<ItemView>,
}

impl ListResponse {
    pub fn new(tree_id: impl Into<String>, shape: Shape, items: Vec<MenuItem>) -> Self {
        let nodes = match shape {
            Shape::Flat => items.into_iter().map(ItemView::from).collect(),
            Shape::Tree => TreeNode::build_forest(items)
                .into_iter()
                .map(ItemView::from)
                .collect(),
        };
        Self {
            tree_id: tree_id.into(),
            shape,
            nodes,
        }
    }
}

/// Ids removed by a delete
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    #[serde(default)]
    pub parent_id: Option<String>,
    pub position: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub items: Vec<ReorderEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildRequest {
    /// Item whose subtree is replaced; the root when absent
    #[serde(default)]
    pub scope_id: Option<String>,
    pub tree: Vec<ClientNode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponse {
    pub summary: RebuildSummary,
    #[serde(flatten)]
    pub tree: ListResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use menutree_core::models::{MenuMeta, Visibility};
    use serde_json::json;

    #[test]
    fn test_item_view_presents_link_and_visibility() {
        let now = Utc::now();
        let mut item = MenuItem::new_leaf("t", "p", "Docs", now);
        item.link = Some(LinkTarget::Resource {
            resource_type: "page".to_string(),
            resource_id: "7".to_string(),
            fallback_url: Some("/docs".to_string()),
        });
        item.visibility = Visibility::hidden();

        let value = serde_json::to_value(ItemView::from(item)).unwrap();
        assert_eq!(value["visibility"], json!({ "mode": "always_hide" }));
        assert_eq!(
            value["resource"],
            json!({ "type": "page", "id": "7", "fallbackUrl": "/docs" })
        );
        assert!(value.get("url").is_none());
        assert!(value.get("children").is_none());
    }

    #[test]
    fn test_root_view_carries_menu_meta() {
        let meta = MenuMeta {
            slug: "main".to_string(),
            max_depth: 2,
        };
        let root = MenuItem::new_root("Main", meta, Utc::now());
        let value = serde_json::to_value(ItemView::from(root)).unwrap();
        assert_eq!(value["slug"], "main");
        assert_eq!(value["maxDepth"], 2);
        assert_eq!(value["parentId"], serde_json::Value::Null);
    }

    #[test]
    fn test_list_query_parsing() {
        let query: ListQuery =
            serde_json::from_value(json!({ "shape": "flat", "asOf": "2025-01-01T00:00:00Z" }))
                .unwrap();
        assert_eq!(query.shape, Shape::Flat);
        assert!(query.as_of.is_some());

        let query: ListQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query.shape, Shape::Tree);
    }
}
