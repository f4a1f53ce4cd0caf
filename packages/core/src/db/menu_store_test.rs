//! Tests for MenuStore persistence and transactional mutation

use super::{DatabaseService, MenuStore};
use crate::models::{
    ClientNode, ContentUpdate, CreateTreeParams, ItemFields, LinkTarget, Visibility,
};
use crate::tree::{TreeError, TreeStore};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a store on a temporary database
async fn create_test_store() -> (MenuStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
    (MenuStore::new(db), temp_dir)
}

fn new_tree(slug: &str) -> TreeStore {
    let params = CreateTreeParams {
        name: format!("Menu {}", slug),
        slug: slug.to_string(),
        max_depth: Some(3),
    };
    TreeStore::new_tree(&params, 3, Utc::now()).unwrap()
}

fn add(tree: &mut TreeStore, parent: &str, name: &str) -> String {
    let content = ItemFields::named(name).validate().unwrap();
    tree.insert(parent, Some(u32::MAX), content, Utc::now())
        .unwrap()
        .id
}

async fn count_rows(store: &MenuStore, tree_id: &str) -> i64 {
    let conn = store.database().connect_with_timeout().await.unwrap();
    let mut stmt = conn
        .prepare("SELECT COUNT(*) FROM menu_items WHERE tree_id = ?1")
        .await
        .unwrap();
    let mut rows = stmt.query([tree_id]).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    row.get(0).unwrap()
}

#[tokio::test]
async fn test_insert_and_load_round_trip() {
    let (store, _temp) = create_test_store().await;
    let mut tree = new_tree("main");
    let root = tree.tree_id().to_string();
    let about = add(&mut tree, &root, "About");
    let team = add(&mut tree, &about, "Team");

    // Exercise every stored column
    let t0 = Utc::now();
    let update = ContentUpdate {
        link: Some(Some(LinkTarget::Resource {
            resource_type: "page".to_string(),
            resource_id: "42".to_string(),
            fallback_url: Some("/team".to_string()),
        })),
        visibility: Some(Visibility::scheduled(Some(t0), Some(t0 + Duration::days(1)))),
        ..Default::default()
    };
    tree.update_fields(&team, &update, t0).unwrap();

    store.insert_tree(&tree).await.unwrap();
    let loaded = store.load_tree(&root).await.unwrap().unwrap();
    assert_eq!(loaded, tree);
    loaded.check_invariants().unwrap();
}

#[tokio::test]
async fn test_load_missing_tree() {
    let (store, _temp) = create_test_store().await;
    assert!(store.load_tree("nope").await.unwrap().is_none());

    let outcome = store
        .mutate_tree::<(), TreeError, _>("nope", |_| Ok(()))
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_mutate_tree_persists_changes() {
    let (store, _temp) = create_test_store().await;
    let tree = new_tree("main");
    let root = tree.tree_id().to_string();
    store.insert_tree(&tree).await.unwrap();

    let (updated, created_id) = store
        .mutate_tree::<_, TreeError, _>(&root, |tree| {
            let content = ItemFields::named("Blog").validate()?;
            Ok(tree.insert(&root, None, content, Utc::now())?.id)
        })
        .await
        .unwrap()
        .unwrap();

    let loaded = store.load_tree(&root).await.unwrap().unwrap();
    assert_eq!(loaded, updated);
    assert!(loaded.contains_id(&created_id));
    assert_eq!(count_rows(&store, &root).await, 2);
}

#[tokio::test]
async fn test_failed_mutation_rolls_back() {
    let (store, _temp) = create_test_store().await;
    let mut tree = new_tree("main");
    let root = tree.tree_id().to_string();
    let a = add(&mut tree, &root, "A");
    let b = add(&mut tree, &a, "B");
    let c = add(&mut tree, &b, "C");
    let d = add(&mut tree, &root, "D");
    store.insert_tree(&tree).await.unwrap();

    // First change succeeds in memory, second one fails: nothing may persist
    let result = store
        .mutate_tree::<(), TreeError, _>(&root, |tree| {
            tree.remove(&d)?;
            tree.move_node(&a, &c, 0, Utc::now())?;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(TreeError::InvalidParent { .. })));

    let loaded = store.load_tree(&root).await.unwrap().unwrap();
    assert_eq!(loaded, tree);
}

#[tokio::test]
async fn test_rebuild_keeps_items_moved_out_of_deleted_subtree() {
    let (store, _temp) = create_test_store().await;
    let mut tree = new_tree("main");
    let root = tree.tree_id().to_string();
    let old = add(&mut tree, &root, "Old section");
    let rescued = add(&mut tree, &old, "Rescued");
    add(&mut tree, &old, "Dropped");
    store.insert_tree(&tree).await.unwrap();

    let forest = vec![ClientNode::existing(&rescued, "Rescued")];
    store
        .mutate_tree::<_, TreeError, _>(&root, |tree| tree.rebuild(&root, &forest, Utc::now()))
        .await
        .unwrap()
        .unwrap();

    let loaded = store.load_tree(&root).await.unwrap().unwrap();
    assert!(loaded.contains_id(&rescued));
    assert!(!loaded.contains_id(&old));
    assert_eq!(count_rows(&store, &root).await, 2);
    loaded.check_invariants().unwrap();
}

#[tokio::test]
async fn test_lookups_and_delete_tree() {
    let (store, _temp) = create_test_store().await;
    let mut main = new_tree("main");
    let main_id = main.tree_id().to_string();
    let item = add(&mut main, &main_id, "Item");
    let footer = new_tree("footer");
    let footer_id = footer.tree_id().to_string();
    store.insert_tree(&main).await.unwrap();
    store.insert_tree(&footer).await.unwrap();

    assert_eq!(
        store.tree_id_of(&item).await.unwrap().as_deref(),
        Some(main_id.as_str())
    );
    assert_eq!(
        store.tree_id_by_slug("footer").await.unwrap().as_deref(),
        Some(footer_id.as_str())
    );
    assert!(store.tree_id_by_slug("missing").await.unwrap().is_none());

    let roots = store.list_roots().await.unwrap();
    let names: Vec<_> = roots.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Menu footer", "Menu main"]);

    assert!(store.delete_tree(&main_id).await.unwrap());
    assert!(!store.delete_tree(&main_id).await.unwrap());
    assert_eq!(count_rows(&store, &main_id).await, 0);
    assert!(store.tree_id_of(&item).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_slug_rejected_by_schema() {
    let (store, _temp) = create_test_store().await;
    store.insert_tree(&new_tree("main")).await.unwrap();
    let clash = new_tree("main");

    assert!(store.insert_tree(&clash).await.is_err());
    assert!(store.load_tree(clash.tree_id()).await.unwrap().is_none());
}
