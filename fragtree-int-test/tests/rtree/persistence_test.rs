use fragtree::store::{KvStore, TreeMeta};
use fragtree::{BBox, FragTreeError};
use fragtree_int_test::test_util::{
    brute_force, cleanup, create_test_context, random_boxes, random_stations, run_test,
};

#[test]
fn test_reopen_keeps_items_and_shape() {
    run_test(
        || create_test_context(),
        |ctx| {
            let items = random_stations(500, 1);
            let before = {
                let mut tree = ctx.open_tree(ctx.config().max_entries(6).build())?;
                tree.load(items.clone())?;
                let dump = tree.to_json()?;
                tree.close()?;
                dump
            };

            let mut tree = ctx.reopen_tree()?;
            assert_eq!(tree.len(), 500);
            assert_eq!(tree.max_entries(), 6);
            assert_eq!(tree.to_json()?, before);

            let query = BBox::new(3.0, 50.0, 4.5, 51.0);
            assert_eq!(tree.search(&query)?.len(), brute_force(&items, &query));
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_inserts_after_reopen_get_new_ids() {
    run_test(
        || create_test_context(),
        |ctx| {
            let first_ids = {
                let mut tree = ctx.open_tree(ctx.config().max_entries(4).build())?;
                tree.load(random_boxes(100, 2))?;
                let ids: Vec<u64> = tree.all()?.iter().map(|data| data.id).collect();
                tree.close()?;
                ids
            };

            let mut tree = ctx.reopen_tree()?;
            tree.load(random_boxes(100, 3))?;
            assert_eq!(tree.len(), 200);

            let all = tree.all()?;
            assert_eq!(all.len(), 200);
            let max_old = first_ids.iter().copied().max().unwrap_or(0);
            let fresh = all.iter().filter(|data| data.id > max_old).count();
            assert_eq!(fresh, 100);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_tiny_cache_matches_large_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            let items = random_boxes(800, 4);

            let mut small = ctx.open_tree(ctx.config().max_entries(5).cache_size(3).build())?;
            small.load(items.clone())?;
            let small_dump = small.to_json()?;
            assert!(small.stats().evictions > 0);
            assert!(small.stats().cached_nodes <= 3);
            small.close()?;

            let mut large = fragtree::RTree::with_store(
                &fragtree::RTreeConfig::builder().max_entries(5).build(),
                fragtree::MemoryStore::new(),
            )?;
            large.load(items)?;
            assert_eq!(large.to_json()?, small_dump);
            large.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dropping_tree_flushes() {
    run_test(
        || create_test_context(),
        |ctx| {
            {
                let mut tree = ctx.open_tree(ctx.config().build())?;
                tree.load(random_stations(50, 5))?;
                // dropped without close
            }

            let mut tree = ctx.reopen_tree()?;
            assert_eq!(tree.len(), 50);
            assert_eq!(tree.all()?.len(), 50);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_flush_writes_metadata() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().build())?;
            tree.load(random_stations(10, 6))?;
            tree.flush()?;

            let raw = tree.backend().get(b"TREE_INFO")?.unwrap_or_default();
            let raw: serde_json::Value = serde_json::from_slice(&raw).map_err(FragTreeError::from)?;
            assert_eq!(raw["totalItems"], 10);

            let meta = TreeMeta::load(tree.backend())?.unwrap();
            assert_eq!(meta.root_id, tree.root_id());
            assert_eq!(meta.total_items, 10);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_require_existing_on_fresh_directory() {
    run_test(
        || create_test_context(),
        |ctx| {
            let result = ctx.reopen_tree();
            assert!(matches!(result, Err(FragTreeError::MalformedState(_))));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_open_existing_falls_back_to_fresh_tree() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().open_existing(true).max_entries(7).build())?;
            assert!(tree.is_empty());
            assert_eq!(tree.max_entries(), 7);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_closed_tree_rejects_operations() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().build())?;
            tree.close()?;
            assert!(matches!(tree.all(), Err(FragTreeError::Closed)));
            assert!(matches!(
                tree.insert(fragtree::Item::new(BBox::point(0.0, 0.0))),
                Err(FragTreeError::Closed)
            ));
            // closing twice is fine
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}
