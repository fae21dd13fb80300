use fragtree::{BBox, Node};
use fragtree_int_test::test_util::{
    brute_force, cleanup, create_test_context, random_boxes, run_test,
};
use fragtree_fjall_adapter::FjallRTree;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Checks fill bounds, heights and box tightness of every branch.
fn check_structure(tree: &mut FjallRTree, check_fill: bool) -> fragtree::FragTreeResult<()> {
    let root_id = tree.root_id();
    let max = tree.max_entries();
    let min = tree.min_entries();

    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        let branch = tree.node(id)?.into_branch()?;
        assert!(branch.children.len() <= max);
        if check_fill && id != root_id {
            assert!(branch.children.len() >= min, "branch {} underfull", id);
        }

        let mut union = BBox::empty();
        for &child_id in &branch.children {
            match tree.node(child_id)? {
                Node::Branch(child) => {
                    assert!(!branch.leaf);
                    assert_eq!(child.height + 1, branch.height);
                    union.extend(&child.bbox);
                    stack.push(child_id);
                }
                Node::Data(data) => {
                    assert!(branch.leaf);
                    assert_eq!(branch.height, 1);
                    union.extend(&data.bbox);
                }
            }
        }
        assert_eq!(union, branch.bbox);
    }
    Ok(())
}

#[test]
fn test_load_then_search() {
    run_test(
        || create_test_context(),
        |ctx| {
            let items = random_boxes(2000, 10);
            let mut tree = ctx.open_tree(ctx.config().cache_size(50).build())?;
            tree.load(items.clone())?;

            assert_eq!(tree.len(), 2000);
            check_structure(&mut tree, true)?;

            for query in [
                BBox::new(0.0, 0.0, 1.0, 1.0),
                BBox::new(4.5, 4.5, 5.5, 5.5),
                BBox::new(9.0, 0.0, 10.0, 10.0),
                BBox::new(20.0, 20.0, 21.0, 21.0),
            ] {
                let expected = brute_force(&items, &query);
                assert_eq!(tree.search(&query)?.len(), expected);
                assert_eq!(tree.collides(&query)?, expected > 0);
            }
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_remove_half_then_reopen() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut items = random_boxes(600, 11);
            {
                let mut tree = ctx.open_tree(ctx.config().max_entries(6).cache_size(20).build())?;
                tree.load(items.clone())?;

                items.shuffle(&mut StdRng::seed_from_u64(12));
                for item in items.drain(..300) {
                    assert!(tree.remove(&item)?);
                }
                assert_eq!(tree.len(), 300);
                check_structure(&mut tree, false)?;
                tree.close()?;
            }

            let mut tree = ctx.reopen_tree()?;
            assert_eq!(tree.len(), 300);
            assert_eq!(tree.all()?.len(), 300);
            check_structure(&mut tree, false)?;

            let everything = BBox::new(-1.0, -1.0, 11.0, 11.0);
            assert_eq!(tree.search(&everything)?.len(), brute_force(&items, &everything));
            for item in &items {
                assert!(tree.remove(item)?);
            }
            assert!(tree.is_empty());
            assert_eq!(tree.height()?, 1);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_clear_then_reuse() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().max_entries(4).build())?;
            tree.load(random_boxes(200, 13))?;
            tree.clear()?;
            assert!(tree.is_empty());
            assert!(tree.all()?.is_empty());

            let items = random_boxes(50, 14);
            tree.load(items.clone())?;
            check_structure(&mut tree, true)?;
            tree.close()?;

            let mut tree = ctx.reopen_tree()?;
            assert_eq!(tree.len(), 50);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}
