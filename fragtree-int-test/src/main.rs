use fragtree::export::{DirectorySink, ExportOptions};
use fragtree::FragTreeResult;
use fragtree_int_test::test_util::{create_test_context, random_stations};

fn main() -> FragTreeResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;

    let count = 200_000;
    let items = random_stations(count, 42);
    let mut tree = ctx.open_tree(ctx.config().cache_size(10_000).build())?;

    let start = std::time::Instant::now();
    tree.load(items)?;
    println!("Inserted {} items in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let hits = tree.search(&fragtree::BBox::new(4.0, 50.5, 4.5, 51.0))?;
    println!("Found {} items in {:?}", hits.len(), start.elapsed());

    let options = ExportOptions::builder("stations", "gtfs:Station")
        .tree_dir("tree")
        .data_dir("data")
        .build();
    let start = std::time::Instant::now();
    let report = tree.to_fragments(&options, &mut DirectorySink::new(ctx.export_dir()))?;
    println!(
        "Exported {} tree pages and {} data pages (page height {}) in {:?}",
        report.tree_pages,
        report.data_pages,
        report.page_height,
        start.elapsed()
    );

    let stats = tree.stats();
    println!(
        "Cache: {} hits, {} misses, {} evictions",
        stats.cache_hits, stats.cache_misses, stats.evictions
    );

    tree.close()
}
