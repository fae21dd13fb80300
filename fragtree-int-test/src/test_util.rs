use fragtree::{BBox, FragTreeResult, Item, RTreeConfig, RTreeConfigBuilder};
use fragtree_fjall_adapter::FjallRTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Runs a test with retry logic and error handling.
/// Each attempt gets a fresh context from `before`.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> FragTreeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> FragTreeResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> FragTreeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        let failure = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_backtrace = Some(bt);
                e
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                last_backtrace = Some(Backtrace::capture().to_string());
                format!("Panic: {}", err_msg)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", failure);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(failure);
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A scratch directory shared by the clones handed to a test.
#[derive(Clone)]
pub struct TestContext {
    dir: Arc<TempDir>,
}

impl TestContext {
    pub fn new() -> FragTreeResult<Self> {
        Ok(Self {
            dir: Arc::new(tempfile::tempdir()?),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory of the tree store.
    pub fn tree_dir(&self) -> PathBuf {
        self.path().join("tree")
    }

    /// Directory receiving exported documents.
    pub fn export_dir(&self) -> PathBuf {
        self.path().join("export")
    }

    /// A config builder already pointing at [`TestContext::tree_dir`].
    pub fn config(&self) -> RTreeConfigBuilder {
        RTreeConfig::builder().dir(self.tree_dir())
    }

    pub fn open_tree(&self, config: RTreeConfig) -> FragTreeResult<FjallRTree> {
        FjallRTree::open(&config)
    }

    pub fn reopen_tree(&self) -> FragTreeResult<FjallRTree> {
        FjallRTree::open(&self.config().require_existing(true).build())
    }
}

pub fn create_test_context() -> FragTreeResult<TestContext> {
    TestContext::new()
}

pub fn cleanup(ctx: TestContext) -> FragTreeResult<()> {
    // the directory goes away with the last clone
    drop(ctx);
    Ok(())
}

/// `count` random points in a Belgium-sized box, each with a name and type.
pub fn random_stations(count: usize, seed: u64) -> Vec<Item> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x = rng.random_range(2.5..6.4);
            let y = rng.random_range(49.5..51.5);
            station(i, x, y)
        })
        .collect()
}

/// `count` random boxes of at most 0.1 degrees per side.
pub fn random_boxes(count: usize, seed: u64) -> Vec<Item> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x = rng.random_range(0.0..10.0);
            let y = rng.random_range(0.0..10.0);
            let w = rng.random_range(0.0..0.1);
            let h = rng.random_range(0.0..0.1);
            Item::new(BBox::new(x, y, x + w, y + h)).with("i", i as u64)
        })
        .collect()
}

pub fn station(i: usize, x: f64, y: f64) -> Item {
    Item::new(BBox::point(x, y))
        .with("name", format!("Station {}", i))
        .with("type", "http://vocab.gtfs.org/terms#Station")
}

/// Items whose box intersects `query`, found by scanning.
pub fn brute_force(items: &[Item], query: &BBox) -> usize {
    items.iter().filter(|item| item.bbox.intersects(query)).count()
}
