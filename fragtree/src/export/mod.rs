//! Paginated JSON-LD export.
//!
//! A completed tree is folded into three kinds of documents:
//! - one collection document announcing the dataset and its entry page
//! - tree pages, each holding a few levels of branches; deeper branches are
//!   referenced by the page they start
//! - data pages holding the items, filled up to a goal size
//!
//! Every tree page below the top one spans the same number of levels, chosen
//! so that one page of the leftmost subtree serializes to roughly the goal
//! size.

mod schema;
mod sink;

pub use schema::FragmentSchema;
pub use sink::{data_page_name, tree_page_name, DirectorySink, FragmentSink, MemorySink};

use serde_json::{Map, Value};

use crate::errors::{FragTreeError, FragTreeResult};
use crate::node::{Branch, NodeId};
use crate::rtree::RTree;
use crate::store::{KvStore, NodeStore};
use schema::{CHILD_RELATION_KEY, MEMBER_KEY};

/// Serialized size a data page aims for before it is closed.
pub const DEFAULT_GOAL_SIZE: usize = 500_000;
/// Size above which a page height is considered too tall.
pub const DEFAULT_MAX_SIZE: usize = 1_000_000;

/// Settings of one export run.
///
/// ```rust
/// use fragtree::export::ExportOptions;
///
/// let options = ExportOptions::builder("stations", "gtfs:Station")
///     .tree_dir("tree")
///     .data_dir("data")
///     .goal_size(100_000)
///     .build();
/// assert_eq!(options.max_size(), 1_000_000);
/// ```
#[derive(Debug, Clone)]
pub struct ExportOptions {
    collection: String,
    manages: String,
    tree_dir: String,
    data_dir: String,
    goal_size: usize,
    max_size: usize,
    schema: FragmentSchema,
}

impl ExportOptions {
    /// Starts options for a collection document named `collection` that
    /// manages items of class `manages`.
    pub fn builder(collection: impl Into<String>, manages: impl Into<String>) -> ExportOptionsBuilder {
        ExportOptionsBuilder {
            options: ExportOptions {
                collection: collection.into(),
                manages: manages.into(),
                tree_dir: String::new(),
                data_dir: String::new(),
                goal_size: DEFAULT_GOAL_SIZE,
                max_size: DEFAULT_MAX_SIZE,
                schema: FragmentSchema::default(),
            },
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn manages(&self) -> &str {
        &self.manages
    }

    pub fn tree_dir(&self) -> &str {
        &self.tree_dir
    }

    pub fn data_dir(&self) -> &str {
        &self.data_dir
    }

    pub fn goal_size(&self) -> usize {
        self.goal_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn schema(&self) -> &FragmentSchema {
        &self.schema
    }
}

pub struct ExportOptionsBuilder {
    options: ExportOptions,
}

impl ExportOptionsBuilder {
    /// Subdirectory of the tree pages, relative to the output root.
    #[inline]
    pub fn tree_dir(mut self, tree_dir: &str) -> Self {
        self.options.tree_dir = tree_dir.trim_matches('/').to_string();
        self
    }

    /// Subdirectory of the data pages, relative to the output root.
    #[inline]
    pub fn data_dir(mut self, data_dir: &str) -> Self {
        self.options.data_dir = data_dir.trim_matches('/').to_string();
        self
    }

    #[inline]
    pub fn goal_size(mut self, goal_size: usize) -> Self {
        self.options.goal_size = goal_size;
        self
    }

    #[inline]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.options.max_size = max_size;
        self
    }

    #[inline]
    pub fn schema(mut self, schema: FragmentSchema) -> Self {
        self.options.schema = schema;
        self
    }

    #[inline]
    pub fn build(self) -> ExportOptions {
        self.options
    }
}

/// Next free tree and data page numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounters {
    pub tree_page: u64,
    pub data_page: u64,
}

/// Outcome of an export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub tree_pages: u64,
    pub data_pages: u64,
    pub data_items: u64,
    /// Levels spanned by one tree page.
    pub page_height: u32,
}

/// First tree level that starts a page, such that every page below the top
/// one spans exactly `page_height` levels.
pub fn start_cut(height: u32, page_height: u32) -> u32 {
    let page_height = page_height.max(1);
    height - (height.saturating_sub(1) % page_height)
}

/// `/<dir>/<file>#<id>`, the absolute reference form used inside pages.
fn absolute_ref(dir: &str, file: &str, id: NodeId) -> String {
    if dir.is_empty() {
        format!("/{}#{}", file, id)
    } else {
        format!("/{}/{}#{}", dir, file, id)
    }
}

/// `<dir>/<file>#<id>`, the relative form used by the collection document.
fn relative_ref(dir: &str, file: &str, id: NodeId) -> String {
    if dir.is_empty() {
        format!("{}#{}", file, id)
    } else {
        format!("{}/{}#{}", dir, file, id)
    }
}

impl<S: KvStore> RTree<S> {
    /// Exports the whole tree as linked pages into `sink`.
    pub fn to_fragments(
        &mut self,
        options: &ExportOptions,
        sink: &mut impl FragmentSink,
    ) -> FragTreeResult<ExportReport> {
        self.check_closed()?;
        if options.goal_size == 0 || options.max_size < options.goal_size {
            return Err(FragTreeError::Configuration(format!(
                "invalid page sizes: goal {} and max {}",
                options.goal_size, options.max_size
            )));
        }

        let root = self.root()?;
        let counters = PageCounters::default();

        let view = relative_ref(&options.tree_dir, &tree_page_name(counters.tree_page), root.id);
        let collection = options.schema.collection_document(
            &options.collection,
            &options.manages,
            self.total_items,
            &view,
        );
        sink.write_collection(&options.collection, &collection)?;

        let mut pager = Pager {
            store: &mut self.store,
            options,
            sink,
            page_height: 1,
            start_cut: root.height,
            data: DataBuffer::default(),
            data_items: 0,
        };
        pager.page_height = pager.optimal_height(&root)?;
        pager.start_cut = start_cut(root.height, pager.page_height);

        log::debug!(
            "Exporting tree of height {} with {} levels per page, first cut at {}",
            root.height,
            pager.page_height,
            pager.start_cut
        );

        let counters = pager.page(root, counters)?;
        let report = ExportReport {
            tree_pages: counters.tree_page,
            data_pages: counters.data_page,
            data_items: pager.data_items,
            page_height: pager.page_height,
        };

        log::debug!(
            "Exported {} items into {} tree pages and {} data pages",
            report.data_items,
            report.tree_pages,
            report.data_pages
        );
        Ok(report)
    }
}

/// Data records waiting to be written as one page.
#[derive(Default)]
struct DataBuffer {
    records: Vec<Value>,
    size: usize,
}

/// Content of a fragment slot once its node has been expanded.
enum Body {
    Pending,
    Inline(Vec<usize>),
    References(Vec<Value>),
    Members(Vec<Value>),
}

struct Slot {
    fields: Map<String, Value>,
    body: Body,
}

struct Pager<'a, S: KvStore, F: FragmentSink> {
    store: &'a mut NodeStore<S>,
    options: &'a ExportOptions,
    sink: &'a mut F,
    page_height: u32,
    start_cut: u32,
    data: DataBuffer,
    data_items: u64,
}

impl<S: KvStore, F: FragmentSink> Pager<'_, S, F> {
    /// Number of levels per tree page.
    ///
    /// Renders ever larger subtrees along the leftmost path, bottom-up, until
    /// one reaches the goal size. A subtree above the maximum size costs one
    /// level.
    fn optimal_height(&mut self, root: &Branch) -> FragTreeResult<u32> {
        let mut path = vec![root.clone()];
        loop {
            let node = &path[path.len() - 1];
            if node.leaf {
                break;
            }
            let first = *node.children.first().ok_or_else(|| {
                FragTreeError::MalformedState(format!("branch {} has no children", node.id))
            })?;
            let child = self.store.get_branch(first)?;
            path.push(child);
        }

        let mut height = 0u32;
        let mut size = 0usize;
        while size < self.options.goal_size {
            match path.pop() {
                Some(node) => {
                    size = serde_json::to_vec(&self.render_subtree(node)?)?.len();
                    height += 1;
                }
                None => break,
            }
        }

        let height = if size > self.options.max_size {
            height.saturating_sub(1)
        } else {
            height
        };
        Ok(height.max(1))
    }

    /// The whole subtree of `node` as a single tree fragment.
    fn render_subtree(&mut self, node: Branch) -> FragTreeResult<Value> {
        let page = tree_page_name(0);
        let data_page = data_page_name(0);
        let schema = &self.options.schema;

        let mut slots = vec![Slot {
            fields: schema.node_fields(&node, &page),
            body: Body::Pending,
        }];
        let mut stack = vec![(0usize, node)];

        while let Some((slot, current)) = stack.pop() {
            if current.height == 1 {
                let mut members = Vec::with_capacity(current.children.len());
                for &child_id in &current.children {
                    let data = self.store.get_data(child_id)?;
                    let reference = absolute_ref(&self.options.data_dir, &data_page, data.id);
                    members.push(schema.member_reference(&data, reference));
                }
                slots[slot].body = Body::Members(members);
            } else {
                let mut inline = Vec::with_capacity(current.children.len());
                for &child_id in &current.children {
                    let child = self.store.get_branch(child_id)?;
                    inline.push(slots.len());
                    slots.push(Slot {
                        fields: schema.node_fields(&child, &page),
                        body: Body::Pending,
                    });
                    stack.push((slots.len() - 1, child));
                }
                slots[slot].body = Body::Inline(inline);
            }
        }

        Ok(assemble(schema, slots))
    }

    /// Writes the page rooted at `root` and, recursively, every page it
    /// references. Returns the counters advanced past all of them.
    fn page(&mut self, root: Branch, mut counters: PageCounters) -> FragTreeResult<PageCounters> {
        let page_number = counters.tree_page;
        counters.tree_page += 1;

        let page = tree_page_name(page_number);
        let start_height = root.height;
        let options = self.options;
        let schema = &options.schema;

        let mut slots = vec![Slot {
            fields: schema.node_fields(&root, &page),
            body: Body::Pending,
        }];
        let mut stack = vec![(0usize, root)];

        while let Some((slot, current)) = stack.pop() {
            let depth = start_height - current.height;
            let inside = depth + 1 < self.page_height && current.height != self.start_cut;

            if current.height == 1 {
                let members = self.buffer_data(&current, &counters)?;
                slots[slot].body = Body::Members(members);

                if self.data.size > options.goal_size && !stack.is_empty() {
                    self.flush_data(&mut counters)?;
                }
            } else if inside {
                let mut inline = Vec::with_capacity(current.children.len());
                for &child_id in &current.children {
                    let child = self.store.get_branch(child_id)?;
                    inline.push(slots.len());
                    slots.push(Slot {
                        fields: schema.node_fields(&child, &page),
                        body: Body::Pending,
                    });
                    stack.push((slots.len() - 1, child));
                }
                slots[slot].body = Body::Inline(inline);
            } else {
                let mut references = Vec::with_capacity(current.children.len());
                for &child_id in &current.children {
                    let reference = absolute_ref(
                        &options.tree_dir,
                        &tree_page_name(counters.tree_page),
                        child_id,
                    );
                    references.push(schema.node_reference(reference));

                    let child = self.store.get_branch(child_id)?;
                    counters = self.page(child, counters)?;
                }
                slots[slot].body = Body::References(references);
            }
        }

        if !self.data.records.is_empty() {
            self.flush_data(&mut counters)?;
        }

        let document = schema.tree_document(assemble(schema, slots));
        self.sink
            .write_tree_page(&options.tree_dir, page_number, &document)?;
        log::debug!("Wrote tree page {}", page_number);

        Ok(counters)
    }

    /// Adds the data children of a leaf-of-branches to the current data page
    /// and returns the member references pointing at them.
    fn buffer_data(&mut self, leaf: &Branch, counters: &PageCounters) -> FragTreeResult<Vec<Value>> {
        let schema = &self.options.schema;
        let data_page = data_page_name(counters.data_page);

        let mut members = Vec::with_capacity(leaf.children.len());
        for &child_id in &leaf.children {
            let data = self.store.get_data(child_id)?;
            let record = schema.data_record(&data, &data_page);
            self.data.size += serde_json::to_vec(&record)?.len();
            self.data.records.push(record);

            let reference = absolute_ref(&self.options.data_dir, &data_page, data.id);
            members.push(schema.member_reference(&data, reference));
            self.data_items += 1;
        }
        Ok(members)
    }

    fn flush_data(&mut self, counters: &mut PageCounters) -> FragTreeResult<()> {
        let records = std::mem::take(&mut self.data.records);
        self.data.size = 0;

        let document = self.options.schema.data_document(records);
        self.sink
            .write_data_page(&self.options.data_dir, counters.data_page, &document)?;
        log::debug!("Wrote data page {}", counters.data_page);

        counters.data_page += 1;
        Ok(())
    }
}

/// Nests fragment slots bottom-up. Children always follow their parent.
fn assemble(schema: &FragmentSchema, slots: Vec<Slot>) -> Value {
    let mut built: Vec<Option<Value>> = vec![None; slots.len()];

    for (index, slot) in slots.into_iter().enumerate().rev() {
        let Slot { mut fields, body } = slot;
        match body {
            Body::Pending => {
                fields.insert(CHILD_RELATION_KEY.into(), Value::Array(Vec::new()));
            }
            Body::Inline(children) => {
                let children = children
                    .iter()
                    .filter_map(|child| built[*child].take())
                    .collect();
                fields.insert(
                    CHILD_RELATION_KEY.into(),
                    Value::Array(vec![schema.relation(children)]),
                );
            }
            Body::References(references) => {
                fields.insert(
                    CHILD_RELATION_KEY.into(),
                    Value::Array(vec![schema.relation(references)]),
                );
            }
            Body::Members(members) => {
                fields.insert(MEMBER_KEY.into(), Value::Array(members));
            }
        }
        built[index] = Some(Value::Object(fields));
    }

    built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or(Value::Null)
}
