//! Paginated crawl: fan page requests out over a fixed worker pool, parse
//! every page, and merge the results into the game's dataset.
//!
//! Each worker owns one contiguous chunk of pages and walks it sequentially.
//! Workers share nothing while running; their page lists are combined after
//! all of them have finished. A failed page contributes no records and never
//! stops its worker or the others.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use vietlott_core::game::with_page_index;
use vietlott_core::{DrawRecord, GameDescriptor};
use vietlott_store::{DatasetStore, StoreError};

use crate::http::{FetchError, PageSource};
use crate::parse::{ParseError, parse_results};

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid page range {from}..={to}")]
    InvalidRange { from: u32, to: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a single page contributed nothing.
#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One page request, owned by exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTask {
    pub task_id: usize,
    pub page_index: u32,
    pub request_body: Value,
}

impl FetchTask {
    pub fn new(task_id: usize, page_index: u32, template: &Value) -> Self {
        Self {
            task_id,
            page_index,
            request_body: with_page_index(template, page_index),
        }
    }
}

/// Inclusive page range of one crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub from: u32,
    pub to: u32,
}

impl PageRange {
    /// Apply the game default for a missing upper bound and widen a
    /// single-page request to two pages.
    pub fn resolve(game: &GameDescriptor, from: u32, to: Option<u32>) -> Result<Self, CrawlError> {
        let mut to = to.unwrap_or(game.default_index_to);
        if to == from {
            to = from
                .checked_add(1)
                .ok_or(CrawlError::InvalidRange { from, to })?;
        }
        if to < from {
            return Err(CrawlError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn len(&self) -> usize {
        (self.to - self.from) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

/// Split `range` into one contiguous chunk per worker.
///
/// Chunks hold `ceil(len / workers)` pages, the last one possibly fewer, so
/// fewer chunks than workers come back when the range is short.
pub fn partition(range: PageRange, template: &Value, workers: usize) -> Vec<Vec<FetchTask>> {
    let tasks: Vec<FetchTask> = (range.from..=range.to)
        .enumerate()
        .map(|(task_id, page)| FetchTask::new(task_id, page, template))
        .collect();
    let chunk_size = range.len().div_ceil(workers.max(1));
    tasks.chunks(chunk_size).map(<[FetchTask]>::to_vec).collect()
}

/// Summary of one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub game: String,
    pub range: PageRange,
    pub pages_requested: usize,
    pub pages_failed: usize,
    /// Records parsed from the pages, duplicates included.
    pub fetched: usize,
    pub new_records: usize,
    pub total_records: usize,
    /// Newest record that was not stored before.
    pub latest_new: Option<DrawRecord>,
    pub path: PathBuf,
}

struct WorkerOutput {
    pages: Vec<Vec<DrawRecord>>,
    failed: usize,
}

/// Crawl `[index_from, index_to]` of `game` and merge into `store`.
///
/// The dataset is read before any page is requested, so an unreadable
/// dataset fails the crawl without touching the network. Only dataset I/O
/// failures are returned as errors; page failures are logged and counted in
/// [`MergeReport::pages_failed`].
pub async fn crawl(
    source: Arc<dyn PageSource>,
    store: &DatasetStore,
    game: &GameDescriptor,
    index_from: u32,
    index_to: Option<u32>,
) -> Result<MergeReport, CrawlError> {
    let range = PageRange::resolve(game, index_from, index_to)?;
    let stored = store.load()?;
    let template = game.request_template();
    let chunks = partition(range, &template, game.num_threads);
    info!(
        game = %game.name,
        pages = range.len(),
        from = range.from,
        to = range.to,
        workers = chunks.len(),
        pages_per_worker = chunks.first().map_or(0, Vec::len),
        "starting crawl"
    );

    let game_arc = Arc::new(game.clone());
    let chunk_sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    let handles: Vec<_> = chunks
        .into_iter()
        .enumerate()
        .map(|(worker, tasks)| {
            tokio::spawn(run_worker(worker, Arc::clone(&source), Arc::clone(&game_arc), tasks))
        })
        .collect();

    let mut pages = Vec::new();
    let mut pages_failed = 0;
    for (worker, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(output) => {
                pages_failed += output.failed;
                pages.extend(output.pages);
            }
            Err(e) => {
                error!(game = %game.name, worker, error = %e, "crawl worker aborted");
                pages_failed += chunk_sizes[worker];
            }
        }
    }

    let fresh = flatten_by_date(pages);
    log_crawled(game, &fresh);
    let fetched = fresh.len();

    let outcome = store.merge(stored, fresh)?;
    let latest_new = outcome.added.last().cloned();
    if let Some(latest) = &latest_new {
        info!(game = %game.name, id = %latest.id, result = ?latest.result, "latest new draw");
    }
    if pages_failed == range.len() {
        warn!(game = %game.name, "every page failed; dataset unchanged");
    }

    Ok(MergeReport {
        game: game.name.clone(),
        range,
        pages_requested: range.len(),
        pages_failed,
        fetched,
        new_records: outcome.added.len(),
        total_records: outcome.total,
        latest_new,
        path: store.path().to_path_buf(),
    })
}

async fn run_worker(
    worker: usize,
    source: Arc<dyn PageSource>,
    game: Arc<GameDescriptor>,
    tasks: Vec<FetchTask>,
) -> WorkerOutput {
    let mut output = WorkerOutput {
        pages: Vec::with_capacity(tasks.len()),
        failed: 0,
    };
    for task in &tasks {
        match fetch_and_parse(source.as_ref(), &game, task).await {
            Ok(records) => {
                debug!(worker, page = task.page_index, records = records.len(), "page done");
                output.pages.push(records);
            }
            Err(e) => {
                warn!(
                    game = %game.name,
                    worker,
                    page = task.page_index,
                    error = %e,
                    "page failed"
                );
                output.failed += 1;
                output.pages.push(Vec::new());
            }
        }
    }
    output
}

async fn fetch_and_parse(
    source: &dyn PageSource,
    game: &GameDescriptor,
    task: &FetchTask,
) -> Result<Vec<DrawRecord>, PageError> {
    let payload = source.fetch(game, task).await?;
    let records = parse_results(&payload.html, task.page_index, &game.table, &process_time())?;
    Ok(records)
}

fn process_time() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Flatten per-page record lists, grouped by date.
fn flatten_by_date(pages: Vec<Vec<DrawRecord>>) -> Vec<DrawRecord> {
    let mut by_date: BTreeMap<String, Vec<DrawRecord>> = BTreeMap::new();
    for record in pages.into_iter().flatten() {
        by_date.entry(record.date.clone()).or_default().push(record);
    }
    for (date, records) in &by_date {
        debug!(date = %date, records = records.len(), "crawled date");
    }
    by_date.into_values().flatten().collect()
}

fn log_crawled(game: &GameDescriptor, records: &[DrawRecord]) {
    let dates = records.iter().map(|r| r.date.as_str());
    let ids = records.iter().map(|r| r.id.as_str());
    match (dates.clone().min(), dates.max(), ids.clone().min(), ids.max()) {
        (Some(min_date), Some(max_date), Some(min_id), Some(max_id)) => info!(
            game = %game.name,
            min_date,
            max_date,
            min_id,
            max_id,
            records = records.len(),
            "crawled data"
        ),
        _ => info!(game = %game.name, "crawl returned no records"),
    }
}
