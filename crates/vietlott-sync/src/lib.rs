//! Sync layer: fetch draw pages over HTTP, parse them, merge them into the
//! dataset, and deliver streak alerts.

pub mod http;
pub mod notify;
pub mod parse;
pub mod pipeline;

pub use http::{DrawClient, FetchError, PagePayload, PageSource};
pub use notify::{DispatchReport, LogNotifier, Notifier, NotifyError, WebhookNotifier, dispatch_alerts};
pub use parse::{ParseError, parse_results};
pub use pipeline::{CrawlError, FetchTask, MergeReport, PageRange, crawl, partition};
