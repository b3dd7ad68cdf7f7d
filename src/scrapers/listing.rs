//! Paginated traversal of an area's article listing.
//!
//! Listing pages live at `/subject/<code>?pagina=<n>` (0-based) and hold up
//! to [`PAGE_SIZE`] links each. The advertised area count is only used for
//! the progress counter: the crawl ends at the first page without links.

use std::collections::VecDeque;

use futures::stream::{self, Stream};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::error::Result;
use crate::models::ListedArea;
use crate::resilience::PageSource;

pub const PAGE_SIZE: u64 = 20;

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".ds-artifact-item .artifact-title a").unwrap());

pub fn listing_path(area_id: u32, page: u32) -> String {
    format!("/subject/{area_id}?pagina={page}")
}

/// Article links on a listing page, resolved against `base`.
pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|url| url.to_string())
        .collect()
}

struct CrawlState {
    page: u32,
    current: u64,
    pending: VecDeque<String>,
    done: bool,
}

#[derive(Debug, Clone)]
pub struct PageCrawler<S> {
    source: S,
    base: Url,
}

impl<S: PageSource> PageCrawler<S> {
    pub fn new(source: S, base: Url) -> Self {
        Self { source, base }
    }

    /// Lazily yield the article URLs of `area`, starting at `start_page`.
    ///
    /// Pages are fetched one at a time, only when the previous page's links
    /// have been consumed. A failed page fetch is yielded once as an error
    /// and ends the stream.
    pub fn crawl<'a>(
        &'a self,
        area: &'a ListedArea,
        start_page: u32,
    ) -> impl Stream<Item = Result<String>> + 'a {
        let state = CrawlState {
            page: start_page,
            current: u64::from(start_page) * PAGE_SIZE,
            pending: VecDeque::new(),
            done: false,
        };

        stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(url) = state.pending.pop_front() {
                    state.current += 1;
                    info!(
                        area = %area.area.name,
                        "Processing {} of {}", state.current, area.count
                    );
                    return Some((Ok(url), state));
                }
                if state.done {
                    return None;
                }

                let path = listing_path(area.area.id, state.page);
                let html = match self.source.get(&path).await {
                    Ok(html) => html,
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                };

                let links = parse_listing(&html, &self.base);
                if links.is_empty() {
                    info!(area = %area.area.name, page = state.page, "Listing page is empty; area done");
                    return None;
                }
                debug!(page = state.page, links = links.len(), "Fetched listing page");
                state.pending.extend(links);
                state.page += 1;
            }
        })
    }
}
