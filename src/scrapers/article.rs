//! Article page extraction and cache refresh.
//!
//! An article page carries everything the cache needs in its `<head>` Dublin
//! Core `<meta>` tags, plus author links in the item view:
//!
//! | Field | Source |
//! |-------|--------|
//! | date | `DCTERMS.issued`, else `DC.date` |
//! | handle | first `DC.identifier` starting with [`HANDLE_PREFIX`] |
//! | title | `DC.title`, else `citation_title` |
//! | area | caller-supplied, else cached, else a `DC.subject` equal to an area name |
//! | authors | `.simple-item-view-authors > a[href^=/author/]` |
//! | collaborators | `.simple-item-view-authors > div > a[href^=/author/]` |
//!
//! A page lacking any of date, handle, title or area is reported as the
//! matching `Missing*` error and nothing is written.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument};

use crate::cache::ArticleCache;
use crate::error::{Error, Result};
use crate::models::{Area, Article, Author, ListedArea, MetaField};
use crate::resilience::PageSource;
use crate::scrapers::areas::AreaCatalog;
use crate::utils::{article_id, strip_accents, truncate_for_log};

pub const HANDLE_PREFIX: &str = "http://hdl.handle.net/";

static META_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("head meta").unwrap());
static AUTHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".simple-item-view-authors > a").unwrap());
static COLLABORATOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".simple-item-view-authors > div > a").unwrap());

/// Everything scraped from an article page, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePage {
    pub metadata: Vec<MetaField>,
    pub authors: Vec<Author>,
    pub collaborators: Vec<Author>,
}

pub fn parse_article_page(html: &str) -> ArticlePage {
    let document = Html::parse_document(html);

    let metadata = document
        .select(&META_SELECTOR)
        .filter_map(|m| {
            let el = m.value();
            let name = el.attr("name").filter(|n| !n.is_empty())?;
            let content = el.attr("content").filter(|c| !c.is_empty())?;
            let lang = el.attr("xml:lang").or_else(|| el.attr("lang"));
            Some(MetaField::new(name, content, lang.map(str::to_string)))
        })
        .collect();

    ArticlePage {
        metadata,
        authors: document.select(&AUTHOR_SELECTOR).filter_map(author_link).collect(),
        collaborators: document
            .select(&COLLABORATOR_SELECTOR)
            .filter_map(author_link)
            .collect(),
    }
}

fn author_link(a: ElementRef<'_>) -> Option<Author> {
    let href = a.value().attr("href")?;
    if !href.starts_with("/author/") {
        return None;
    }
    let id = href.trim_end_matches('/').rsplit('/').next()?.to_string();
    let text = a.text().collect::<String>();
    let name = text.trim().trim_matches('"').trim().to_string();
    Some(Author { id, name })
}

fn first<'a>(metadata: &'a [MetaField], name: &str) -> Option<&'a str> {
    metadata
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.content.as_str())
}

/// Parse an issue date: a full date, else a bare year (January 1st), else a
/// handful of free-form date and timestamp layouts.
pub fn parse_issue_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(year) = value.parse::<i32>() {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.date_naive());
    }
    for layout in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(dt.date());
        }
    }
    for layout in ["%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%B %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            return Some(date);
        }
    }
    // year and month only
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok()
}

pub fn resolve_date(metadata: &[MetaField], url: &str) -> Result<NaiveDate> {
    let issued = first(metadata, "DCTERMS.issued").or_else(|| first(metadata, "DC.date"));
    issued
        .and_then(parse_issue_date)
        .ok_or_else(|| Error::MissingDate {
            url: url.to_string(),
            found: issued.map(str::to_string),
        })
}

pub fn resolve_handle(metadata: &[MetaField], url: &str) -> Result<String> {
    metadata
        .iter()
        .find(|m| m.name == "DC.identifier" && m.content.starts_with(HANDLE_PREFIX))
        .map(|m| m.content.clone())
        .ok_or_else(|| Error::MissingIdentifier {
            url: url.to_string(),
        })
}

pub fn resolve_title(metadata: &[MetaField], url: &str) -> Result<String> {
    first(metadata, "DC.title")
        .or_else(|| first(metadata, "citation_title"))
        .map(str::to_string)
        .ok_or_else(|| Error::MissingTitle {
            url: url.to_string(),
        })
}

/// The first listed area named by one of the article's `DC.subject` entries,
/// comparing without accents.
pub fn match_subject(metadata: &[MetaField], areas: &[ListedArea]) -> Option<Area> {
    let subjects: Vec<String> = metadata
        .iter()
        .filter(|m| m.name == "DC.subject")
        .map(|m| strip_accents(m.content.trim()))
        .collect();

    areas
        .iter()
        .find(|listed| subjects.contains(&strip_accents(listed.area.name.trim())))
        .map(|listed| listed.area.clone())
}

/// Downloads article pages and merges them into the cache.
#[derive(Debug)]
pub struct ArticleFetcher<S> {
    source: S,
    cache: ArticleCache,
    catalog: AreaCatalog<S>,
}

impl<S: PageSource + Clone> ArticleFetcher<S> {
    pub fn new(source: S, cache: ArticleCache) -> Self {
        let catalog = AreaCatalog::new(source.clone());
        Self {
            source,
            cache,
            catalog,
        }
    }
}

impl<S: PageSource> ArticleFetcher<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    pub fn catalog(&self) -> &AreaCatalog<S> {
        &self.catalog
    }

    /// Fetch `url`, extract its fields, merge them into the cached record and
    /// persist the result.
    ///
    /// `known_area` skips `DC.subject` matching; without it an already-cached
    /// area is used before falling back to matching.
    ///
    /// # Errors
    ///
    /// The `Missing*` variants are per-article and leave the cache untouched.
    /// [`Error::UnknownAreaName`] from the catalog is fatal.
    #[instrument(level = "info", skip(self, known_area))]
    pub async fn fetch(&self, url: &str, known_area: Option<Area>) -> Result<Article> {
        let id = article_id(url).ok_or_else(|| Error::InvalidArticleUrl(url.to_string()))?;

        let html = self.source.get(url).await?;
        let page = parse_article_page(&html);

        let date = resolve_date(&page.metadata, url)?;
        let handle = resolve_handle(&page.metadata, url)?;
        let title = resolve_title(&page.metadata, url)?;

        let existing = self.cache.read(&id).await?;
        let area = match known_area.or_else(|| existing.as_ref().and_then(|a| a.area.clone())) {
            Some(area) => area,
            None => {
                let areas = self.catalog.list_areas().await?;
                match_subject(&page.metadata, areas).ok_or_else(|| Error::MissingArea {
                    url: url.to_string(),
                })?
            }
        };

        let patch = Article {
            area: Some(area),
            title: Some(title),
            handle,
            date,
            metadata: page.metadata,
            authors: page.authors,
            collaborators: page.collaborators,
        };
        let merged = ArticleCache::merge(existing.as_ref(), patch);
        let changed = self.cache.write(&id, &merged).await?;

        info!(
            %id,
            title = %truncate_for_log(merged.title.as_deref().unwrap_or_default(), 80),
            authors = merged.authors.len(),
            changed,
            "Fetched article"
        );
        Ok(merged)
    }

    /// Return `article` unchanged when complete, otherwise re-fetch it from
    /// its handle and return the refreshed record.
    pub async fn ensure_complete(&self, article: Article) -> Result<Article> {
        if article.is_complete() {
            return Ok(article);
        }
        let title = article.title.as_deref().or_else(|| article.title_from_metadata());
        info!(
            handle = %article.handle,
            title = %truncate_for_log(title.unwrap_or_default(), 80),
            "Refreshing incomplete article"
        );
        self.fetch(&article.handle, article.area.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::areas::SUBJECT_PATH;
    use crate::testing::{MockSource, article_page, subject_page};

    const URL: &str = "https://ri.conicet.gov.ar/handle/11336/100";

    fn meta(name: &str, content: &str) -> MetaField {
        MetaField::new(name, content, None)
    }

    fn fetcher(source: MockSource, dir: &std::path::Path) -> ArticleFetcher<MockSource> {
        ArticleFetcher::new(source, ArticleCache::new(dir))
    }

    #[test]
    fn test_parse_article_page() {
        let page = parse_article_page(&article_page(100, "CIENCIAS SOCIALES Y HUMANIDADES", "a; b", "2015-03-01"));

        assert!(page.metadata.iter().all(|m| !m.name.is_empty() && !m.content.is_empty()));
        assert!(!page.metadata.iter().any(|m| m.name == "empty"));
        let title = page.metadata.iter().find(|m| m.name == "DC.title").unwrap();
        assert_eq!(title.lang.as_deref(), Some("es"));

        assert_eq!(
            page.authors,
            vec![
                Author { id: "1001".into(), name: "Pérez, Juan".into() },
                Author { id: "1002".into(), name: "Gómez, Ana".into() },
            ]
        );
        assert_eq!(
            page.collaborators,
            vec![Author { id: "1009".into(), name: "Colaborador, Luis".into() }]
        );
    }

    #[test]
    fn test_parse_issue_date_variants() {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(parse_issue_date("2015-03-01"), ymd(2015, 3, 1));
        assert_eq!(parse_issue_date("2012"), ymd(2012, 1, 1));
        assert_eq!(parse_issue_date("2014-07"), ymd(2014, 7, 1));
        assert_eq!(parse_issue_date("2016-05-04T10:00:00Z"), ymd(2016, 5, 4));
        assert_eq!(parse_issue_date("21/09/2018"), ymd(2018, 9, 21));
        assert_eq!(parse_issue_date("not a date"), None);
    }

    #[test]
    fn test_resolve_date_prefers_issued() {
        let metadata = vec![meta("DC.date", "2001"), meta("DCTERMS.issued", "2010-02-03")];
        assert_eq!(
            resolve_date(&metadata, URL).unwrap(),
            NaiveDate::from_ymd_opt(2010, 2, 3).unwrap()
        );
        let fallback = vec![meta("DC.date", "2001")];
        assert_eq!(resolve_date(&fallback, URL).unwrap().to_string(), "2001-01-01");
        assert!(matches!(
            resolve_date(&[meta("DC.date", "someday")], URL),
            Err(Error::MissingDate { found: Some(_), .. })
        ));
        assert!(matches!(resolve_date(&[], URL), Err(Error::MissingDate { found: None, .. })));
    }

    #[test]
    fn test_resolve_handle_and_title() {
        let metadata = vec![
            meta("DC.identifier", "10.1000/xyz"),
            meta("DC.identifier", "http://hdl.handle.net/11336/5"),
            meta("citation_title", "Fallback"),
        ];
        assert_eq!(resolve_handle(&metadata, URL).unwrap(), "http://hdl.handle.net/11336/5");
        assert_eq!(resolve_title(&metadata, URL).unwrap(), "Fallback");
        assert!(matches!(
            resolve_handle(&[meta("DC.identifier", "10.1000/xyz")], URL),
            Err(Error::MissingIdentifier { .. })
        ));
        assert!(matches!(resolve_title(&[], URL), Err(Error::MissingTitle { .. })));
    }

    #[tokio::test]
    async fn test_fetch_matches_subject_and_caches() {
        let tmp = tempfile::tempdir().unwrap();
        let source = MockSource::new()
            .with_page(SUBJECT_PATH, subject_page())
            .with_page(URL, article_page(100, "INGENIERIAS Y TECNOLOGIAS", "x", "2015-03-01"));
        let fetcher = fetcher(source, tmp.path());

        let article = fetcher.fetch(URL, None).await.unwrap();
        assert_eq!(article.area.as_ref().unwrap().id, 53);
        assert_eq!(article.title.as_deref(), Some("Artículo 100"));
        assert_eq!(article.handle, "http://hdl.handle.net/11336/100");
        assert!(article.is_complete());
        assert_eq!(fetcher.cache().read("11336-100").await.unwrap(), Some(article));
    }

    #[tokio::test]
    async fn test_fetch_missing_area_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = MockSource::new()
            .with_page(SUBJECT_PATH, subject_page())
            .with_page(URL, article_page(100, "OTRA DISCIPLINA", "x", "2015-03-01"));
        let fetcher = fetcher(source, tmp.path());

        let err = fetcher.fetch(URL, None).await.unwrap_err();
        assert!(matches!(err, Error::MissingArea { .. }));
        assert!(!err.is_fatal());
        assert!(fetcher.cache().read("11336-100").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_twice_keeps_first_area_and_title() {
        let tmp = tempfile::tempdir().unwrap();
        let source = MockSource::new()
            .with_page(URL, article_page(100, "CIENCIAS SOCIALES Y HUMANIDADES", "x", "2015-03-01"));
        let fetcher = fetcher(source.clone(), tmp.path());

        let social = Area { id: 192, name: "CIENCIAS SOCIALES Y HUMANIDADES".into() };
        let tech = Area { id: 53, name: "INGENIERÍAS Y TECNOLOGÍAS".into() };

        let first = fetcher.fetch(URL, Some(social.clone())).await.unwrap();
        let bytes = std::fs::read(fetcher.cache().path("11336-100")).unwrap();
        let second = fetcher.fetch(URL, Some(tech)).await.unwrap();

        assert_eq!(second.area, Some(social));
        assert_eq!(second.title, first.title);
        assert_eq!(std::fs::read(fetcher.cache().path("11336-100")).unwrap(), bytes);
        // the area was known, so the catalog was never needed
        assert_eq!(source.request_count(SUBJECT_PATH), 0);
    }

    #[tokio::test]
    async fn test_fetch_uses_cached_area_without_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let source = MockSource::new()
            .with_page(URL, article_page(100, "UNLISTED", "x", "2015-03-01"));
        let fetcher = fetcher(source.clone(), tmp.path());

        let mut cached = Article {
            area: Some(Area { id: 192, name: "CIENCIAS SOCIALES Y HUMANIDADES".into() }),
            title: None,
            handle: "http://hdl.handle.net/11336/100".into(),
            date: NaiveDate::from_ymd_opt(2015, 3, 1).unwrap(),
            metadata: vec![],
            authors: vec![],
            collaborators: vec![],
        };
        fetcher.cache().write("11336-100", &cached).await.unwrap();

        let article = fetcher.fetch(URL, None).await.unwrap();
        cached.title = Some("Artículo 100".into());
        assert_eq!(article.area, cached.area);
        assert_eq!(article.title, cached.title);
        assert_eq!(article.authors.len(), 2);
        assert_eq!(source.request_count(SUBJECT_PATH), 0);
    }
}
