//! Scrapers for the repository site.
//!
//! Each page type of the site has its own module:
//!
//! | Page | Module | Path | Extracts |
//! |------|--------|------|----------|
//! | Subject list | [`areas`] | `/subject/` | Areas with advertised counts |
//! | Area listing | [`listing`] | `/subject/<code>?pagina=<n>` | Article links, 20 per page |
//! | Article | [`article`] | `/handle/<prefix>/<n>` | Dublin Core metadata, authors |
//! | Author profile | [`author`] | `/author/<id>` | Title, grade, field, specialty |
//!
//! All of them fetch through a [`crate::resilience::PageSource`], and reduce
//! the parsed HTML to owned values before the next `.await`.

pub mod areas;
pub mod article;
pub mod author;
pub mod listing;
