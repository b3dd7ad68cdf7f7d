//! In-memory page source and HTML fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::resilience::PageSource;

/// Serves canned bodies by exact URL and records every request.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    pages: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: impl Into<String>) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl PageSource for MockSource {
    async fn get(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        let body = self.pages.lock().unwrap().get(url).cloned();
        body.ok_or_else(|| Error::Status {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND,
        })
    }
}

pub const BASE_URL: &str = "https://ri.conicet.gov.ar";

/// The subject page listing two areas.
pub fn subject_page() -> String {
    r#"<html><body>
<ul id="aspect_conicet_VerArea_list_nivel1">
  <li class="ds-simple-list-item"><span>CIENCIAS SOCIALES Y HUMANIDADES</span><span>[120]</span></li>
  <li class="ds-simple-list-item"><span>INGENIERÍAS Y TECNOLOGÍAS</span><span>[45]</span></li>
</ul>
</body></html>"#
        .to_string()
}

/// A listing page linking to the given handle paths.
pub fn listing_page(paths: &[&str]) -> String {
    let items: String = paths
        .iter()
        .map(|p| {
            format!(
                r#"<div class="ds-artifact-item"><div class="artifact-title"><a href="{p}">Title</a></div></div>"#
            )
        })
        .collect();
    format!("<html><body><div id=\"list\">{items}</div></body></html>")
}

/// An article page with the usual Dublin Core metadata.
pub fn article_page(number: u32, subject: &str, keywords: &str, issued: &str) -> String {
    format!(
        r#"<html><head>
<meta name="DC.title" content="Artículo {number}" xml:lang="es">
<meta name="DC.identifier" content="http://hdl.handle.net/11336/{number}">
<meta name="DC.identifier" content="10.1000/xyz{number}">
<meta name="DCTERMS.issued" content="{issued}">
<meta name="DC.subject" content="{subject}" xml:lang="es">
<meta name="DC.type" content="info:eu-repo/semantics/article">
<meta name="citation_keywords" content="{keywords}">
<meta name="empty" content="">
</head><body>
<div class="simple-item-view-authors">
  <a href="/author/{number}1">" Pérez, Juan "</a>
  <a href="/author/{number}2">Gómez, Ana</a>
  <a href="https://example.org/other">Not an author</a>
  <div><a href="/author/{number}9">Colaborador, Luis</a></div>
</div>
</body></html>"#
    )
}

/// An author profile page.
pub fn author_page() -> String {
    r#"<html><body><table id="aspect_conicet_VerAutor_table_datos">
<tr><td>Título</td><td>Doctor en Ciencias Sociales</td></tr>
<tr><td>Grado</td><td>Investigador Adjunto</td></tr>
<tr><td>Campo de aplicación</td><td>Sociología</td></tr>
<tr><td>Especialidad</td><td>Estudios urbanos</td></tr>
<tr><td>Otro</td><td>ignored</td></tr>
</table></body></html>"#
        .to_string()
}
