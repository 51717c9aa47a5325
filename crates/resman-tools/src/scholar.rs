//! Semantic Scholar REST client.
//!
//! Stateless wrapper over the Graph and Recommendations APIs. Every request
//! carries the `x-api-key` header and a fixed 30 s timeout; failures are
//! surfaced as-is, never retried.

use crate::pdf::PdfTextExtractor;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const GRAPH_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
pub const RECOMMENDATIONS_BASE_URL: &str = "https://api.semanticscholar.org/recommendations/v1";
pub const DEFAULT_FULL_TEXT_CHARS: usize = 15_000;
pub const TRUNCATION_MARKER: &str = "\n\n...[truncated]...";

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PDF_BYTES: u64 = 64 * 1024 * 1024;

const SEARCH_FIELDS: &str = "title,authors,year,abstract,url,venue,citationCount,\
influentialCitationCount,openAccessPdf,externalIds";
const DETAIL_FIELDS: &str = "title,authors,year,abstract,url,venue,citationCount,\
influentialCitationCount,openAccessPdf,externalIds,references.title,references.paperId,\
citations.title,citations.paperId";
const RECOMMEND_FIELDS: &str =
    "title,authors,year,abstract,url,venue,citationCount,openAccessPdf,externalIds";

#[derive(Error, Debug)]
pub enum ScholarError {
    #[error("Missing S2_KEY. Set it in your environment or .env file.")]
    MissingKey,

    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, ScholarError>;

/// Outcome of a full-text read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullText {
    pub paper_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FullText {
    fn unavailable(paper_id: &str, reason: &str) -> Self {
        Self {
            paper_id: paper_id.to_string(),
            success: false,
            pdf_url: None,
            text: None,
            reason: Some(reason.to_string()),
        }
    }
}

pub struct ScholarClient {
    agent: ureq::Agent,
    api_key: String,
    graph_base: String,
    recommendations_base: String,
}

impl ScholarClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ScholarError::MissingKey);
        }
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Ok(Self {
            agent,
            api_key,
            graph_base: GRAPH_BASE_URL.to_string(),
            recommendations_base: RECOMMENDATIONS_BASE_URL.to_string(),
        })
    }

    /// Point the client at other hosts (a local stub in tests).
    pub fn with_base_urls(mut self, graph: &str, recommendations: &str) -> Self {
        self.graph_base = graph.trim_end_matches('/').to_string();
        self.recommendations_base = recommendations.trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<ureq::http::Response<ureq::Body>> {
        let mut req = self.agent.get(url).header("x-api-key", &self.api_key);
        for (k, v) in query {
            req = req.query(*k, v);
        }
        let mut resp = req.call()?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(ScholarError::Status {
                url: url.to_string(),
                status,
                body: body.chars().take(500).collect(),
            });
        }
        Ok(resp)
    }

    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut resp = self.get(url, query)?;
        Ok(resp.body_mut().read_json::<Value>()?)
    }

    pub fn search_papers(&self, query: &str, limit: usize, year: Option<&str>) -> Result<Value> {
        let mut params = vec![
            ("query", query.to_string()),
            ("limit", clamp_limit(limit).to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];
        if let Some(year) = year.filter(|y| !y.trim().is_empty()) {
            params.push(("year", year.to_string()));
        }
        self.get_json(&format!("{}/paper/search", self.graph_base), &params)
    }

    pub fn paper_details(&self, paper_id: &str) -> Result<Value> {
        self.get_json(
            &format!("{}/paper/{paper_id}", self.graph_base),
            &[("fields", DETAIL_FIELDS.to_string())],
        )
    }

    pub fn recommend_papers(&self, paper_id: &str, limit: usize) -> Result<Value> {
        self.get_json(
            &format!("{}/papers/forpaper/{paper_id}", self.recommendations_base),
            &[
                ("limit", clamp_limit(limit).to_string()),
                ("fields", RECOMMEND_FIELDS.to_string()),
            ],
        )
    }

    pub fn open_access_pdf_url(&self, paper_id: &str) -> Result<Option<String>> {
        let details = self.paper_details(paper_id)?;
        Ok(details
            .get("openAccessPdf")
            .and_then(|p| p.get("url"))
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string))
    }

    /// Download the open-access PDF and extract at most `max_chars`
    /// characters of text.
    pub fn read_full_paper_text(
        &self,
        paper_id: &str,
        max_chars: usize,
        extractor: Option<&dyn PdfTextExtractor>,
    ) -> Result<FullText> {
        let Some(extractor) = extractor else {
            return Ok(FullText::unavailable(
                paper_id,
                "PDF text extraction is not enabled (set pdf.enabled).",
            ));
        };
        let Some(pdf_url) = self.open_access_pdf_url(paper_id)? else {
            return Ok(FullText::unavailable(
                paper_id,
                "No open-access PDF URL available from Semantic Scholar for this paper.",
            ));
        };

        let mut resp = self.get(&pdf_url, &[])?;
        let bytes = resp
            .body_mut()
            .with_config()
            .limit(MAX_PDF_BYTES)
            .read_to_vec()?;
        let text = extractor
            .extract_text(&bytes)
            .map_err(|e| ScholarError::Pdf(format!("{e:#}")))?;

        Ok(FullText {
            paper_id: paper_id.to_string(),
            success: true,
            pdf_url: Some(pdf_url),
            text: Some(truncate_text(text.trim(), max_chars)),
            reason: None,
        })
    }
}

/// Result counts the APIs accept.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, 50)
}

pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
