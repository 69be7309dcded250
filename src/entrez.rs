//! NCBI Entrez E-utilities transport for dbSNP searches

use crate::{RsidError, RsidResult};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

pub const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

/// Maximum identifiers requested per query
pub const RETMAX: usize = 20;

/// Tool name reported to NCBI alongside the caller's email
pub const TOOL_NAME: &str = "rsid_retrieval";

/// Query used by [`check_connection`]
pub const CONNECTION_TEST_TERM: &str = "16[CHR] AND 123456[POS]";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the dbSNP search term for a chromosome number and position
pub fn build_query(chromosome: u8, position: u64) -> String {
    format!("{}[CHR] AND {}[POS]", chromosome, position)
}

/// The only check applied to the caller identity is the presence of `@`
pub fn validate_email(email: &str) -> RsidResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(RsidError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// One search against the SNP database
///
/// Returns the raw numeric identifiers reported by the service, or an error
/// for network failures, non-success statuses and malformed bodies. Retrying
/// is the caller's business.
pub trait SnpSearch: Send + Sync {
    fn esearch(&self, term: &str) -> RsidResult<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

/// Extract the identifier list from an esearch JSON body
pub fn parse_esearch_response(body: &str) -> RsidResult<Vec<String>> {
    let response: EsearchResponse = serde_json::from_str(body)?;
    if let Some(error) = response.esearchresult.error {
        return Err(RsidError::Remote(error));
    }
    Ok(response.esearchresult.idlist)
}

/// Blocking HTTP client for `esearch.fcgi` with `db=snp`
pub struct EntrezSearch {
    client: Client,
    base_url: String,
    email: String,
}

impl EntrezSearch {
    pub fn new(email: &str) -> RsidResult<Self> {
        Self::with_base_url(email, ESEARCH_URL)
    }

    pub fn with_base_url(email: &str, base_url: &str) -> RsidResult<Self> {
        validate_email(email)?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl SnpSearch for EntrezSearch {
    fn esearch(&self, term: &str) -> RsidResult<Vec<String>> {
        let retmax = RETMAX.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("db", "snp"),
                ("term", term),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
                ("email", self.email.as_str()),
                ("tool", TOOL_NAME),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(RsidError::Remote(format!("HTTP {}", response.status())));
        }

        let body = response.text()?;
        parse_esearch_response(&body)
    }
}

/// Run a fixed query to confirm the service is reachable
///
/// Never fails; the outcome is reported as `(ok, message)`.
pub fn check_connection<S: SnpSearch + ?Sized>(search: &S) -> (bool, String) {
    match search.esearch(CONNECTION_TEST_TERM) {
        Ok(ids) => (
            true,
            format!("Entrez test successful: {} identifier(s) returned", ids.len()),
        ),
        Err(e) => (false, format!("Entrez test failed: {}", e)),
    }
}
