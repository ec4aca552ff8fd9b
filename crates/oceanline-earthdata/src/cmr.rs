//! CMR granule search
//!
//! Queries `{cmr}/search/granules.umm_json` by collection short name and
//! temporal range, following `CMR-Search-After` paging until every hit has
//! been collected (or the requested count is reached).

use oceanline_core::{SHARED_RUNTIME, StreamError, http_client, retry_with_backoff};
use serde::Deserialize;

use crate::registry::DateRange;

/// Largest page CMR serves
pub const PAGE_SIZE: usize = 2000;

const SEARCH_AFTER_HEADER: &str = "CMR-Search-After";
const HITS_HEADER: &str = "CMR-Hits";

/// Error from a catalog query
#[derive(Debug)]
pub enum CmrError {
    Stream(StreamError),
    Parse(String),
}

impl std::fmt::Display for CmrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(e) => write!(f, "{e}"),
            Self::Parse(msg) => write!(f, "invalid CMR response: {msg}"),
        }
    }
}

impl std::error::Error for CmrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(e) => Some(e),
            Self::Parse(_) => None,
        }
    }
}

impl From<StreamError> for CmrError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

/// Remote file handle for one granule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granule {
    /// Granule UR (usually the file name)
    pub id: String,
    pub concept_id: Option<String>,
    /// Direct HTTPS data links
    pub urls: Vec<String>,
    /// Archive size reported by the catalog
    pub size_bytes: Option<u64>,
}

// UMM-G JSON, only the fields we read

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Option<usize>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    meta: Meta,
    umm: Umm,
}

#[derive(Deserialize, Default)]
struct Meta {
    #[serde(rename = "concept-id")]
    concept_id: Option<String>,
}

#[derive(Deserialize)]
struct Umm {
    #[serde(rename = "GranuleUR")]
    granule_ur: String,
    #[serde(rename = "RelatedUrls", default)]
    related_urls: Vec<RelatedUrl>,
    #[serde(rename = "DataGranule")]
    data_granule: Option<DataGranule>,
}

#[derive(Deserialize)]
struct RelatedUrl {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct DataGranule {
    #[serde(rename = "ArchiveAndDistributionInformation", default)]
    archive_info: Vec<ArchiveInfo>,
}

#[derive(Deserialize)]
struct ArchiveInfo {
    /// `Size` + `SizeUnit` are rounded, so only the exact byte count is read
    #[serde(rename = "SizeInBytes")]
    size_in_bytes: Option<u64>,
}

impl From<Item> for Granule {
    fn from(item: Item) -> Self {
        let urls = item
            .umm
            .related_urls
            .into_iter()
            .filter(|u| u.kind.as_deref() == Some("GET DATA"))
            .filter(|u| u.url.starts_with("https://") || u.url.starts_with("http://"))
            .map(|u| u.url)
            .collect();

        // Several entries may include sidecars; only a lone entry describes the file
        let size_bytes = item
            .umm
            .data_granule
            .and_then(|dg| match dg.archive_info.as_slice() {
                [only] => only.size_in_bytes,
                _ => None,
            });

        Self {
            id: item.umm.granule_ur,
            concept_id: item.meta.concept_id,
            urls,
            size_bytes,
        }
    }
}

/// CMR `temporal[]` value covering whole days, inclusive
pub fn temporal_param(range: &DateRange) -> String {
    format!(
        "{}T00:00:00Z,{}T23:59:59Z",
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d")
    )
}

/// Parse one page of UMM-JSON granules. Returns (granules, total hits).
pub fn parse_granules(body: &str) -> Result<(Vec<Granule>, Option<usize>), CmrError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| CmrError::Parse(e.to_string()))?;
    let granules = resp.items.into_iter().map(Granule::from).collect();
    Ok((granules, resp.hits))
}

/// One response page: body plus paging headers
struct Page {
    body: String,
    search_after: Option<String>,
    hits: Option<usize>,
}

/// Search granules of `short_name` within `range`.
///
/// `count = None` collects every hit; otherwise at most `count` granules.
pub fn search_granules(
    cmr_url: &str,
    token: Option<&str>,
    short_name: &str,
    range: &DateRange,
    count: Option<usize>,
) -> Result<Vec<Granule>, CmrError> {
    let url = format!(
        "{}/search/granules.umm_json",
        cmr_url.trim_end_matches('/')
    );
    let page_size = count.map_or(PAGE_SIZE, |c| c.clamp(1, PAGE_SIZE));
    let temporal = temporal_param(range);
    let label = format!("CMR search {short_name}");

    let mut granules: Vec<Granule> = Vec::new();
    let mut search_after: Option<String> = None;

    loop {
        let page = retry_with_backoff(&label, || {
            fetch_page(
                &url,
                token,
                short_name,
                &temporal,
                page_size,
                search_after.as_deref(),
            )
        })?;
        let (items, body_hits) = parse_granules(&page.body)?;
        let hits = page.hits.or(body_hits);
        let page_len = items.len();
        granules.extend(items);

        log::debug!(
            "{short_name}: page of {page_len} granules ({} of {} collected)",
            granules.len(),
            hits.map_or("?".to_string(), |h| h.to_string())
        );

        if let Some(limit) = count {
            if granules.len() >= limit {
                granules.truncate(limit);
                break;
            }
        }
        if page_len < page_size || hits.is_some_and(|h| granules.len() >= h) {
            break;
        }
        match page.search_after {
            Some(next) => search_after = Some(next),
            None => break,
        }
    }

    Ok(granules)
}

fn fetch_page(
    url: &str,
    token: Option<&str>,
    short_name: &str,
    temporal: &str,
    page_size: usize,
    search_after: Option<&str>,
) -> Result<Page, StreamError> {
    let page_size = page_size.to_string();

    SHARED_RUNTIME.handle().block_on(async {
        let mut request = http_client().get(url).query(&[
            ("short_name", short_name),
            ("temporal[]", temporal),
            ("page_size", page_size.as_str()),
            ("sort_key", "start_date"),
        ]);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(after) = search_after {
            request = request.header(SEARCH_AFTER_HEADER, after);
        }

        let resp = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StreamError::from_reqwest(&e))?;

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let search_after = header(SEARCH_AFTER_HEADER);
        let hits = header(HITS_HEADER).and_then(|h| h.parse().ok());

        let body = resp.text().await.map_err(|e| StreamError::from_reqwest(&e))?;
        Ok::<_, StreamError>(Page {
            body,
            search_after,
            hits,
        })
    })
}
