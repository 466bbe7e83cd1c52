//! Typed client for the shelter service HTTP API.

use std::cmp::min;
use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;

use pawhub_core::dog::Dog;
use rand::seq::IndexedRandom;
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, MatchError, SearchError, TransientError};
use crate::types::{
    Credentials,
    DogId,
    MAX_ID_BATCH,
    MatchResponse,
    SearchCriteria,
    SearchOutcome,
    SearchPage,
};

/// Additional attempts after the first transient failure.
pub const RETRY_BUDGET: u32 = 2;
/// First backoff delay, doubled per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(250);
/// Upper bound on a single backoff delay.
const BACKOFF_CAP: Duration = Duration::from_secs(2);
/// Bound on the availability probe so a dead service cannot hang callers.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Sample size used when drawing a random match.
const MATCH_SAMPLE_SIZE: u32 = 100;

/// Body placeholder for requests without one.
const NO_BODY: Option<&()> = None;

/// A client for the shelter service.
///
/// This wraps a [reqwest::Client] and handles:
/// - cookie-based session credentials (in-process cookie store plus an
///   optional persisted session cookie from [ClientConfig])
/// - retry with exponential backoff for transient failures
/// - error classification (auth vs. transient vs. exhausted)
#[derive(Clone)]
pub struct ShelterClient {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
}

impl Debug for ShelterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelterClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl ShelterClient {
    /// Create a new shelter client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(ApiError::InvalidUrl)?;
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Get the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Issue one logical request, classifying and retrying failures.
    ///
    /// A 401 response propagates immediately as [ApiError::AuthRequired];
    /// any other non-2xx status and any transport error counts against the
    /// retry budget, with the backoff delay doubling per attempt.
    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.base_url.join(path).map_err(ApiError::InvalidUrl)?;

        let mut delay = BACKOFF_BASE;
        let mut last_error = None;
        for attempt in 0..=RETRY_BUDGET {
            if attempt > 0 {
                debug!(?delay, attempt, path, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                delay = min(delay * 2, BACKOFF_CAP);
            }

            let mut request = self.http.request(method.clone(), url.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let transient = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    return Err(ApiError::AuthRequired);
                },
                Ok(response) => TransientError::Status(response.status()),
                Err(err) => TransientError::Request(err),
            };
            debug!(%transient, attempt, path, "attempt failed");
            last_error = Some(transient);
        }

        Err(ApiError::ExhaustedRetries {
            attempts: RETRY_BUDGET + 1,
            source: last_error.expect("retry loop always records an error"),
        })
    }

    /// [Self::execute] plus JSON decoding of the response body.
    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(method, path, query, body, None)
            .await?
            .json()
            .await
            .map_err(ApiError::Response)
    }

    /// Fetch one raw search page (ids only, no detail resolution).
    async fn search_page(&self, criteria: &SearchCriteria) -> Result<SearchPage, ApiError> {
        self.request_json(Method::GET, "/dogs/search", &criteria.to_query(), NO_BODY)
            .await
    }
}

// ---------------------------------------------------------------------------
// ClientTrait
// ---------------------------------------------------------------------------

/// The complete shelter API surface.
///
/// This trait enables alternate implementations:
/// - **HTTP** (current): calls to the hosted service via [ShelterClient]
/// - **Stub** (tests): canned responses without HTTP
#[allow(async_fn_in_trait)]
pub trait ClientTrait {
    /// Log in, returning the session cookie value if the service issued
    /// one, so callers can persist it for later processes.
    async fn login(&self, credentials: &Credentials) -> Result<Option<String>, ApiError>;

    /// Invalidate the session server-side.
    async fn logout(&self) -> Result<(), ApiError>;

    /// Probe a protected endpoint to learn whether the session is live.
    /// Bounded by [PROBE_TIMEOUT] per attempt.
    async fn probe(&self) -> Result<(), ApiError>;

    /// All available breeds, in server order.
    async fn breeds(&self) -> Result<Vec<String>, ApiError>;

    /// Execute a search and resolve the returned ids into full entities.
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SearchError>;

    /// Resolve ids into full entities via the batched detail capability.
    /// At most [MAX_ID_BATCH] ids are submitted; extras are dropped.
    async fn resolve_dogs(&self, ids: &[DogId]) -> Result<Vec<Dog>, ApiError>;

    /// Ask the service to pick one of the given favorites.
    async fn match_from_favorites(&self, ids: &[DogId]) -> Result<Dog, MatchError>;

    /// Draw a match from the whole population: a random breed is sampled,
    /// searched, and one of the results picked uniformly.
    async fn random_match(&self) -> Result<Dog, MatchError>;
}

impl ClientTrait for ShelterClient {
    #[instrument(skip_all, fields(name = %credentials.name))]
    async fn login(&self, credentials: &Credentials) -> Result<Option<String>, ApiError> {
        let response = self
            .execute(Method::POST, "/auth/login", &[], Some(credentials), None)
            .await?;
        debug!("login accepted");
        Ok(session_cookie_from(response.headers()))
    }

    #[instrument(skip_all)]
    async fn logout(&self) -> Result<(), ApiError> {
        self.execute(Method::POST, "/auth/logout", &[], NO_BODY, None)
            .await?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), ApiError> {
        self.execute(
            Method::GET,
            "/dogs/breeds",
            &[],
            NO_BODY,
            Some(PROBE_TIMEOUT),
        )
        .await?;
        Ok(())
    }

    async fn breeds(&self) -> Result<Vec<String>, ApiError> {
        self.request_json(Method::GET, "/dogs/breeds", &[], NO_BODY)
            .await
    }

    #[instrument(skip_all, fields(page = criteria.page()))]
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SearchError> {
        let (age_min, age_max) = criteria.age_bounds();
        if age_min > age_max {
            return Err(SearchError::InvalidAgeRange {
                min: age_min,
                max: age_max,
            });
        }

        let page = self.search_page(criteria).await?;
        debug!(
            ids = page.result_ids.len(),
            total = page.total,
            "received search page"
        );

        let dogs = if page.result_ids.is_empty() {
            Vec::new()
        } else {
            self.resolve_dogs(&page.result_ids).await?
        };

        let page_size = u64::from(criteria.page_size());
        Ok(SearchOutcome {
            dogs,
            total: page.total,
            page: criteria.page(),
            page_count: page.total.div_ceil(page_size) as u32,
        })
    }

    async fn resolve_dogs(&self, ids: &[DogId]) -> Result<Vec<Dog>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_ID_BATCH {
            debug!(
                dropped = ids.len() - MAX_ID_BATCH,
                "capping detail fetch to the batch maximum"
            );
        }
        let batch = &ids[..min(ids.len(), MAX_ID_BATCH)];
        self.request_json(Method::POST, "/dogs", &[], Some(batch))
            .await
    }

    #[instrument(skip_all, fields(candidates = ids.len()))]
    async fn match_from_favorites(&self, ids: &[DogId]) -> Result<Dog, MatchError> {
        if ids.is_empty() {
            return Err(MatchError::NoFavorites);
        }
        let batch = &ids[..min(ids.len(), MAX_ID_BATCH)];
        let response: MatchResponse = self
            .request_json(Method::POST, "/dogs/match", &[], Some(batch))
            .await?;
        debug!(id = %response.matched, "service picked a match");

        let dogs = self.resolve_dogs(&[response.matched.clone()]).await?;
        dogs.into_iter()
            .next()
            .ok_or(MatchError::UnresolvedMatch(response.matched))
    }

    #[instrument(skip_all)]
    async fn random_match(&self) -> Result<Dog, MatchError> {
        let breeds = self.breeds().await?;
        let breed = {
            let mut rng = rand::rng();
            breeds.choose(&mut rng).cloned()
        };

        let criteria = SearchCriteria::new()
            .with_page_size(MATCH_SAMPLE_SIZE)
            .with_breeds(breed.clone().into_iter().collect());
        let mut page = self.search_page(&criteria).await?;

        if page.result_ids.is_empty() {
            debug!(?breed, "no dogs for the sampled breed, retrying unconstrained");
            let unconstrained = SearchCriteria::new().with_page_size(MATCH_SAMPLE_SIZE);
            page = self.search_page(&unconstrained).await?;
        }

        let id = {
            let mut rng = rand::rng();
            page.result_ids.choose(&mut rng).cloned()
        }
        .ok_or(MatchError::NoCandidates)?;

        let dogs = self.resolve_dogs(&[id.clone()]).await?;
        dogs.into_iter()
            .next()
            .ok_or(MatchError::UnresolvedMatch(id))
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Collects the `name=value` pairs of all `Set-Cookie` headers on a
/// response, in a form suitable for replay as one `Cookie` header.
fn session_cookie_from(headers: &HeaderMap) -> Option<String> {
    let pairs = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Build the HTTP client with session credentials attached by default.
fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ApiError> {
    let mut headers = HeaderMap::new();

    // A session cookie persisted by an earlier process
    if let Some(cookie) = &config.session_cookie {
        headers.insert(
            header::COOKIE,
            header::HeaderValue::from_str(cookie).map_err(|e| ApiError::Other(e.to_string()))?,
        );
    }

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key).map_err(
                |e: header::InvalidHeaderName| ApiError::Other(e.to_string()),
            )?,
            header::HeaderValue::from_str(value).map_err(
                |e: header::InvalidHeaderValue| ApiError::Other(e.to_string()),
            )?,
        );
    }

    debug!(
        base_url = %config.base_url,
        has_session = config.session_cookie.is_some(),
        extra_headers = config.extra_headers.len(),
        "building shelter HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60));

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder
        .build()
        .map_err(|e| ApiError::Other(e.to_string()))
}
