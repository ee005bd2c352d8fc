// src/client.rs

use crate::auth::{AuthHandle, Session};
use crate::config::{ParkConfig, DEFAULT_PLOTS_TABLE};
use crate::error::ParkError;
use crate::geo::DEFAULT_DIRECTIONS_BASE;
use crate::plot::Plot;
use crate::query::PlotQuery;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Specifies which credential is sent as the bearer token of a request.
pub enum AuthType {
    /// Use the signed-in staff session while it is valid, otherwise the API key.
    /// Row-level security on the backend decides what each of them may read or write.
    SessionToken,
    /// Always use the stored session token, even an expired one.
    /// Endpoints that act on the session itself (user, logout) expect this.
    UserToken,
    /// Always use the public API key, even when a session exists.
    /// Auth endpoints (sign-in, refresh) expect this.
    ApiKey,
}

/// The main client for the memorial park backend.
///
/// `ParkClient` talks to a PostgREST-style REST interface (`/rest/v1/<table>`) for plot
/// records and to a token-based auth service (`/auth/v1/...`) for staff sign-in. It holds
/// the current staff [`Session`], if any, and uses an underlying `reqwest::Client` that is
/// shared between clones.
///
/// ```rust,no_run
/// use memorial_park::{ParkClient, ParkError};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ParkError> {
/// let mut client = ParkClient::new("https://db.example", "public-anon-key")?;
///
/// let plots = client.all_plots().await?;
/// for plot in &plots {
///     println!("{} - {}", plot.display_name(), plot.status());
/// }
///
/// client.auth().sign_in_with_password("staff@example.com", "secret").await?;
/// assert!(client.is_authenticated());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ParkClient {
    pub backend_url: String,
    pub(crate) api_key: String,
    pub(crate) plots_table: String,
    pub(crate) directions_base: String,
    pub(crate) http_client: Client,
    pub(crate) session: Option<Session>,
}

impl ParkClient {
    /// Creates a new `ParkClient`.
    ///
    /// # Arguments
    ///
    /// * `backend_url`: base URL of the backend project. A missing scheme defaults to
    ///   `http://`; a trailing `/` or `/rest/v1` is stripped.
    /// * `api_key`: the public API key. It is sent as the `apikey` header on every request
    ///   and as the bearer token while nobody is signed in.
    pub fn new(backend_url: &str, api_key: &str) -> Result<Self, ParkError> {
        if api_key.trim().is_empty() {
            return Err(ParkError::InvalidInput("api_key must not be empty".to_string()));
        }

        let mut temp_url_string = backend_url.trim().to_string();
        if !temp_url_string.starts_with("http://") && !temp_url_string.starts_with("https://") {
            temp_url_string = format!("http://{}", temp_url_string);
        }

        let parsed_url = Url::parse(&temp_url_string)?;
        if parsed_url.cannot_be_a_base() || parsed_url.host_str().is_none() {
            return Err(ParkError::InvalidUrl(format!(
                "The backend_url '{}' cannot be used as a base URL",
                backend_url
            )));
        }

        let mut final_url = parsed_url.as_str().trim_end_matches('/').to_string();
        if let Some(stripped) = final_url.strip_suffix("/rest/v1") {
            final_url = stripped.to_string();
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).map_err(ParkError::InvalidHeaderValue)?,
        );
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(ParkError::ReqwestError)?;

        log::debug!("ParkClient initialized with backend_url: {}", final_url);

        Ok(Self {
            backend_url: final_url,
            api_key: api_key.to_string(),
            plots_table: DEFAULT_PLOTS_TABLE.to_string(),
            directions_base: DEFAULT_DIRECTIONS_BASE.to_string(),
            http_client,
            session: None,
        })
    }

    /// Creates a client from a loaded [`ParkConfig`].
    pub fn from_config(config: &ParkConfig) -> Result<Self, ParkError> {
        let mut client = Self::new(&config.backend_url, &config.api_key)?;
        client.plots_table = config.plots_table.clone();
        client.directions_base = config.directions_base.clone();
        Ok(client)
    }

    pub fn plots_table(&self) -> &str {
        &self.plots_table
    }

    /// Base URL used when building directions links for plots.
    pub fn directions_base(&self) -> &str {
        &self.directions_base
    }

    /// Returns the current staff session, if one is set on the client.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True when a session is present and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_valid)
    }

    /// Returns an [`AuthHandle`] for sign-in, sign-out and session refresh.
    pub fn auth(&mut self) -> AuthHandle<'_> {
        AuthHandle::new(self)
    }

    /// Fetches a single plot by its identifier. `Ok(None)` when no row has that id.
    pub async fn get_plot(&self, id: &str) -> Result<Option<Plot>, ParkError> {
        if id.trim().is_empty() {
            return Err(ParkError::InvalidInput("plot id must not be empty".to_string()));
        }
        let mut query = PlotQuery::new();
        query.equal_to("id", id).limit(1);
        let plots = self.list_plots(&query).await?;
        Ok(plots.into_iter().next())
    }

    /// Lists the plots matching `query`.
    pub async fn list_plots(&self, query: &PlotQuery) -> Result<Vec<Plot>, ParkError> {
        let endpoint = self.table_endpoint();
        let params = query.build_query_params();
        self._request(
            Method::GET,
            &endpoint,
            &params,
            None::<&Value>,
            AuthType::SessionToken,
            HeaderMap::new(),
        )
        .await
    }

    /// Lists every plot, ordered by id.
    pub async fn all_plots(&self) -> Result<Vec<Plot>, ParkError> {
        let mut query = PlotQuery::new();
        query.order_by_ascending("id");
        self.list_plots(&query).await
    }

    /// Counts the plots matching `query` without transferring the rows.
    pub async fn count_plots(&self, query: &PlotQuery) -> Result<u64, ParkError> {
        let endpoint = self.table_endpoint();
        let params = query.build_query_params();
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self
            ._send(
                Method::HEAD,
                &endpoint,
                &params,
                None::<&Value>,
                AuthType::SessionToken,
                headers,
            )
            .await?;
        let response = Self::_check_status(response).await?;

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                ParkError::JsonDeserializationFailed(
                    "count response carried no usable Content-Range header".to_string(),
                )
            })
    }

    /// Applies `changes` to the plot with `id` and returns the updated row.
    ///
    /// Requires a signed-in staff session; anonymous writes are rejected locally.
    pub async fn update_plot<T: Serialize + Send + Sync>(
        &self,
        id: &str,
        changes: &T,
    ) -> Result<Option<Plot>, ParkError> {
        if !self.is_authenticated() {
            return Err(ParkError::SessionMissing);
        }
        let endpoint = self.table_endpoint();
        let params = vec![
            ("id".to_string(), format!("eq.{}", id)),
            ("select".to_string(), "*".to_string()),
        ];
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let updated: Vec<Plot> = self
            ._request(
                Method::PATCH,
                &endpoint,
                &params,
                Some(changes),
                AuthType::SessionToken,
                headers,
            )
            .await?;
        Ok(updated.into_iter().next())
    }

    fn table_endpoint(&self) -> String {
        format!("rest/v1/{}", self.plots_table)
    }

    pub(crate) fn _endpoint_url(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Url, ParkError> {
        let base_url = Url::parse(&format!("{}/", self.backend_url)).map_err(|e| {
            ParkError::InvalidUrl(format!(
                "Base backend URL '{}' is invalid: {}",
                self.backend_url, e
            ))
        })?;

        let mut full_url = base_url.join(endpoint.trim_start_matches('/')).map_err(|e| {
            ParkError::InvalidUrl(format!(
                "Failed to join base URL '{}' with path '{}': {}",
                base_url, endpoint, e
            ))
        })?;

        if !params.is_empty() {
            let mut pairs = full_url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(full_url)
    }

    // Builds and sends a request; the response is returned unchecked.
    pub(crate) async fn _send<T: Serialize + Send + Sync>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(String, String)],
        body: Option<&T>,
        auth: AuthType,
        extra_headers: HeaderMap,
    ) -> Result<Response, ParkError> {
        let full_url = self._endpoint_url(endpoint, params)?;

        let bearer = match auth {
            AuthType::SessionToken => self
                .session
                .as_ref()
                .filter(|s| s.is_valid())
                .map(|s| s.access_token.as_str())
                .unwrap_or(self.api_key.as_str()),
            AuthType::UserToken => self
                .session
                .as_ref()
                .map(|s| s.access_token.as_str())
                .ok_or(ParkError::SessionMissing)?,
            AuthType::ApiKey => self.api_key.as_str(),
        };

        let mut headers = extra_headers;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(ParkError::InvalidHeaderValue)?,
        );

        let mut request_builder = self.http_client.request(method.clone(), full_url.clone());

        if let Some(body_data) = body {
            let body_str = serde_json::to_string(body_data).map_err(ParkError::JsonError)?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            log::debug!("Request body: {} bytes", body_str.len());
            request_builder = request_builder.body(body_str);
        }

        log::debug!(
            "Sending request: Method={}, URL={}, WithSession={}",
            method,
            full_url.as_str(),
            self.session.is_some()
        );

        request_builder
            .headers(headers)
            .send()
            .await
            .map_err(ParkError::ReqwestError)
    }

    // Passes successful responses through and maps failures to `ParkError`.
    pub(crate) async fn _check_status(response: Response) -> Result<Response, ParkError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body_bytes = response.bytes().await.map_err(ParkError::ReqwestError)?;
        let error_body_str = String::from_utf8_lossy(&error_body_bytes).to_string();
        log::warn!(
            "Request failed with status {}. Response body: {}",
            status,
            error_body_str
        );
        let json_value = serde_json::from_slice::<Value>(&error_body_bytes).unwrap_or_else(|_| {
            serde_json::json!({
                "code": status.as_u16(),
                "message": error_body_str.chars().take(200).collect::<String>(),
            })
        });
        Err(ParkError::from_response(status.as_u16(), json_value))
    }

    pub(crate) async fn _request<T: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(String, String)],
        body: Option<&T>,
        auth: AuthType,
        extra_headers: HeaderMap,
    ) -> Result<R, ParkError> {
        let response = self
            ._send(method, endpoint, params, body, auth, extra_headers)
            .await?;
        let response = Self::_check_status(response).await?;
        let response_url = response.url().to_string();

        let body_bytes = response.bytes().await.map_err(ParkError::ReqwestError)?;
        // Empty 2xx bodies (204, logout) deserialize as JSON null.
        let body_bytes: &[u8] = if body_bytes.is_empty() {
            b"null"
        } else {
            &body_bytes
        };
        serde_json::from_slice::<R>(body_bytes).map_err(|e| {
            log::error!(
                "JSON deserialization failed for successful response from '{}': {}",
                response_url,
                e
            );
            ParkError::JsonDeserializationFailed(format!(
                "Failed to deserialize response from '{}': {}",
                response_url, e
            ))
        })
    }
}

/// Extracts the total from a `Content-Range` value such as `0-24/573` or `*/573`.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
