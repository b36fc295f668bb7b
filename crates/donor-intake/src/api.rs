//! Client for the donor service.
//!
//! Three calls make up the whole contract:
//!
//! | Operation       | Request                          |
//! |-----------------|----------------------------------|
//! | fetch donor     | `GET  /api/donor/{id}`           |
//! | create donor    | `POST /api/donor`                |
//! | record donation | `POST /api/donor/{id}/donation`  |
//!
//! The server names some fields differently from the kiosk (`name` for the
//! full name, `diseases` for conditions); the wire types here translate at the
//! boundary so the rest of the crate only ever sees [`DonorRecord`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::donor::{
    BloodType, Condition, DonationSubmission, DonorId, DonorIdentity, DonorRecord, Signature,
};
use crate::error::{Error, Result, GENERIC_SUBMIT_FAILURE};

/// Path segments every endpoint lives under.
const API_PREFIX: [&str; 2] = ["api", "donor"];

/// Fallback when a lookup fails without an error body.
const GENERIC_FETCH_FAILURE: &str = "Could not load the donor record.";

/// Fallback when registration fails without an error body.
const GENERIC_CREATE_FAILURE: &str = "Could not register the donor. Please try again.";

/// Body of a create-donor request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateDonorRequest {
    /// Temporary identifier issued by the session.
    pub id: DonorId,
    /// Details typed on the form.
    #[serde(flatten)]
    pub identity: DonorIdentity,
}

/// Operations the kiosk needs from the donor service.
#[async_trait]
pub trait DonorApi: Send + Sync {
    /// Fetch an existing donor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DonorNotFound`] on 404, a backend error on any other
    /// non-success status, or a transport error.
    async fn fetch_donor(&self, id: &DonorId) -> Result<DonorRecord>;

    /// Register a new donor and return the record with the server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a backend error carrying the server's message, or a transport
    /// error.
    async fn create_donor(&self, request: &CreateDonorRequest) -> Result<DonorRecord>;

    /// Record one donation for an existing donor.
    ///
    /// # Errors
    ///
    /// Returns a backend error carrying the server's message, or a transport
    /// error.
    async fn record_donation(&self, id: &DonorId, donation: &DonationSubmission) -> Result<()>;
}

/// [`DonorApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDonorApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpDonorApi {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path or the HTTP
    /// client cannot be built.
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigValidation {
                message: format!("'{base_url}' cannot be used as a base URL"),
            });
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Create a client from the `[api]` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_base_url()?,
            config.api.token.clone(),
            config.request_timeout(),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl DonorApi for HttpDonorApi {
    #[instrument(skip(self), fields(donor_id = %id))]
    async fn fetch_donor(&self, id: &DonorId) -> Result<DonorRecord> {
        let url = self.endpoint(&[id.as_str()]);
        debug!(%url, "Fetching donor");
        let response = self.authorize(self.client.get(url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::DonorNotFound { id: id.to_string() });
        }
        let payload: DonorPayload = read_json(response, GENERIC_FETCH_FAILURE).await?;
        payload.into_record()
    }

    #[instrument(skip(self, request), fields(temporary_id = %request.id))]
    async fn create_donor(&self, request: &CreateDonorRequest) -> Result<DonorRecord> {
        let url = self.endpoint(&[]);
        debug!(%url, "Creating donor");
        let response = self
            .authorize(self.client.post(url))
            .json(request)
            .send()
            .await?;

        let created: CreateDonorResponse = read_json(response, GENERIC_CREATE_FAILURE).await?;
        let created = created.into_payload();
        let id = created.id.into_donor_id()?;

        let mut record = DonorRecord::new(id, request.identity.clone());
        record.donation_count = created.donation_count.unwrap_or(0);
        Ok(record)
    }

    #[instrument(skip(self, donation), fields(donor_id = %id))]
    async fn record_donation(&self, id: &DonorId, donation: &DonationSubmission) -> Result<()> {
        let url = self.endpoint(&[id.as_str(), "donation"]);
        debug!(%url, "Recording donation");
        let response = self
            .authorize(self.client.post(url))
            .json(donation)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::backend(
            status.as_u16(),
            error_message(&body),
            GENERIC_SUBMIT_FAILURE,
        ))
    }
}

/// Read a success body as JSON, or turn a failure status into a backend error.
async fn read_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "Donor service rejected request");
        return Err(Error::backend(status.as_u16(), error_message(&body), fallback));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Pull the `error` (or `message`) field out of a failure body.
fn error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
}

/// Identifiers arrive as strings or bare numbers depending on the backend.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_donor_id(self) -> Result<DonorId> {
        match self {
            Self::Text(text) => DonorId::parse(&text),
            Self::Number(n) => DonorId::parse(&n.to_string()),
        }
    }
}

/// A donor as the server describes it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DonorPayload {
    id: WireId,
    #[serde(alias = "fullName")]
    name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    email: String,
    blood_type: BloodType,
    #[serde(default, alias = "conditions", deserialize_with = "known_conditions")]
    diseases: Vec<Condition>,
    #[serde(default)]
    donation_count: u32,
    #[serde(default)]
    last_donation_date: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

impl DonorPayload {
    fn into_record(self) -> Result<DonorRecord> {
        let identity = DonorIdentity {
            full_name: self.name,
            address: self.address,
            phone: self.phone,
            email: self.email,
            blood_type: self.blood_type,
        };
        let mut record = DonorRecord::new(self.id.into_donor_id()?, identity);
        record.conditions = self.diseases.into_iter().collect();
        record.donation_count = self.donation_count;
        record.last_donation_date = self
            .last_donation_date
            .as_deref()
            .map(parse_wire_date)
            .transpose()?;
        record.signature = self
            .signature
            .filter(|s| !s.is_empty())
            .map(Signature::from_data_url);
        Ok(record)
    }
}

/// Keeps the conditions this kiosk knows and logs the rest.
fn known_conditions<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<Condition>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .iter()
        .filter_map(|value| match Condition::deserialize(value) {
            Ok(condition) => Some(condition),
            Err(_) => {
                warn!(condition = %value, "Ignoring unknown condition from server");
                None
            }
        })
        .collect())
}

/// Accepts `YYYY-MM-DD` and full RFC 3339 timestamps.
fn parse_wire_date(raw: &str) -> Result<NaiveDate> {
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| Error::validation("last donation date", format!("'{raw}' is not a date")))
}

/// Only the identifier (and possibly a count) matters in a create response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDonorPayload {
    id: WireId,
    #[serde(default)]
    donation_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateDonorResponse {
    Wrapped { donor: CreatedDonorPayload },
    Bare(CreatedDonorPayload),
}

impl CreateDonorResponse {
    fn into_payload(self) -> CreatedDonorPayload {
        match self {
            Self::Wrapped { donor } | Self::Bare(donor) => donor,
        }
    }
}
