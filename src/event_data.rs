// Reservation calendar client for the mountain hut booking site
// The event endpoint answers with JSON that is sometimes wrapped in one or more JSON strings

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::date_range::DateRange;

// Listing page visited first so the server hands out its session cookie
pub const LISTING_PATH: &str = "/MountainHutInfolists?mountaionGroupId=1";
pub const EVENT_DATA_PATH: &str = "/MountainHutInfolists/GetEventData";

// Upper bound on string-unwrapping passes after the first decode
pub const MAX_DECODE_PASSES: usize = 5;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {0}")]
    HttpStatus(u16),

    #[error("JSON parse failure: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Payload still string-encoded after {0} decode passes")]
    TooDeeplyEncoded(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParameters {
    pub master_no: u32,
    pub service_type1_id: u32,
    pub service_type2_id: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl QueryParameters {
    pub fn new(
        master_no: u32,
        service_type1_id: u32,
        service_type2_id: u32,
        range: DateRange,
    ) -> Self {
        Self {
            master_no,
            service_type1_id,
            service_type2_id,
            start_date: range.start,
            end_date: range.end,
        }
    }

    // Query string pairs in the order the booking site's own calendar sends them
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("masterNo", self.master_no.to_string()),
            ("serviceType1Id", self.service_type1_id.to_string()),
            ("serviceType2Id", self.service_type2_id.to_string()),
            ("startDate", self.start_date.format("%Y-%m-%d").to_string()),
            ("endDate", self.end_date.format("%Y-%m-%d").to_string()),
        ]
    }
}

// One calendar entry as upstream reports it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventRecord {
    pub service_date: Option<String>,
    #[serde(deserialize_with = "any_number")]
    pub reservation_count: Option<Number>,
}

impl EventRecord {
    // Any positive number counts, whether upstream sends 2, 2.0 or something past i64
    pub fn has_open_slots(&self) -> bool {
        self.reservation_count
            .as_ref()
            .and_then(Number::as_f64)
            .map_or(false, |count| count > 0.0)
    }
}

// A count of an unexpected type is treated as absent so the date still decides the match
fn any_number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(count) => Ok(Some(count)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCollection {
    pub records: Vec<EventRecord>,
}

impl EventCollection {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    // Anything other than an array of record-shaped objects contributes no records
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                let total = items.len();
                let records: Vec<EventRecord> = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect();
                if records.len() < total {
                    tracing::debug!(
                        dropped = total - records.len(),
                        "Ignoring event entries that are not record objects"
                    );
                }
                Self { records }
            }
            other => {
                tracing::warn!(kind = value_kind(&other), "Event payload is not a list");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord> {
        self.records.iter()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Decode a response body, unwrapping string-encoded JSON until a structural value appears
pub fn decode_nested_json(raw: &str) -> Result<Value, FetchError> {
    let mut value: Value = serde_json::from_str(raw.trim())?;
    let mut passes = 0;

    loop {
        value = match value {
            Value::String(inner) if passes < MAX_DECODE_PASSES => {
                passes += 1;
                serde_json::from_str(inner.trim())?
            }
            Value::String(_) => return Err(FetchError::TooDeeplyEncoded(passes)),
            other => return Ok(other),
        };
    }
}

// Source of reservation events for a query window
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, query: &QueryParameters) -> Result<EventCollection, FetchError>;
}

// Cookie-carrying HTTP session against the booking site
pub struct EventDataClient {
    base_url: String,
    http: reqwest::Client,
}

impl EventDataClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        Self::with_timeout(&config.base_url, config.timeout)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn bootstrap_session(&self) -> Result<(), FetchError> {
        let url = format!("{}{}", self.base_url, LISTING_PATH);
        let response = self.http.get(&url).send().await?;
        tracing::debug!(%url, status = %response.status(), "Session bootstrap finished");
        Ok(())
    }
}

#[async_trait]
impl EventSource for EventDataClient {
    async fn fetch_events(&self, query: &QueryParameters) -> Result<EventCollection, FetchError> {
        self.bootstrap_session().await?;

        let url = format!("{}{}", self.base_url, EVENT_DATA_PATH);
        let response = self.http.get(&url).query(&query.to_query()).send().await?;

        let status = response.status();
        tracing::debug!(%url, %status, "Event data response received");
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let events = EventCollection::from_value(decode_nested_json(&body)?);
        tracing::debug!(records = events.len(), "Event data decoded");
        Ok(events)
    }
}
