use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::adapters::hooks::CustomizationHooks;
use crate::adapters::result_code::{
    CODE_INVALID_HTTP_RESPONSE, CODE_INVALID_RESPONSE_FORMAT, Outcome, classify,
};
use crate::adapters::wire::{
    self, OP_CONNECTOR_POST_STATUS, OP_RFID_VERIFY, OP_SESSION_POST, OP_STATION_POST, WireError,
};
use crate::domain::session::ChargeDetailRecord;
use crate::domain::station::Station;
use crate::domain::status::ConnectorStatusType;

const API_REQUEST_PATH: &str = "/api/v4/request";

// Caller errors. Transport and partner failures never surface here; they
// come back as a synthesized OioiResponse instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("api key must not be empty")]
    MissingApiKey,
    #[error("partner identifier must not be empty")]
    MissingPartnerIdentifier,
    #[error("rfid must not be empty")]
    EmptyRfid,
    #[error("failed to build http client: {0}")]
    Http(String),
    #[error("request could not be encoded: {0}")]
    Encode(#[from] WireError),
}

// Insertion-ordered string map with copy-on-extend semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomData {
    entries: Vec<(String, String)>,
}

impl CustomData {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let mut entries = self.entries.clone();

        match entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }

        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OioiResponse {
    pub operation: String,
    pub correlation_id: String,
    pub code: u32,
    pub message: String,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    pub retry_after: Option<Duration>,
    pub custom_data: CustomData,
}

impl OioiResponse {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn with_custom_data(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut extended = self.clone();
        extended.custom_data = self.custom_data.with(key, value);
        extended
    }
}

#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub operation: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub operation: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed: Duration,
    pub code: u32,
    pub outcome: Outcome,
}

pub trait RequestObserver: Send + Sync {
    fn on_request(&self, event: &RequestEvent);
    fn on_response(&self, event: &ResponseEvent);
}

pub trait OioiApi: Send + Sync + 'static {
    fn station_post(
        &self,
        station: &Station,
        partner_identifier: &str,
    ) -> Result<OioiResponse, ClientError>;

    fn connector_post_status(
        &self,
        connector_id: &str,
        partner_identifier: &str,
        status: ConnectorStatusType,
    ) -> Result<OioiResponse, ClientError>;

    fn session_post(&self, record: &ChargeDetailRecord) -> Result<OioiResponse, ClientError>;

    fn rfid_verify(&self, rfid: &str) -> Result<OioiResponse, ClientError>;
}

pub struct OioiHttpClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    hooks: CustomizationHooks,
    observers: RwLock<Vec<Arc<dyn RequestObserver>>>,
}

struct Reply {
    body: String,
    retry_after: Option<Duration>,
}

impl OioiHttpClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ClientError::MissingApiKey);
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientError::Http(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            hooks: CustomizationHooks::default(),
            observers: RwLock::new(Vec::new()),
        })
    }

    pub fn with_hooks(mut self, hooks: CustomizationHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn register_observer(&self, observer: Arc<dyn RequestObserver>) {
        let mut observers = match self.observers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        observers.push(observer);
    }

    fn execute(&self, operation: &'static str, body: Value) -> OioiResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let body = self.hooks.apply_outgoing(operation, body);

        self.notify_request(&RequestEvent {
            operation: operation.to_string(),
            correlation_id: correlation_id.clone(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let exchange = self.exchange(&body);
        let elapsed = started.elapsed();

        let (code, message, retry_after) = match exchange {
            Err(transport_error) => (CODE_INVALID_HTTP_RESPONSE, transport_error, None),
            Ok(reply) => match serde_json::from_str::<Value>(&reply.body) {
                Err(_) => (CODE_INVALID_RESPONSE_FORMAT, reply.body, reply.retry_after),
                Ok(parsed) => {
                    let parsed = self.hooks.apply_incoming(operation, parsed);
                    match wire::decode_result(operation, &parsed) {
                        Ok(result) => (result.code, result.message, reply.retry_after),
                        Err(_) => (CODE_INVALID_RESPONSE_FORMAT, reply.body, reply.retry_after),
                    }
                }
            },
        };

        let response = OioiResponse {
            operation: operation.to_string(),
            correlation_id: correlation_id.clone(),
            code,
            message,
            outcome: classify(code),
            timestamp: Utc::now(),
            retry_after,
            custom_data: CustomData::default(),
        };

        if !response.is_success() {
            tracing::warn!(
                operation,
                correlation_id = %correlation_id,
                code = response.code,
                message = %response.message,
                "partner request did not succeed"
            );
        }

        self.notify_response(&ResponseEvent {
            operation: operation.to_string(),
            correlation_id,
            timestamp: response.timestamp,
            elapsed,
            code: response.code,
            outcome: response.outcome,
        });

        response
    }

    fn exchange(&self, body: &Value) -> Result<Reply, String> {
        let response = self
            .http
            .post(format!("{}{API_REQUEST_PATH}", self.base_url))
            .header(AUTHORIZATION, format!("key={}", self.api_key))
            .json(body)
            .send()
            .map_err(|error| error.to_string())?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().map_err(|error| error.to_string())?;

        Ok(Reply { body, retry_after })
    }

    fn notify_request(&self, event: &RequestEvent) {
        let observers = match self.observers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for observer in observers.iter() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_request(event))).is_err() {
                tracing::warn!(operation = %event.operation, "request observer panicked");
            }
        }
    }

    fn notify_response(&self, event: &ResponseEvent) {
        let observers = match self.observers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for observer in observers.iter() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_response(event))).is_err() {
                tracing::warn!(operation = %event.operation, "response observer panicked");
            }
        }
    }
}

fn non_empty_partner_id(value: &str) -> Result<&str, ClientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::MissingPartnerIdentifier);
    }
    Ok(trimmed)
}

impl OioiApi for OioiHttpClient {
    fn station_post(
        &self,
        station: &Station,
        partner_identifier: &str,
    ) -> Result<OioiResponse, ClientError> {
        let partner_identifier = non_empty_partner_id(partner_identifier)?;
        let body = wire::station_post_body(station, partner_identifier)?;
        Ok(self.execute(OP_STATION_POST, body))
    }

    fn connector_post_status(
        &self,
        connector_id: &str,
        partner_identifier: &str,
        status: ConnectorStatusType,
    ) -> Result<OioiResponse, ClientError> {
        let partner_identifier = non_empty_partner_id(partner_identifier)?;
        let body = wire::connector_status_body(connector_id, partner_identifier, status)?;
        Ok(self.execute(OP_CONNECTOR_POST_STATUS, body))
    }

    fn session_post(&self, record: &ChargeDetailRecord) -> Result<OioiResponse, ClientError> {
        let body = wire::session_post_body(record)?;
        Ok(self.execute(OP_SESSION_POST, body))
    }

    fn rfid_verify(&self, rfid: &str) -> Result<OioiResponse, ClientError> {
        let rfid = rfid.trim();
        if rfid.is_empty() {
            return Err(ClientError::EmptyRfid);
        }
        Ok(self.execute(OP_RFID_VERIFY, wire::rfid_verify_body(rfid)))
    }
}
