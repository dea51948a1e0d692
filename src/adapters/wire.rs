use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::domain::DomainError;
use crate::domain::session::{ChargeDetailRecord, Identification, IdentifierType, TimeInterval};
use crate::domain::station::{
    Address, Connector, ConnectorType, Contact, OpeningHours, Station, StationDraft,
};
use crate::domain::status::{ConnectorStatus, ConnectorStatusType};

pub const OP_STATION_POST: &str = "station-post";
pub const OP_CONNECTOR_POST_STATUS: &str = "connector-post-status";
pub const OP_SESSION_POST: &str = "session-post";
pub const OP_RFID_VERIFY: &str = "rfid-verify";

#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("message must be a JSON object")]
    NotAnObject,
    #[error("missing required property: {0}")]
    MissingProperty(&'static str),
    #[error("property {0} has an unexpected type")]
    InvalidProperty(&'static str),
    #[error("refusing to serialize the fallback value of {0}")]
    UnmappableValue(&'static str),
    #[error("decoded entity violates an invariant: {0}")]
    Invariant(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResult {
    pub code: u32,
    pub message: String,
}

pub fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn decode_timestamp(raw: &str, property: &'static str) -> Result<DateTime<Utc>, WireError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| WireError::InvalidProperty(property))
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, WireError> {
    value.as_object().ok_or(WireError::NotAnObject)
}

fn require<'a>(
    object: &'a Map<String, Value>,
    property: &'static str,
) -> Result<&'a Value, WireError> {
    object
        .get(property)
        .ok_or(WireError::MissingProperty(property))
}

fn require_str<'a>(
    object: &'a Map<String, Value>,
    property: &'static str,
) -> Result<&'a str, WireError> {
    require(object, property)?
        .as_str()
        .ok_or(WireError::InvalidProperty(property))
}

fn require_f64(object: &Map<String, Value>, property: &'static str) -> Result<f64, WireError> {
    require(object, property)?
        .as_f64()
        .ok_or(WireError::InvalidProperty(property))
}

fn optional_str<'a>(
    object: &'a Map<String, Value>,
    property: &'static str,
) -> Result<Option<&'a str>, WireError> {
    match object.get(property) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or(WireError::InvalidProperty(property)),
    }
}

fn str_or_default(object: &Map<String, Value>, property: &'static str) -> Result<String, WireError> {
    Ok(optional_str(object, property)?.unwrap_or_default().to_string())
}

fn bool_or_default(object: &Map<String, Value>, property: &'static str) -> Result<bool, WireError> {
    match object.get(property) {
        None => Ok(false),
        Some(value) => value
            .as_bool()
            .ok_or(WireError::InvalidProperty(property)),
    }
}

// The partner documentation is ambiguous on whether street-number is a
// string or a number; we emit strings and accept both.
fn string_or_number(
    object: &Map<String, Value>,
    property: &'static str,
) -> Result<String, WireError> {
    match require(object, property)? {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(WireError::InvalidProperty(property)),
    }
}

pub fn encode_station(station: &Station) -> Result<Value, WireError> {
    let mut object = Map::new();
    object.insert("id".to_string(), json!(station.id));
    object.insert("name".to_string(), json!(station.name));

    if let Some(description) = &station.description
        && !description.is_empty()
    {
        object.insert("description".to_string(), json!(description));
    }

    object.insert("latitude".to_string(), json!(station.latitude));
    object.insert("longitude".to_string(), json!(station.longitude));
    object.insert(
        "address".to_string(),
        json!({
            "street": station.address.street,
            "street-number": station.address.street_number,
            "city": station.address.city,
            "zip": station.address.zip,
            "country": station.address.country,
        }),
    );
    object.insert(
        "contact".to_string(),
        json!({
            "phone": station.contact.phone,
            "fax": station.contact.fax,
            "web": station.contact.web,
            "email": station.contact.email,
        }),
    );
    object.insert("cpo-id".to_string(), json!(station.operator_id));
    object.insert(
        "is-open-24".to_string(),
        json!(station.opening_hours == OpeningHours::Open24h),
    );

    let mut connectors = Vec::with_capacity(station.connectors.len());
    for connector in &station.connectors {
        let name = connector
            .connector_type
            .wire_name()
            .ok_or(WireError::UnmappableValue("connector type"))?;
        connectors.push(json!({
            "id": connector.id,
            "name": name,
            "speed": connector.speed_kw,
        }));
    }
    object.insert("connectors".to_string(), Value::Array(connectors));

    let open_hour_notes = match &station.opening_hours {
        OpeningHours::Open24h => "",
        OpeningHours::Notes(notes) => notes.as_str(),
    };
    object.insert("open-hour-notes".to_string(), json!(open_hour_notes));
    object.insert("notes".to_string(), json!(station.notes));
    object.insert("is-reservable".to_string(), json!(station.reservable));

    if let Some(floor_level) = station.floor_level {
        object.insert("floor-level".to_string(), json!(floor_level));
    }

    object.insert("is-free-charge".to_string(), json!(station.free_of_charge));

    if let Some(parking_spots) = station.parking_spots {
        object.insert("total-parking".to_string(), json!(parking_spots));
    }

    object.insert(
        "is-green-power-available".to_string(),
        json!(station.green_power),
    );
    object.insert("is-plugin-charge".to_string(), json!(station.plugin_charge));
    object.insert("is-roofed".to_string(), json!(station.roofed));
    object.insert("is-private".to_string(), json!(station.private));
    object.insert("deleted".to_string(), json!(station.deleted));

    Ok(Value::Object(object))
}

pub fn decode_station(value: &Value) -> Result<Station, WireError> {
    let object = as_object(value)?;

    let address_object = as_object(require(object, "address")?)?;
    let address = Address {
        street: require_str(address_object, "street")?.to_string(),
        street_number: string_or_number(address_object, "street-number")?,
        city: require_str(address_object, "city")?.to_string(),
        zip: require_str(address_object, "zip")?.to_string(),
        country: require_str(address_object, "country")?.to_string(),
    };

    let contact = match object.get("contact") {
        None => Contact::default(),
        Some(value) => {
            let contact_object = as_object(value)?;
            Contact {
                phone: str_or_default(contact_object, "phone")?,
                fax: str_or_default(contact_object, "fax")?,
                web: str_or_default(contact_object, "web")?,
                email: str_or_default(contact_object, "email")?,
            }
        }
    };

    let connector_values = require(object, "connectors")?
        .as_array()
        .ok_or(WireError::InvalidProperty("connectors"))?;
    let mut connectors = Vec::with_capacity(connector_values.len());
    for connector_value in connector_values {
        let connector_object = as_object(connector_value)?;
        connectors.push(Connector {
            id: require_str(connector_object, "id")?.to_string(),
            connector_type: ConnectorType::from_wire(require_str(connector_object, "name")?),
            speed_kw: require_f64(connector_object, "speed")?,
        });
    }

    let opening_hours = if bool_or_default(object, "is-open-24")? {
        OpeningHours::Open24h
    } else {
        OpeningHours::Notes(str_or_default(object, "open-hour-notes")?)
    };

    let floor_level = match object.get("floor-level") {
        None => None,
        Some(value) => Some(
            value
                .as_i64()
                .and_then(|level| i32::try_from(level).ok())
                .ok_or(WireError::InvalidProperty("floor-level"))?,
        ),
    };
    let parking_spots = match object.get("total-parking") {
        None => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(|spots| u32::try_from(spots).ok())
                .ok_or(WireError::InvalidProperty("total-parking"))?,
        ),
    };

    let draft = StationDraft {
        id: require_str(object, "id")?.to_string(),
        name: require_str(object, "name")?.to_string(),
        description: optional_str(object, "description")?.map(str::to_string),
        latitude: require_f64(object, "latitude")?,
        longitude: require_f64(object, "longitude")?,
        address,
        contact,
        operator_id: require_str(object, "cpo-id")?.to_string(),
        opening_hours,
        connectors,
        notes: str_or_default(object, "notes")?,
        reservable: bool_or_default(object, "is-reservable")?,
        floor_level,
        free_of_charge: bool_or_default(object, "is-free-charge")?,
        parking_spots,
        green_power: bool_or_default(object, "is-green-power-available")?,
        plugin_charge: bool_or_default(object, "is-plugin-charge")?,
        roofed: bool_or_default(object, "is-roofed")?,
        private: bool_or_default(object, "is-private")?,
        deleted: bool_or_default(object, "deleted")?,
    };

    draft.build().map_err(WireError::from)
}

pub fn encode_session(record: &ChargeDetailRecord) -> Result<Value, WireError> {
    let identifier_type = record
        .user
        .identifier_type
        .wire_name()
        .ok_or(WireError::UnmappableValue("identifier-type"))?;

    let mut user = Map::new();
    user.insert("identifier".to_string(), json!(record.user.identifier));
    user.insert("identifier-type".to_string(), json!(identifier_type));
    if let Some(token) = &record.user.token
        && !token.is_empty()
    {
        user.insert("token".to_string(), json!(token));
    }

    let mut object = Map::new();
    object.insert("user".to_string(), Value::Object(user));
    object.insert("session-id".to_string(), json!(record.session_id));
    object.insert("connector-id".to_string(), json!(record.connector_id));
    object.insert(
        "session-interval".to_string(),
        encode_interval(&record.session_interval),
    );

    if let Some(charging) = &record.charging_interval {
        object.insert("charging-interval".to_string(), encode_interval(charging));
    }
    if let Some(energy) = record.energy_consumed_kwh {
        object.insert("energy-consumed".to_string(), json!(energy));
    }
    if let Some(partner_identifier) = &record.partner_identifier
        && !partner_identifier.is_empty()
    {
        object.insert("partner-identifier".to_string(), json!(partner_identifier));
    }

    Ok(Value::Object(object))
}

fn encode_interval(interval: &TimeInterval) -> Value {
    let mut object = Map::new();
    object.insert(
        "start".to_string(),
        json!(encode_timestamp(interval.start())),
    );
    if let Some(stop) = interval.stop() {
        object.insert("stop".to_string(), json!(encode_timestamp(stop)));
    }
    Value::Object(object)
}

fn decode_interval(value: &Value) -> Result<TimeInterval, WireError> {
    let object = as_object(value)?;
    let start = decode_timestamp(require_str(object, "start")?, "start")?;
    let stop = match optional_str(object, "stop")? {
        None => None,
        Some(raw) => Some(decode_timestamp(raw, "stop")?),
    };
    TimeInterval::new(start, stop).map_err(WireError::from)
}

pub fn decode_session(value: &Value) -> Result<ChargeDetailRecord, WireError> {
    let object = as_object(value)?;

    let user_object = as_object(require(object, "user")?)?;
    let user = Identification {
        identifier: require_str(user_object, "identifier")?.to_string(),
        identifier_type: IdentifierType::from_wire(require_str(user_object, "identifier-type")?),
        token: optional_str(user_object, "token")?.map(str::to_string),
    };

    let session_interval = decode_interval(require(object, "session-interval")?)?;
    let charging_interval = match object.get("charging-interval") {
        None => None,
        Some(value) => Some(decode_interval(value)?),
    };
    let energy_consumed_kwh = match object.get("energy-consumed") {
        None => None,
        Some(value) => Some(
            value
                .as_f64()
                .ok_or(WireError::InvalidProperty("energy-consumed"))?,
        ),
    };

    ChargeDetailRecord::new(
        require_str(object, "session-id")?.to_string(),
        user,
        require_str(object, "connector-id")?.to_string(),
        session_interval,
        charging_interval,
        energy_consumed_kwh,
        optional_str(object, "partner-identifier")?.map(str::to_string),
    )
    .map_err(WireError::from)
}

pub fn decode_connector_status(value: &Value) -> Result<ConnectorStatus, WireError> {
    let object = as_object(value)?;

    Ok(ConnectorStatus {
        connector_id: require_str(object, "connector-id")?.to_string(),
        status: ConnectorStatusType::from_wire(require_str(object, "status")?),
        timestamp: decode_timestamp(require_str(object, "timestamp")?, "timestamp")?,
    })
}

pub fn station_post_body(station: &Station, partner_identifier: &str) -> Result<Value, WireError> {
    Ok(json!({
        OP_STATION_POST: {
            "station": encode_station(station)?,
            "partner-identifier": partner_identifier,
        }
    }))
}

pub fn connector_status_body(
    connector_id: &str,
    partner_identifier: &str,
    status: ConnectorStatusType,
) -> Result<Value, WireError> {
    let status = status
        .wire_name()
        .ok_or(WireError::UnmappableValue("status"))?;

    Ok(json!({
        OP_CONNECTOR_POST_STATUS: {
            "connector-id": connector_id,
            "partner-identifier": partner_identifier,
            "status": status,
        }
    }))
}

pub fn session_post_body(record: &ChargeDetailRecord) -> Result<Value, WireError> {
    Ok(json!({
        OP_SESSION_POST: {
            "session": encode_session(record)?,
        }
    }))
}

pub fn rfid_verify_body(rfid: &str) -> Value {
    json!({
        OP_RFID_VERIFY: {
            "rfid": rfid,
        }
    })
}

// Responses normally carry the result envelope; older endpoints answer
// with a bare success flag keyed by the operation name instead.
pub fn decode_result(operation: &str, body: &Value) -> Result<WireResult, WireError> {
    let object = as_object(body)?;

    if let Some(result_value) = object.get("result") {
        let result_object = as_object(result_value)?;
        let code = require(result_object, "code")?
            .as_u64()
            .and_then(|code| u32::try_from(code).ok())
            .ok_or(WireError::InvalidProperty("code"))?;
        let message = require_str(result_object, "message")?.to_string();
        return Ok(WireResult { code, message });
    }

    if let Some(legacy) = object.get(operation)
        && let Some(success) = legacy.get("success").and_then(Value::as_bool)
    {
        return Ok(if success {
            WireResult {
                code: 0,
                message: String::new(),
            }
        } else {
            WireResult {
                code: 200,
                message: "rejected".to_string(),
            }
        });
    }

    Err(WireError::MissingProperty("result"))
}
