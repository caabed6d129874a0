//! Wire formats of the catalog backend and their validated decoders.
//!
//! Response bodies are decoded from raw JSON values so that every missing
//! container or mistyped field surfaces as a [`DecodeError`] instead of a
//! partially-filled record.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::{AppId, AppRecord},
    error::error_message,
};

/// Keys the list endpoint has used for its record container, in preference order.
const RECORD_CONTAINERS: [&str; 2] = ["data", "apps"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("response body is not a JSON object")]
    NotAnObject,
    #[error("response has no `{0}` container")]
    MissingContainer(&'static str),
    #[error("`{0}` container is not a list")]
    MalformedContainer(&'static str),
    #[error("record {index}: missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
    #[error("metadata field `{0}` is not a non-negative integer")]
    InvalidMetadata(&'static str),
    #[error("server reported failure: {0}")]
    Rejected(String),
}

/// One page of records plus whatever pagination metadata the backend sent.
#[derive(Debug, Clone, PartialEq)]
pub struct AppsPage {
    pub records: Vec<AppRecord>,
    pub total: Option<u64>,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_app_id(self) -> Option<AppId> {
        match self {
            WireId::Text(text) if text.trim().is_empty() => None,
            WireId::Text(text) => Some(AppId(text)),
            WireId::Number(n) => Some(AppId(n.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireAppRecord {
    #[serde(default)]
    app_id: Option<WireId>,
    #[serde(default, rename = "_id")]
    object_id: Option<WireId>,
    #[serde(default)]
    app_name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    ratings: Option<f64>,
    #[serde(default)]
    num_reviews: Option<u64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    app_image_url: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn decode_record(index: usize, value: &Value) -> Result<AppRecord, DecodeError> {
    let wire = WireAppRecord::deserialize(value).map_err(|err| DecodeError::InvalidRecord {
        index,
        reason: err.to_string(),
    })?;

    // `app_id` is the catalog key; `_id` only shows up on the raw store rows.
    let id = wire
        .app_id
        .and_then(WireId::into_app_id)
        .or_else(|| wire.object_id.and_then(WireId::into_app_id))
        .ok_or(DecodeError::MissingField {
            index,
            field: "app_id",
        })?;
    let name = non_empty(wire.app_name).ok_or(DecodeError::MissingField {
        index,
        field: "app_name",
    })?;

    Ok(AppRecord {
        id,
        name,
        category: non_empty(wire.category),
        rating: wire.ratings,
        review_count: wire.num_reviews,
        description: non_empty(wire.description),
        image_url: non_empty(wire.app_image_url),
        source_url: non_empty(wire.source_url),
    })
}

fn metadata_u64(body: &Value, field: &'static str) -> Result<Option<u64>, DecodeError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or(DecodeError::InvalidMetadata(field)),
    }
}

fn reject_if_failed(body: &Value) -> Result<(), DecodeError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = error_message(body).unwrap_or_else(|| "request failed".to_string());
        return Err(DecodeError::Rejected(message));
    }
    Ok(())
}

/// Decodes the body of `GET /api/apps`.
pub fn decode_apps_page(body: &Value) -> Result<AppsPage, DecodeError> {
    if !body.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    reject_if_failed(body)?;

    let (field, container) = RECORD_CONTAINERS
        .iter()
        .find_map(|key| body.get(*key).map(|value| (*key, value)))
        .ok_or(DecodeError::MissingContainer(RECORD_CONTAINERS[0]))?;
    let items = container
        .as_array()
        .ok_or(DecodeError::MalformedContainer(field))?;

    let records = items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_record(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    let total = metadata_u64(body, "total")?;
    let total_pages = metadata_u64(body, "total_pages")?
        .map(|pages| u32::try_from(pages).map_err(|_| DecodeError::InvalidMetadata("total_pages")))
        .transpose()?;

    Ok(AppsPage {
        records,
        total,
        total_pages,
    })
}

/// Decodes the body of `GET /api/categories`. Null and blank entries are dropped.
pub fn decode_categories(body: &Value) -> Result<Vec<String>, DecodeError> {
    if !body.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    reject_if_failed(body)?;

    let items = body
        .get("categories")
        .ok_or(DecodeError::MissingContainer("categories"))?
        .as_array()
        .ok_or(DecodeError::MalformedContainer("categories"))?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect())
}

/// Decodes the body of `GET /api/apps/{id}`.
pub fn decode_app(body: &Value) -> Result<AppRecord, DecodeError> {
    if !body.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    reject_if_failed(body)?;
    decode_record(0, body)
}
