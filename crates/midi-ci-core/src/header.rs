//! Typed views of property exchange JSON headers.
//!
//! Parsing is lenient: missing or mistyped keys fall back to their defaults, and keys
//! we don't know about are kept in `extended`. The condensed form omits every field
//! that still holds its default value, which keeps headers small enough to fit in the
//! first chunk.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::encoding::Encoding;
use crate::error::Error;

pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Well-known `status` values.
pub mod status {
    /// Notify: the transaction is still being processed.
    pub const STILL_PROCESSING: i64 = 100;
    /// Notify: the transaction was terminated.
    pub const TERMINATE: i64 = 144;
    pub const OK: i64 = 200;
    /// The responder has too many transactions in flight, retry later.
    pub const RETRY: i64 = 343;
    pub const BAD_REQUEST: i64 = 400;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 1,
        }
    }
}

/// Header of a Get Data or Set Data inquiry.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRequestHeader {
    pub resource: String,
    pub res_id: String,
    pub media_type: String,
    pub mutual_encoding: Encoding,
    pub set_partial: bool,
    pub pagination: Option<Pagination>,
    pub extended: Map<String, Value>,
}

impl Default for PropertyRequestHeader {
    fn default() -> Self {
        Self {
            resource: String::new(),
            res_id: String::new(),
            media_type: DEFAULT_MEDIA_TYPE.to_owned(),
            mutual_encoding: Encoding::Ascii,
            set_partial: false,
            pagination: None,
            extended: Map::new(),
        }
    }
}

impl PropertyRequestHeader {
    const KEYS: &'static [&'static str] = &[
        "resource",
        "resId",
        "mediaType",
        "mutualEncoding",
        "setPartial",
        "offset",
        "limit",
    ];

    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let defaults = Pagination::default();
        let pagination = (value.get("offset").is_some() || value.get("limit").is_some())
            .then(|| Pagination {
                offset: get_i64(value, "offset").unwrap_or(defaults.offset),
                limit: get_i64(value, "limit").unwrap_or(defaults.limit),
            });

        Self {
            resource: get_string(value, "resource").unwrap_or_default(),
            res_id: get_string(value, "resId").unwrap_or_default(),
            media_type: get_media_type(value),
            mutual_encoding: get_encoding(value),
            set_partial: value
                .get("setPartial")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            pagination,
            extended: get_extended(value, Self::KEYS),
        }
    }

    pub fn to_value_condensed(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("resource".into(), self.resource.clone().into());

        if !self.res_id.is_empty() {
            obj.insert("resId".into(), self.res_id.clone().into());
        }
        insert_common(&mut obj, &self.media_type, self.mutual_encoding);
        if self.set_partial {
            obj.insert("setPartial".into(), true.into());
        }
        if let Some(pagination) = self.pagination {
            obj.insert("offset".into(), pagination.offset.into());
            obj.insert("limit".into(), pagination.limit.into());
        }

        extend_missing(&mut obj, &self.extended);
        Value::Object(obj)
    }
}

/// Header of a reply to any property exchange inquiry.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyReplyHeader {
    pub status: i64,
    pub message: Option<String>,
    pub mutual_encoding: Encoding,
    pub cache_time: i64,
    pub media_type: String,
    pub extended: Map<String, Value>,
}

impl Default for PropertyReplyHeader {
    fn default() -> Self {
        Self {
            status: status::OK,
            message: None,
            mutual_encoding: Encoding::Ascii,
            cache_time: 0,
            media_type: DEFAULT_MEDIA_TYPE.to_owned(),
            extended: Map::new(),
        }
    }
}

impl PropertyReplyHeader {
    const KEYS: &'static [&'static str] = &[
        "status",
        "message",
        "mutualEncoding",
        "cacheTime",
        "mediaType",
    ];

    pub fn with_status(status: i64) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> Self {
        Self {
            status: get_i64(value, "status").unwrap_or(status::OK),
            message: get_string(value, "message"),
            mutual_encoding: get_encoding(value),
            cache_time: get_i64(value, "cacheTime").unwrap_or(0),
            media_type: get_media_type(value),
            extended: get_extended(value, Self::KEYS),
        }
    }

    pub fn to_value_condensed(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("status".into(), self.status.into());

        if let Some(message) = &self.message {
            obj.insert("message".into(), message.clone().into());
        }
        if self.cache_time != 0 {
            obj.insert("cacheTime".into(), self.cache_time.into());
        }
        insert_common(&mut obj, &self.media_type, self.mutual_encoding);

        extend_missing(&mut obj, &self.extended);
        Value::Object(obj)
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropertySubscriptionCommand {
    #[default]
    Start,
    Partial,
    Full,
    Notify,
    End,
}

impl PropertySubscriptionCommand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Partial => "partial",
            Self::Full => "full",
            Self::Notify => "notify",
            Self::End => "end",
        }
    }
}

impl FromStr for PropertySubscriptionCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Start,
            Self::Partial,
            Self::Full,
            Self::Notify,
            Self::End,
        ]
        .into_iter()
        .find(|c| c.as_str() == s)
        .ok_or_else(|| Error::Malformed(format!("unknown subscription command '{s}'")))
    }
}

/// Header of a Subscription message.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySubscriptionHeader {
    pub resource: String,
    pub res_id: String,
    pub media_type: String,
    pub mutual_encoding: Encoding,
    pub command: PropertySubscriptionCommand,
    pub subscribe_id: String,
    pub extended: Map<String, Value>,
}

impl Default for PropertySubscriptionHeader {
    fn default() -> Self {
        Self {
            resource: String::new(),
            res_id: String::new(),
            media_type: DEFAULT_MEDIA_TYPE.to_owned(),
            mutual_encoding: Encoding::Ascii,
            command: PropertySubscriptionCommand::Start,
            subscribe_id: String::new(),
            extended: Map::new(),
        }
    }
}

impl PropertySubscriptionHeader {
    const KEYS: &'static [&'static str] = &[
        "resource",
        "resId",
        "mediaType",
        "mutualEncoding",
        "command",
        "subscribeId",
    ];

    pub fn from_value(value: &Value) -> Self {
        Self {
            resource: get_string(value, "resource").unwrap_or_default(),
            res_id: get_string(value, "resId").unwrap_or_default(),
            media_type: get_media_type(value),
            mutual_encoding: get_encoding(value),
            command: value
                .get("command")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            subscribe_id: get_string(value, "subscribeId").unwrap_or_default(),
            extended: get_extended(value, Self::KEYS),
        }
    }

    pub fn to_value_condensed(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("command".into(), self.command.as_str().into());

        if !self.resource.is_empty() {
            obj.insert("resource".into(), self.resource.clone().into());
        }
        if !self.subscribe_id.is_empty() {
            obj.insert("subscribeId".into(), self.subscribe_id.clone().into());
        }
        if !self.res_id.is_empty() {
            obj.insert("resId".into(), self.res_id.clone().into());
        }
        insert_common(&mut obj, &self.media_type, self.mutual_encoding);

        extend_missing(&mut obj, &self.extended);
        Value::Object(obj)
    }
}

fn get_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn get_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn get_media_type(value: &Value) -> String {
    get_string(value, "mediaType").unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_owned())
}

fn get_encoding(value: &Value) -> Encoding {
    value
        .get("mutualEncoding")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn get_extended(value: &Value, known: &[&str]) -> Map<String, Value> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(key, _)| !known.contains(&key.as_str()))
                .map(|(key, v)| (key.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn insert_common(obj: &mut Map<String, Value>, media_type: &str, encoding: Encoding) {
    if media_type != DEFAULT_MEDIA_TYPE {
        obj.insert("mediaType".into(), media_type.into());
    }
    if !encoding.is_ascii() {
        obj.insert("mutualEncoding".into(), encoding.as_str().into());
    }
}

fn extend_missing(obj: &mut Map<String, Value>, extended: &Map<String, Value>) {
    for (key, value) in extended {
        if !obj.contains_key(key) {
            obj.insert(key.clone(), value.clone());
        }
    }
}
