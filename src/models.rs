use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::LikeError;

// Numeric application id, kept as the literal the client sent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    /// Accepts only a non-empty run of ASCII digits.
    pub fn parse(raw: Option<&str>) -> Result<Self, LikeError> {
        match raw {
            Some(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Self(s.to_string()))
            }
            _ => Err(LikeError::InvalidAppId),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Per-app like counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRecord {
    pub count: u64,
    #[serde(rename = "first_like")]
    pub first_like_at: i64,
    #[serde(rename = "last_like")]
    pub last_like_at: i64,
}

impl LikeRecord {
    pub fn new(now: i64) -> Self {
        Self {
            count: 0,
            first_like_at: now,
            last_like_at: now,
        }
    }
}

// Per-IP throttling bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpThrottleState {
    #[serde(rename = "likes")]
    pub like_count: u64,
    #[serde(rename = "last_like")]
    pub last_like_at: i64,
}

/// Everything the counter store persists, read and rewritten as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikesData {
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub apps: BTreeMap<String, LikeRecord>,
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub ips: BTreeMap<String, IpThrottleState>,
    #[serde(default)]
    pub last_update: i64,
}

impl LikesData {
    pub fn new(now: i64) -> Self {
        Self {
            apps: BTreeMap::new(),
            ips: BTreeMap::new(),
            last_update: now,
        }
    }

    pub fn likes_for(&self, app_id: &AppId) -> u64 {
        self.apps.get(app_id.as_str()).map_or(0, |r| r.count)
    }

    pub fn throttle_state(&self, ip: &str) -> IpThrottleState {
        self.ips.get(ip).cloned().unwrap_or_default()
    }

    /// Counts one like from `ip` for `app_id` and returns the app's new total.
    pub fn record_like(&mut self, app_id: &AppId, ip: &str, now: i64) -> u64 {
        let record = self
            .apps
            .entry(app_id.to_string())
            .or_insert_with(|| LikeRecord::new(now));
        record.count += 1;
        record.last_like_at = now;
        let count = record.count;

        let throttle = self.ips.entry(ip.to_string()).or_default();
        throttle.like_count += 1;
        throttle.last_like_at = now;

        count
    }
}

// Older data files encode empty maps as `[]`
fn map_or_empty_list<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<V> {
        Map(BTreeMap<String, V>),
        List(Vec<serde_json::Value>),
    }

    match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => Ok(map),
        MapOrList::List(list) if list.is_empty() => Ok(BTreeMap::new()),
        MapOrList::List(_) => Err(serde::de::Error::custom(
            "expected an object keyed by id",
        )),
    }
}

// Query string shared by GET and POST
#[derive(Debug, Default)]
pub struct LikeQuery {
    pub action: Option<String>,
    pub app_id: Option<String>,
}

impl LikeQuery {
    /// Builds from decoded pairs; a repeated key keeps its last value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "action" => query.action = Some(value),
                "app_id" => query.app_id = Some(value),
                _ => {}
            }
        }
        query
    }
}

// Form body of a like submission, urlencoded or multipart
#[derive(Debug, Default)]
pub struct LikeForm {
    pub app_id: Option<String>,
    pub client_hash: Option<String>,
    pub timestamp: Option<String>,
}

impl LikeForm {
    // last value wins, as for the query
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "app_id" => form.app_id = Some(value),
                "client_hash" => form.client_hash = Some(value),
                "timestamp" => form.timestamp = Some(value),
                _ => {}
            }
        }
        form
    }
}

// A like as seen by the service, after HTTP extraction
#[derive(Debug, Clone)]
pub struct LikeSubmission {
    pub app_id: Option<String>,
    pub client_hash: Option<String>,
    pub client_timestamp: Option<String>,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub success: bool,
    pub app_id: String,
    pub likes: u64,
    pub message: String,
}

impl LikeResponse {
    pub fn new(app_id: &AppId, likes: u64, message: &str) -> Self {
        Self {
            success: true,
            app_id: app_id.to_string(),
            likes,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_id_accepts_only_digits() {
        assert_eq!(AppId::parse(Some("123")).unwrap().as_str(), "123");
        assert_eq!(AppId::parse(Some("0")).unwrap().as_str(), "0");

        for bad in ["", "abc", "12a", "-1", "1.5", " 12", "1e3", "+4"] {
            assert!(
                matches!(AppId::parse(Some(bad)), Err(LikeError::InvalidAppId)),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(AppId::parse(None), Err(LikeError::InvalidAppId)));
    }

    #[test]
    fn record_like_creates_and_increments() {
        let mut data = LikesData::new(100);
        let app = AppId::parse(Some("7")).unwrap();

        assert_eq!(data.record_like(&app, "1.2.3.4", 200), 1);
        assert_eq!(data.record_like(&app, "5.6.7.8", 300), 2);

        let record = &data.apps["7"];
        assert_eq!(record.first_like_at, 200);
        assert_eq!(record.last_like_at, 300);
        assert_eq!(data.throttle_state("1.2.3.4").like_count, 1);
        assert_eq!(data.throttle_state("5.6.7.8").last_like_at, 300);
        assert_eq!(data.throttle_state("9.9.9.9"), IpThrottleState::default());
    }

    #[test]
    fn reads_legacy_empty_arrays() {
        let raw = r#"{"apps": [], "ips": [], "last_update": 1700000000}"#;
        let data: LikesData = serde_json::from_str(raw).unwrap();
        assert!(data.apps.is_empty());
        assert!(data.ips.is_empty());
        assert_eq!(data.last_update, 1700000000);
    }

    #[test]
    fn repeated_keys_keep_last_value() {
        let pairs = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        };

        let query = LikeQuery::from_pairs(pairs(&[("app_id", "1"), ("action", "get"), ("app_id", "2")]));
        assert_eq!(query.app_id.as_deref(), Some("2"));
        assert_eq!(query.action.as_deref(), Some("get"));

        let form = LikeForm::from_pairs(pairs(&[("client_hash", "a"), ("other", "x"), ("client_hash", "b")]));
        assert_eq!(form.client_hash.as_deref(), Some("b"));
        assert!(form.app_id.is_none());
    }

    #[test]
    fn uses_persisted_field_names() {
        let mut data = LikesData::new(1);
        let app = AppId::parse(Some("42")).unwrap();
        data.record_like(&app, "8.8.8.8", 5);

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["apps"]["42"]["count"], 1);
        assert_eq!(json["apps"]["42"]["first_like"], 5);
        assert_eq!(json["ips"]["8.8.8.8"]["likes"], 1);
        assert_eq!(json["ips"]["8.8.8.8"]["last_like"], 5);
    }
}
