use crate::error::{CollectError, Result};
use serde::{Deserialize, Serialize};

/// Metric kind, the discriminant of [`MetricValue`].
///
/// # Examples
///
/// ```
/// use metrix_common::types::MetricKind;
///
/// let kind: MetricKind = "counter".parse().unwrap();
/// assert_eq!(kind, MetricKind::Counter);
/// assert_eq!(MetricKind::Gauge.to_string(), "gauge");
/// assert!("histogram".parse::<MetricKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = CollectError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(CollectError::UnsupportedKind(other.to_string())),
        }
    }
}

/// The payload of a metric. A counter carries an increment, a gauge a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(i64),
    Gauge(f64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Counter(delta) => write!(f, "{delta}"),
            MetricValue::Gauge(value) => write!(f, "{value}"),
        }
    }
}

/// A single named metric.
///
/// Serializes through [`Metrics`], so the JSON form is the wire format:
///
/// ```
/// use metrix_common::types::MetricRecord;
///
/// let record = MetricRecord::counter("PollCount", 3);
/// let json = serde_json::to_string(&record).unwrap();
/// assert_eq!(json, r#"{"id":"PollCount","type":"counter","delta":3}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Metrics", into = "Metrics")]
pub struct MetricRecord {
    pub id: String,
    pub value: MetricValue,
}

impl MetricRecord {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(delta),
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(value),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Checks the invariants every stored record must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::InvalidArgument`] for an empty id, a negative
    /// delta, or a negative or non-finite gauge value.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CollectError::InvalidArgument("metric id is empty".to_string()));
        }
        match self.value {
            MetricValue::Counter(delta) if delta < 0 => Err(CollectError::InvalidArgument(
                format!("counter '{}' has negative delta {delta}", self.id),
            )),
            MetricValue::Gauge(value) if !value.is_finite() => Err(CollectError::InvalidArgument(
                format!("gauge '{}' has non-finite value", self.id),
            )),
            MetricValue::Gauge(value) if value < 0.0 => Err(CollectError::InvalidArgument(
                format!("gauge '{}' has negative value {value}", self.id),
            )),
            _ => Ok(()),
        }
    }
}

/// Wire representation of a metric, as sent by the agent and echoed by the server.
///
/// `delta` is present only for counters, `value` only for gauges. Lookups
/// (`POST /value/`) send only `id` and `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub id: String,
    #[serde(rename = "type")]
    pub mtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl TryFrom<Metrics> for MetricRecord {
    type Error = CollectError;

    fn try_from(wire: Metrics) -> Result<Self> {
        let kind: MetricKind = wire.mtype.parse()?;
        let value = match (kind, wire.delta, wire.value) {
            (MetricKind::Counter, Some(delta), None) => MetricValue::Counter(delta),
            (MetricKind::Gauge, None, Some(value)) => MetricValue::Gauge(value),
            (MetricKind::Counter, _, _) => {
                return Err(CollectError::InvalidArgument(format!(
                    "counter '{}' must carry exactly a delta",
                    wire.id
                )))
            }
            (MetricKind::Gauge, _, _) => {
                return Err(CollectError::InvalidArgument(format!(
                    "gauge '{}' must carry exactly a value",
                    wire.id
                )))
            }
        };
        Ok(MetricRecord { id: wire.id, value })
    }
}

impl From<MetricRecord> for Metrics {
    fn from(record: MetricRecord) -> Self {
        let (delta, value) = match record.value {
            MetricValue::Counter(delta) => (Some(delta), None),
            MetricValue::Gauge(value) => (None, Some(value)),
        };
        Metrics {
            id: record.id,
            mtype: record.value.kind().to_string(),
            delta,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_without_payload_is_rejected() {
        let wire = Metrics {
            id: "hits".to_string(),
            mtype: "counter".to_string(),
            delta: None,
            value: Some(1.0),
        };
        let err = MetricRecord::try_from(wire).unwrap_err();
        assert!(matches!(err, CollectError::InvalidArgument(_)));
    }

    #[test]
    fn wire_with_unknown_type_is_unsupported() {
        let err = serde_json::from_str::<MetricRecord>(r#"{"id":"x","type":"histogram","value":1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("histogram"));

        let wire = Metrics {
            id: "x".to_string(),
            mtype: "histogram".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MetricRecord::try_from(wire),
            Err(CollectError::UnsupportedKind(kind)) if kind == "histogram"
        ));
    }

    #[test]
    fn gauge_serializes_without_delta() {
        let json = serde_json::to_string(&MetricRecord::gauge("temp", 12.5)).unwrap();
        assert_eq!(json, r#"{"id":"temp","type":"gauge","value":12.5}"#);
    }

    #[test]
    fn validate_rejects_negative_and_non_finite() {
        assert!(MetricRecord::counter("c", -1).validate().is_err());
        assert!(MetricRecord::gauge("g", -0.5).validate().is_err());
        assert!(MetricRecord::gauge("g", f64::NAN).validate().is_err());
        assert!(MetricRecord::gauge("g", f64::INFINITY).validate().is_err());
        assert!(MetricRecord::gauge("", 1.0).validate().is_err());
        assert!(MetricRecord::gauge("g", 0.0).validate().is_ok());
        assert!(MetricRecord::counter("c", 0).validate().is_ok());
    }

    #[test]
    fn value_display_matches_plain_text_format() {
        assert_eq!(MetricValue::Counter(8).to_string(), "8");
        assert_eq!(MetricValue::Gauge(12.5).to_string(), "12.5");
        assert_eq!(MetricValue::Gauge(3.0).to_string(), "3");
    }
}
