//! 알림 envelope 디코딩
//!
//! 큐 메시지 본문은 S3 이벤트 알림 JSON입니다.
//!
//! ```text
//! {"Records":[{"EventVersion","EventTime","EventName",
//!              "S3":{"S3SchemaVersion","Bucket":{"Name","Arn"},"Object":{"Key"}}}]}
//! ```
//!
//! - 실제 S3가 보내는 camelCase 표기(`eventName`, `s3.bucket.name`)도 받습니다.
//! - SNS `{"Type":"Notification","Message":"<json>"}` 프레임은 벗겨냅니다.
//! - `Records`가 없는 envelope(`s3:TestEvent` 등)은 레코드 0개로 디코딩됩니다.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use logferry_core::types::ObjectReference;

use crate::error::LogShipperError;

/// 큐 메시지 하나에 대응하는 레코드 묶음
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// 레코드 목록
    #[serde(rename = "Records", alias = "records", default)]
    pub records: Vec<NotificationRecord>,
}

/// 오브젝트 이벤트 레코드
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// 이벤트 버전
    #[serde(rename = "EventVersion", alias = "eventVersion", default)]
    pub event_version: String,
    /// 이벤트 발생 시각 (RFC 3339)
    #[serde(rename = "EventTime", alias = "eventTime", default)]
    pub event_time: String,
    /// 이벤트 이름 (예: `ObjectCreated:Put`)
    #[serde(rename = "EventName", alias = "eventName", default)]
    pub event_name: String,
    /// S3 엔티티
    #[serde(rename = "S3", alias = "s3")]
    pub s3: S3Entity,
}

/// 레코드의 S3 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    /// 스키마 버전
    #[serde(rename = "S3SchemaVersion", alias = "s3SchemaVersion", default)]
    pub schema_version: String,
    /// 버킷
    #[serde(rename = "Bucket", alias = "bucket")]
    pub bucket: BucketEntity,
    /// 오브젝트
    #[serde(rename = "Object", alias = "object")]
    pub object: ObjectEntity,
}

/// 버킷 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntity {
    /// 버킷 이름
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    /// 버킷 ARN
    #[serde(rename = "Arn", alias = "arn", default)]
    pub arn: String,
}

/// 오브젝트 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntity {
    /// URL 인코딩된 오브젝트 키
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
    /// 오브젝트 크기 (바이트)
    #[serde(rename = "Size", alias = "size", default)]
    pub size: Option<u64>,
}

impl NotificationRecord {
    /// 삭제 이벤트인지 확인합니다.
    pub fn is_removal(&self) -> bool {
        self.event_name
            .trim_start_matches("s3:")
            .starts_with("ObjectRemoved")
    }

    /// URL 디코딩된 키로 오브젝트 참조를 생성합니다.
    ///
    /// # Errors
    /// 버킷/키가 비어 있거나 디코딩 결과가 UTF-8이 아니면 `MalformedKey`
    pub fn object_reference(&self) -> Result<ObjectReference, LogShipperError> {
        let raw_key = &self.s3.object.key;
        if self.s3.bucket.name.is_empty() {
            return Err(LogShipperError::MalformedKey {
                key: raw_key.clone(),
                reason: "bucket name is empty".to_owned(),
            });
        }

        let key = decode_key(raw_key)?;
        if key.is_empty() {
            return Err(LogShipperError::MalformedKey {
                key: raw_key.clone(),
                reason: "object key is empty".to_owned(),
            });
        }

        Ok(ObjectReference::new(self.s3.bucket.name.clone(), key))
    }

    /// 이벤트 발생 시각을 파싱합니다.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.event_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// 이벤트 발생부터 지금까지의 지연 (밀리초)
    pub fn lag_ms(&self) -> Option<i64> {
        self.event_time()
            .map(|t| Utc::now().signed_duration_since(t).num_milliseconds())
    }
}

/// S3 이벤트 키를 디코딩합니다 (`+` → 공백, `%XX` → 바이트).
pub fn decode_key(raw_key: &str) -> Result<String, LogShipperError> {
    let spaced = raw_key.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|e| LogShipperError::MalformedKey {
            key: raw_key.to_owned(),
            reason: format!("key is not valid UTF-8 after decoding: {e}"),
        })
}

/// 메시지 본문을 envelope로 디코딩합니다.
///
/// # Errors
/// JSON이 아니거나 레코드 스키마가 맞지 않으면 `EnvelopeDecode`
pub fn decode_envelope(body: &str) -> Result<NotificationEnvelope, LogShipperError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| LogShipperError::EnvelopeDecode(format!("invalid JSON: {e}")))?;

    let value = match sns_message(&value) {
        Some(inner) => serde_json::from_str(inner).map_err(|e| {
            LogShipperError::EnvelopeDecode(format!("invalid JSON in SNS message: {e}"))
        })?,
        None => value,
    };

    if !value.is_object() {
        return Err(LogShipperError::EnvelopeDecode(
            "envelope must be a JSON object".to_owned(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| LogShipperError::EnvelopeDecode(format!("unexpected envelope shape: {e}")))
}

fn sns_message(value: &Value) -> Option<&str> {
    if value.get("Type")?.as_str()? != "Notification" {
        return None;
    }
    value.get("Message")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASCAL_BODY: &str = r#"{
        "Records": [{
            "EventVersion": "2.1",
            "EventTime": "2024-01-01T00:00:05.000Z",
            "EventName": "ObjectCreated:Put",
            "S3": {
                "S3SchemaVersion": "1.0",
                "Bucket": {"Name": "logs", "Arn": "arn:aws:s3:::logs"},
                "Object": {"Key": "2024-01-01/abc-123/app.log.gz"}
            }
        }]
    }"#;

    const CAMEL_BODY: &str = r#"{
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "awsRegion": "us-east-1",
            "eventTime": "2024-01-01T00:00:05.000Z",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "logs-created",
                "bucket": {"name": "logs", "arn": "arn:aws:s3:::logs"},
                "object": {"key": "2024-01-01/abc+123/my%20app.log.gz", "size": 1024}
            }
        }]
    }"#;

    #[test]
    fn decodes_pascal_case_envelope() {
        let envelope = decode_envelope(PASCAL_BODY).unwrap();
        assert_eq!(envelope.records.len(), 1);
        let record = &envelope.records[0];
        assert_eq!(record.event_name, "ObjectCreated:Put");
        assert_eq!(record.s3.bucket.arn, "arn:aws:s3:::logs");

        let reference = record.object_reference().unwrap();
        assert_eq!(reference.bucket, "logs");
        assert_eq!(reference.key, "2024-01-01/abc-123/app.log.gz");
    }

    #[test]
    fn decodes_camel_case_envelope_and_url_decodes_key() {
        let envelope = decode_envelope(CAMEL_BODY).unwrap();
        let record = &envelope.records[0];
        assert_eq!(record.s3.object.size, Some(1024));
        let reference = record.object_reference().unwrap();
        assert_eq!(reference.key, "2024-01-01/abc 123/my app.log.gz");
    }

    #[test]
    fn unwraps_sns_notification() {
        let wrapped = serde_json::json!({
            "Type": "Notification",
            "MessageId": "m-1",
            "Message": PASCAL_BODY,
        })
        .to_string();
        let envelope = decode_envelope(&wrapped).unwrap();
        assert_eq!(envelope.records.len(), 1);
    }

    #[test]
    fn test_event_has_no_records() {
        let body = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"logs"}"#;
        let envelope = decode_envelope(body).unwrap();
        assert!(envelope.records.is_empty());
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let err = decode_envelope("not json at all").unwrap_err();
        assert!(matches!(err, LogShipperError::EnvelopeDecode(_)));
    }

    #[test]
    fn non_object_is_decode_error() {
        let err = decode_envelope("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, LogShipperError::EnvelopeDecode(_)));
    }

    #[test]
    fn record_without_bucket_is_decode_error() {
        let body = r#"{"Records":[{"EventName":"ObjectCreated:Put","S3":{"Object":{"Key":"a/b"}}}]}"#;
        let err = decode_envelope(body).unwrap_err();
        assert!(matches!(err, LogShipperError::EnvelopeDecode(_)));
    }

    #[test]
    fn removal_events_are_detected() {
        let record = NotificationRecord {
            event_name: "ObjectRemoved:Delete".to_owned(),
            ..Default::default()
        };
        assert!(record.is_removal());

        let record = NotificationRecord {
            event_name: "s3:ObjectRemoved:DeleteMarkerCreated".to_owned(),
            ..Default::default()
        };
        assert!(record.is_removal());

        let record = NotificationRecord {
            event_name: "ObjectCreated:CompleteMultipartUpload".to_owned(),
            ..Default::default()
        };
        assert!(!record.is_removal());
    }

    #[test]
    fn invalid_utf8_key_is_malformed() {
        let err = decode_key("2024-01-01/%FF%FE/x.gz").unwrap_err();
        assert!(matches!(err, LogShipperError::MalformedKey { .. }));
    }

    #[test]
    fn empty_bucket_is_malformed() {
        let mut record = decode_envelope(PASCAL_BODY).unwrap().records.remove(0);
        record.s3.bucket.name.clear();
        assert!(matches!(
            record.object_reference(),
            Err(LogShipperError::MalformedKey { .. })
        ));
    }

    #[test]
    fn event_time_and_lag() {
        let record = &decode_envelope(PASCAL_BODY).unwrap().records[0];
        let time = record.event_time().unwrap();
        assert_eq!(time.to_rfc3339(), "2024-01-01T00:00:05+00:00");
        assert!(record.lag_ms().unwrap() > 0);

        let record = NotificationRecord::default();
        assert!(record.event_time().is_none());
        assert!(record.lag_ms().is_none());
    }
}
