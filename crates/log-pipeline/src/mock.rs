//! 테스트용 mock 구현
//!
//! 큐/오브젝트 스토어/문서 전송 trait의 인메모리 구현입니다.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;

use logferry_core::types::{AckToken, LogEntry, ObjectReference, PROGRAM_CONNECT};

use crate::error::LogShipperError;
use crate::queue::{QueueClient, QueueMessage};
use crate::sink::DocumentSink;
use crate::store::ObjectStore;

/// 빈 큐에서 long polling을 흉내 내는 대기 시간
const EMPTY_RECEIVE_DELAY: Duration = Duration::from_millis(10);

/// 데이터를 gzip으로 압축합니다.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// 테스트용 엔트리
pub fn sample_entry(raw_line: &str) -> LogEntry {
    LogEntry {
        date: "2024-01-01T12:34:56".to_owned(),
        time: "12:34:56".to_owned(),
        correlation_id: "abc-123".to_owned(),
        source_location: "2024-01-01/abc-123/app.log.gz".to_owned(),
        program: PROGRAM_CONNECT.to_owned(),
        facility: "Auth".to_owned(),
        level: "E".to_owned(),
        message: raw_line.to_owned(),
        raw_line: raw_line.to_owned(),
    }
}

/// 단일 레코드 알림 본문을 만듭니다.
pub fn notification_body(bucket: &str, key: &str) -> String {
    notification_body_multi(bucket, &[key])
}

/// 키마다 레코드 하나씩, 순서대로 담은 알림 본문을 만듭니다.
pub fn notification_body_multi(bucket: &str, keys: &[&str]) -> String {
    let records: Vec<_> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "EventVersion": "2.1",
                "EventTime": "2024-01-01T00:00:05.000Z",
                "EventName": "ObjectCreated:Put",
                "S3": {
                    "S3SchemaVersion": "1.0",
                    "Bucket": {"Name": bucket, "Arn": format!("arn:aws:s3:::{bucket}")},
                    "Object": {"Key": key}
                }
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}

type ReceiveScript = Result<Vec<(String, String)>, String>;

/// mock 큐
///
/// 수신 결과를 순서대로 돌려주고, 스크립트가 끝나면 빈 목록을 반환합니다.
/// receipt handle은 `rh-<message_id>` 형식입니다.
#[derive(Default)]
pub struct MockQueueClient {
    script: Mutex<VecDeque<ReceiveScript>>,
    acked: Mutex<Vec<String>>,
    fail_deletes: bool,
    stall_deletes: bool,
}

impl MockQueueClient {
    /// 빈 큐를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 한 번의 수신에서 돌려줄 메시지 묶음을 추가합니다.
    pub fn with_batch(self, messages: Vec<(&str, String)>) -> Self {
        let batch = messages
            .into_iter()
            .map(|(id, body)| (id.to_owned(), body))
            .collect();
        self.script.lock().unwrap().push_back(Ok(batch));
        self
    }

    /// 수신 실패를 추가합니다.
    pub fn with_receive_error(self, reason: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(reason.to_owned()));
        self
    }

    /// 삭제 호출이 실패하도록 설정합니다.
    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    /// 삭제 호출이 끝나지 않도록 설정합니다.
    pub fn with_stalled_deletes(mut self) -> Self {
        self.stall_deletes = true;
        self
    }

    /// 확인된 메시지 ID 목록
    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }
}

impl QueueClient for MockQueueClient {
    async fn receive(
        &self,
        max_messages: u32,
        _wait_time_secs: u32,
    ) -> Result<Vec<QueueMessage>, LogShipperError> {
        let next = self.script.lock().unwrap().pop_front();
        let Some(next) = next else {
            tokio::time::sleep(EMPTY_RECEIVE_DELAY).await;
            return Ok(Vec::new());
        };

        let batch = next.map_err(LogShipperError::Queue)?;
        Ok(batch
            .into_iter()
            .take(max_messages as usize)
            .map(|(message_id, body)| QueueMessage {
                ack_token: AckToken::new(format!("rh-{message_id}")),
                message_id,
                body,
            })
            .collect())
    }

    async fn delete(&self, token: AckToken) -> Result<(), LogShipperError> {
        if self.fail_deletes {
            return Err(LogShipperError::Queue("mock delete failure".to_owned()));
        }
        if self.stall_deletes {
            std::future::pending::<()>().await;
        }
        let handle = token.into_receipt_handle();
        let id = handle.strip_prefix("rh-").unwrap_or(&handle).to_owned();
        self.acked.lock().unwrap().push(id);
        Ok(())
    }
}

/// mock 오브젝트 스토어
#[derive(Default)]
pub struct MockObjectStore {
    objects: HashMap<ObjectReference, Bytes>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MockObjectStore {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 오브젝트를 추가합니다.
    pub fn with_object(mut self, reference: ObjectReference, data: Vec<u8>) -> Self {
        self.objects.insert(reference, Bytes::from(data));
        self
    }

    /// 조회마다 지연을 추가합니다.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 총 조회 수
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MockObjectStore {
    async fn get_object(
        &self,
        reference: &ObjectReference,
        max_bytes: u64,
    ) -> Result<Bytes, LogShipperError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let data = self
            .objects
            .get(reference)
            .cloned()
            .ok_or_else(|| LogShipperError::Retrieval {
                bucket: reference.bucket.clone(),
                key: reference.key.clone(),
                reason: "NoSuchKey".to_owned(),
            })?;

        if data.len() as u64 > max_bytes {
            return Err(LogShipperError::Retrieval {
                bucket: reference.bucket.clone(),
                key: reference.key.clone(),
                reason: format!("object too large: {} bytes", data.len()),
            });
        }

        Ok(data)
    }
}

/// mock 문서 전송
///
/// 실패 스크립트(`None`은 전송 계층 실패)를 소진한 뒤에는 성공합니다.
#[derive(Default)]
pub struct MockDocumentSink {
    delivered: Mutex<Vec<LogEntry>>,
    failures: Mutex<VecDeque<Option<u16>>>,
    permanent_failure: Option<u16>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockDocumentSink {
    /// 항상 성공하는 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 앞선 호출들이 순서대로 실패하도록 설정합니다.
    pub fn with_failures(self, statuses: impl IntoIterator<Item = Option<u16>>) -> Self {
        self.failures.lock().unwrap().extend(statuses);
        self
    }

    /// 모든 호출이 주어진 상태로 실패하도록 설정합니다.
    pub fn with_permanent_failure(mut self, status: u16) -> Self {
        self.permanent_failure = Some(status);
        self
    }

    /// 호출마다 지연을 추가합니다.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 수락된 엔트리 목록
    pub fn delivered(&self) -> Vec<LogEntry> {
        self.delivered.lock().unwrap().clone()
    }

    /// 총 호출 수
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentSink for MockDocumentSink {
    async fn send(&self, entry: &LogEntry) -> Result<(), LogShipperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.failures.lock().unwrap().pop_front();
        if let Some(status) = scripted.or(self.permanent_failure.map(Some)) {
            return Err(LogShipperError::Delivery {
                status,
                reason: "mock failure".to_owned(),
            });
        }

        self.delivered.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
