//! 오브젝트 조회 및 압축 해제
//!
//! [`ObjectRetriever`]는 오브젝트 전체를 읽고 gzip을 해제한 뒤
//! [`DecodedObject`]로 돌려줍니다. 해제가 끝나기 전에는 라인이 하나도
//! 노출되지 않으므로, 실패한 오브젝트에서 엔트리가 새어 나가지 않습니다.

use std::borrow::Cow;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;

use logferry_core::types::ObjectReference;

use crate::config::ShipperConfig;
use crate::error::LogShipperError;
use crate::store::ObjectStore;

/// 오브젝트 조회기
pub struct ObjectRetriever<S> {
    store: Arc<S>,
    fetch_timeout: Duration,
    max_object_bytes: u64,
    max_decompressed_bytes: u64,
}

impl<S> Clone for ObjectRetriever<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetch_timeout: self.fetch_timeout,
            max_object_bytes: self.max_object_bytes,
            max_decompressed_bytes: self.max_decompressed_bytes,
        }
    }
}

impl<S: ObjectStore> ObjectRetriever<S> {
    /// 스토어와 설정으로 조회기를 생성합니다.
    pub fn new(store: Arc<S>, config: &ShipperConfig) -> Self {
        Self {
            store,
            fetch_timeout: config.fetch_timeout(),
            max_object_bytes: config.max_object_bytes,
            max_decompressed_bytes: config.max_decompressed_bytes,
        }
    }

    /// 오브젝트를 읽고 압축을 해제합니다.
    ///
    /// 길이 0인 오브젝트는 라인이 없는 오브젝트로 취급합니다.
    ///
    /// # Errors
    /// - 조회 실패/타임아웃/크기 초과: `Retrieval`
    /// - gzip 형식 오류/해제 크기 초과: `Decompression`
    pub async fn fetch(
        &self,
        reference: &ObjectReference,
    ) -> Result<DecodedObject, LogShipperError> {
        let compressed = tokio::time::timeout(
            self.fetch_timeout,
            self.store.get_object(reference, self.max_object_bytes),
        )
        .await
        .map_err(|_| LogShipperError::Retrieval {
            bucket: reference.bucket.clone(),
            key: reference.key.clone(),
            reason: format!("timed out after {}s", self.fetch_timeout.as_secs()),
        })??;

        if compressed.is_empty() {
            return Ok(DecodedObject::default());
        }

        let key = reference.key.clone();
        let limit = self.max_decompressed_bytes;
        let data = tokio::task::spawn_blocking(move || gunzip(&compressed, limit, &key))
            .await
            .map_err(|e| LogShipperError::Decompression {
                key: reference.key.clone(),
                reason: format!("decompression task failed: {e}"),
            })??;

        tracing::debug!(
            object = %reference,
            bytes = data.len(),
            "object retrieved"
        );

        Ok(DecodedObject::new(data))
    }
}

/// 다중 멤버 gzip을 `limit` 바이트까지 해제합니다.
fn gunzip(compressed: &[u8], limit: u64, key: &str) -> Result<Bytes, LogShipperError> {
    let mut decoded = Vec::new();
    MultiGzDecoder::new(compressed)
        .take(limit.saturating_add(1))
        .read_to_end(&mut decoded)
        .map_err(|e| LogShipperError::Decompression {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

    if decoded.len() as u64 > limit {
        return Err(LogShipperError::Decompression {
            key: key.to_owned(),
            reason: format!("decompressed size exceeds {limit} bytes"),
        });
    }

    Ok(Bytes::from(decoded))
}

/// 압축 해제된 오브젝트 본문
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedObject {
    data: Bytes,
}

impl DecodedObject {
    /// 해제된 바이트로 생성합니다.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// 라인을 순서대로 반환합니다.
    ///
    /// `\n`으로 나누고 끝의 `\r`은 제거합니다. 마지막 개행 뒤에는 빈 라인을
    /// 만들지 않으며, 개행 없이 끝나는 마지막 라인은 유지합니다.
    /// 잘못된 UTF-8은 U+FFFD로 대체됩니다.
    pub fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> {
        let body = self.data.strip_suffix(b"\n").unwrap_or(&self.data[..]);
        let empty = self.data.is_empty();
        body.split(|b| *b == b'\n')
            .filter(move |_| !empty)
            .map(|line| String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line)))
    }

    /// 라인 수
    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// 해제된 바이트 수
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
