//! 오브젝트 스토어 클라이언트
//!
//! [`ObjectStore`] trait은 단일 오브젝트 전체 조회를 추상화합니다.
//! 운영 환경에서는 [`S3ObjectStore`]를 사용합니다.

use std::future::Future;

use aws_sdk_s3::error::DisplayErrorContext;
use bytes::{Bytes, BytesMut};

use logferry_core::types::ObjectReference;

use crate::error::LogShipperError;

/// 오브젝트 스토어 추상화
pub trait ObjectStore: Send + Sync + 'static {
    /// 오브젝트 본문 전체를 읽습니다.
    ///
    /// # Errors
    /// 조회 실패 또는 `max_bytes` 초과 시 `Retrieval`
    fn get_object(
        &self,
        reference: &ObjectReference,
        max_bytes: u64,
    ) -> impl Future<Output = Result<Bytes, LogShipperError>> + Send;
}

/// S3 기반 오브젝트 스토어
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// 설정된 SDK 클라이언트로 생성합니다.
    ///
    /// 커스텀 endpoint/path-style 주소 지정은 클라이언트 설정에서 처리합니다.
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

fn retrieval(reference: &ObjectReference, reason: String) -> LogShipperError {
    LogShipperError::Retrieval {
        bucket: reference.bucket.clone(),
        key: reference.key.clone(),
        reason,
    }
}

fn too_large(reference: &ObjectReference, size: u64, max_bytes: u64) -> LogShipperError {
    retrieval(
        reference,
        format!("object too large: {size} bytes (max: {max_bytes})"),
    )
}

impl ObjectStore for S3ObjectStore {
    async fn get_object(
        &self,
        reference: &ObjectReference,
        max_bytes: u64,
    ) -> Result<Bytes, LogShipperError> {
        let output = self
            .client
            .get_object()
            .bucket(&reference.bucket)
            .key(&reference.key)
            .send()
            .await
            .map_err(|e| retrieval(reference, DisplayErrorContext(&e).to_string()))?;

        let declared = output
            .content_length()
            .and_then(|l| u64::try_from(l).ok())
            .unwrap_or(0);
        if declared > max_bytes {
            return Err(too_large(reference, declared, max_bytes));
        }

        let mut body = output.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| retrieval(reference, format!("body read failed: {e}")))?
        {
            let size = (buffer.len() + chunk.len()) as u64;
            if size > max_bytes {
                return Err(too_large(reference, size, max_bytes));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer.freeze())
    }
}
