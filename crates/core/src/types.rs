//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 알림 큐, 오브젝트 스토어, 인덱싱 백엔드 사이를 오가는 데이터 구조를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 구조화 패턴에 매칭된 라인의 프로그램 이름
pub const PROGRAM_CONNECT: &str = "Connect";
/// 어떤 규칙에도 매칭되지 않은 라인의 프로그램 이름
pub const PROGRAM_KERNEL: &str = "Kernel";

/// 오브젝트 스토어의 오브젝트 식별자
///
/// 알림 레코드에서 파생되며 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    /// 버킷 이름
    pub bucket: String,
    /// 오브젝트 키 (URL 디코딩 완료)
    pub key: String,
}

impl ObjectReference {
    /// 새 오브젝트 참조를 생성합니다.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// 키 경로에서 날짜/상관 ID를 추출합니다.
    ///
    /// 키는 `<date>/<correlationId>/...` 형식이어야 합니다.
    /// 세그먼트가 2개 미만이거나 앞의 두 세그먼트 중 하나가 비어 있으면 `None`.
    pub fn origin(&self) -> Option<ObjectOrigin> {
        let mut segments = self.key.split('/');
        let date = segments.next().filter(|s| !s.is_empty())?;
        let correlation_id = segments.next().filter(|s| !s.is_empty())?;

        Some(ObjectOrigin {
            date: date.to_owned(),
            correlation_id: correlation_id.to_owned(),
            location: self.key.clone(),
        })
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// 오브젝트 키에서 파생된 출처 정보
///
/// 같은 오브젝트에서 나온 모든 `LogEntry`는 동일한 출처를 공유합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOrigin {
    /// 키의 첫 번째 세그먼트 (날짜)
    pub date: String,
    /// 키의 두 번째 세그먼트 (상관 ID)
    pub correlation_id: String,
    /// 전체 오브젝트 키
    pub location: String,
}

/// 인덱싱 백엔드로 전송되는 로그 엔트리
///
/// 입력 라인 하나당 정확히 하나가 생성되며, 생성 후 변경되지 않고
/// 싱크에서 정확히 한 번 소비됩니다. JSON 필드명은 인덱스 스키마를 따릅니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogEntry {
    /// `<origin date>T<time>`
    pub date: String,
    /// 파싱된 시각 (매칭 실패 시 빈 문자열)
    pub time: String,
    /// 오브젝트 키의 상관 ID
    #[serde(rename = "Uuid")]
    pub correlation_id: String,
    /// 오브젝트 키 전체
    #[serde(rename = "LogLocation")]
    pub source_location: String,
    /// 매칭된 규칙의 프로그램 이름 (`Connect` / `Kernel` 등)
    pub program: String,
    /// 퍼실리티
    pub facility: String,
    /// 레벨 코드
    pub level: String,
    /// 메시지 본문
    pub message: String,
    /// 수정되지 않은 원본 라인
    #[serde(rename = "FullLogline")]
    pub raw_line: String,
}

impl LogEntry {
    /// 오브젝트 출처 정보를 붙인 엔트리를 반환합니다.
    ///
    /// 날짜는 출처 날짜와 파싱된 시각을 `T`로 이어 붙입니다.
    /// 시각이 비어 있으면 `2024-01-01T`처럼 끝납니다.
    pub fn with_origin(mut self, origin: &ObjectOrigin) -> Self {
        self.date = format!("{}T{}", origin.date, self.time);
        self.correlation_id.clone_from(&origin.correlation_id);
        self.source_location.clone_from(&origin.location);
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.program, self.correlation_id, self.facility, self.raw_line,
        )
    }
}

/// 큐 메시지 확인(삭제)용 토큰
///
/// 메시지 하나에 묶인 receipt handle입니다. `Clone`을 구현하지 않으며
/// 확인 호출에서 값으로 소비되므로 재사용할 수 없습니다.
#[derive(Debug, PartialEq, Eq)]
pub struct AckToken(String);

impl AckToken {
    /// receipt handle로 토큰을 생성합니다.
    pub fn new(receipt_handle: impl Into<String>) -> Self {
        Self(receipt_handle.into())
    }

    /// receipt handle 문자열을 반환합니다.
    pub fn receipt_handle(&self) -> &str {
        &self.0
    }

    /// 토큰을 소비하여 receipt handle을 꺼냅니다.
    pub fn into_receipt_handle(self) -> String {
        self.0
    }
}
