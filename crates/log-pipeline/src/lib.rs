#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`notification`]: 큐 메시지 본문(S3 이벤트 알림) 디코딩
//! - [`queue`]: 알림 큐 클라이언트 trait 및 SQS 구현
//! - [`store`]: 오브젝트 스토어 trait 및 S3 구현
//! - [`retriever`]: 오브젝트 조회, gzip 해제, 라인 분할
//! - [`parser`]: 우선순위 기반 라인 추출 규칙과 `Kernel` fallback
//! - [`rule`]: YAML 추출 규칙 파일 로더
//! - [`consumer`]: 메시지 단위 처리와 확인(ack) 규칙
//! - [`sink`]: 인덱싱 백엔드 전달 (재시도, dead letter)
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`stats`]: 처리 통계 카운터
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Queue -> NotificationConsumer -> mpsc -> ForwardingSink -> indexing backend
//!               |
//!   ObjectStore + gzip + LineParser
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod notification;
pub mod pipeline;
pub mod queue;
pub mod retriever;
pub mod sink;
pub mod stats;
pub mod store;

pub mod parser;
pub mod rule;

#[cfg(test)]
mod mock;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogShipper, LogShipperBuilder};

// 설정
pub use config::{AckMode, FailureAction, MalformedMessageAction, ShipperConfig, ShipperConfigBuilder};

// 에러
pub use error::LogShipperError;

// 알림
pub use notification::{NotificationEnvelope, NotificationRecord, decode_envelope};

// 큐 / 스토어 / 전달
pub use queue::{QueueClient, QueueMessage, SqsQueueClient};
pub use sink::{DeliveryOutcome, DocumentSink, ForwardingSink, HandoffItem, HttpDocumentSink};
pub use store::{ObjectStore, S3ObjectStore};

// 처리 단계
pub use consumer::{NotificationConsumer, PollSummary};
pub use retriever::{DecodedObject, ObjectRetriever};

// 파서 / 규칙
pub use parser::{LineParser, PatternRule};
pub use rule::{RuleDefinition, RuleLoader};

// 통계
pub use stats::{ShipperStats, StatsSnapshot};
