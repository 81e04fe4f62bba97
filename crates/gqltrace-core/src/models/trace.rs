//! 실행 트레이스 모델.
//!
//! GraphQL 연산 하나의 실행 기록. protobuf 와이어 포맷으로 직렬화되며,
//! 인코딩 전에 반드시 [`Trace::validate`]를 통과해야 한다.

use chrono::{DateTime, Utc};
use prost::Message;
use prost_types::Timestamp;

use crate::error::CoreError;

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// 연산 하나의 실행 트레이스
#[derive(Clone, PartialEq, Message)]
pub struct Trace {
    /// 실행 시작 시각
    #[prost(message, optional, tag = "4")]
    pub start_time: Option<Timestamp>,
    /// 실행 종료 시각
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<Timestamp>,
    /// 총 소요 시간 (나노초)
    #[prost(uint64, tag = "11")]
    pub duration_ns: u64,
    /// 리졸버 트리 루트
    #[prost(message, optional, tag = "14")]
    pub root: Option<trace::Node>,
    /// 클라이언트 이름 (apollographql-client-name 등)
    #[prost(string, tag = "7")]
    pub client_name: String,
    /// 클라이언트 버전
    #[prost(string, tag = "8")]
    pub client_version: String,
    /// HTTP 요청 정보
    #[prost(message, optional, tag = "10")]
    pub http: Option<trace::Http>,
    /// 전체 쿼리 캐시 적중 여부
    #[prost(bool, tag = "16")]
    pub full_query_cache_hit: bool,
}

/// 트레이스 하위 메시지
pub mod trace {
    use prost::Message;

    /// 리졸버 트리 노드
    #[derive(Clone, PartialEq, Message)]
    pub struct Node {
        /// 응답 필드 이름 또는 리스트 인덱스
        #[prost(oneof = "node::Id", tags = "1, 2")]
        pub id: Option<node::Id>,
        /// 별칭 적용 전 원래 필드 이름
        #[prost(string, tag = "14")]
        pub original_field_name: String,
        /// 필드 반환 타입 (예: "[User!]")
        #[prost(string, tag = "3")]
        pub r#type: String,
        /// 부모 타입 이름
        #[prost(string, tag = "13")]
        pub parent_type: String,
        /// 리졸버 에러
        #[prost(message, repeated, tag = "11")]
        pub error: Vec<Error>,
        /// 자식 노드
        #[prost(message, repeated, tag = "12")]
        pub child: Vec<Node>,
        /// 트레이스 시작 기준 상대 시작 시각 (나노초)
        #[prost(uint64, tag = "8")]
        pub start_time: u64,
        /// 트레이스 시작 기준 상대 종료 시각 (나노초)
        #[prost(uint64, tag = "9")]
        pub end_time: u64,
    }

    /// 노드 식별자
    pub mod node {
        /// 필드 이름 또는 리스트 인덱스
        #[derive(Clone, PartialEq, Eq, Hash, prost::Oneof)]
        pub enum Id {
            /// 응답 필드 이름
            #[prost(string, tag = "1")]
            ResponseName(String),
            /// 리스트 요소 인덱스
            #[prost(uint32, tag = "2")]
            Index(u32),
        }
    }

    /// 리졸버 에러
    #[derive(Clone, PartialEq, Message)]
    pub struct Error {
        /// 에러 메시지
        #[prost(string, tag = "1")]
        pub message: String,
        /// 원본 에러 JSON
        #[prost(string, tag = "4")]
        pub json: String,
    }

    /// HTTP 요청 정보
    #[derive(Clone, PartialEq, Message)]
    pub struct Http {
        /// 요청 메서드 ("GET", "POST" ...)
        #[prost(string, tag = "1")]
        pub method: String,
        /// 응답 상태 코드
        #[prost(uint32, tag = "6")]
        pub status_code: u32,
    }

    impl Node {
        /// 응답 필드 이름으로 노드 생성
        pub fn field(response_name: &str, r#type: &str, start_ns: u64, end_ns: u64) -> Self {
            Self {
                id: Some(node::Id::ResponseName(response_name.to_string())),
                r#type: r#type.to_string(),
                start_time: start_ns,
                end_time: end_ns,
                ..Default::default()
            }
        }
    }
}

/// chrono 시각 → protobuf Timestamp
pub fn to_timestamp(time: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

impl Trace {
    /// 시작/종료 시각으로 트레이스 생성 (소요 시간 자동 계산)
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let duration_ns = (end - start)
            .num_nanoseconds()
            .map(|ns| ns.max(0) as u64)
            .unwrap_or(0);
        Self {
            start_time: Some(to_timestamp(start)),
            end_time: Some(to_timestamp(end)),
            duration_ns,
            ..Default::default()
        }
    }

    /// 구조 검증
    ///
    /// 시각 누락, 범위를 벗어난 nanos, 역전된 시간, 빈 에러 메시지를 거부한다.
    pub fn validate(&self) -> Result<(), CoreError> {
        let start = self
            .start_time
            .as_ref()
            .ok_or_else(|| CoreError::Encoding("trace.start_time 누락".to_string()))?;
        let end = self
            .end_time
            .as_ref()
            .ok_or_else(|| CoreError::Encoding("trace.end_time 누락".to_string()))?;

        validate_timestamp("trace.start_time", start)?;
        validate_timestamp("trace.end_time", end)?;

        if (end.seconds, end.nanos) < (start.seconds, start.nanos) {
            return Err(CoreError::Encoding(
                "trace.end_time이 start_time보다 이전".to_string(),
            ));
        }

        if let Some(root) = &self.root {
            validate_node(root, "root")?;
        }
        Ok(())
    }

    /// 검증 후 와이어 포맷으로 직렬화
    pub fn encode_validated(&self) -> Result<Vec<u8>, CoreError> {
        self.validate()?;
        Ok(self.encode_to_vec())
    }
}

fn validate_timestamp(field: &str, ts: &Timestamp) -> Result<(), CoreError> {
    if !(0..NANOS_PER_SECOND).contains(&ts.nanos) {
        return Err(CoreError::Encoding(format!(
            "{field}.nanos 범위 초과: {}",
            ts.nanos
        )));
    }
    Ok(())
}

fn validate_node(node: &trace::Node, path: &str) -> Result<(), CoreError> {
    if node.end_time < node.start_time {
        return Err(CoreError::Encoding(format!(
            "{path}: end_time({}) < start_time({})",
            node.end_time, node.start_time
        )));
    }
    if node.error.iter().any(|e| e.message.is_empty()) {
        return Err(CoreError::Encoding(format!("{path}: 빈 에러 메시지")));
    }
    for child in &node.child {
        let child_path = match &child.id {
            Some(trace::node::Id::ResponseName(name)) => format!("{path}.{name}"),
            Some(trace::node::Id::Index(i)) => format!("{path}[{i}]"),
            None => format!("{path}.?"),
        };
        validate_node(child, &child_path)?;
    }
    Ok(())
}
