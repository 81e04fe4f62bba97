//! 쿼리 시그니처 계산 포트.
//!
//! 시그니처 알고리즘은 주입 가능한 함수 값이다. 기본 구현은 공백 정규화만 한다.

use std::sync::Arc;

/// 파싱된 GraphQL 연산 문서
///
/// 실행 파이프라인이 파싱/검증을 마친 문서를 출력 형태로 넘긴다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDocument {
    body: String,
}

impl QueryDocument {
    /// 출력된 문서 본문으로 생성
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// 문서 본문
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// 시그니처 함수: (문서, 연산 이름) → 시그니처 문자열
pub type SignatureFn = Arc<dyn Fn(&QueryDocument, Option<&str>) -> String + Send + Sync>;

/// 기본 시그니처 — 연속 공백을 하나로 줄이고 양끝을 자른다
pub fn default_signature(document: &QueryDocument, _operation_name: Option<&str>) -> String {
    document.body().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 기본 시그니처 함수 값
pub fn default_signature_fn() -> SignatureFn {
    Arc::new(default_signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_signature_collapses_whitespace() {
        let doc = QueryDocument::new("query GetUser {\n  user(id: 1) {\n    id\n  }\n}\n");
        assert_eq!(
            default_signature(&doc, Some("GetUser")),
            "query GetUser { user(id: 1) { id } }"
        );
    }

    #[test]
    fn default_signature_fn_is_callable() {
        let f = default_signature_fn();
        assert_eq!(f(&QueryDocument::new("  { a }  "), None), "{ a }");
    }
}
