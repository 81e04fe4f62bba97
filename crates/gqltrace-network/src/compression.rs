//! gzip 압축 어댑터.
//!
//! `Compressor` 포트 구현. 수집 엔드포인트는 `content-encoding: gzip`만 받는다.

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use gqltrace_core::error::CoreError;
use gqltrace_core::ports::compressor::Compressor;
use std::io::Read;

/// gzip 압축기 — `Compressor` 포트 구현
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// 기본 압축 레벨로 생성
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// 압축 레벨 지정 (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipCompressor {
    fn content_encoding(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut encoder = GzEncoder::new(data, self.level);
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| CoreError::Internal(format!("gzip 압축 실패: {e}")))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CoreError::Internal(format!("gzip 해제 실패: {e}")))?;
        Ok(decompressed)
    }
}
