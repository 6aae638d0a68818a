//! 기준 심볼 → 거래소 고유 심볼 매핑.
//!
//! 매핑 파일은 오프라인 생성기(`perp-collector generate-symbols`)가 만들며
//! 수집기는 시작 시 한 번 읽고 이후 읽기 전용으로 사용합니다.
//!
//! ```json
//! {
//!   "BTC": { "binance": "BTCUSDT", "okx": "BTC-USDT-SWAP", "coinbase": null },
//!   "ETH": { "binance": "ETHUSDT", "okx": "ETH-USDT-SWAP" }
//! }
//! ```
//!
//! 값이 `null`이거나 키가 없으면 해당 거래소에 거래 가능한 상품이 없다는 뜻입니다.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// 거래소 식별자 → 고유 심볼 (없으면 `None`).
pub type ExchangeSymbols = BTreeMap<String, Option<String>>;

/// 읽기 전용 심볼 매핑.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolRegistry {
    entries: BTreeMap<String, ExchangeSymbols>,
}

impl SymbolRegistry {
    /// 매핑 테이블로부터 생성.
    pub fn new(entries: BTreeMap<String, ExchangeSymbols>) -> Self {
        Self { entries }
    }

    /// JSON 문자열에서 로드.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let entries: BTreeMap<String, ExchangeSymbols> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// 파일에서 로드.
    ///
    /// 파일이 없거나, 형식이 틀리거나, 심볼이 하나도 없으면 에러입니다.
    /// 매핑 없이 수집기를 띄우지 않도록 호출 측은 이 에러를 치명적으로 취급해야 합니다.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| CoreError::MappingIo {
            path: path.display().to_string(),
            source,
        })?;

        let registry = Self::from_json_str(&data)?;
        if registry.is_empty() {
            return Err(CoreError::EmptyMapping(path.display().to_string()));
        }

        tracing::info!(
            path = %path.display(),
            bases = registry.len(),
            "심볼 매핑 로드 완료"
        );
        Ok(registry)
    }

    /// 지정한 기준 심볼만 남긴 매핑.
    ///
    /// 매핑 파일에 없는 심볼은 경고 후 무시합니다.
    pub fn retain_bases(mut self, bases: &[String]) -> Self {
        for base in bases {
            if !self.entries.contains_key(base) {
                tracing::warn!(symbol = %base, "매핑 파일에 없는 심볼, 무시");
            }
        }
        self.entries.retain(|base, _| bases.iter().any(|b| b == base));
        self
    }

    /// 거래소 고유 심볼 조회 (순수 조회, I/O 없음).
    pub fn resolve(&self, base: &str, exchange: &str) -> Option<&str> {
        self.entries
            .get(base)
            .and_then(|m| m.get(exchange))
            .and_then(|s| s.as_deref())
    }

    /// 모든 기준 심볼 (정렬 순서).
    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 기준 심볼 수.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 내부 테이블 (직렬화용).
    pub fn entries(&self) -> &BTreeMap<String, ExchangeSymbols> {
        &self.entries
    }

    /// 매핑을 보기 좋은 JSON으로 직렬화.
    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "BTC": { "binance": "BTCUSDT", "okx": "BTC-USDT-SWAP", "coinbase": null },
        "ETH": { "binance": "ETHUSDT" }
    }"#;

    #[test]
    fn test_resolve() {
        let registry = SymbolRegistry::from_json_str(SAMPLE).unwrap();

        assert_eq!(registry.resolve("BTC", "binance"), Some("BTCUSDT"));
        assert_eq!(registry.resolve("BTC", "okx"), Some("BTC-USDT-SWAP"));
        // null 매핑과 누락된 키 모두 "상품 없음"
        assert_eq!(registry.resolve("BTC", "coinbase"), None);
        assert_eq!(registry.resolve("ETH", "okx"), None);
        assert_eq!(registry.resolve("DOGE", "binance"), None);
    }

    #[test]
    fn test_bases_are_sorted() {
        let registry = SymbolRegistry::from_json_str(SAMPLE).unwrap();
        let bases: Vec<&str> = registry.bases().collect();
        assert_eq!(bases, vec!["BTC", "ETH"]);
    }

    #[test]
    fn test_retain_bases() {
        let registry = SymbolRegistry::from_json_str(SAMPLE)
            .unwrap()
            .retain_bases(&["ETH".to_string(), "XRP".to_string()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("ETH", "binance"), Some("ETHUSDT"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = SymbolRegistry::load("/nonexistent/symbols-dynamic.json").unwrap_err();
        assert!(matches!(err, CoreError::MappingIo { .. }));
    }

    #[test]
    fn test_load_empty_mapping_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let err = SymbolRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyMapping(_)));
    }

    #[test]
    fn test_load_malformed_mapping_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[\"BTC\"]").unwrap();

        let err = SymbolRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::MappingFormat(_)));
    }

    #[test]
    fn test_load_roundtrips_generated_file() {
        let registry = SymbolRegistry::from_json_str(SAMPLE).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(registry.to_json_pretty().unwrap().as_bytes()).unwrap();

        let loaded = SymbolRegistry::load(file.path()).unwrap();
        assert_eq!(loaded, registry);
    }
}
