//! 심볼 매핑 파일 생성.
//!
//! 거래소별 무기한 선물 목록을 받아 기준 심볼마다 고유 심볼을 고릅니다.
//! 수집 프로세스 밖에서 따로 실행하는 오프라인 작업입니다.

use std::collections::BTreeMap;
use std::path::Path;

use perp_core::{ExchangeSymbols, SymbolRegistry};
use perp_exchange::{ExchangeClient, PerpMarket};

use crate::Result;

/// 선호 순서대로의 호가 통화.
const PREFERRED_QUOTES: [&str; 2] = ["USDT", "USDC"];

/// 기준 심볼에 맞는 상품 선택.
///
/// 같은 기준 자산 중 USDT, USDC 순으로 고르고 둘 다 없으면 아무 호가 통화나 씁니다.
pub fn pick_market<'a>(markets: &'a [PerpMarket], base: &str) -> Option<&'a PerpMarket> {
    let same_base = || markets.iter().filter(|m| m.base.eq_ignore_ascii_case(base));

    PREFERRED_QUOTES
        .iter()
        .find_map(|quote| same_base().find(|m| m.quote.eq_ignore_ascii_case(quote)))
        .or_else(|| same_base().next())
}

/// 모든 거래소 목록을 받아 매핑 생성.
///
/// 목록 조회에 실패한 거래소는 모든 심볼을 `null`로 둡니다.
pub async fn generate_registry(clients: &[ExchangeClient], bases: &[String]) -> SymbolRegistry {
    let mut listings: Vec<(&str, Option<Vec<PerpMarket>>)> = Vec::with_capacity(clients.len());

    for client in clients {
        match client.list_perpetual_markets().await {
            Ok(markets) => {
                tracing::info!(exchange = client.id(), markets = markets.len(), "상품 목록 로드");
                listings.push((client.id(), Some(markets)));
            }
            Err(e) => {
                tracing::warn!(exchange = client.id(), error = %e, "상품 목록 로드 실패");
                listings.push((client.id(), None));
            }
        }
    }

    let mut entries = BTreeMap::new();
    for base in bases {
        let mut per_exchange = ExchangeSymbols::new();
        for (exchange, markets) in &listings {
            let native = markets
                .as_deref()
                .and_then(|m| pick_market(m, base))
                .map(|m| m.native.clone());

            match &native {
                Some(n) => tracing::debug!(exchange = exchange, symbol = %base, native = %n, "매핑"),
                None => tracing::info!(exchange = exchange, symbol = %base, "매핑 없음"),
            }
            per_exchange.insert(exchange.to_string(), native);
        }
        entries.insert(base.clone(), per_exchange);
    }

    SymbolRegistry::new(entries)
}

/// 매핑을 JSON 파일로 기록.
pub fn write_registry(registry: &SymbolRegistry, path: impl AsRef<Path>) -> Result<()> {
    let json = registry.to_json_pretty()?;
    std::fs::write(path.as_ref(), json)?;
    tracing::info!(
        path = %path.as_ref().display(),
        symbols = registry.len(),
        "심볼 매핑 파일 기록"
    );
    Ok(())
}
