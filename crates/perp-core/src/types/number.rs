//! 거래소 응답의 숫자 정규화.
//!
//! 거래소는 같은 필드를 문자열("0.0001")이나 숫자로 내려줍니다.
//! 파싱할 수 없거나 유한하지 않은 값은 에러 대신 `None`이 됩니다.

use serde_json::Value;

/// JSON 값을 유한한 f64로 변환.
pub fn parse_num(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_num_str(s)?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// 문자열을 유한한 f64로 변환.
pub fn parse_num_str(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// JSON 값을 epoch 밀리초 정수로 변환 (숫자 또는 숫자 문자열).
pub fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
