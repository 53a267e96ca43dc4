//! 시간 유틸리티

use chrono::Utc;

/// 현재 Unix 타임스탬프(초)를 반환합니다.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// 현재 Unix 타임스탬프(밀리초)를 반환합니다.
pub fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_monotonic() {
        let a = current_timestamp();
        let b = current_timestamp();
        assert!(b >= a);
    }
}
