//! 重连退避计算

use std::time::Duration;

const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_RANGE_MS: u64 = 1_000;

/// 第 `attempt` 次重试前的等待时长。
///
/// `jitter` 取 [0, 1)，把同一时刻断开的一批客户端错开，
/// 避免同时冲击刚恢复的服务器。结果封顶 30 秒。
pub fn reconnect_delay(attempt: u32, jitter: f64) -> Duration {
    let exponential = BASE_DELAY_MS.saturating_mul(1_u64 << attempt.min(31));
    let jitter_ms = (jitter.clamp(0.0, 1.0) * JITTER_RANGE_MS as f64) as u64;
    Duration::from_millis(exponential.saturating_add(jitter_ms).min(MAX_DELAY_MS))
}
