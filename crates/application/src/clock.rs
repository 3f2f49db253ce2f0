use chrono::Utc;
use domain::Timestamp;

/// 时钟抽象，测试中可以注入固定时间。
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// 默认实现，直接读系统时钟。
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
