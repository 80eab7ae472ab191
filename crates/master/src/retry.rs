use std::time::Duration;

use fleet_core::config::DeployRetryConfig;

/// 部署乐观并发重试策略
///
/// 尝试次数有上限；两次尝试之间按指数退避并叠加随机抖动，
/// 避免多个 master 在同一冲突上同步重试。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: DeployRetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DeployRetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: DeployRetryConfig) -> Self {
        Self { config }
    }

    /// 不等待的策略，测试中使用
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(DeployRetryConfig {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// 第 `attempt` 次尝试（从 1 开始）失败后的等待时间
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let max = self.config.max_delay_ms as f64;
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;

        let exponential = base * self.config.backoff_multiplier.powi(exponent);
        let capped = exponential.min(max);

        let jitter = capped * self.config.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        let millis = (capped + jitter).clamp(0.0, max);

        Duration::from_micros((millis * 1000.0) as u64)
    }

    /// 失败后等待，最后一次尝试之后不等待
    pub async fn pause(&self, attempt: u32) {
        if attempt >= self.max_attempts() {
            return;
        }
        let delay = self.backoff(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
