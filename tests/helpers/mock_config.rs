// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use std::error::Error;
use transport_dispatch::config::{ConstraintToggles, PlanningConfig, PlanningConfigReader};
use transport_dispatch::domain::types::CheckingMode;

/// Mock 配置结构
///
/// 与 PlanningConfig 的区别: 可模拟读取失败
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub config: PlanningConfig,
    pub fail_with: Option<String>,
}

impl MockConfig {
    /// 创建默认配置 (STRICT, 全部约束开启)
    pub fn default() -> Self {
        Self {
            config: PlanningConfig::default(),
            fail_with: None,
        }
    }

    pub fn with_mode(mode: CheckingMode) -> Self {
        let mut mock = Self::default();
        mock.config.checking_mode = mode;
        mock
    }

    /// 关闭全部约束
    pub fn unconstrained() -> Self {
        let mut mock = Self::default();
        mock.config.constraints = ConstraintToggles::all_disabled();
        mock
    }

    pub fn with_depot(mut self, depot: &str) -> Self {
        self.config.default_depot_address_id = Some(depot.to_string());
        self
    }

    /// 读取时返回错误
    pub fn failing(message: &str) -> Self {
        Self {
            config: PlanningConfig::default(),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl PlanningConfigReader for MockConfig {
    async fn load_planning_config(&self) -> Result<PlanningConfig, Box<dyn Error>> {
        if let Some(message) = &self.fail_with {
            return Err(message.clone().into());
        }
        self.config.validate()?;
        Ok(self.config.clone())
    }
}
