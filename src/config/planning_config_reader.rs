// ==========================================
// 运输调度排车系统 - 排车参数读取 Trait
// ==========================================
// 职责: 定义排车入口所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::planning_config::PlanningConfig;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PlanningConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）、PlanningConfig（静态参数）
#[async_trait]
pub trait PlanningConfigReader: Send + Sync {
    /// 读取一次排车调用的完整参数
    ///
    /// # 返回
    /// - PlanningConfig: 未配置的键使用默认值
    ///
    /// # 错误
    /// - 配置值格式错误
    /// - 参数校验失败 (见 PlanningConfig::validate)
    async fn load_planning_config(&self) -> Result<PlanningConfig, Box<dyn Error>>;
}

#[async_trait]
impl PlanningConfigReader for PlanningConfig {
    async fn load_planning_config(&self) -> Result<PlanningConfig, Box<dyn Error>> {
        self.validate()?;
        Ok(self.clone())
    }
}
