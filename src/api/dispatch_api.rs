// ==========================================
// 运输调度排车系统 - 排车 API
// ==========================================
// 职责: 排车入口 (读取参数 -> 执行排车 -> 返回报告)
// 红线: 参数在每次调用时重新读取, 不跨调用缓存
// ==========================================

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::PlanningConfigReader;
use crate::engine::orchestrator::{AllocationOrchestrator, CancellationFlag};
use crate::engine::report::AllocationReport;
use crate::engine::reservation::ReservationTable;
use crate::repository::DispatchRepository;

// ==========================================
// DispatchApi - 排车 API
// ==========================================

/// 排车API
///
/// 职责：
/// 1. 读取并校验排车参数
/// 2. 在阻塞线程池中执行排车
/// 3. 多个 DispatchApi 可共享同一资源占用表
pub struct DispatchApi<C>
where
    C: PlanningConfigReader,
{
    config_reader: Arc<C>,
    repo: Arc<dyn DispatchRepository>,
    reservations: Arc<ReservationTable>,
}

impl<C> DispatchApi<C>
where
    C: PlanningConfigReader,
{
    /// 创建新的DispatchApi实例
    ///
    /// # 参数
    /// - config_reader: 排车参数读取器
    /// - repo: 排车仓储
    pub fn new(config_reader: Arc<C>, repo: Arc<dyn DispatchRepository>) -> Self {
        Self::with_reservations(config_reader, repo, Arc::new(ReservationTable::new()))
    }

    pub fn with_reservations(
        config_reader: Arc<C>,
        repo: Arc<dyn DispatchRepository>,
        reservations: Arc<ReservationTable>,
    ) -> Self {
        Self {
            config_reader,
            repo,
            reservations,
        }
    }

    /// 为运输计划排车
    ///
    /// # 参数
    /// - plan_id: 运输计划ID
    /// - consolidate: 是否按货物类型拼单
    ///
    /// # 返回
    /// - Ok(AllocationReport): 排车报告
    /// - Err(ApiError): 参数错误 / 取数失败
    pub async fn allocate_for_plan(
        &self,
        plan_id: &str,
        consolidate: bool,
    ) -> ApiResult<AllocationReport> {
        self.allocate_with_cancellation(plan_id, consolidate, CancellationFlag::new())
            .await
    }

    /// 可取消的排车入口
    ///
    /// 取消标志在行程之间检查, 剩余行程记为 CANCELLED
    pub async fn allocate_with_cancellation(
        &self,
        plan_id: &str,
        consolidate: bool,
        cancel: CancellationFlag,
    ) -> ApiResult<AllocationReport> {
        let plan_id = plan_id.trim();
        if plan_id.is_empty() {
            return Err(ApiError::InvalidInput("plan_id 不能为空".to_string()));
        }

        let config = self
            .config_reader
            .load_planning_config()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let orchestrator = AllocationOrchestrator::with_reservations(
            self.repo.clone(),
            Arc::new(config),
            self.reservations.clone(),
        )
        .with_cancellation(cancel);

        let owned_plan_id = plan_id.to_string();
        let report = tokio::task::spawn_blocking(move || {
            orchestrator.allocate_for_plan(&owned_plan_id, consolidate)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("排车任务异常终止: {}", e)))?
        .map_err(|e| {
            warn!(plan_id, error = %e, "排车失败");
            ApiError::from(e)
        })?;

        info!(
            plan_id,
            run_sheets = report.created_total() + report.reused,
            errors = report.errors.len(),
            "排车请求完成"
        );
        Ok(report)
    }
}
