// ==========================================
// 运输调度排车系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod dispatch_repo;
pub mod error;
pub mod leg_repo;
pub mod memory_repo;
pub mod resource_repo;
pub mod row_codec;
pub mod rule_repo;
pub mod run_sheet_repo;
pub mod sqlite_dispatch_repo;

// 重导出核心仓储
pub use dispatch_repo::DispatchRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use leg_repo::LegRepository;
pub use memory_repo::InMemoryDispatchRepository;
pub use resource_repo::ResourceRepository;
pub use rule_repo::RuleRepository;
pub use run_sheet_repo::RunSheetRepository;
pub use sqlite_dispatch_repo::SqliteDispatchRepository;
