// ==========================================
// 运输调度排车系统 - 引擎层
// ==========================================
// 职责: 实现排车业务规则, 不拼 SQL
// 红线: Engine 不拼 SQL, 所有拒绝必须输出 reason
// ==========================================

pub mod consolidator;
pub mod constraint;
pub mod error;
pub mod leg_window;
pub mod orchestrator;
pub mod report;
pub mod reservation;
pub mod resource_matcher;
pub mod run_sheet_assembler;

// 重导出核心引擎
pub use consolidator::{GreedyTripPacker, TripConsolidator, TripPacker};
pub use constraint::{ConstraintValidator, ValidationOutcome, ValidationTarget};
pub use error::{EngineError, EngineResult};
pub use leg_window::{resolve_horizon, Horizon, LegWindow};
pub use orchestrator::{AllocationOrchestrator, CancellationFlag};
pub use report::{AllocationError, AllocationReport, ConsolidationSummary, SkippedLeg};
pub use reservation::{Lease, LeaseHolder, ReservationTable};
pub use resource_matcher::{DriverMatch, ResourceMatcher, VehicleMatch};
pub use run_sheet_assembler::RunSheetAssembler;
