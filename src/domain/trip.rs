// ==========================================
// 运输调度排车系统 - 行程 (临时分组)
// ==========================================
// 红线: 危险品段只能与危险品段同车
// 红线: 行程只存在于一次排车过程中, 不落库
// ==========================================

use crate::domain::capacity::LoadVector;
use crate::domain::leg::Leg;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 拼单草稿 (由拼车引擎产出, 编排器负责落库)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationDraft {
    pub load_type: String,
    pub run_date: NaiveDate,
    pub job_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub run_date: NaiveDate,
    pub vehicle_type: Option<String>,
    pub hazardous: bool,
    pub legs: Vec<Leg>,
    pub consolidation: Option<ConsolidationDraft>,
}

impl Trip {
    /// 行程累计载量
    pub fn total_load(&self) -> LoadVector {
        self.legs
            .iter()
            .fold(LoadVector::zero(), |acc, leg| acc + leg.load)
    }

    pub fn leg_ids(&self) -> Vec<String> {
        self.legs.iter().map(|l| l.leg_id.clone()).collect()
    }

    /// 按出现顺序去重的上级作业列表
    pub fn parent_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = Vec::new();
        for leg in &self.legs {
            if let Some(job) = &leg.parent_job_id {
                if !jobs.contains(job) {
                    jobs.push(job.clone());
                }
            }
        }
        jobs
    }

    pub fn any_hazardous(&self) -> bool {
        self.legs.iter().any(|l| l.hazardous)
    }
}
