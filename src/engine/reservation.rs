// ==========================================
// 运输调度排车系统 - 资源占用表
// ==========================================
// 职责: (资源类型, 资源ID, 日期) 粒度的占用租约
// 红线: 同一资源同一天同一时刻只能被一个行程持有
// ==========================================
// 生命周期: 匹配时获取 -> 失败时释放 -> 派车单落库后提交
//           排车结束时按批次整体清理 (落库后的派车单本身即占用记录)
// 共享: Arc<ReservationTable> 可在多个编排器实例之间共享
// ==========================================

use crate::domain::types::ResourceKind;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReservationKey {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub date: NaiveDate,
}

/// 租约持有者: 一次排车批次中的一个行程
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseHolder {
    pub pass_id: String,
    pub trip_id: String,
}

impl LeaseHolder {
    pub fn new(pass_id: &str, trip_id: &str) -> Self {
        Self {
            pass_id: pass_id.to_string(),
            trip_id: trip_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Reservation {
    holder: LeaseHolder,
    committed: bool,
}

/// 已获取的租约凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: ReservationKey,
    pub holder: LeaseHolder,
}

// ==========================================
// ReservationTable
// ==========================================
#[derive(Debug, Default)]
pub struct ReservationTable {
    entries: Mutex<HashMap<ReservationKey, Reservation>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, HashMap<ReservationKey, Reservation>>> {
        self.entries
            .lock()
            .map_err(|e| EngineError::ReservationLock(e.to_string()))
    }

    /// 比较并占用: 空闲或已由同一持有者占用时成功
    pub fn try_acquire(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        holder: &LeaseHolder,
    ) -> EngineResult<Option<Lease>> {
        let key = ReservationKey {
            kind,
            resource_id: resource_id.to_string(),
            date,
        };
        let mut entries = self.lock()?;
        match entries.get(&key) {
            Some(existing) if existing.holder != *holder => Ok(None),
            Some(_) => Ok(Some(Lease {
                key,
                holder: holder.clone(),
            })),
            None => {
                entries.insert(
                    key.clone(),
                    Reservation {
                        holder: holder.clone(),
                        committed: false,
                    },
                );
                Ok(Some(Lease {
                    key,
                    holder: holder.clone(),
                }))
            }
        }
    }

    /// 资源是否被其他持有者占用
    pub fn is_held_by_other(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        holder: &LeaseHolder,
    ) -> EngineResult<bool> {
        let key = ReservationKey {
            kind,
            resource_id: resource_id.to_string(),
            date,
        };
        Ok(self
            .lock()?
            .get(&key)
            .map_or(false, |r| r.holder != *holder))
    }

    /// 释放未提交的租约; 已提交或非本人持有的租约不受影响
    pub fn release(&self, lease: &Lease) -> EngineResult<()> {
        let mut entries = self.lock()?;
        let releasable = entries
            .get(&lease.key)
            .map_or(false, |r| r.holder == lease.holder && !r.committed);
        if releasable {
            entries.remove(&lease.key);
        }
        Ok(())
    }

    pub fn commit(&self, lease: &Lease) -> EngineResult<()> {
        let mut entries = self.lock()?;
        if let Some(r) = entries.get_mut(&lease.key) {
            if r.holder == lease.holder {
                r.committed = true;
            }
        }
        Ok(())
    }

    /// 清理某一排车批次的全部租约, 返回清理数量
    pub fn release_pass(&self, pass_id: &str) -> EngineResult<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, r| r.holder.pass_id != pass_id);
        Ok(before - entries.len())
    }

    pub fn len(&self) -> EngineResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.lock()?.is_empty())
    }
}
