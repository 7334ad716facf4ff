//! 时钟抽象
//!
//! 需要打时间戳的组件显式持有时钟，时区由配置决定而不是读取进程级全局状态。

use crate::error::{ClinicError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc};
use std::fmt::Debug;

pub trait Clock: Send + Sync + Debug {
    /// 配置时区下的当前时间
    fn now(&self) -> DateTime<FixedOffset>;

    fn local_now(&self) -> NaiveDateTime {
        self.now().naive_local()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// 精确到秒的当前时刻
    fn time_of_day(&self) -> NaiveTime {
        let time = self.now().time();
        time.with_nanosecond(0).unwrap_or(time)
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// 以相对UTC的分钟数构造
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or_else(|| {
                ClinicError::InvalidArgument(format!("utc offset out of range: {} minutes", minutes))
            })
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// 固定时钟，用于测试和演示
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// 以UTC时区的本地时间构造
    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self::new(date.and_time(time).and_utc().fixed_offset())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }
}
