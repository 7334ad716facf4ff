//! 排班重复规则
//!
//! 根据起止日期和重复方式生成排班日期。按月重复固定以28天为步长，不做日历月计算。

use chrono::{Duration, NaiveDate};
use clinic_core::utils::parse_date;
use clinic_core::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 重复方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatPolicy {
    NoRepeat,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatPolicy {
    /// 每次递增的天数，不重复时为空
    pub fn step_days(&self) -> Option<i64> {
        match self {
            RepeatPolicy::NoRepeat => None,
            RepeatPolicy::Daily => Some(1),
            RepeatPolicy::Weekly => Some(7),
            RepeatPolicy::Monthly => Some(28),
        }
    }

    /// 生成 `[start, end]` 闭区间内的日期，超出日期可表示范围时报错
    pub fn dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let Some(step) = self.step_days() else {
            return Ok(vec![start]);
        };

        let step = Duration::days(step);
        let mut dates = Vec::new();
        let mut current = start;
        while current <= end {
            dates.push(current);
            current = current.checked_add_signed(step).ok_or_else(|| {
                ClinicError::InvalidArgument(format!(
                    "date range {} to {} is out of range for {}",
                    start, end, self
                ))
            })?;
        }
        Ok(dates)
    }
}

impl fmt::Display for RepeatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepeatPolicy::NoRepeat => "no-repeat",
            RepeatPolicy::Daily => "daily",
            RepeatPolicy::Weekly => "weekly",
            RepeatPolicy::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

impl FromStr for RepeatPolicy {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no-repeat" => Ok(RepeatPolicy::NoRepeat),
            "daily" => Ok(RepeatPolicy::Daily),
            "weekly" => Ok(RepeatPolicy::Weekly),
            "monthly" => Ok(RepeatPolicy::Monthly),
            other => Err(ClinicError::InvalidArgument(format!(
                "unknown repeat type: {}",
                other
            ))),
        }
    }
}

/// 解析字符串形式的起止日期和重复方式并生成日期
pub fn generate(start_date: &str, end_date: &str, policy: &str) -> Result<Vec<NaiveDate>> {
    let start = parse_date(start_date)?;
    let end = parse_date(end_date)?;
    let policy: RepeatPolicy = policy.parse()?;

    let dates = policy.dates(start, end)?;
    tracing::debug!("Generated {} dates for {} from {} to {}", dates.len(), policy, start, end);
    Ok(dates)
}
