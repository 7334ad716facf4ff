//! 通用工具函数

use crate::error::{ClinicError, Result};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

/// 日期格式 `YYYY-MM-DD`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 时间格式 `HH:MM:SS`
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// 生成排班批次标识
pub fn generate_group_id() -> Uuid {
    Uuid::new_v4()
}

/// 检查字符串是否严格符合给定形状，`pattern` 中 `9` 表示任意ASCII数字，其余字符需原样出现
fn matches_shape(value: &str, pattern: &str) -> bool {
    value.len() == pattern.len()
        && value
            .bytes()
            .zip(pattern.bytes())
            .all(|(c, p)| if p == b'9' { c.is_ascii_digit() } else { c == p })
}

/// 解析日期，只接受 `YYYY-MM-DD`
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    if !matches_shape(value, "9999-99-99") {
        return Err(ClinicError::InvalidArgument(format!(
            "invalid date '{}': expected YYYY-MM-DD",
            value
        )));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ClinicError::InvalidArgument(format!("invalid date '{}': {}", value, e)))
}

/// 解析时间，只接受 `HH:MM:SS`
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    if !matches_shape(value, "99:99:99") {
        return Err(ClinicError::InvalidArgument(format!(
            "invalid time '{}': expected HH:MM:SS",
            value
        )));
    }
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| ClinicError::InvalidArgument(format!("invalid time '{}': {}", value, e)))
}

/// 解析班次起止时间，要求开始早于结束
pub fn parse_time_range(start: &str, end: &str) -> Result<(NaiveTime, NaiveTime)> {
    let start_time = parse_time(start)?;
    let end_time = parse_time(end)?;
    if start_time >= end_time {
        return Err(ClinicError::InvalidArgument(format!(
            "start time {} must be before end time {}",
            start, end
        )));
    }
    Ok((start_time, end_time))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2020-02-29").unwrap();
        assert_eq!(format_date(date), "2020-02-29");

        assert!(parse_date("2021-02-29").is_err());
        assert!(parse_date("01/02/2020").is_err());
        assert!(parse_date("").is_err());

        for value in [
            "2020-1-1",
            "20-01-01",
            " 2020-01-01",
            "2020-01-01 ",
            "+2020-01-01",
            "+262142-12-31",
            "2020/01/01",
            "２020-01-01",
        ] {
            let err = parse_date(value).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument, "{:?}", value);
        }
    }

    #[test]
    fn test_parse_time_range() {
        let (start, end) = parse_time_range("08:00:00", "12:30:00").unwrap();
        assert_eq!(format_time(start), "08:00:00");
        assert_eq!(format_time(end), "12:30:00");

        let err = parse_time_range("12:00:00", "08:00:00").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
        assert!(parse_time_range("08:00:00", "08:00:00").is_err());
        assert!(parse_time_range("8am", "12:00:00").is_err());

        for value in ["8:00:00", "08:0:0", "08:00", " 08:00:00", "08:00:00.5", "24:00:00"] {
            let err = parse_time(value).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument, "{:?}", value);
        }
        assert_eq!(format_time(parse_time("23:59:59").unwrap()), "23:59:59");
    }

    #[test]
    fn test_generate_group_id_is_unique() {
        assert_ne!(generate_group_id(), generate_group_id());
    }
}
