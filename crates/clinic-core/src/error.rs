//! 错误定义模块
//!
//! 错误按类别区分而非按类型区分：上层通过 [`ClinicError::kind`] 判断错误类别，
//! 依赖调用失败时用 [`ResultExt::during`] 包裹当前操作名，原始错误始终保留在
//! `source()` 链中。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Unprocessable,
    Unauthorized,
    ServerError,
}

/// 系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("参数错误: {0}")]
    InvalidArgument(String),

    #[error("无法处理的请求: {0}")]
    Unprocessable(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("权限错误: {0}")]
    Unauthorized(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("{operation}: {source}")]
    Operation {
        operation: String,
        #[source]
        source: Box<ClinicError>,
    },
}

impl ClinicError {
    /// 用操作名包裹错误
    pub fn during(self, operation: impl Into<String>) -> Self {
        ClinicError::Operation {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// 错误类别，穿透所有操作包裹层
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            ClinicError::NotFound(_) => ErrorKind::NotFound,
            ClinicError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ClinicError::Unprocessable(_) | ClinicError::InvalidStateTransition { .. } => {
                ErrorKind::Unprocessable
            }
            ClinicError::Unauthorized(_) => ErrorKind::Unauthorized,
            _ => ErrorKind::ServerError,
        }
    }

    /// 最内层的原始错误
    pub fn root(&self) -> &ClinicError {
        let mut current = self;
        while let ClinicError::Operation { source, .. } = current {
            current = &**source;
        }
        current
    }

    /// 操作轨迹，外层在前
    pub fn operations(&self) -> Vec<&str> {
        let mut trail = Vec::new();
        let mut current = self;
        while let ClinicError::Operation { operation, source } = current {
            trail.push(operation.as_str());
            current = &**source;
        }
        trail
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for ClinicError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ClinicError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ClinicError::Unprocessable(db.message().to_string())
            }
            _ => ClinicError::Database(err.to_string()),
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;

/// 为依赖调用的结果附加操作名
pub trait ResultExt<T> {
    fn during(self, operation: &str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ClinicError>,
{
    fn during(self, operation: &str) -> Result<T> {
        self.map_err(|e| {
            let err: ClinicError = e.into();
            err.during(operation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_survives_wrapping() {
        let err: Result<()> = Err(ClinicError::NotFound("doctor".into()));
        let err = err.during("find doctor").during("create schedule").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.operations(), vec!["create schedule", "find doctor"]);
        assert!(matches!(err.root(), ClinicError::NotFound(_)));
    }

    #[test]
    fn test_source_chain_keeps_cause() {
        let err = ClinicError::Database("connection reset".into()).during("count waiting");

        assert_eq!(err.kind(), ErrorKind::ServerError);
        let source = err.source().expect("wrapped error has a source");
        assert_eq!(source.to_string(), "数据库错误: connection reset");
        assert!(err.to_string().starts_with("count waiting: "));
    }

    #[test]
    fn test_state_transition_is_unprocessable() {
        let err = ClinicError::InvalidStateTransition {
            from: "Finished".into(),
            event: "Cancel".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Unprocessable);
        assert!(err.operations().is_empty());
    }
}
