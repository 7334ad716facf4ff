//! # Clinic Core
//!
//! 排班与门诊系统的核心模块，提供数据模型、错误定义、时钟抽象，
//! 以及仓储和外部目录服务的接口。

pub mod clock;
pub mod directory;
pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use directory::{Directory, DoctorDirectory, NurseDirectory, PatientDirectory};
pub use error::{ClinicError, ErrorKind, Result, ResultExt};
pub use models::*;
pub use repository::{OutpatientRepository, ScheduleRepository};
