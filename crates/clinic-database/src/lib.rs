//! # Clinic数据库模块
//!
//! 负责排班、门诊和处方的持久化，提供PostgreSQL连接池、建表脚本和仓储实现，
//! 以及一个用于测试和演示的内存后端。

pub mod connection;
pub mod directories;
pub mod memory;
pub mod models;
pub mod outpatients;
pub mod schedules;
pub mod schema;

// 重新导出主要类型
pub use connection::{DatabaseConfig, DatabasePool};
pub use directories::PgDirectory;
pub use memory::{InMemoryStore, MemoryDirectory};
pub use outpatients::PgOutpatientRepository;
pub use schedules::PgScheduleRepository;
pub use schema::create_tables;
