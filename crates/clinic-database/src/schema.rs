//! 数据库表结构

use crate::connection::DatabasePool;
use clinic_core::Result;

/// 创建数据库表
pub async fn create_tables(pool: &DatabasePool) -> Result<()> {
    let pool = pool.pool();

    // 目录表由各自的管理模块写入，排班与门诊只引用
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS doctors (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255) NOT NULL,
            phone VARCHAR(32) NOT NULL,
            specialty VARCHAR(128) NOT NULL,
            room VARCHAR(64) NOT NULL
        )
    "#).execute(pool).await?;

    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS nurses (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255) NOT NULL,
            phone VARCHAR(32) NOT NULL
        )
    "#).execute(pool).await?;

    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS patients (
            id UUID PRIMARY KEY,
            national_id VARCHAR(32) UNIQUE NOT NULL,
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255) NOT NULL,
            phone VARCHAR(32) NOT NULL,
            birth_date DATE
        )
    "#).execute(pool).await?;

    // 创建排班表
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS work_schedules (
            id UUID PRIMARY KEY,
            group_id UUID NOT NULL,
            date DATE NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            doctor_id UUID NOT NULL,
            nurse_id UUID,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            CHECK (start_time < end_time)
        )
    "#).execute(pool).await?;

    // 创建门诊表
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS outpatients (
            id UUID PRIMARY KEY,
            work_schedule_id UUID NOT NULL REFERENCES work_schedules(id),
            patient_id UUID NOT NULL,
            complaint TEXT NOT NULL DEFAULT '',
            status VARCHAR(20) NOT NULL DEFAULT 'WAITING',
            start_time TIME,
            end_time TIME,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
    "#).execute(pool).await?;

    // 创建处方表
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS prescriptions (
            id UUID PRIMARY KEY,
            outpatient_id UUID NOT NULL REFERENCES outpatients(id),
            medicine VARCHAR(255) NOT NULL,
            instruction TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
    "#).execute(pool).await?;

    create_indexes(pool).await?;

    tracing::info!("Database tables created successfully");
    Ok(())
}

/// 创建数据库索引
async fn create_indexes(pool: &sqlx::PgPool) -> Result<()> {
    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_work_schedules_date ON work_schedules(date, start_time)",
        "CREATE INDEX IF NOT EXISTS idx_work_schedules_group_id ON work_schedules(group_id)",
        "CREATE INDEX IF NOT EXISTS idx_work_schedules_doctor_id ON work_schedules(doctor_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_work_schedules_nurse_id ON work_schedules(nurse_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_outpatients_work_schedule_id ON outpatients(work_schedule_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_outpatients_patient_id ON outpatients(patient_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_prescriptions_outpatient_id ON prescriptions(outpatient_id)",
        // 同一排班同时只能有一个就诊中的门诊
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_outpatients_on_examination \
         ON outpatients(work_schedule_id) WHERE status = 'ON_EXAMINATION'",
    ];

    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    tracing::info!("Database indexes created successfully");
    Ok(())
}
