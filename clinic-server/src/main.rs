//! Clinic运维命令行
//!
//! 建表、预览排班日期，以及医生离职、护士调岗、患者注销时的批量清理。

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clinic_core::utils::format_date;
use clinic_core::SystemClock;
use clinic_database::{
    create_tables, DatabasePool, PgDirectory, PgOutpatientRepository, PgScheduleRepository,
};
use clinic_workflow::{generate, Enricher, OutpatientService, ScheduleService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Clinic运维命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "医院排班与门诊就诊流程管理")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 创建数据表和索引
    InitDb,
    /// 打印重复规则生成的排班日期
    Preview {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// no-repeat、daily、weekly 或 monthly
        #[arg(long, default_value = "no-repeat")]
        repeat: String,
    },
    /// 删除医生今天及以后的全部排班
    PurgeDoctor { id: Uuid },
    /// 从护士今天及以后的排班上移除该护士
    DetachNurse { id: Uuid },
    /// 删除患者所有候诊中的门诊
    PurgePatientQueue { id: Uuid },
}

struct Services {
    schedules: ScheduleService,
    outpatients: OutpatientService,
}

impl Services {
    fn new(pool: &DatabasePool, clock: SystemClock) -> Self {
        let schedules = Arc::new(PgScheduleRepository::new(pool));
        let outpatients = Arc::new(PgOutpatientRepository::new(pool));
        let directory = Arc::new(PgDirectory::new(pool));
        let clock = Arc::new(clock);
        let enricher = Enricher::new(directory.clone(), directory.clone(), directory.clone());

        Self {
            schedules: ScheduleService::new(
                schedules.clone(),
                outpatients.clone(),
                directory.clone(),
                directory.clone(),
                enricher.clone(),
                clock.clone(),
            ),
            outpatients: OutpatientService::new(outpatients, schedules, directory, enricher, clock),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config.as_deref())?;

    // 初始化日志
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Command::Preview { start, end, repeat } = &args.command {
        for date in generate(start, end, repeat)? {
            println!("{}", format_date(date));
        }
        return Ok(());
    }

    let clock = SystemClock::from_offset_minutes(config.clock.utc_offset_minutes)?;
    let pool = DatabasePool::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let services = Services::new(&pool, clock);

    match args.command {
        Command::InitDb => {
            create_tables(&pool).await.context("Failed to create tables")?;
            info!("Database schema is ready");
        }
        Command::PurgeDoctor { id } => {
            let deleted = services.schedules.remove_doctor_future_schedules(id).await?;
            info!("Doctor {}: {} future work schedules deleted", id, deleted);
        }
        Command::DetachNurse { id } => {
            let affected = services.schedules.remove_nurse_from_future_schedules(id).await?;
            info!("Nurse {}: removed from {} future work schedules", id, affected);
        }
        Command::PurgePatientQueue { id } => {
            let deleted = services.outpatients.remove_waiting_by_patient(id).await?;
            info!("Patient {}: {} waiting outpatients deleted", id, deleted);
        }
        Command::Preview { .. } => {}
    }

    Ok(())
}
