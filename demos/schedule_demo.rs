//! 排班与门诊流程演示程序
//!
//! 使用内存后端走一遍完整流程：批量排班、挂号、就诊、结束就诊、取消，
//! 以及医生离职和护士调岗时的排班清理。

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clinic_core::utils::{format_date, format_time};
use clinic_core::{
    Actor, Doctor, FixedClock, NewOutpatient, NewSchedule, Nurse, Patient, PrescriptionInput,
    Role, ScheduleQuery,
};
use clinic_database::{InMemoryStore, MemoryDirectory};
use clinic_workflow::{Enricher, OutpatientService, ScheduleService};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🏥 排班与门诊流程演示\n");

    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: "Li Wei".to_string(),
        email: "li.wei@clinic.local".to_string(),
        phone: "555-0100".to_string(),
        specialty: "Internal Medicine".to_string(),
        room: "A-201".to_string(),
    };
    let nurse = Nurse {
        id: Uuid::new_v4(),
        name: "Zhou Min".to_string(),
        email: "zhou.min@clinic.local".to_string(),
        phone: "555-0200".to_string(),
    };
    let patients = vec![
        sample_patient("Wang Fang", "110101199001011234"),
        sample_patient("Zhao Lei", "110101198505052345"),
        sample_patient("Sun Li", "110101197712123456"),
    ];

    let store = InMemoryStore::new();
    let doctors = Arc::new(MemoryDirectory::with_entries([doctor.clone()]));
    let nurses = Arc::new(MemoryDirectory::with_entries([nurse.clone()]));
    let patient_directory = Arc::new(MemoryDirectory::with_entries(patients.clone()));
    let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default();
    let clock = Arc::new(FixedClock::at(
        today,
        NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
    ));
    let enricher = Enricher::new(doctors.clone(), nurses.clone(), patient_directory.clone());

    let schedule_service = ScheduleService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        doctors,
        nurses,
        enricher.clone(),
        clock.clone(),
    );
    let outpatient_service = OutpatientService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        patient_directory,
        enricher,
        clock,
    );

    // 1. 每周一上午的排班，持续四周
    let query = ScheduleQuery::new("2024-03-04", "2024-03-25").with_repeat("weekly");
    let created = schedule_service
        .create(
            &NewSchedule {
                doctor_id: doctor.id,
                nurse_id: nurse.id,
                start_time: "08:00:00".to_string(),
                end_time: "12:00:00".to_string(),
            },
            &query,
        )
        .await?;
    println!("✅ 创建了 {} 个排班 (批次 {})", created.len(), created[0].group);
    for schedule in &created {
        println!(
            "   - {} {}-{}",
            format_date(schedule.date),
            format_time(schedule.start_time),
            format_time(schedule.end_time)
        );
    }

    // 2. 三名患者挂今天的号
    let today_schedule = &created[0];
    let mut registered = Vec::new();
    for patient in &patients {
        let outpatient = outpatient_service
            .create(&NewOutpatient {
                work_schedule_id: today_schedule.id,
                patient_id: patient.id,
                complaint: "cough for three days".to_string(),
            })
            .await?;
        registered.push(outpatient);
    }
    println!("\n📋 {} 名患者已挂号", registered.len());

    // 3. 就诊流程
    let doctor_actor = Actor::new(doctor.id, Role::Doctor);
    let nurse_actor = Actor::new(nurse.id, Role::Nurse);
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);

    let first = outpatient_service.examine(&nurse_actor, registered[0].id).await?;
    println!("\n👩‍⚕️ 开始就诊: {} ({:?})", first.id, first.status);

    match outpatient_service.examine(&doctor_actor, registered[1].id).await {
        Ok(_) => println!("   ⚠️ 第二名患者不应同时就诊"),
        Err(e) => println!("   🚫 第二名患者被拒绝 ({:?}): {}", e.kind(), e),
    }

    let finished = outpatient_service
        .finish(
            &doctor_actor,
            registered[0].id,
            &[PrescriptionInput {
                medicine: "Amoxicillin 500mg".to_string(),
                instruction: "three times a day for 7 days".to_string(),
            }],
        )
        .await?;
    println!(
        "   ✅ 就诊结束: {:?}，处方 {} 张",
        finished.status,
        finished.prescriptions.len()
    );

    outpatient_service.examine(&doctor_actor, registered[1].id).await?;
    let canceled = outpatient_service.cancel(&admin, registered[2].id).await?;
    println!("   ❎ 管理员取消了 {} ({:?})", canceled.id, canceled.status);

    // 4. 带候诊人数的排班列表
    let window = ScheduleQuery::new("2024-03-01", "2024-03-31").with_limit(10);
    println!("\n📊 本月排班:");
    for schedule in schedule_service.find_all(&window).await? {
        let doctor_name = schedule
            .doctor
            .loaded()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| schedule.doctor_id().to_string());
        println!(
            "   - {} 医生 {} 候诊 {}",
            format_date(schedule.date),
            doctor_name,
            schedule.total_waiting
        );
    }

    let queue = outpatient_service.find_by_schedule(today_schedule.id).await?;
    println!("\n🧾 今日队列:");
    for outpatient in &queue {
        let name = outpatient
            .patient
            .loaded()
            .map(|p| p.name.as_str())
            .unwrap_or("unknown");
        let allowed = outpatient_service.possible_events(outpatient);
        println!("   - {} {:?} 可执行 {:?}", name, outpatient.status, allowed);
    }

    // 5. 护士调岗、医生离职
    let detached = schedule_service
        .remove_nurse_from_future_schedules(nurse.id)
        .await?;
    println!("\n🔄 护士已从 {} 个排班上移除", detached);

    let deleted = schedule_service
        .remove_doctor_future_schedules(doctor.id)
        .await?;
    println!("🗑️ 删除了医生 {} 个未来排班", deleted);

    let remaining = schedule_service.find_all(&window).await?;
    println!("   剩余排班: {}", remaining.len());

    println!("\n🎉 演示完成");
    Ok(())
}

fn sample_patient(name: &str, national_id: &str) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        national_id: national_id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: "555-0300".to_string(),
        birth_date: None,
    }
}
