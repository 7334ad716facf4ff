//! 排班服务
//!
//! 负责排班的批量创建、修改、删除以及医生/护士离职时的未来排班清理。
//! 所有查询结果都会经过补全层，附带医生、护士快照和候诊人数。

use crate::enrichment::{apply_waiting_counts, Enricher};
use crate::recurrence;
use chrono::{DateTime, Utc};
use clinic_core::utils::{generate_group_id, parse_date, parse_time_range};
use clinic_core::{
    ClinicError, Clock, Doctor, DoctorDirectory, EntityRef, NewSchedule, Nurse, NurseDirectory,
    OutpatientRepository, Result, ResultExt, ScheduleEdit, ScheduleQuery, ScheduleRepository,
    ScheduleWindow, WorkSchedule,
};
use std::sync::Arc;
use uuid::Uuid;

/// 排班服务
pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
    outpatients: Arc<dyn OutpatientRepository>,
    doctors: Arc<DoctorDirectory>,
    nurses: Arc<NurseDirectory>,
    enricher: Enricher,
    clock: Arc<dyn Clock>,
}

impl ScheduleService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        outpatients: Arc<dyn OutpatientRepository>,
        doctors: Arc<DoctorDirectory>,
        nurses: Arc<NurseDirectory>,
        enricher: Enricher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedules,
            outpatients,
            doctors,
            nurses,
            enricher,
            clock,
        }
    }

    /// 按重复规则批量创建排班
    ///
    /// 同一次请求生成的所有排班共享一个批次标识，并通过一次批量插入落库。
    pub async fn create(&self, input: &NewSchedule, query: &ScheduleQuery) -> Result<Vec<WorkSchedule>> {
        let (doctor, nurse) = self.staff(input.doctor_id, input.nurse_id).await?;
        let (start_time, end_time) = parse_time_range(&input.start_time, &input.end_time)?;
        let dates = recurrence::generate(&query.start_date, &query.end_date, &query.repeat)?;
        if dates.is_empty() {
            return Err(ClinicError::InvalidArgument(format!(
                "no dates between {} and {}",
                query.start_date, query.end_date
            )));
        }

        let group = generate_group_id();
        let now = self.timestamp();
        let schedules: Vec<WorkSchedule> = dates
            .into_iter()
            .map(|date| WorkSchedule {
                id: Uuid::new_v4(),
                group,
                date,
                start_time,
                end_time,
                doctor: EntityRef::Loaded(doctor.clone()),
                nurse: Some(EntityRef::Loaded(nurse.clone())),
                total_waiting: 0,
                outpatients: Vec::new(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.schedules
            .insert_batch(&schedules)
            .await
            .during("insert work schedules")?;

        tracing::info!(
            "Created {} work schedules in group {} for doctor {} ({})",
            schedules.len(),
            group,
            doctor.id,
            query.repeat
        );
        Ok(schedules)
    }

    /// 修改排班的医生、护士、日期和时间，批次和创建时间保持不变
    pub async fn edit(&self, input: &ScheduleEdit) -> Result<WorkSchedule> {
        let mut schedule = self
            .schedules
            .find_by_id(input.id)
            .await
            .during("find work schedule")?;
        let (doctor, nurse) = self.staff(input.doctor_id, input.nurse_id).await?;
        let date = parse_date(&input.date)?;
        let (start_time, end_time) = parse_time_range(&input.start_time, &input.end_time)?;

        schedule.doctor = EntityRef::Loaded(doctor);
        schedule.nurse = Some(EntityRef::Loaded(nurse));
        schedule.date = date;
        schedule.start_time = start_time;
        schedule.end_time = end_time;
        schedule.updated_at = self.timestamp();

        self.schedules
            .update(&schedule)
            .await
            .during("update work schedule")?;

        tracing::info!("Updated work schedule {} (group {})", schedule.id, schedule.group);
        Ok(schedule)
    }

    /// 删除单个排班，门诊和处方随之删除
    pub async fn remove_by_id(&self, id: Uuid) -> Result<()> {
        self.schedules
            .delete_by_id(id)
            .await
            .during("delete work schedule")?;

        tracing::info!("Deleted work schedule {}", id);
        Ok(())
    }

    /// 删除医生今天及以后的全部排班，返回删除数
    pub async fn remove_doctor_future_schedules(&self, doctor_id: Uuid) -> Result<u64> {
        let window = ScheduleWindow::from_today(self.clock.today());
        let deleted = self
            .schedules
            .delete_by_doctor(doctor_id, &window)
            .await
            .during("delete doctor schedules")?;

        tracing::info!(
            "Deleted {} future work schedules of doctor {} from {}",
            deleted,
            doctor_id,
            window.start
        );
        Ok(deleted)
    }

    /// 从护士今天及以后的排班上移除护士，排班本身保留
    pub async fn remove_nurse_from_future_schedules(&self, nurse_id: Uuid) -> Result<u64> {
        let window = ScheduleWindow::from_today(self.clock.today());
        let affected = self
            .schedules
            .clear_nurse(nurse_id, &window)
            .await
            .during("clear nurse from schedules")?;

        tracing::info!(
            "Removed nurse {} from {} future work schedules from {}",
            nurse_id,
            affected,
            window.start
        );
        Ok(affected)
    }

    pub async fn find_all(&self, query: &ScheduleQuery) -> Result<Vec<WorkSchedule>> {
        let window = query.window()?;
        let schedules = self
            .schedules
            .find_all(&window)
            .await
            .during("find work schedules")?;
        self.decorate(schedules).await
    }

    pub async fn find_by_doctor(&self, doctor_id: Uuid, query: &ScheduleQuery) -> Result<Vec<WorkSchedule>> {
        let window = query.window()?;
        let schedules = self
            .schedules
            .find_by_doctor(doctor_id, &window)
            .await
            .during("find doctor schedules")?;
        self.decorate(schedules).await
    }

    pub async fn find_by_nurse(&self, nurse_id: Uuid, query: &ScheduleQuery) -> Result<Vec<WorkSchedule>> {
        let window = query.window()?;
        let schedules = self
            .schedules
            .find_by_nurse(nurse_id, &window)
            .await
            .during("find nurse schedules")?;
        self.decorate(schedules).await
    }

    /// 单个排班，附带其门诊队列
    pub async fn find_by_id(&self, id: Uuid) -> Result<WorkSchedule> {
        let mut schedule = self
            .schedules
            .find_by_id(id)
            .await
            .during("find work schedule")?;
        schedule.outpatients = self
            .outpatients
            .find_by_schedule(id)
            .await
            .during("find schedule outpatients")?;

        self.decorate_in_place(std::slice::from_mut(&mut schedule)).await?;
        Ok(schedule)
    }

    async fn staff(&self, doctor_id: Uuid, nurse_id: Uuid) -> Result<(Doctor, Nurse)> {
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await
            .during("find doctor")?;
        let nurse = self
            .nurses
            .find_by_id(nurse_id)
            .await
            .during("find nurse")?;
        Ok((doctor, nurse))
    }

    async fn decorate(&self, mut schedules: Vec<WorkSchedule>) -> Result<Vec<WorkSchedule>> {
        self.decorate_in_place(&mut schedules).await?;
        Ok(schedules)
    }

    async fn decorate_in_place(&self, schedules: &mut [WorkSchedule]) -> Result<()> {
        if schedules.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = schedules.iter().map(|s| s.id).collect();
        let counts = self
            .schedules
            .count_waiting(&ids)
            .await
            .during("count waiting outpatients")?;
        self.enricher.enrich_schedules(schedules).await?;
        apply_waiting_counts(schedules, &counts);
        Ok(())
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }
}
