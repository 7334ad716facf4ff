//! 门诊服务
//!
//! 驱动门诊就诊的生命周期：挂号、修改主诉、开始就诊、结束就诊、取消和删除。
//! 状态转换由 [`OutpatientStateMachine`] 校验，就诊时间取自注入的时钟。
//!
//! 同一排班同时只能有一名患者处于就诊中。服务在转换前重新读取该排班的全部门诊进行检查，
//! 这一读后写检查本身不是原子的；存储层另有唯一约束兜底，并发冲突时写入会以
//! `Unprocessable` 失败。状态写入都以读取时的状态为前提，期间被其他请求改变时同样失败。

use crate::enrichment::Enricher;
use crate::state_machine::{OutpatientStateMachine, VisitEvent};
use chrono::{DateTime, Utc};
use clinic_core::{
    Actor, ClinicError, Clock, EntityRef, NewOutpatient, Outpatient, OutpatientRepository,
    OutpatientStatus, PatientDirectory, Prescription, PrescriptionInput, Result, ResultExt, Role,
    ScheduleRepository, WorkSchedule,
};
use std::sync::Arc;
use uuid::Uuid;

/// 门诊服务
pub struct OutpatientService {
    outpatients: Arc<dyn OutpatientRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    patients: Arc<dyn PatientDirectory>,
    enricher: Enricher,
    state_machine: OutpatientStateMachine,
    clock: Arc<dyn Clock>,
}

impl OutpatientService {
    pub fn new(
        outpatients: Arc<dyn OutpatientRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        patients: Arc<dyn PatientDirectory>,
        enricher: Enricher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            outpatients,
            schedules,
            patients,
            enricher,
            state_machine: OutpatientStateMachine::new(),
            clock,
        }
    }

    /// 挂号：排班和患者必须存在，且排班尚未结束
    pub async fn create(&self, input: &NewOutpatient) -> Result<Outpatient> {
        let schedule = self.schedule(input.work_schedule_id).await?;
        let patient = self
            .patients
            .find_by_id(input.patient_id)
            .await
            .during("find patient")?;

        let now = self.clock.local_now();
        if schedule.has_elapsed(now) {
            tracing::warn!(
                "Rejected registration on work schedule {}: ended at {} {}, now {}",
                schedule.id,
                schedule.date,
                schedule.end_time,
                now
            );
            return Err(ClinicError::Unprocessable(format!(
                "work schedule {} has already elapsed",
                schedule.id
            )));
        }

        let timestamp = self.timestamp();
        let outpatient = Outpatient {
            id: Uuid::new_v4(),
            work_schedule_id: schedule.id,
            patient: EntityRef::Loaded(patient),
            complaint: input.complaint.clone(),
            status: OutpatientStatus::Waiting,
            start_time: None,
            end_time: None,
            prescriptions: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.outpatients
            .insert(&outpatient)
            .await
            .during("insert outpatient")?;

        tracing::info!(
            "Registered outpatient {} for patient {} on work schedule {}",
            outpatient.id,
            outpatient.patient_id(),
            schedule.id
        );
        Ok(outpatient)
    }

    /// 只修改主诉，状态和就诊时间保持存储中的值
    pub async fn edit_complaint(&self, id: Uuid, complaint: &str) -> Result<Outpatient> {
        self.outpatients
            .update_complaint(id, complaint, self.timestamp())
            .await
            .during("update outpatient complaint")?;

        tracing::debug!("Updated complaint of outpatient {}", id);
        self.outpatient(id).await
    }

    /// 开始就诊，只允许排班指定的医生或护士操作
    pub async fn examine(&self, actor: &Actor, id: Uuid) -> Result<Outpatient> {
        let mut outpatient = self.outpatient(id).await?;
        let schedule = self.schedule(outpatient.work_schedule_id).await?;

        if !is_assigned(actor, &schedule) {
            return Err(deny(actor, "examine", id));
        }
        let status = self.advance(&outpatient, VisitEvent::Examine)?;

        let siblings = self
            .outpatients
            .find_by_schedule(schedule.id)
            .await
            .during("find schedule outpatients")?;
        if let Some(current) = siblings
            .iter()
            .find(|o| o.id != id && o.status == OutpatientStatus::OnExamination)
        {
            tracing::warn!(
                "Rejected examination of outpatient {}: outpatient {} is already on examination",
                id,
                current.id
            );
            return Err(ClinicError::Unprocessable(format!(
                "work schedule {} already has an outpatient on examination",
                schedule.id
            )));
        }

        let expected = outpatient.status;
        outpatient.status = status;
        outpatient.start_time = Some(self.clock.time_of_day());
        outpatient.updated_at = self.timestamp();

        self.outpatients
            .update_status(&outpatient, expected)
            .await
            .during("update outpatient status")?;

        tracing::info!("Outpatient {} is on examination by {} {}", id, actor.role, actor.user_id);
        Ok(outpatient)
    }

    /// 结束就诊，只允许排班指定的医生操作；处方整体替换
    pub async fn finish(
        &self,
        actor: &Actor,
        id: Uuid,
        prescriptions: &[PrescriptionInput],
    ) -> Result<Outpatient> {
        let mut outpatient = self.outpatient(id).await?;
        let schedule = self.schedule(outpatient.work_schedule_id).await?;

        if actor.role != Role::Doctor || !is_assigned(actor, &schedule) {
            return Err(deny(actor, "finish", id));
        }
        let status = self.advance(&outpatient, VisitEvent::Finish)?;

        let timestamp = self.timestamp();
        outpatient.status = status;
        outpatient.end_time = Some(self.clock.time_of_day());
        outpatient.updated_at = timestamp;
        outpatient.prescriptions = prescriptions
            .iter()
            .map(|input| Prescription {
                id: Uuid::new_v4(),
                outpatient_id: id,
                medicine: input.medicine.clone(),
                instruction: input.instruction.clone(),
                created_at: timestamp,
            })
            .collect();

        self.outpatients
            .finish(&outpatient)
            .await
            .during("finish outpatient")?;

        tracing::info!(
            "Outpatient {} finished with {} prescriptions",
            id,
            outpatient.prescriptions.len()
        );
        Ok(outpatient)
    }

    /// 取消候诊：管理员总是可以取消，医生和护士只能取消自己排班上的门诊
    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<Outpatient> {
        let mut outpatient = self.outpatient(id).await?;
        let schedule = self.schedule(outpatient.work_schedule_id).await?;

        if actor.role != Role::Admin && !is_assigned(actor, &schedule) {
            return Err(deny(actor, "cancel", id));
        }
        let expected = outpatient.status;
        outpatient.status = self.advance(&outpatient, VisitEvent::Cancel)?;
        outpatient.updated_at = self.timestamp();

        self.outpatients
            .update_status(&outpatient, expected)
            .await
            .during("update outpatient status")?;

        tracing::info!("Outpatient {} canceled by {} {}", id, actor.role, actor.user_id);
        Ok(outpatient)
    }

    /// 删除门诊及其处方，就诊中的门诊不能删除
    pub async fn remove_by_id(&self, id: Uuid) -> Result<()> {
        let outpatient = self.outpatient(id).await?;
        if outpatient.status == OutpatientStatus::OnExamination {
            tracing::warn!("Rejected removal of outpatient {}: on examination", id);
            return Err(ClinicError::Unprocessable(format!(
                "outpatient {} is on examination",
                id
            )));
        }

        self.outpatients
            .delete_by_id(id)
            .await
            .during("delete outpatient")?;

        tracing::info!("Deleted outpatient {} ({})", id, outpatient.status);
        Ok(())
    }

    /// 删除患者所有候诊中的门诊，返回删除数
    pub async fn remove_waiting_by_patient(&self, patient_id: Uuid) -> Result<u64> {
        let deleted = self
            .outpatients
            .delete_waiting_by_patient(patient_id)
            .await
            .during("delete waiting outpatients")?;

        tracing::info!("Deleted {} waiting outpatients of patient {}", deleted, patient_id);
        Ok(deleted)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Outpatient> {
        let mut outpatient = self.outpatient(id).await?;
        self.enricher
            .enrich_outpatients(std::slice::from_mut(&mut outpatient))
            .await?;
        Ok(outpatient)
    }

    /// 某个排班的候诊队列，按挂号时间排序
    pub async fn find_by_schedule(&self, schedule_id: Uuid) -> Result<Vec<Outpatient>> {
        let mut outpatients = self
            .outpatients
            .find_by_schedule(schedule_id)
            .await
            .during("find schedule outpatients")?;
        self.enricher.enrich_outpatients(&mut outpatients).await?;
        Ok(outpatients)
    }

    /// 患者的就诊历史
    pub async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Outpatient>> {
        let mut outpatients = self
            .outpatients
            .find_by_patient(patient_id)
            .await
            .during("find patient outpatients")?;
        self.enricher.enrich_outpatients(&mut outpatients).await?;
        Ok(outpatients)
    }

    /// 当前状态下允许的操作
    pub fn possible_events(&self, outpatient: &Outpatient) -> Vec<VisitEvent> {
        self.state_machine.possible_events(outpatient.status)
    }

    fn advance(&self, outpatient: &Outpatient, event: VisitEvent) -> Result<OutpatientStatus> {
        self.state_machine
            .transition(outpatient.status, event)
            .map_err(|err| {
                tracing::warn!(
                    "Rejected {:?} on outpatient {} in status {}",
                    event,
                    outpatient.id,
                    outpatient.status
                );
                err
            })
    }

    async fn outpatient(&self, id: Uuid) -> Result<Outpatient> {
        self.outpatients
            .find_by_id(id)
            .await
            .during("find outpatient")
    }

    async fn schedule(&self, id: Uuid) -> Result<WorkSchedule> {
        self.schedules
            .find_by_id(id)
            .await
            .during("find work schedule")
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }
}

/// 调用者是否为排班指定的医生或护士
fn is_assigned(actor: &Actor, schedule: &WorkSchedule) -> bool {
    match actor.role {
        Role::Doctor => actor.user_id == schedule.doctor_id(),
        Role::Nurse => schedule.nurse_id() == Some(actor.user_id),
        Role::Admin | Role::Patient => false,
    }
}

fn deny(actor: &Actor, action: &str, outpatient_id: Uuid) -> ClinicError {
    tracing::warn!(
        "Denied {} on outpatient {} to {} {}",
        action,
        outpatient_id,
        actor.role,
        actor.user_id
    );
    ClinicError::Unauthorized(format!(
        "{} {} may not {} outpatient {}",
        actor.role, actor.user_id, action, outpatient_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use clinic_core::{Doctor, ErrorKind, FixedClock, Nurse, Patient};
    use clinic_database::{InMemoryStore, MemoryDirectory};

    struct Fixture {
        service: OutpatientService,
        store: InMemoryStore,
        schedule: WorkSchedule,
        doctor: Actor,
        nurse: Actor,
        patient: Patient,
    }

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 6).unwrap()
    }

    fn work_schedule(date: NaiveDate, doctor_id: Uuid, nurse_id: Uuid) -> WorkSchedule {
        WorkSchedule {
            id: Uuid::new_v4(),
            group: Uuid::new_v4(),
            date,
            start_time: hms(8, 0, 0),
            end_time: hms(12, 0, 0),
            doctor: EntityRef::Id(doctor_id),
            nurse: Some(EntityRef::Id(nurse_id)),
            total_waiting: 0,
            outpatients: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn fixture_at(time: NaiveTime) -> Fixture {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Li Wei".into(),
            email: "li.wei@clinic.local".into(),
            phone: "555-0100".into(),
            specialty: "Internal Medicine".into(),
            room: "A-201".into(),
        };
        let nurse = Nurse {
            id: Uuid::new_v4(),
            name: "Zhou Min".into(),
            email: "zhou.min@clinic.local".into(),
            phone: "555-0200".into(),
        };
        let patient = Patient {
            id: Uuid::new_v4(),
            national_id: "110101199001011234".into(),
            name: "Wang Fang".into(),
            email: "wang.fang@example.com".into(),
            phone: "555-0300".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1),
        };

        let store = InMemoryStore::new();
        let schedule = work_schedule(today(), doctor.id, nurse.id);
        store.insert_batch(&[schedule.clone()]).await.unwrap();

        let doctors = Arc::new(MemoryDirectory::with_entries([doctor.clone()]));
        let nurses = Arc::new(MemoryDirectory::with_entries([nurse.clone()]));
        let patients = Arc::new(MemoryDirectory::with_entries([patient.clone()]));
        let enricher = Enricher::new(doctors, nurses, patients.clone());
        let clock = Arc::new(FixedClock::at(today(), time));

        let service = OutpatientService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            patients,
            enricher,
            clock,
        );

        Fixture {
            service,
            store,
            schedule,
            doctor: Actor::new(doctor.id, Role::Doctor),
            nurse: Actor::new(nurse.id, Role::Nurse),
            patient,
        }
    }

    async fn fixture() -> Fixture {
        fixture_at(hms(9, 15, 30)).await
    }

    async fn register(f: &Fixture) -> Outpatient {
        let input = NewOutpatient {
            work_schedule_id: f.schedule.id,
            patient_id: f.patient.id,
            complaint: "persistent cough".into(),
        };
        f.service.create(&input).await.unwrap()
    }

    fn stranger(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role)
    }

    #[tokio::test]
    async fn test_create_starts_waiting() {
        let f = fixture().await;
        let outpatient = register(&f).await;

        assert_eq!(outpatient.status, OutpatientStatus::Waiting);
        assert_eq!(outpatient.start_time, None);
        assert_eq!(outpatient.patient.loaded(), Some(&f.patient));

        let stored = f.service.find_by_id(outpatient.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::Waiting);
        assert_eq!(stored.complaint, "persistent cough");
        assert_eq!(
            f.service.possible_events(&stored),
            vec![VisitEvent::Examine, VisitEvent::Cancel]
        );
    }

    #[tokio::test]
    async fn test_create_requires_schedule_and_patient() {
        let f = fixture().await;

        let err = f
            .service
            .create(&NewOutpatient {
                work_schedule_id: Uuid::new_v4(),
                patient_id: f.patient.id,
                complaint: "rash".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.operations(), vec!["find work schedule"]);

        let err = f
            .service
            .create(&NewOutpatient {
                work_schedule_id: f.schedule.id,
                patient_id: Uuid::new_v4(),
                complaint: "rash".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.operations(), vec!["find patient"]);
    }

    #[tokio::test]
    async fn test_create_rejects_elapsed_schedule() {
        let f = fixture().await;
        let yesterday = work_schedule(
            today().pred_opt().unwrap(),
            f.doctor.user_id,
            f.nurse.user_id,
        );
        f.store.insert_batch(&[yesterday.clone()]).await.unwrap();

        let err = f
            .service
            .create(&NewOutpatient {
                work_schedule_id: yesterday.id,
                patient_id: f.patient.id,
                complaint: "rash".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);

        // 当天班次结束后不再接受挂号
        let late = fixture_at(hms(12, 0, 1)).await;
        let err = late
            .service
            .create(&NewOutpatient {
                work_schedule_id: late.schedule.id,
                patient_id: late.patient.id,
                complaint: "rash".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);

        let last_minute = fixture_at(hms(12, 0, 0)).await;
        assert_eq!(register(&last_minute).await.status, OutpatientStatus::Waiting);
    }

    #[tokio::test]
    async fn test_edit_complaint_only_touches_complaint() {
        let f = fixture().await;
        let outpatient = register(&f).await;

        let edited = f
            .service
            .edit_complaint(outpatient.id, "cough and fever")
            .await
            .unwrap();
        assert_eq!(edited.complaint, "cough and fever");

        let stored = f.service.find_by_id(outpatient.id).await.unwrap();
        assert_eq!(stored.complaint, "cough and fever");
        assert_eq!(stored.status, OutpatientStatus::Waiting);

        let err = f.service.edit_complaint(Uuid::new_v4(), "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_edit_complaint_keeps_examination_state() {
        let f = fixture().await;
        let outpatient = register(&f).await;
        f.service.examine(&f.doctor, outpatient.id).await.unwrap();

        let edited = f
            .service
            .edit_complaint(outpatient.id, "cough, worse at night")
            .await
            .unwrap();
        assert_eq!(edited.status, OutpatientStatus::OnExamination);
        assert_eq!(edited.start_time, Some(hms(9, 15, 30)));

        let stored = f.service.find_by_id(outpatient.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::OnExamination);
        assert_eq!(stored.complaint, "cough, worse at night");
    }

    #[tokio::test]
    async fn test_examine_by_assigned_staff() {
        let f = fixture().await;
        let first = register(&f).await;
        let second = register(&f).await;

        let examined = f.service.examine(&f.doctor, first.id).await.unwrap();
        assert_eq!(examined.status, OutpatientStatus::OnExamination);
        assert_eq!(examined.start_time, Some(hms(9, 15, 30)));

        let stored = f.service.find_by_id(first.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::OnExamination);
        assert_eq!(stored.start_time, Some(hms(9, 15, 30)));

        f.service.finish(&f.doctor, first.id, &[]).await.unwrap();
        let examined = f.service.examine(&f.nurse, second.id).await.unwrap();
        assert_eq!(examined.status, OutpatientStatus::OnExamination);
    }

    #[tokio::test]
    async fn test_examine_rejects_unassigned_callers() {
        let f = fixture().await;
        let outpatient = register(&f).await;

        for actor in [
            stranger(Role::Doctor),
            stranger(Role::Nurse),
            stranger(Role::Admin),
            Actor::new(f.patient.id, Role::Patient),
            // 医生ID冒用护士角色
            Actor::new(f.doctor.user_id, Role::Nurse),
        ] {
            let err = f.service.examine(&actor, outpatient.id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized, "{:?}", actor);
        }

        let stored = f.service.find_by_id(outpatient.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::Waiting);
    }

    #[tokio::test]
    async fn test_examine_rejects_second_active_examination() {
        let f = fixture().await;
        let first = register(&f).await;
        let second = register(&f).await;

        f.service.examine(&f.doctor, first.id).await.unwrap();
        let err = f.service.examine(&f.nurse, second.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);

        let stored = f.service.find_by_id(second.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::Waiting);

        // 已在就诊中的门诊不能再次开始
        let err = f.service.examine(&f.doctor, first.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn test_finish_rules() {
        let f = fixture().await;
        let outpatient = register(&f).await;

        let err = f.service.finish(&f.doctor, outpatient.id, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);

        f.service.examine(&f.nurse, outpatient.id).await.unwrap();

        let err = f.service.finish(&f.nurse, outpatient.id, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = f
            .service
            .finish(&stranger(Role::Doctor), outpatient.id, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let prescriptions = vec![
            PrescriptionInput {
                medicine: "Amoxicillin 500mg".into(),
                instruction: "three times a day for 7 days".into(),
            },
            PrescriptionInput {
                medicine: "Paracetamol 500mg".into(),
                instruction: "as needed for fever".into(),
            },
        ];
        let finished = f
            .service
            .finish(&f.doctor, outpatient.id, &prescriptions)
            .await
            .unwrap();
        assert_eq!(finished.status, OutpatientStatus::Finished);
        assert_eq!(finished.end_time, Some(hms(9, 15, 30)));

        let stored = f.service.find_by_id(outpatient.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::Finished);
        let medicines: Vec<&str> = stored.prescriptions.iter().map(|p| p.medicine.as_str()).collect();
        assert_eq!(medicines, vec!["Amoxicillin 500mg", "Paracetamol 500mg"]);
        assert!(stored.prescriptions.iter().all(|p| p.outpatient_id == outpatient.id));
        assert!(f.service.possible_events(&stored).is_empty());
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let f = fixture().await;
        let examined = register(&f).await;
        let queued = register(&f).await;
        f.service.examine(&f.doctor, examined.id).await.unwrap();

        let err = f.service.cancel(&f.doctor, examined.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);

        let err = f.service.cancel(&stranger(Role::Nurse), queued.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = f
            .service
            .cancel(&Actor::new(f.patient.id, Role::Patient), queued.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let canceled = f.service.cancel(&stranger(Role::Admin), queued.id).await.unwrap();
        assert_eq!(canceled.status, OutpatientStatus::Canceled);

        let other = register(&f).await;
        let canceled = f.service.cancel(&f.nurse, other.id).await.unwrap();
        assert_eq!(canceled.status, OutpatientStatus::Canceled);
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let f = fixture().await;
        let examined = register(&f).await;
        let queued = register(&f).await;
        f.service.examine(&f.doctor, examined.id).await.unwrap();

        let err = f.service.remove_by_id(examined.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unprocessable);
        assert!(f.service.find_by_id(examined.id).await.is_ok());

        f.service.remove_by_id(queued.id).await.unwrap();
        let err = f.service.find_by_id(queued.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        f.service.finish(&f.doctor, examined.id, &[]).await.unwrap();
        f.service.remove_by_id(examined.id).await.unwrap();
        assert!(f.service.find_by_id(examined.id).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_waiting_by_patient_keeps_history() {
        let f = fixture().await;
        let finished = register(&f).await;
        let canceled = register(&f).await;
        register(&f).await;
        register(&f).await;

        f.service.examine(&f.doctor, finished.id).await.unwrap();
        f.service.finish(&f.doctor, finished.id, &[]).await.unwrap();
        f.service.cancel(&f.doctor, canceled.id).await.unwrap();

        let deleted = f.service.remove_waiting_by_patient(f.patient.id).await.unwrap();
        assert_eq!(deleted, 2);

        let history = f.service.find_by_patient(f.patient.id).await.unwrap();
        let statuses: Vec<OutpatientStatus> = history.iter().map(|o| o.status).collect();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains(&OutpatientStatus::Finished));
        assert!(statuses.contains(&OutpatientStatus::Canceled));
        assert!(history.iter().all(|o| o.patient.loaded() == Some(&f.patient)));
    }

    #[tokio::test]
    async fn test_queue_is_enriched() {
        let f = fixture().await;
        let first = register(&f).await;
        let second = register(&f).await;

        let queue = f.service.find_by_schedule(f.schedule.id).await.unwrap();
        let ids: Vec<Uuid> = queue.iter().map(|o| o.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        assert!(queue.iter().all(|o| o.patient.is_loaded()));
    }
}
