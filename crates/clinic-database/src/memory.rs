//! 内存存储后端
//!
//! 与PostgreSQL实现遵循同一套仓储契约，用于测试和演示。所有表共用一把写锁，
//! 因此级联删除天然是原子的；就诊中唯一约束与数据库的部分唯一索引保持一致。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_core::{
    ClinicError, Directory, EntityRef, Identified, Outpatient, OutpatientRepository,
    OutpatientStatus, Patient, PatientDirectory, Result, ScheduleRepository, ScheduleWindow,
    WorkSchedule,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    schedules: HashMap<Uuid, WorkSchedule>,
    outpatients: HashMap<Uuid, Outpatient>,
}

impl Tables {
    fn remove_schedule_cascade(&mut self, schedule_id: Uuid) -> bool {
        self.outpatients
            .retain(|_, outpatient| outpatient.work_schedule_id != schedule_id);
        self.schedules.remove(&schedule_id).is_some()
    }

    fn sorted_outpatients<F>(&self, predicate: F) -> Vec<Outpatient>
    where
        F: Fn(&Outpatient) -> bool,
    {
        let mut list: Vec<Outpatient> = self
            .outpatients
            .values()
            .filter(|o| predicate(o))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        list
    }
}

/// 只保留外键，丢弃计算字段和补全快照
fn stored_schedule(schedule: &WorkSchedule) -> WorkSchedule {
    WorkSchedule {
        doctor: EntityRef::Id(schedule.doctor_id()),
        nurse: schedule.nurse_id().map(EntityRef::Id),
        total_waiting: 0,
        outpatients: Vec::new(),
        ..schedule.clone()
    }
}

fn stored_outpatient(outpatient: &Outpatient) -> Outpatient {
    Outpatient {
        patient: EntityRef::Id(outpatient.patient_id()),
        ..outpatient.clone()
    }
}

/// 排班与门诊的内存仓储
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filter_schedules<F>(&self, window: &ScheduleWindow, predicate: F) -> Vec<WorkSchedule>
    where
        F: Fn(&WorkSchedule) -> bool,
    {
        let tables = self.tables.read().await;
        let mut list: Vec<WorkSchedule> = tables
            .schedules
            .values()
            .filter(|s| window.contains(s.date) && predicate(s))
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            (a.date, a.start_time, a.created_at).cmp(&(b.date, b.start_time, b.created_at))
        });
        if let Some(limit) = window.limit {
            list.truncate(limit.max(0) as usize);
        }
        list
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn insert_batch(&self, schedules: &[WorkSchedule]) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(duplicate) = schedules.iter().find(|s| tables.schedules.contains_key(&s.id)) {
            return Err(ClinicError::Unprocessable(format!(
                "work schedule {} already exists",
                duplicate.id
            )));
        }
        for schedule in schedules {
            tables.schedules.insert(schedule.id, stored_schedule(schedule));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<WorkSchedule> {
        let tables = self.tables.read().await;
        tables
            .schedules
            .get(&id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("work schedule {} not found", id)))
    }

    async fn find_all(&self, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>> {
        Ok(self.filter_schedules(window, |_| true).await)
    }

    async fn find_by_doctor(&self, doctor_id: Uuid, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>> {
        Ok(self
            .filter_schedules(window, |s| s.doctor_id() == doctor_id)
            .await)
    }

    async fn find_by_nurse(&self, nurse_id: Uuid, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>> {
        Ok(self
            .filter_schedules(window, |s| s.nurse_id() == Some(nurse_id))
            .await)
    }

    async fn update(&self, schedule: &WorkSchedule) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables.schedules.get_mut(&schedule.id).ok_or_else(|| {
            ClinicError::NotFound(format!("work schedule {} not found", schedule.id))
        })?;

        stored.doctor = EntityRef::Id(schedule.doctor_id());
        stored.nurse = schedule.nurse_id().map(EntityRef::Id);
        stored.date = schedule.date;
        stored.start_time = schedule.start_time;
        stored.end_time = schedule.end_time;
        stored.updated_at = schedule.updated_at;
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.schedules.contains_key(&id) {
            return Err(ClinicError::NotFound(format!("work schedule {} not found", id)));
        }
        tables.remove_schedule_cascade(id);
        Ok(())
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid, window: &ScheduleWindow) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let ids: Vec<Uuid> = tables
            .schedules
            .values()
            .filter(|s| s.doctor_id() == doctor_id && window.contains(s.date))
            .map(|s| s.id)
            .collect();

        for id in &ids {
            tables.remove_schedule_cascade(*id);
        }
        Ok(ids.len() as u64)
    }

    async fn clear_nurse(&self, nurse_id: Uuid, window: &ScheduleWindow) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut affected = 0;
        for schedule in tables.schedules.values_mut() {
            if schedule.nurse_id() == Some(nurse_id) && window.contains(schedule.date) {
                schedule.nurse = None;
                schedule.updated_at = Utc::now();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn count_waiting(&self, schedule_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for outpatient in tables.outpatients.values() {
            if outpatient.status == OutpatientStatus::Waiting
                && schedule_ids.contains(&outpatient.work_schedule_id)
            {
                *counts.entry(outpatient.work_schedule_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl OutpatientRepository for InMemoryStore {
    async fn insert(&self, outpatient: &Outpatient) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.schedules.contains_key(&outpatient.work_schedule_id) {
            return Err(ClinicError::Database(format!(
                "work schedule {} does not exist",
                outpatient.work_schedule_id
            )));
        }
        tables
            .outpatients
            .insert(outpatient.id, stored_outpatient(outpatient));
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Outpatient> {
        let tables = self.tables.read().await;
        tables
            .outpatients
            .get(&id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("outpatient {} not found", id)))
    }

    async fn find_by_schedule(&self, schedule_id: Uuid) -> Result<Vec<Outpatient>> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_outpatients(|o| o.work_schedule_id == schedule_id))
    }

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Outpatient>> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_outpatients(|o| o.patient_id() == patient_id))
    }

    async fn update_complaint(&self, id: Uuid, complaint: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .outpatients
            .get_mut(&id)
            .ok_or_else(|| ClinicError::NotFound(format!("outpatient {} not found", id)))?;
        stored.complaint = complaint.to_string();
        stored.updated_at = updated_at;
        Ok(())
    }

    async fn update_status(&self, outpatient: &Outpatient, expected: OutpatientStatus) -> Result<()> {
        let mut tables = self.tables.write().await;

        if outpatient.status == OutpatientStatus::OnExamination {
            let conflict = tables.outpatients.values().any(|o| {
                o.id != outpatient.id
                    && o.work_schedule_id == outpatient.work_schedule_id
                    && o.status == OutpatientStatus::OnExamination
            });
            if conflict {
                return Err(ClinicError::Unprocessable(format!(
                    "work schedule {} already has an outpatient on examination",
                    outpatient.work_schedule_id
                )));
            }
        }

        let stored = tables.outpatients.get_mut(&outpatient.id).ok_or_else(|| {
            ClinicError::NotFound(format!("outpatient {} not found", outpatient.id))
        })?;
        if stored.status != expected {
            return Err(ClinicError::Unprocessable(format!(
                "outpatient {} is no longer {}",
                outpatient.id, expected
            )));
        }
        stored.status = outpatient.status;
        stored.start_time = outpatient.start_time;
        stored.end_time = outpatient.end_time;
        stored.updated_at = outpatient.updated_at;
        Ok(())
    }

    async fn finish(&self, outpatient: &Outpatient) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables.outpatients.get_mut(&outpatient.id).ok_or_else(|| {
            ClinicError::NotFound(format!("outpatient {} not found", outpatient.id))
        })?;
        if stored.status != OutpatientStatus::OnExamination {
            return Err(ClinicError::Unprocessable(format!(
                "outpatient {} is not on examination",
                outpatient.id
            )));
        }

        stored.status = outpatient.status;
        stored.end_time = outpatient.end_time;
        stored.updated_at = outpatient.updated_at;
        stored.prescriptions = outpatient.prescriptions.clone();
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.outpatients.get(&id) {
            None => Err(ClinicError::NotFound(format!("outpatient {} not found", id))),
            Some(o) if o.status == OutpatientStatus::OnExamination => Err(
                ClinicError::Unprocessable(format!("outpatient {} is on examination", id)),
            ),
            Some(_) => {
                tables.outpatients.remove(&id);
                Ok(())
            }
        }
    }

    async fn delete_waiting_by_patient(&self, patient_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.outpatients.len();
        tables.outpatients.retain(|_, o| {
            !(o.patient_id() == patient_id && o.status == OutpatientStatus::Waiting)
        });
        Ok((before - tables.outpatients.len()) as u64)
    }
}

/// 内存目录，记录每次批量查询的参数
#[derive(Debug)]
pub struct MemoryDirectory<T> {
    entries: RwLock<HashMap<Uuid, T>>,
    batch_calls: RwLock<Vec<Vec<Uuid>>>,
}

impl<T: Identified + Clone> MemoryDirectory<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            batch_calls: RwLock::new(Vec::new()),
        }
    }

    pub fn with_entries(entries: impl IntoIterator<Item = T>) -> Self {
        let map = entries.into_iter().map(|e| (e.id(), e)).collect();
        Self {
            entries: RwLock::new(map),
            batch_calls: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(&self, entity: T) {
        self.entries.write().await.insert(entity.id(), entity);
    }

    pub async fn remove(&self, id: Uuid) -> Option<T> {
        self.entries.write().await.remove(&id)
    }

    /// 已发生的批量查询
    pub async fn batch_calls(&self) -> Vec<Vec<Uuid>> {
        self.batch_calls.read().await.clone()
    }
}

impl<T: Identified + Clone> Default for MemoryDirectory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Directory<T> for MemoryDirectory<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    async fn find_by_id(&self, id: Uuid) -> Result<T> {
        self.entries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("{} not found", id)))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<T>> {
        self.batch_calls.write().await.push(ids.to_vec());
        let entries = self.entries.read().await;
        Ok(ids.iter().filter_map(|id| entries.get(id).cloned()).collect())
    }
}

#[async_trait]
impl PatientDirectory for MemoryDirectory<Patient> {
    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Patient>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .find(|p| p.national_id == national_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn schedule(doctor_id: Uuid, nurse_id: Uuid, date: NaiveDate) -> WorkSchedule {
        WorkSchedule {
            id: Uuid::new_v4(),
            group: Uuid::new_v4(),
            date,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            doctor: EntityRef::Id(doctor_id),
            nurse: Some(EntityRef::Id(nurse_id)),
            total_waiting: 0,
            outpatients: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn outpatient(schedule_id: Uuid, status: OutpatientStatus) -> Outpatient {
        Outpatient {
            id: Uuid::new_v4(),
            work_schedule_id: schedule_id,
            patient: EntityRef::Id(Uuid::new_v4()),
            complaint: "headache".into(),
            status,
            start_time: None,
            end_time: None,
            prescriptions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_delete_schedule_cascades_to_outpatients() {
        let store = InMemoryStore::new();
        let s = schedule(Uuid::new_v4(), Uuid::new_v4(), day(1));
        store.insert_batch(&[s.clone()]).await.unwrap();
        let o = outpatient(s.id, OutpatientStatus::Waiting);
        store.insert(&o).await.unwrap();

        ScheduleRepository::delete_by_id(&store, s.id).await.unwrap();

        assert!(ScheduleRepository::find_by_id(&store, s.id).await.is_err());
        assert!(OutpatientRepository::find_by_id(&store, o.id).await.is_err());
    }

    #[tokio::test]
    async fn test_count_waiting_ignores_other_statuses() {
        let store = InMemoryStore::new();
        let s = schedule(Uuid::new_v4(), Uuid::new_v4(), day(1));
        store.insert_batch(&[s.clone()]).await.unwrap();
        store.insert(&outpatient(s.id, OutpatientStatus::Waiting)).await.unwrap();
        store.insert(&outpatient(s.id, OutpatientStatus::Waiting)).await.unwrap();
        store.insert(&outpatient(s.id, OutpatientStatus::Canceled)).await.unwrap();

        let counts = store.count_waiting(&[s.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(counts.get(&s.id), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[tokio::test]
    async fn test_window_and_limit() {
        let store = InMemoryStore::new();
        let doctor = Uuid::new_v4();
        let nurse = Uuid::new_v4();
        let rows: Vec<_> = (1..=5).map(|d| schedule(doctor, nurse, day(d))).collect();
        store.insert_batch(&rows).await.unwrap();

        let window = ScheduleWindow { start: day(2), end: day(4), limit: None };
        let found = store.find_by_doctor(doctor, &window).await.unwrap();
        assert_eq!(found.iter().map(|s| s.date).collect::<Vec<_>>(), vec![day(2), day(3), day(4)]);

        let window = ScheduleWindow { start: day(1), end: day(5), limit: Some(2) };
        assert_eq!(store.find_all(&window).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_examination_rejected_by_store() {
        let store = InMemoryStore::new();
        let s = schedule(Uuid::new_v4(), Uuid::new_v4(), day(1));
        store.insert_batch(&[s.clone()]).await.unwrap();
        let first = outpatient(s.id, OutpatientStatus::OnExamination);
        store.insert(&first).await.unwrap();
        let mut second = outpatient(s.id, OutpatientStatus::Waiting);
        store.insert(&second).await.unwrap();

        second.status = OutpatientStatus::OnExamination;
        let err = store
            .update_status(&second, OutpatientStatus::Waiting)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), clinic_core::ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn test_stale_status_write_does_not_revert() {
        let store = InMemoryStore::new();
        let s = schedule(Uuid::new_v4(), Uuid::new_v4(), day(1));
        store.insert_batch(&[s.clone()]).await.unwrap();
        let waiting = outpatient(s.id, OutpatientStatus::Waiting);
        store.insert(&waiting).await.unwrap();

        // 两个请求读到同一份候诊记录
        let stale = OutpatientRepository::find_by_id(&store, waiting.id).await.unwrap();
        let mut examined = stale.clone();
        examined.status = OutpatientStatus::OnExamination;
        examined.start_time = NaiveTime::from_hms_opt(9, 0, 0);
        store
            .update_status(&examined, OutpatientStatus::Waiting)
            .await
            .unwrap();

        let mut canceled = stale.clone();
        canceled.status = OutpatientStatus::Canceled;
        let err = store
            .update_status(&canceled, OutpatientStatus::Waiting)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), clinic_core::ErrorKind::Unprocessable);

        store
            .update_complaint(waiting.id, "fever", Utc::now())
            .await
            .unwrap();

        let stored = OutpatientRepository::find_by_id(&store, waiting.id).await.unwrap();
        assert_eq!(stored.status, OutpatientStatus::OnExamination);
        assert_eq!(stored.start_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(stored.complaint, "fever");
    }

    #[tokio::test]
    async fn test_delete_refuses_outpatient_on_examination() {
        let store = InMemoryStore::new();
        let s = schedule(Uuid::new_v4(), Uuid::new_v4(), day(1));
        store.insert_batch(&[s.clone()]).await.unwrap();
        let examined = outpatient(s.id, OutpatientStatus::OnExamination);
        store.insert(&examined).await.unwrap();
        let finished = outpatient(s.id, OutpatientStatus::Finished);
        store.insert(&finished).await.unwrap();

        let err = OutpatientRepository::delete_by_id(&store, examined.id).await.unwrap_err();
        assert_eq!(err.kind(), clinic_core::ErrorKind::Unprocessable);
        assert!(OutpatientRepository::find_by_id(&store, examined.id).await.is_ok());

        OutpatientRepository::delete_by_id(&store, finished.id).await.unwrap();
        let err = OutpatientRepository::delete_by_id(&store, finished.id).await.unwrap_err();
        assert_eq!(err.kind(), clinic_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_directory_records_batches() {
        let patient = Patient {
            id: Uuid::new_v4(),
            national_id: "110101199001011234".into(),
            name: "Wang".into(),
            email: "wang@example.com".into(),
            phone: "555-0101".into(),
            birth_date: None,
        };
        let directory = MemoryDirectory::with_entries([patient.clone()]);

        let missing = Uuid::new_v4();
        let found = directory.find_by_ids(&[patient.id, missing]).await.unwrap();
        assert_eq!(found, vec![patient.clone()]);
        assert_eq!(directory.batch_calls().await, vec![vec![patient.id, missing]]);

        let by_national_id = directory.find_by_national_id("110101199001011234").await.unwrap();
        assert_eq!(by_national_id.map(|p| p.id), Some(patient.id));
    }
}
