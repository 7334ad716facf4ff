//! 关联数据补全
//!
//! 从一批排班或门诊中收集去重后的医生、护士、患者ID，每类实体只向对应目录发起一次
//! 批量查询。三类查询相互独立，并发执行并在全部成功后才合并结果；任何一次查询失败
//! 都会使整个补全失败，不会返回部分补全的数据。

use clinic_core::{
    Directory, Doctor, DoctorDirectory, EntityRef, Identified, Nurse, NurseDirectory, Outpatient,
    Patient, PatientDirectory, Result, ResultExt, WorkSchedule,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// 关联数据补全器
#[derive(Clone)]
pub struct Enricher {
    doctors: Arc<DoctorDirectory>,
    nurses: Arc<NurseDirectory>,
    patients: Arc<dyn PatientDirectory>,
}

impl Enricher {
    pub fn new(
        doctors: Arc<DoctorDirectory>,
        nurses: Arc<NurseDirectory>,
        patients: Arc<dyn PatientDirectory>,
    ) -> Self {
        Self {
            doctors,
            nurses,
            patients,
        }
    }

    /// 补全排班的医生、护士，以及已加载门诊的患者
    pub async fn enrich_schedules(&self, schedules: &mut [WorkSchedule]) -> Result<()> {
        if schedules.is_empty() {
            return Ok(());
        }

        let doctor_ids: BTreeSet<Uuid> = schedules.iter().map(WorkSchedule::doctor_id).collect();
        let nurse_ids: BTreeSet<Uuid> = schedules.iter().filter_map(WorkSchedule::nurse_id).collect();
        let patient_ids: BTreeSet<Uuid> = schedules
            .iter()
            .flat_map(|s| s.outpatients.iter().map(Outpatient::patient_id))
            .collect();

        tracing::debug!(
            "Enriching {} schedules ({} doctors, {} nurses, {} patients)",
            schedules.len(),
            doctor_ids.len(),
            nurse_ids.len(),
            patient_ids.len()
        );

        let (doctors, nurses, patients) = tokio::try_join!(
            fetch_index::<Doctor, _>(self.doctors.as_ref(), &doctor_ids, "doctors"),
            fetch_index::<Nurse, _>(self.nurses.as_ref(), &nurse_ids, "nurses"),
            fetch_index::<Patient, _>(self.patients.as_ref(), &patient_ids, "patients"),
        )?;

        for schedule in schedules.iter_mut() {
            resolve(&mut schedule.doctor, &doctors);
            if let Some(nurse) = schedule.nurse.as_mut() {
                resolve(nurse, &nurses);
            }
            for outpatient in schedule.outpatients.iter_mut() {
                resolve(&mut outpatient.patient, &patients);
            }
        }
        Ok(())
    }

    /// 补全门诊的患者
    pub async fn enrich_outpatients(&self, outpatients: &mut [Outpatient]) -> Result<()> {
        let patient_ids: BTreeSet<Uuid> = outpatients.iter().map(Outpatient::patient_id).collect();
        let patients = fetch_index::<Patient, _>(self.patients.as_ref(), &patient_ids, "patients").await?;

        for outpatient in outpatients.iter_mut() {
            resolve(&mut outpatient.patient, &patients);
        }
        Ok(())
    }
}

/// 把候诊人数合并到排班上，没有记录的排班为0
pub fn apply_waiting_counts(schedules: &mut [WorkSchedule], counts: &HashMap<Uuid, i64>) {
    for schedule in schedules.iter_mut() {
        schedule.total_waiting = counts.get(&schedule.id).copied().unwrap_or(0);
    }
}

/// 一次批量查询并按ID建立索引，ID集合为空时不发起查询
async fn fetch_index<T, D>(
    directory: &D,
    ids: &BTreeSet<Uuid>,
    kind: &str,
) -> Result<HashMap<Uuid, T>>
where
    T: Identified,
    D: Directory<T> + ?Sized,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids: Vec<Uuid> = ids.iter().copied().collect();
    let found = directory
        .find_by_ids(&ids)
        .await
        .during(&format!("batch lookup {}", kind))?;

    Ok(found.into_iter().map(|entity| (entity.id(), entity)).collect())
}

/// 目录中存在时替换为快照，否则保留原ID
fn resolve<T: Identified + Clone>(reference: &mut EntityRef<T>, index: &HashMap<Uuid, T>) {
    if let Some(entity) = index.get(&reference.id()) {
        *reference = EntityRef::Loaded(entity.clone());
    }
}
