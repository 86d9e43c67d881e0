//! In-memory stand-in for the REST backend, following the backend's documented
//! behaviour closely enough for view tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::api::{ApiError, SchoolApi};
use crate::models::{
    AttendanceDay, AttendanceEntry, AttendanceStatus, AttendanceSubmission, BackupEntry,
    DailyAttendance, DailyAttendanceRow, ExportFormat, FeeId, FeeRecord, FeeStats, FeeStatus,
    MonthlyCollection, NewFee, NewStudent, StatusCount, Student, StudentAttendanceSummary,
    StudentFeeSummary, StudentId,
};

pub fn sample_student(id: StudentId, class_name: &str) -> Student {
    Student {
        id,
        roll_no: format!("R{id}"),
        name: format!("Student {id}"),
        class_name: class_name.to_string(),
        contact: "9876543210".to_string(),
        email: None,
        address: None,
        admission_date: None,
    }
}

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("school-admin-{}-{name}", uuid::Uuid::new_v4()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn fee_status(total: f64, paid: f64) -> FeeStatus {
    if paid >= total {
        FeeStatus::Paid
    } else if paid > 0.0 {
        FeeStatus::Partial
    } else {
        FeeStatus::Pending
    }
}

#[derive(Default)]
struct State {
    students: Vec<Student>,
    fees: Vec<FeeRecord>,
    attendance: BTreeMap<NaiveDate, Vec<AttendanceEntry>>,
    backups: Option<Vec<BackupEntry>>,
    export: Option<Vec<u8>>,
    next_id: i64,
    calls: Vec<String>,
    fail_reads: bool,
    fail_writes: Option<ApiError>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn with_students(students: Vec<Student>) -> Self {
        let next_id = students.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(State {
                students,
                next_id,
                ..State::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, error: Option<ApiError>) {
        self.state.lock().unwrap().fail_writes = error;
    }

    pub fn insert_student(&self, student: Student) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(student.id + 1);
        state.students.push(student);
    }

    pub fn set_backups(&self, backups: Option<Vec<BackupEntry>>) {
        self.state.lock().unwrap().backups = backups;
    }

    pub fn set_export(&self, bytes: Option<Vec<u8>>) {
        self.state.lock().unwrap().export = bytes;
    }

    pub fn attendance_for(&self, date: NaiveDate) -> Option<Vec<AttendanceEntry>> {
        self.state.lock().unwrap().attendance.get(&date).cloned()
    }

    fn read(&self, call: String) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.fail_reads {
            return Err(ApiError::Transport("Network Error".to_string()));
        }
        Ok(state)
    }

    fn write(&self, call: String) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(err) = state.fail_writes.clone() {
            return Err(err);
        }
        Ok(state)
    }
}

fn not_found(message: &str) -> ApiError {
    ApiError::Backend {
        status: 404,
        message: message.to_string(),
    }
}

#[async_trait]
impl SchoolApi for FakeApi {
    async fn list_students(&self) -> Result<Vec<Student>, ApiError> {
        Ok(self.read("GET /students".to_string())?.students.clone())
    }

    async fn search_students(&self, query: &str) -> Result<Vec<Student>, ApiError> {
        let state = self.read("GET /students/search".to_string())?;
        let needle = query.to_lowercase();
        Ok(state
            .students
            .iter()
            .filter(|s| {
                [&s.name, &s.roll_no, &s.class_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn create_student(&self, student: &NewStudent) -> Result<(), ApiError> {
        let mut state = self.write("POST /students".to_string())?;
        if state.students.iter().any(|s| s.roll_no == student.roll_no) {
            return Err(ApiError::Backend {
                status: 400,
                message: "Roll number already exists".to_string(),
            });
        }
        let id = state.next_id.max(1);
        state.next_id = id + 1;
        state.students.push(Student {
            id,
            roll_no: student.roll_no.clone(),
            name: student.name.clone(),
            class_name: student.class_name.clone(),
            contact: student.contact.clone(),
            email: Some(student.email.clone()),
            address: Some(student.address.clone()),
            admission_date: None,
        });
        Ok(())
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), ApiError> {
        let mut state = self.write(format!("DELETE /students/{id}"))?;
        let before = state.students.len();
        state.students.retain(|s| s.id != id);
        if state.students.len() == before {
            return Err(not_found("Student not found"));
        }
        Ok(())
    }

    async fn submit_attendance(&self, submission: &AttendanceSubmission) -> Result<(), ApiError> {
        let mut state = self.write("POST /attendance".to_string())?;
        state
            .attendance
            .insert(submission.date, submission.records.clone());
        Ok(())
    }

    async fn attendance_on(&self, date: NaiveDate) -> Result<DailyAttendance, ApiError> {
        let state = self.read(format!("GET /attendance/{date}"))?;
        let rows = state
            .attendance
            .get(&date)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        let student = state.students.iter().find(|s| s.id == entry.student_id);
                        DailyAttendanceRow {
                            student_id: entry.student_id,
                            student_name: student
                                .map(|s| s.name.clone())
                                .unwrap_or_else(|| "Unknown".to_string()),
                            student_roll: student.map(|s| s.roll_no.clone()).unwrap_or_default(),
                            student_class: student
                                .map(|s| s.class_name.clone())
                                .unwrap_or_default(),
                            status: entry.status.to_string(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(DailyAttendance {
            date,
            attendance: rows,
        })
    }

    async fn student_attendance(
        &self,
        id: StudentId,
    ) -> Result<StudentAttendanceSummary, ApiError> {
        let state = self.read(format!("GET /students/{id}/attendance"))?;
        let summary: Vec<AttendanceDay> = state
            .attendance
            .iter()
            .map(|(date, entries)| AttendanceDay {
                date: *date,
                status: entries
                    .iter()
                    .find(|entry| entry.student_id == id)
                    .map(|entry| entry.status.to_string())
                    .unwrap_or_else(|| "Not Marked".to_string()),
            })
            .collect();
        let present_days = summary
            .iter()
            .filter(|day| day.status == AttendanceStatus::Present.as_str())
            .count() as u32;
        let total_days = summary.len() as u32;
        Ok(StudentAttendanceSummary {
            student_id: id,
            total_days,
            present_days,
            attendance_percentage: if total_days == 0 {
                0.0
            } else {
                round2(present_days as f64 / total_days as f64 * 100.0)
            },
            summary,
        })
    }

    async fn list_fees(&self) -> Result<Vec<FeeRecord>, ApiError> {
        Ok(self.read("GET /fees".to_string())?.fees.clone())
    }

    async fn create_fee(&self, fee: &NewFee) -> Result<(), ApiError> {
        let mut state = self.write("POST /fees".to_string())?;
        let status = fee_status(fee.total_amount, fee.paid_amount);
        let due_amount = round2(fee.total_amount - fee.paid_amount);

        if let Some(existing) = state
            .fees
            .iter_mut()
            .find(|f| f.student_id == fee.student_id && f.month == fee.month)
        {
            existing.total_amount = fee.total_amount;
            existing.paid_amount = fee.paid_amount;
            existing.due_amount = due_amount;
            existing.status = status;
            existing.due_date = Some(fee.due_date.to_string());
            return Ok(());
        }

        let id: FeeId = state.fees.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        state.fees.push(FeeRecord {
            id,
            student_id: fee.student_id,
            month: fee.month.clone(),
            total_amount: fee.total_amount,
            paid_amount: fee.paid_amount,
            due_amount,
            status,
            due_date: Some(fee.due_date.to_string()),
            payment_date: None,
        });
        Ok(())
    }

    async fn delete_fee(&self, id: FeeId) -> Result<(), ApiError> {
        let mut state = self.write(format!("DELETE /fees/{id}"))?;
        let before = state.fees.len();
        state.fees.retain(|f| f.id != id);
        if state.fees.len() == before {
            return Err(not_found("Fees record not found"));
        }
        Ok(())
    }

    async fn fee_stats(&self) -> Result<FeeStats, ApiError> {
        let state = self.read("GET /fees/stats".to_string())?;
        let total_fees: f64 = state.fees.iter().map(|f| f.total_amount).sum();
        let total_paid: f64 = state.fees.iter().map(|f| f.paid_amount).sum();
        let count = |status: FeeStatus| state.fees.iter().filter(|f| f.status == status).count();
        let mut monthly_data = BTreeMap::new();
        for fee in &state.fees {
            let month: &mut MonthlyCollection = monthly_data.entry(fee.month.clone()).or_default();
            month.collected += fee.paid_amount;
            month.pending += fee.total_amount - fee.paid_amount;
        }

        Ok(FeeStats {
            total_fees: round2(total_fees),
            total_paid: round2(total_paid),
            total_due: round2(total_fees - total_paid),
            collection_rate: if total_fees > 0.0 {
                round2(total_paid / total_fees * 100.0)
            } else {
                0.0
            },
            status_count: StatusCount {
                paid: count(FeeStatus::Paid) as u64,
                partial: count(FeeStatus::Partial) as u64,
                pending: count(FeeStatus::Pending) as u64,
            },
            monthly_data,
        })
    }

    async fn student_fees(&self, id: StudentId) -> Result<StudentFeeSummary, ApiError> {
        let state = self.read(format!("GET /students/{id}/fees"))?;
        let fees: Vec<FeeRecord> = state
            .fees
            .iter()
            .filter(|f| f.student_id == id)
            .cloned()
            .collect();
        Ok(StudentFeeSummary {
            student_id: id,
            total_records: fees.len() as u32,
            total_paid: round2(fees.iter().map(|f| f.paid_amount).sum()),
            total_due: round2(fees.iter().map(|f| f.total_amount - f.paid_amount).sum()),
            fees,
        })
    }

    async fn list_backups(&self) -> Result<Vec<BackupEntry>, ApiError> {
        let state = self.read("GET /backups".to_string())?;
        state
            .backups
            .clone()
            .ok_or_else(|| ApiError::Unavailable("backups".to_string()))
    }

    async fn create_backup(&self) -> Result<String, ApiError> {
        let mut state = self.read("GET /backup".to_string())?;
        let backups = state
            .backups
            .as_mut()
            .ok_or_else(|| ApiError::Unavailable("backup".to_string()))?;
        let filename = format!("student_data_backup_server_{}.db", backups.len() + 1);
        backups.insert(
            0,
            BackupEntry {
                filename: filename.clone(),
                size: 4096,
                created: "2024-12-17 09:00:00".to_string(),
                status: Some("success".to_string()),
            },
        );
        Ok(filename)
    }

    async fn export_students(&self, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        let state = self.read(format!("GET /export/students/{}", format.path_segment()))?;
        state
            .export
            .clone()
            .ok_or_else(|| ApiError::Unavailable(format.label().to_string()))
    }
}
