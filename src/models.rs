use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type StudentId = i64;
pub type FeeId = i64;

/// A student as the backend returns it. The `id` is server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub roll_no: String,
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
}

/// Body of `POST /students`: every student field except the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub roll_no: String,
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 3] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Leave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Leave => "Leave",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AttendanceStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown attendance status: {value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
}

/// Body of `POST /attendance`. Submitted as one batch for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSubmission {
    pub date: NaiveDate,
    pub records: Vec<AttendanceEntry>,
}

/// One row of `GET /attendance/{date}`. The status is kept as sent; stored
/// rows are not guaranteed to hold one of the three known values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAttendanceRow {
    pub student_id: StudentId,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub student_roll: String,
    #[serde(default)]
    pub student_class: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAttendance {
    pub date: NaiveDate,
    #[serde(default)]
    pub attendance: Vec<DailyAttendanceRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDay {
    pub date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAttendanceSummary {
    pub student_id: StudentId,
    pub total_days: u32,
    pub present_days: u32,
    pub attendance_percentage: f64,
    #[serde(default)]
    pub summary: Vec<AttendanceDay>,
}

/// Fee status as reported by the backend. Unknown labels are preserved so they
/// can still be displayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeeStatus {
    Paid,
    Partial,
    Pending,
    Other(String),
}

impl From<String> for FeeStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Paid" => FeeStatus::Paid,
            "Partial" => FeeStatus::Partial,
            "Pending" => FeeStatus::Pending,
            _ => FeeStatus::Other(value),
        }
    }
}

impl From<FeeStatus> for String {
    fn from(value: FeeStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeStatus::Paid => f.write_str("Paid"),
            FeeStatus::Partial => f.write_str("Partial"),
            FeeStatus::Pending => f.write_str("Pending"),
            FeeStatus::Other(label) => f.write_str(label),
        }
    }
}

/// A fee record. `due_amount` and `status` are computed by the backend and
/// must never be recomputed or patched locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub id: FeeId,
    pub student_id: StudentId,
    pub month: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub due_amount: f64,
    pub status: FeeStatus,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub payment_date: Option<String>,
}

/// Body of `POST /fees`. The backend upserts on `(student_id, month)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFee {
    pub student_id: StudentId,
    pub month: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    #[serde(default)]
    pub paid: u64,
    #[serde(default)]
    pub partial: u64,
    #[serde(default)]
    pub pending: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCollection {
    #[serde(default)]
    pub collected: f64,
    #[serde(default)]
    pub pending: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeStats {
    pub total_fees: f64,
    pub total_paid: f64,
    pub total_due: f64,
    pub collection_rate: f64,
    #[serde(default)]
    pub status_count: StatusCount,
    #[serde(default)]
    pub monthly_data: BTreeMap<String, MonthlyCollection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentFeeSummary {
    pub student_id: StudentId,
    pub total_records: u32,
    pub total_paid: f64,
    pub total_due: f64,
    #[serde(default)]
    pub fees: Vec<FeeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub filename: String,
    pub size: u64,
    pub created: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn path_segment(self) -> &'static str {
        match self {
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Excel => "Excel",
            ExportFormat::Pdf => "PDF",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}
