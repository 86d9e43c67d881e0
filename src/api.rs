use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AttendanceSubmission, BackupEntry, DailyAttendance, ExportFormat, FeeId, FeeRecord, FeeStats,
    NewFee, NewStudent, Student, StudentAttendanceSummary, StudentFeeSummary, StudentId,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("feature unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// The most specific text available for the user: backend error text,
    /// otherwise the transport error text.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Backend { message, .. } => message.clone(),
            ApiError::Transport(message)
            | ApiError::Unavailable(message)
            | ApiError::Decode(message) => message.clone(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApiError::Unavailable(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// The REST backend. Every view talks to the server only through this trait.
#[async_trait]
pub trait SchoolApi: Send + Sync {
    async fn list_students(&self) -> Result<Vec<Student>, ApiError>;
    async fn search_students(&self, query: &str) -> Result<Vec<Student>, ApiError>;
    async fn create_student(&self, student: &NewStudent) -> Result<(), ApiError>;
    async fn delete_student(&self, id: StudentId) -> Result<(), ApiError>;

    async fn submit_attendance(&self, submission: &AttendanceSubmission) -> Result<(), ApiError>;
    async fn attendance_on(&self, date: NaiveDate) -> Result<DailyAttendance, ApiError>;
    async fn student_attendance(&self, id: StudentId)
        -> Result<StudentAttendanceSummary, ApiError>;

    async fn list_fees(&self) -> Result<Vec<FeeRecord>, ApiError>;
    async fn create_fee(&self, fee: &NewFee) -> Result<(), ApiError>;
    async fn delete_fee(&self, id: FeeId) -> Result<(), ApiError>;
    async fn fee_stats(&self) -> Result<FeeStats, ApiError>;
    async fn student_fees(&self, id: StudentId) -> Result<StudentFeeSummary, ApiError>;

    async fn list_backups(&self) -> Result<Vec<BackupEntry>, ApiError>;
    /// Returns the backup file name reported by the server.
    async fn create_backup(&self) -> Result<String, ApiError>;
    async fn export_students(&self, format: ExportFormat) -> Result<Vec<u8>, ApiError>;
}

#[derive(Deserialize)]
struct StudentsEnvelope {
    #[serde(default)]
    students: Vec<Student>,
}

#[derive(Deserialize)]
struct FeesEnvelope {
    #[serde(default)]
    fees: Vec<FeeRecord>,
}

#[derive(Deserialize)]
struct StatsEnvelope {
    stats: FeeStats,
}

#[derive(Deserialize)]
struct BackupsEnvelope {
    #[serde(default)]
    backups: Vec<BackupEntry>,
}

#[derive(Deserialize)]
struct BackupCreated {
    backup_file: String,
}

/// Fields every backend reply may carry next to its payload.
#[derive(Deserialize, Default)]
struct ReplyStatus {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.client.get(self.url(path))).await
    }

    /// Write calls only care about success; an empty or non-JSON 2xx body counts.
    async fn mutate(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "backend replied to write");
        let body = response.text().await?;
        if status.is_success() && serde_json::from_str::<serde_json::Value>(&body).is_err() {
            return Ok(());
        }
        decode_reply::<serde_json::Value>(status, &body).map(|_| ())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "backend replied");
        let body = response.text().await?;
        decode_reply(status, &body)
    }

    async fn read_bytes(response: Response) -> Result<Vec<u8>, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(backend_error(status, &body));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Optional endpoints are allowed to be missing entirely.
fn optional<T>(result: Result<T, ApiError>, what: &str) -> Result<T, ApiError> {
    result.map_err(|err| match err {
        ApiError::Backend { status, .. } if is_missing_endpoint(status) => {
            ApiError::Unavailable(what.to_string())
        }
        ApiError::Transport(_) => ApiError::Unavailable(what.to_string()),
        other => other,
    })
}

fn is_missing_endpoint(status: u16) -> bool {
    matches!(status, 404 | 405 | 501)
}

fn backend_error(status: StatusCode, body: &str) -> ApiError {
    let reply: ReplyStatus = serde_json::from_str(body).unwrap_or_default();
    let message = reply.error.unwrap_or_else(|| {
        format!("Request failed with status code {}", status.as_u16())
    });
    ApiError::Backend {
        status: status.as_u16(),
        message,
    }
}

/// Turns a raw reply into a payload. Non-2xx replies and `{"success": false}`
/// bodies both become backend errors carrying the server's `error` text.
fn decode_reply<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(backend_error(status, body));
    }

    let reply: ReplyStatus = serde_json::from_str(body).unwrap_or_default();
    if reply.success == Some(false) {
        return Err(ApiError::Backend {
            status: status.as_u16(),
            message: reply
                .error
                .unwrap_or_else(|| "request was not successful".to_string()),
        });
    }

    serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))
}

#[async_trait]
impl SchoolApi for HttpApi {
    async fn list_students(&self) -> Result<Vec<Student>, ApiError> {
        let envelope: StudentsEnvelope = self.get_json("students").await?;
        Ok(envelope.students)
    }

    async fn search_students(&self, query: &str) -> Result<Vec<Student>, ApiError> {
        let request = self
            .client
            .get(self.url("students/search"))
            .query(&[("q", query)]);
        let envelope: StudentsEnvelope = self.send(request).await?;
        Ok(envelope.students)
    }

    async fn create_student(&self, student: &NewStudent) -> Result<(), ApiError> {
        self.mutate(self.client.post(self.url("students")).json(student))
            .await
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), ApiError> {
        self.mutate(self.client.delete(self.url(&format!("students/{id}"))))
            .await
    }

    async fn submit_attendance(&self, submission: &AttendanceSubmission) -> Result<(), ApiError> {
        self.mutate(self.client.post(self.url("attendance")).json(submission))
            .await
    }

    async fn attendance_on(&self, date: NaiveDate) -> Result<DailyAttendance, ApiError> {
        self.get_json(&format!("attendance/{}", date.format("%Y-%m-%d")))
            .await
    }

    async fn student_attendance(
        &self,
        id: StudentId,
    ) -> Result<StudentAttendanceSummary, ApiError> {
        self.get_json(&format!("students/{id}/attendance")).await
    }

    async fn list_fees(&self) -> Result<Vec<FeeRecord>, ApiError> {
        let envelope: FeesEnvelope = self.get_json("fees").await?;
        Ok(envelope.fees)
    }

    async fn create_fee(&self, fee: &NewFee) -> Result<(), ApiError> {
        self.mutate(self.client.post(self.url("fees")).json(fee)).await
    }

    async fn delete_fee(&self, id: FeeId) -> Result<(), ApiError> {
        self.mutate(self.client.delete(self.url(&format!("fees/{id}"))))
            .await
    }

    async fn fee_stats(&self) -> Result<FeeStats, ApiError> {
        let envelope: StatsEnvelope = self.get_json("fees/stats").await?;
        Ok(envelope.stats)
    }

    async fn student_fees(&self, id: StudentId) -> Result<StudentFeeSummary, ApiError> {
        self.get_json(&format!("students/{id}/fees")).await
    }

    async fn list_backups(&self) -> Result<Vec<BackupEntry>, ApiError> {
        let result: Result<BackupsEnvelope, ApiError> = self.get_json("backups").await;
        let envelope = optional(result, "backups")?;
        Ok(envelope.backups)
    }

    async fn create_backup(&self) -> Result<String, ApiError> {
        let result: Result<BackupCreated, ApiError> = self.get_json("backup").await;
        let created = optional(result, "backup")?;
        Ok(created.backup_file)
    }

    async fn export_students(&self, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        let url = self.url(&format!("export/students/{}", format.path_segment()));
        let result = match self.client.get(url).send().await {
            Ok(response) => Self::read_bytes(response).await,
            Err(err) => Err(err.into()),
        };
        optional(result, format.label())
    }
}
