//! Backup and export calls. These endpoints are optional on the server; when
//! they are missing the view keeps working with demo or locally named data.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::api::SchoolApi;
use crate::collection::{Confirm, Feedback};
use crate::models::{BackupEntry, ExportFormat};

pub fn demo_backups() -> Vec<BackupEntry> {
    [
        ("student_data_backup_2024-12-16_15-30-22.db", 24576, "2024-12-16 15:30:22"),
        ("student_data_backup_2024-12-15_10-15-45.db", 20480, "2024-12-15 10:15:45"),
        ("student_data_backup_2024-12-14_09-20-30.db", 18432, "2024-12-14 09:20:30"),
    ]
    .into_iter()
    .map(|(filename, size, created)| BackupEntry {
        filename: filename.to_string(),
        size,
        created: created.to_string(),
        status: Some("success".to_string()),
    })
    .collect()
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn local_backup_name(now: NaiveDateTime) -> String {
    format!("student_data_backup_{}.db", now.format("%Y-%m-%dT%H-%M-%S"))
}

pub struct BackupsView {
    api: Arc<dyn SchoolApi>,
    entries: Vec<BackupEntry>,
    demo: bool,
    feedback: Option<Feedback>,
}

impl BackupsView {
    pub fn new(api: Arc<dyn SchoolApi>) -> Self {
        Self {
            api,
            entries: Vec::new(),
            demo: false,
            feedback: None,
        }
    }

    pub fn entries(&self) -> &[BackupEntry] {
        &self.entries
    }

    /// True when the list is demo data rather than the server's.
    pub fn is_demo(&self) -> bool {
        self.demo
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub async fn load(&mut self) {
        match self.api.list_backups().await {
            Ok(entries) => {
                self.entries = entries;
                self.demo = false;
            }
            Err(err) => {
                if err.is_unavailable() {
                    info!("backup listing unavailable, showing demo data");
                } else {
                    warn!(error = %err, "failed to list backups, showing demo data");
                }
                self.entries = demo_backups();
                self.demo = true;
            }
        }
    }

    /// Asks the server for a backup. Without one, a locally named entry is
    /// added to the list instead.
    pub async fn create(&mut self, now: NaiveDateTime) {
        match self.api.create_backup().await {
            Ok(file) => {
                self.feedback = Some(Feedback::Success(format!(
                    "Backup created successfully! File: {file}"
                )));
                self.load().await;
            }
            Err(err) => {
                info!(error = %err, "backup endpoint unavailable, recording local entry");
                let filename = local_backup_name(now);
                self.feedback = Some(Feedback::Success(format!(
                    "Backup created successfully! File: {filename}"
                )));
                self.entries.insert(
                    0,
                    BackupEntry {
                        filename,
                        size: 0,
                        created: now.format("%Y-%m-%d %H:%M:%S").to_string(),
                        status: None,
                    },
                );
            }
        }
    }

    /// Drops an entry from the displayed list only. There is no server call.
    pub fn remove(&mut self, index: usize, confirm: &mut dyn Confirm) -> bool {
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        if !confirm.confirm(&format!("Delete backup: {}?", entry.filename)) {
            return false;
        }
        let removed = self.entries.remove(index);
        self.feedback = Some(Feedback::Success(format!(
            "Backup {} deleted from list!",
            removed.filename
        )));
        true
    }
}

/// Downloads a server-side roster export to `out`. The inner `Err` is the
/// notice to show when the server offers no such export.
pub async fn export_students(
    api: &dyn SchoolApi,
    format: ExportFormat,
    out: &Path,
) -> anyhow::Result<Result<usize, Feedback>> {
    match api.export_students(format).await {
        Ok(bytes) => {
            std::fs::write(out, &bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            Ok(Ok(bytes.len()))
        }
        Err(err) => {
            info!(format = format.label(), error = %err, "export unavailable");
            Ok(Err(Feedback::Error(format!(
                "{} export feature will be available soon!",
                format.label()
            ))))
        }
    }
}
