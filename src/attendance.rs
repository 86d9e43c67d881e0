use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::api::SchoolApi;
use crate::collection::{CollectionView, Feedback, LoadOutcome, SubmitError};
use crate::models::{
    AttendanceEntry, AttendanceStatus, AttendanceSubmission, DailyAttendance, Student, StudentId,
};
use crate::students::StudentResource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub leave: usize,
}

/// Counts statuses. Labels outside the three known values are only part of `total`.
pub fn count_statuses<I>(statuses: I) -> AttendanceStats
where
    I: IntoIterator<Item = Option<AttendanceStatus>>,
{
    statuses
        .into_iter()
        .fold(AttendanceStats::default(), |mut stats, status| {
            stats.total += 1;
            match status {
                Some(AttendanceStatus::Present) => stats.present += 1,
                Some(AttendanceStatus::Absent) => stats.absent += 1,
                Some(AttendanceStatus::Leave) => stats.leave += 1,
                None => {}
            }
            stats
        })
}

/// One day's attendance for the loaded roster.
///
/// Every loaded student has exactly one mark. A successful roster load resets
/// all marks to `Present`, dropping unsaved edits.
pub struct AttendanceSheet {
    roster: CollectionView<StudentResource>,
    date: NaiveDate,
    marks: BTreeMap<StudentId, AttendanceStatus>,
}

impl AttendanceSheet {
    pub fn new(api: Arc<dyn SchoolApi>, date: NaiveDate) -> Self {
        Self {
            roster: CollectionView::new(StudentResource, api),
            date,
            marks: BTreeMap::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn students(&self) -> &[Student] {
        self.roster.items()
    }

    pub fn status_of(&self, id: StudentId) -> Option<AttendanceStatus> {
        self.marks.get(&id).copied()
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.roster.feedback()
    }

    pub async fn load(&mut self) -> LoadOutcome {
        let outcome = self.roster.load().await;
        if outcome == LoadOutcome::Applied {
            self.marks = self
                .roster
                .items()
                .iter()
                .map(|student| (student.id, AttendanceStatus::Present))
                .collect();
        }
        outcome
    }

    /// Selects a status for one student; last write wins. Returns `false` for
    /// ids that are not on the loaded roster.
    pub fn set_status(&mut self, id: StudentId, status: AttendanceStatus) -> bool {
        match self.marks.get_mut(&id) {
            Some(mark) => {
                *mark = status;
                true
            }
            None => false,
        }
    }

    /// Recomputed from the current marks on every call.
    pub fn stats(&self) -> AttendanceStats {
        AttendanceStats {
            total: self.roster.len(),
            ..count_statuses(self.marks.values().map(|status| Some(*status)))
        }
    }

    pub fn submission(&self) -> AttendanceSubmission {
        AttendanceSubmission {
            date: self.date,
            records: self
                .marks
                .iter()
                .map(|(student_id, status)| AttendanceEntry {
                    student_id: *student_id,
                    status: *status,
                })
                .collect(),
        }
    }

    /// Sends every mark as one batch. Marks are kept either way.
    ///
    /// The backend replaces the whole day on submit, so nothing is sent until
    /// the roster has loaded at least once.
    pub async fn submit(&mut self) -> Result<(), SubmitError> {
        if !self.roster.has_loaded() {
            let err = SubmitError::NotLoaded("student roster");
            warn!(date = %self.date, "refusing attendance submit without a roster");
            self.roster.set_feedback(Feedback::Error(format!(
                "Error marking attendance: {}",
                err.user_message()
            )));
            return Err(err);
        }

        let submission = self.submission();
        let result = self.roster.api().submit_attendance(&submission).await;
        match result {
            Ok(()) => {
                info!(date = %self.date, count = submission.records.len(), "attendance saved");
                self.roster.set_feedback(Feedback::Success(
                    "Attendance marked successfully!".to_string(),
                ));
                Ok(())
            }
            Err(err) => {
                warn!(date = %self.date, error = %err, "attendance submit failed");
                self.roster.set_feedback(Feedback::Error(format!(
                    "Error marking attendance: {}",
                    err.user_message()
                )));
                Err(err.into())
            }
        }
    }

    pub fn teardown(&mut self) {
        self.roster.teardown();
    }
}

/// Stats for a day already stored on the server.
pub fn daily_stats(day: &DailyAttendance) -> AttendanceStats {
    count_statuses(
        day.attendance
            .iter()
            .map(|row| row.status.parse::<AttendanceStatus>().ok()),
    )
}
