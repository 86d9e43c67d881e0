use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::api::{ApiError, SchoolApi};
use crate::collection::{
    CollectionView, Confirm, DeleteOutcome, Feedback, FormError, LoadOutcome, Notices, Resource,
    SubmitError,
};
use crate::models::{FeeId, FeeRecord, FeeStats, NewFee, Student, StudentId};
use crate::students::StudentResource;

pub const DEFAULT_DUE_IN_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct FeeResource;

const FEE_NOTICES: Notices = Notices {
    created: "Fees record saved successfully!",
    create_failed: "Error saving fees",
    deleted: "Fees record deleted!",
    delete_failed: "Error deleting fee record",
};

#[async_trait]
impl Resource for FeeResource {
    type Item = FeeRecord;
    type Input = NewFee;
    type Id = FeeId;

    fn noun(&self) -> &'static str {
        "fees record"
    }

    fn notices(&self) -> &'static Notices {
        &FEE_NOTICES
    }

    async fn fetch_all(&self, api: &dyn SchoolApi) -> Result<Vec<FeeRecord>, ApiError> {
        api.list_fees().await
    }

    async fn create(&self, api: &dyn SchoolApi, input: &NewFee) -> Result<(), ApiError> {
        api.create_fee(input).await
    }

    async fn delete(&self, api: &dyn SchoolApi, id: FeeId) -> Result<(), ApiError> {
        api.delete_fee(id).await
    }
}

/// Fee entry form as typed. Amounts stay text until submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeForm {
    pub student_id: Option<StudentId>,
    pub month: String,
    pub total_amount: String,
    pub paid_amount: String,
    pub due_date: NaiveDate,
}

impl FeeForm {
    /// Blank form for `today`: the month label is "<Month> <Year>" and the
    /// due date is thirty days out.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            student_id: None,
            month: today.format("%B %Y").to_string(),
            total_amount: String::new(),
            paid_amount: String::new(),
            due_date: today + Duration::days(DEFAULT_DUE_IN_DAYS),
        }
    }

    /// Presence and sign checks only. `paid_amount` above `total_amount` is
    /// accepted; the backend decides what that means.
    pub fn validate(&self) -> Result<NewFee, FormError> {
        let student_id = self.student_id.ok_or(FormError::Missing("student"))?;
        if self.month.trim().is_empty() {
            return Err(FormError::Missing("month"));
        }
        if self.total_amount.trim().is_empty() {
            return Err(FormError::Missing("total_amount"));
        }
        let total_amount = parse_amount("total_amount", &self.total_amount)?;
        let paid_amount = if self.paid_amount.trim().is_empty() {
            0.0
        } else {
            parse_amount("paid_amount", &self.paid_amount)?
        };

        Ok(NewFee {
            student_id,
            month: self.month.trim().to_string(),
            total_amount,
            paid_amount,
            due_date: self.due_date,
        })
    }
}

fn parse_amount(field: &'static str, raw: &str) -> Result<f64, FormError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(FormError::InvalidAmount {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Fee records, their aggregate stats, and the roster used to label them.
///
/// Stats are always refetched alongside the record list so the two never
/// disagree after a write.
pub struct FeeLedger {
    fees: CollectionView<FeeResource>,
    students: CollectionView<StudentResource>,
    stats: Option<FeeStats>,
    today: NaiveDate,
    pub form: FeeForm,
    selected_student: Option<Student>,
}

impl FeeLedger {
    pub fn new(api: Arc<dyn SchoolApi>, today: NaiveDate) -> Self {
        Self {
            fees: CollectionView::new(FeeResource, api.clone()),
            students: CollectionView::new(StudentResource, api),
            stats: None,
            today,
            form: FeeForm::new(today),
            selected_student: None,
        }
    }

    pub fn fees(&self) -> &[FeeRecord] {
        self.fees.items()
    }

    pub fn students(&self) -> &[Student] {
        self.students.items()
    }

    pub fn view(&self) -> &CollectionView<FeeResource> {
        &self.fees
    }

    /// Server-computed stats, absent until the first successful read.
    pub fn stats(&self) -> Option<&FeeStats> {
        self.stats.as_ref()
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.fees.feedback()
    }

    pub fn selected_student(&self) -> Option<&Student> {
        self.selected_student.as_ref()
    }

    /// Local join against the loaded roster. `None` renders as "Student not found".
    pub fn student_for(&self, fee: &FeeRecord) -> Option<&Student> {
        self.students
            .items()
            .iter()
            .find(|student| student.id == fee.student_id)
    }

    pub async fn load(&mut self) -> LoadOutcome {
        self.students.load().await;
        let outcome = self.fees.load().await;
        self.load_stats().await;
        outcome
    }

    async fn load_stats(&mut self) {
        let result = self.fees.api().fee_stats().await;
        if self.fees.is_closed() {
            debug!("discarding fee stats for closed ledger");
            return;
        }
        match result {
            Ok(stats) => self.stats = Some(stats),
            Err(err) => warn!(error = %err, "failed to load fee stats"),
        }
    }

    /// Picks the student for the form from the already-loaded roster.
    pub fn select_student(&mut self, id: StudentId) {
        self.form.student_id = Some(id);
        self.selected_student = self
            .students
            .items()
            .iter()
            .find(|student| student.id == id)
            .cloned();
    }

    pub async fn submit_form(&mut self) -> Result<(), SubmitError> {
        let fee = match self.form.validate() {
            Ok(fee) => fee,
            Err(err) => {
                self.fees.set_feedback(Feedback::Error(err.to_string()));
                return Err(err.into());
            }
        };

        self.fees.submit_create(&fee).await?;
        self.load_stats().await;
        self.form = FeeForm::new(self.today);
        self.selected_student = None;
        Ok(())
    }

    pub async fn delete(&mut self, id: FeeId, confirm: &mut dyn Confirm) -> DeleteOutcome {
        let outcome = self.fees.submit_delete(id, confirm).await;
        if outcome == DeleteOutcome::Deleted {
            self.load_stats().await;
        }
        outcome
    }

    pub fn teardown(&mut self) {
        self.fees.teardown();
        self.students.teardown();
    }
}
