use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::warn;

use crate::api::{ApiError, SchoolApi};
use crate::collection::{
    CollectionView, Confirm, DeleteOutcome, Feedback, FormError, LoadOutcome, Notices, Resource,
    SubmitError,
};
use crate::models::{NewStudent, Student, StudentId};

#[derive(Debug, Clone, Copy, Default)]
pub struct StudentResource;

const STUDENT_NOTICES: Notices = Notices {
    created: "Student added successfully!",
    create_failed: "Error adding student",
    deleted: "Student deleted successfully!",
    delete_failed: "Error deleting student",
};

#[async_trait]
impl Resource for StudentResource {
    type Item = Student;
    type Input = NewStudent;
    type Id = StudentId;

    fn noun(&self) -> &'static str {
        "student"
    }

    fn notices(&self) -> &'static Notices {
        &STUDENT_NOTICES
    }

    async fn fetch_all(&self, api: &dyn SchoolApi) -> Result<Vec<Student>, ApiError> {
        api.list_students().await
    }

    async fn create(&self, api: &dyn SchoolApi, input: &NewStudent) -> Result<(), ApiError> {
        api.create_student(input).await
    }

    async fn delete(&self, api: &dyn SchoolApi, id: StudentId) -> Result<(), ApiError> {
        api.delete_student(id).await
    }
}

/// Raw add-student form input, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentForm {
    pub roll_no: String,
    pub name: String,
    pub class_name: String,
    pub contact: String,
    pub email: String,
    pub address: String,
}

impl StudentForm {
    /// Presence check on the required fields. Nothing else is validated here.
    pub fn validate(&self) -> Result<NewStudent, FormError> {
        let required = [
            ("roll_no", &self.roll_no),
            ("name", &self.name),
            ("class", &self.class_name),
            ("contact", &self.contact),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(FormError::Missing(*field));
        }

        Ok(NewStudent {
            roll_no: self.roll_no.trim().to_string(),
            name: self.name.trim().to_string(),
            class_name: self.class_name.trim().to_string(),
            contact: self.contact.trim().to_string(),
            email: self.email.trim().to_string(),
            address: self.address.trim().to_string(),
        })
    }
}

impl From<NewStudent> for StudentForm {
    fn from(student: NewStudent) -> Self {
        Self {
            roll_no: student.roll_no,
            name: student.name,
            class_name: student.class_name,
            contact: student.contact,
            email: student.email,
            address: student.address,
        }
    }
}

/// The student roster plus its add form.
pub struct StudentRoster {
    view: CollectionView<StudentResource>,
    pub form: StudentForm,
}

impl StudentRoster {
    pub fn new(api: Arc<dyn SchoolApi>) -> Self {
        Self {
            view: CollectionView::new(StudentResource, api),
            form: StudentForm::default(),
        }
    }

    pub fn students(&self) -> &[Student] {
        self.view.items()
    }

    pub fn view(&self) -> &CollectionView<StudentResource> {
        &self.view
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.view.feedback()
    }

    pub async fn load(&mut self) -> LoadOutcome {
        self.view.load().await
    }

    /// Submits the form. The form is cleared only when the backend accepts it.
    pub async fn submit_form(&mut self) -> Result<(), SubmitError> {
        let student = match self.form.validate() {
            Ok(student) => student,
            Err(err) => {
                self.view.set_feedback(Feedback::Error(err.to_string()));
                return Err(err.into());
            }
        };

        self.view.submit_create(&student).await?;
        self.form = StudentForm::default();
        Ok(())
    }

    pub async fn delete(&mut self, id: StudentId, confirm: &mut dyn Confirm) -> DeleteOutcome {
        self.view.submit_delete(id, confirm).await
    }

    pub fn teardown(&mut self) {
        self.view.teardown();
    }
}

/// Server-side search. An empty query is refused before any request.
pub async fn search(api: &dyn SchoolApi, query: &str) -> Result<Vec<Student>, SubmitError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(FormError::Missing("search query").into());
    }
    Ok(api.search_students(query).await?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub failures: Vec<(usize, String)>,
}

/// Adds every row of a roster CSV (`roll_no,name,class,contact,email,address`)
/// through the add form. A rejected row is recorded and the import moves on.
pub async fn import_csv(roster: &mut StudentRoster, csv_path: &Path) -> anyhow::Result<ImportSummary> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary {
        added: 0,
        failures: Vec::new(),
    };

    for (index, result) in reader.deserialize::<NewStudent>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line, error = %err, "skipping unreadable roster row");
                summary.failures.push((line, err.to_string()));
                continue;
            }
        };

        roster.form = StudentForm::from(row);
        match roster.submit_form().await {
            Ok(()) => summary.added += 1,
            Err(err) => summary.failures.push((line, err.user_message())),
        }
    }

    Ok(summary)
}

/// Writes the currently loaded roster, not a fresh fetch.
pub fn export_csv(students: &[Student], out: &Path) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    writer.write_record(["id", "roll_no", "name", "class", "contact", "email", "address"])?;

    for student in students {
        writer.write_record([
            student.id.to_string().as_str(),
            &student.roll_no,
            &student.name,
            &student.class_name,
            &student.contact,
            student.email.as_deref().unwrap_or(""),
            student.address.as_deref().unwrap_or(""),
        ])?;
    }

    writer.flush()?;
    Ok(students.len())
}
