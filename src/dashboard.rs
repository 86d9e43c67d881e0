use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::SchoolApi;
use crate::collection::{CollectionView, LoadOutcome};
use crate::models::Student;
use crate::students::StudentResource;

/// Single-pass frequency count of students per class label.
pub fn class_distribution(students: &[Student]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for student in students {
        *counts.entry(student.class_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Fixed sample figures shown on the dashboard. None of these are derived from
/// data; they are kept only so a rendering can show and label them as such.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderFigures {
    pub attendance_percentage: f64,
    pub fees_collected: &'static str,
    pub stream_distribution: [(&'static str, u32); 3],
    pub admission_trend: [(&'static str, u32); 6],
    pub recent_activity: [(&'static str, &'static str); 4],
}

pub const PLACEHOLDERS: PlaceholderFigures = PlaceholderFigures {
    attendance_percentage: 92.5,
    fees_collected: "1,85,000",
    stream_distribution: [("Science", 40), ("Commerce", 35), ("Arts", 25)],
    admission_trend: [
        ("Jan", 12),
        ("Feb", 19),
        ("Mar", 8),
        ("Apr", 15),
        ("May", 10),
        ("Jun", 22),
    ],
    recent_activity: [
        ("New student \"Aarav Sharma\" added", "2 hours ago"),
        ("Attendance marked for Class 12", "4 hours ago"),
        ("Fees received from Priya Patel", "1 day ago"),
        ("Student details updated - Rohan Singh", "2 days ago"),
    ],
};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_students: usize,
    pub class_distribution: BTreeMap<String, usize>,
    pub placeholders: PlaceholderFigures,
}

impl DashboardSummary {
    pub fn from_students(students: &[Student]) -> Self {
        Self {
            total_students: students.len(),
            class_distribution: class_distribution(students),
            placeholders: PLACEHOLDERS,
        }
    }

    pub fn class_count(&self) -> usize {
        self.class_distribution.len()
    }
}

/// Read-only view over the roster.
pub struct Dashboard {
    roster: CollectionView<StudentResource>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn SchoolApi>) -> Self {
        Self {
            roster: CollectionView::new(StudentResource, api),
        }
    }

    pub async fn load(&mut self) -> LoadOutcome {
        self.roster.load().await
    }

    /// Derived from whatever the roster currently holds; zeroes before any load.
    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary::from_students(self.roster.items())
    }

    pub fn teardown(&mut self) {
        self.roster.teardown();
    }
}
