use std::fmt::Write;

use chrono::NaiveDate;

use crate::attendance::{daily_stats, AttendanceSheet, AttendanceStats};
use crate::collection::CollectionView;
use crate::dashboard::DashboardSummary;
use crate::fees::FeeLedger;
use crate::maintenance::{format_size, BackupsView};
use crate::models::{DailyAttendance, FeeRecord, Student, StudentAttendanceSummary, StudentFeeSummary};
use crate::settings::Settings;
use crate::students::StudentResource;

/// Amounts are shown as the backend sent them, with no rounding.
fn amount(value: f64) -> String {
    format!("₹{value}")
}

fn optional(value: Option<&str>) -> &str {
    match value {
        Some(text) if !text.is_empty() => text,
        _ => "-",
    }
}

pub fn render_students(students: &[Student]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Students ({})", students.len());

    if students.is_empty() {
        let _ = writeln!(output, "No students found.");
        return output;
    }

    for student in students {
        let admitted = student
            .admission_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "- [{}] {} {} ({}) contact {} email {} address {} admitted {}",
            student.id,
            student.roll_no,
            student.name,
            student.class_name,
            student.contact,
            optional(student.email.as_deref()),
            optional(student.address.as_deref()),
            admitted,
        );
    }

    output
}

/// The roster view, distinguishing a failed read from an empty roster.
pub fn render_roster(view: &CollectionView<StudentResource>) -> String {
    let mut output = String::new();

    if view.is_loading() {
        let _ = writeln!(output, "Loading students...");
        return output;
    }
    if !view.has_loaded() {
        let _ = writeln!(output, "Students could not be loaded from the server.");
        return output;
    }
    if view.is_empty() {
        let _ = writeln!(output, "Students (0)");
        let _ = writeln!(output, "No students found. Add one with `students add`.");
        return output;
    }

    render_students(view.items())
}

fn render_stats_line(output: &mut String, stats: &AttendanceStats) {
    let _ = writeln!(
        output,
        "Total: {} | Present: {} | Absent: {} | Leave: {}",
        stats.total, stats.present, stats.absent, stats.leave
    );
}

pub fn render_attendance_sheet(sheet: &AttendanceSheet) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Attendance for {}", sheet.date());
    render_stats_line(&mut output, &sheet.stats());

    if sheet.students().is_empty() {
        let _ = writeln!(output, "No students to mark.");
        return output;
    }

    for student in sheet.students() {
        let status = sheet
            .status_of(student.id)
            .map(|status| status.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "- {} {} ({}): {}",
            student.roll_no, student.name, student.class_name, status
        );
    }

    output
}

pub fn render_daily_attendance(day: &DailyAttendance) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Recorded attendance for {}", day.date);
    render_stats_line(&mut output, &daily_stats(day));

    if day.attendance.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this date.");
        return output;
    }

    for row in &day.attendance {
        let _ = writeln!(
            output,
            "- {} {} ({}): {}",
            row.student_roll, row.student_name, row.student_class, row.status
        );
    }

    output
}

pub fn render_student_attendance(summary: &StudentAttendanceSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Student {}: present {} of {} days ({}%)",
        summary.student_id, summary.present_days, summary.total_days, summary.attendance_percentage
    );
    for day in &summary.summary {
        let _ = writeln!(output, "- {}: {}", day.date, day.status);
    }
    output
}

fn render_fee_row(output: &mut String, fee: &FeeRecord, student: Option<&Student>) {
    let who = match student {
        Some(student) => format!(
            "{} ({} | {})",
            student.name, student.roll_no, student.class_name
        ),
        None => "Student not found".to_string(),
    };
    let _ = writeln!(
        output,
        "- [{}] {} | {} | total {} | paid {} | due {} | {} | due date {}",
        fee.id,
        who,
        fee.month,
        amount(fee.total_amount),
        amount(fee.paid_amount),
        amount(fee.due_amount),
        fee.status,
        fee.due_date.as_deref().unwrap_or("N/A"),
    );
}

pub fn render_fees(ledger: &FeeLedger) -> String {
    let mut output = String::new();

    if !ledger.view().has_loaded() {
        let _ = writeln!(output, "Fees records could not be loaded from the server.");
    }

    if let Some(stats) = ledger.stats() {
        let _ = writeln!(output, "Total Fees: {}", amount(stats.total_fees));
        let _ = writeln!(output, "Total Paid: {}", amount(stats.total_paid));
        let _ = writeln!(output, "Total Due: {}", amount(stats.total_due));
        let _ = writeln!(output, "Collection Rate: {}%", stats.collection_rate);
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "Fees Records ({})", ledger.fees().len());
    if ledger.fees().is_empty() {
        let _ = writeln!(output, "No Fees Records Found. Add one with `fees add`.");
    } else {
        for fee in ledger.fees() {
            render_fee_row(&mut output, fee, ledger.student_for(fee));
        }
    }

    if let Some(stats) = ledger.stats() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Fully Paid: {} | Partially Paid: {} | Pending Payment: {}",
            stats.status_count.paid, stats.status_count.partial, stats.status_count.pending
        );
        for (month, data) in &stats.monthly_data {
            let _ = writeln!(
                output,
                "- {month}: collected {} pending {}",
                amount(data.collected),
                amount(data.pending)
            );
        }
    }

    output
}

pub fn render_student_fees(summary: &StudentFeeSummary, student: Option<&Student>) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Student {}: {} records, paid {}, due {}",
        summary.student_id,
        summary.total_records,
        amount(summary.total_paid),
        amount(summary.total_due)
    );
    for fee in &summary.fees {
        render_fee_row(&mut output, fee, student);
    }
    output
}

/// Markdown dashboard. Sample figures are labelled as placeholders.
pub fn build_dashboard_report(summary: &DashboardSummary, generated_on: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# School Dashboard");
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "- Total Students: {}", summary.total_students);
    let _ = writeln!(output, "- Classes: {}", summary.class_count());
    let _ = writeln!(
        output,
        "- Attendance %: {}% (placeholder)",
        summary.placeholders.attendance_percentage
    );
    let _ = writeln!(
        output,
        "- Fees Collected: ₹{} (placeholder)",
        summary.placeholders.fees_collected
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Class-wise Student Distribution");
    if summary.class_distribution.is_empty() {
        let _ = writeln!(output, "No students loaded.");
    } else {
        for (class_name, count) in &summary.class_distribution {
            let _ = writeln!(output, "- {class_name}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stream-wise Distribution (placeholder)");
    for (stream, share) in summary.placeholders.stream_distribution {
        let _ = writeln!(output, "- {stream}: {share}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Admission Trend (placeholder)");
    for (month, admissions) in summary.placeholders.admission_trend {
        let _ = writeln!(output, "- {month}: {admissions}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Activity (placeholder)");
    for (text, when) in summary.placeholders.recent_activity {
        let _ = writeln!(output, "- {text} ({when})");
    }

    output
}

pub fn render_settings(settings: &Settings) -> String {
    let mut output = String::new();
    for (key, value) in settings.entries() {
        let _ = writeln!(output, "{key}: {value}");
    }
    output
}

pub fn render_backups(view: &BackupsView) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Backups ({}){}",
        view.entries().len(),
        if view.is_demo() { " [demo data]" } else { "" }
    );

    if view.entries().is_empty() {
        let _ = writeln!(output, "No backups yet.");
        return output;
    }

    for (index, entry) in view.entries().iter().enumerate() {
        let _ = writeln!(
            output,
            "{index}. {} | {} | {}",
            entry.filename,
            format_size(entry.size),
            entry.created
        );
    }

    output
}
