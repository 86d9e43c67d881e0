//! School preferences kept on this machine only. Nothing here is sent to the
//! backend, and nothing the backend owns is stored here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::collection::Confirm;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("unknown setting: {0} (expected one of: {known})", known = FIELDS.join(", "))]
    UnknownField(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub school_name: String,
    pub school_address: String,
    pub principal_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub academic_year: String,
    #[serde(rename = "feeDueDate")]
    pub fee_due_day: u8,
    pub default_fee_amount: f64,
    pub attendance_start_time: NaiveTime,
    pub attendance_end_time: NaiveTime,
    pub website: String,
    pub school_code: String,
    pub total_classes: u32,
    pub working_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            school_name: "Delhi Public School".to_string(),
            school_address: "123 Main Street, New Delhi, India".to_string(),
            principal_name: "Dr. Rajesh Kumar Sharma".to_string(),
            contact_email: "info@dps.edu.in".to_string(),
            contact_phone: "+91-11-12345678".to_string(),
            academic_year: "2024-2025".to_string(),
            fee_due_day: 10,
            default_fee_amount: 5000.0,
            attendance_start_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default(),
            attendance_end_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap_or_default(),
            website: "www.dps.edu.in".to_string(),
            school_code: "DPS-ND-001".to_string(),
            total_classes: 12,
            working_days: 220,
        }
    }
}

pub const FIELDS: [&str; 14] = [
    "schoolName",
    "schoolAddress",
    "principalName",
    "contactEmail",
    "contactPhone",
    "academicYear",
    "feeDueDate",
    "defaultFeeAmount",
    "attendanceStartTime",
    "attendanceEndTime",
    "website",
    "schoolCode",
    "totalClasses",
    "workingDays",
];

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| SettingsError::InvalidValue {
            field,
            reason: err.to_string(),
        })
}

fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, SettingsError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|err| SettingsError::InvalidValue {
        field,
        reason: err.to_string(),
    })
}

impl Settings {
    /// Sets one field by its stored key, e.g. `schoolName` or `feeDueDate`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "schoolName" => {
                if value.trim().is_empty() {
                    return Err(SettingsError::InvalidValue {
                        field: "schoolName",
                        reason: "school name is required".to_string(),
                    });
                }
                self.school_name = value.to_string();
            }
            "schoolAddress" => self.school_address = value.to_string(),
            "principalName" => self.principal_name = value.to_string(),
            "contactEmail" => self.contact_email = value.to_string(),
            "contactPhone" => self.contact_phone = value.to_string(),
            "academicYear" => self.academic_year = value.to_string(),
            "feeDueDate" => {
                let day: u8 = parse_number("feeDueDate", value)?;
                if !(1..=31).contains(&day) {
                    return Err(SettingsError::InvalidValue {
                        field: "feeDueDate",
                        reason: format!("{day} is not a day of the month (1-31)"),
                    });
                }
                self.fee_due_day = day;
            }
            "defaultFeeAmount" => {
                let amount: f64 = parse_number("defaultFeeAmount", value)?;
                if !amount.is_finite() || amount < 0.0 {
                    return Err(SettingsError::InvalidValue {
                        field: "defaultFeeAmount",
                        reason: "must be a non-negative amount".to_string(),
                    });
                }
                self.default_fee_amount = amount;
            }
            "attendanceStartTime" => {
                self.attendance_start_time = parse_time("attendanceStartTime", value)?
            }
            "attendanceEndTime" => {
                self.attendance_end_time = parse_time("attendanceEndTime", value)?
            }
            "website" => self.website = value.to_string(),
            "schoolCode" => self.school_code = value.to_string(),
            "totalClasses" => self.total_classes = parse_number("totalClasses", value)?,
            "workingDays" => self.working_days = parse_number("workingDays", value)?,
            other => return Err(SettingsError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Field key and display value pairs in form order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("schoolName", self.school_name.clone()),
            ("schoolAddress", self.school_address.clone()),
            ("principalName", self.principal_name.clone()),
            ("contactEmail", self.contact_email.clone()),
            ("contactPhone", self.contact_phone.clone()),
            ("academicYear", self.academic_year.clone()),
            ("feeDueDate", self.fee_due_day.to_string()),
            ("defaultFeeAmount", self.default_fee_amount.to_string()),
            (
                "attendanceStartTime",
                self.attendance_start_time.format("%H:%M").to_string(),
            ),
            (
                "attendanceEndTime",
                self.attendance_end_time.format("%H:%M").to_string(),
            ),
            ("website", self.website.clone()),
            ("schoolCode", self.school_code.clone()),
            ("totalClasses", self.total_classes.to_string()),
            ("workingDays", self.working_days.to_string()),
        ]
    }
}

/// Settings plus the file they live in.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Reads saved settings, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "saved settings unreadable, using defaults");
                Settings::default()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no saved settings, using defaults");
                Settings::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read settings, using defaults");
                Settings::default()
            }
        };
        Self { path, settings }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.settings.set(key, value)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.path, json).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Back to the built-in defaults. Not written until [`SettingsStore::save`].
    pub fn reset(&mut self) {
        self.settings = Settings::default();
    }

    /// Asks first, then resets and saves. Returns `false` when declined, with
    /// both memory and file untouched.
    pub fn reset_confirmed(&mut self, confirm: &mut dyn Confirm) -> Result<bool, SettingsError> {
        if !confirm.confirm("Are you sure you want to reset all settings to default?") {
            info!("settings reset declined");
            return Ok(false);
        }
        self.reset();
        self.save()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_path;

    #[test]
    fn missing_file_yields_defaults() {
        let store = SettingsStore::open(temp_path("absent.json"));
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let path = temp_path("corrupt.json");
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::open(&path);
        fs::remove_file(&path).ok();
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn saved_edits_survive_reopen() {
        let path = temp_path("settings.json");
        let mut store = SettingsStore::open(&path);
        store.set("schoolName", "Springfield High").unwrap();
        store.set("feeDueDate", "5").unwrap();
        store.set("attendanceStartTime", "07:45").unwrap();
        store.save().unwrap();

        let reopened = SettingsStore::open(&path);
        fs::remove_file(&path).ok();

        assert_eq!(reopened.settings().school_name, "Springfield High");
        assert_eq!(reopened.settings().fee_due_day, 5);
        assert_eq!(
            reopened.settings().attendance_start_time,
            NaiveTime::from_hms_opt(7, 45, 0).unwrap()
        );
    }

    #[test]
    fn stored_keys_match_field_names() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        let object = value.as_object().unwrap();
        for key in FIELDS {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), FIELDS.len());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path("partial.json");
        fs::write(&path, r#"{"schoolName": "Hillview"}"#).unwrap();
        let store = SettingsStore::open(&path);
        fs::remove_file(&path).ok();

        assert_eq!(store.settings().school_name, "Hillview");
        assert_eq!(store.settings().working_days, 220);
    }

    #[test]
    fn invalid_values_are_rejected_without_change() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("feeDueDate", "40"),
            Err(SettingsError::InvalidValue { field: "feeDueDate", .. })
        ));
        assert!(settings.set("workingDays", "many").is_err());
        assert!(settings.set("attendanceEndTime", "25:00").is_err());
        let unknown = settings.set("theme", "dark").unwrap_err();
        assert!(matches!(unknown, SettingsError::UnknownField(_)));
        assert!(unknown.to_string().starts_with("unknown setting: theme (expected one of: schoolName, "));
        assert!(unknown.to_string().ends_with("workingDays)"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn reset_restores_defaults_in_memory_only() {
        let path = temp_path("reset.json");
        let mut store = SettingsStore::open(&path);
        store.set("website", "example.org").unwrap();
        store.save().unwrap();

        store.reset();
        assert_eq!(store.settings(), &Settings::default());

        let reopened = SettingsStore::open(&path);
        fs::remove_file(&path).ok();
        assert_eq!(reopened.settings().website, "example.org");
    }

    #[test]
    fn declined_reset_changes_nothing() {
        let path = temp_path("reset-declined.json");
        let mut store = SettingsStore::open(&path);
        store.set("schoolCode", "HV-01").unwrap();
        store.save().unwrap();

        let mut prompts = Vec::new();
        let reset = store
            .reset_confirmed(&mut |prompt: &str| {
                prompts.push(prompt.to_string());
                false
            })
            .unwrap();

        let reopened = SettingsStore::open(&path);
        fs::remove_file(&path).ok();
        assert!(!reset);
        assert_eq!(
            prompts,
            vec!["Are you sure you want to reset all settings to default?"]
        );
        assert_eq!(store.settings().school_code, "HV-01");
        assert_eq!(reopened.settings().school_code, "HV-01");
    }

    #[test]
    fn confirmed_reset_is_saved() {
        let path = temp_path("reset-confirmed.json");
        let mut store = SettingsStore::open(&path);
        store.set("totalClasses", "10").unwrap();
        store.save().unwrap();

        assert!(store.reset_confirmed(&mut |_: &str| true).unwrap());

        let reopened = SettingsStore::open(&path);
        fs::remove_file(&path).ok();
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(reopened.settings(), &Settings::default());
    }
}
