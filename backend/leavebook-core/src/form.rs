// src/form.rs
use chrono::NaiveDate;

use crate::error::FieldProblem;
use crate::time_value::{is_valid_time, TimeField};

/// Editable submission form. Lives behind the desk's mutex because the
/// duplicate countdown may clear its date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionForm {
    pub staff_name: String,
    pub date: Option<NaiveDate>,
    pub time_in: TimeField,
    pub time_out: TimeField,
    pub reason: String,
}

/// Field values that passed validation, ready to become a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub staff_name: String,
    pub date: NaiveDate,
    pub time_in: String,
    pub time_out: String,
    pub reason: String,
}

impl SubmissionForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Collects every problem rather than stopping at the first.
    pub fn validate(&self, require_reason: bool) -> Result<ValidatedForm, Vec<FieldProblem>> {
        let mut problems = Vec::new();

        let name = self.staff_name.trim();
        if name.is_empty() {
            problems.push(FieldProblem::MissingName);
        }
        if self.date.is_none() {
            problems.push(FieldProblem::MissingDate);
        }

        let time_in = self.time_in.value();
        if time_in.is_empty() {
            problems.push(FieldProblem::MissingTimeIn);
        } else if !is_valid_time(time_in) {
            problems.push(FieldProblem::InvalidTimeIn(time_in.to_string()));
        }

        let time_out = self.time_out.value();
        if time_out.is_empty() {
            problems.push(FieldProblem::MissingTimeOut);
        } else if !is_valid_time(time_out) {
            problems.push(FieldProblem::InvalidTimeOut(time_out.to_string()));
        }

        let reason = self.reason.trim();
        if require_reason && reason.is_empty() {
            problems.push(FieldProblem::MissingReason);
        }

        match (problems.is_empty(), self.date) {
            (true, Some(date)) => Ok(ValidatedForm {
                staff_name: name.to_string(),
                date,
                time_in: time_in.to_string(),
                time_out: time_out.to_string(),
                reason: reason.to_string(),
            }),
            _ => Err(problems),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> SubmissionForm {
        SubmissionForm {
            staff_name: " Uy Mengsae ".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            time_in: TimeField::new("8:00"),
            time_out: TimeField::new("17:00"),
            reason: "Dentist".into(),
        }
    }

    #[test]
    fn test_complete_form_validates_and_trims() {
        let valid = filled().validate(true).unwrap();
        assert_eq!(valid.staff_name, "Uy Mengsae");
        assert_eq!(valid.time_out, "17:00");
    }

    #[test]
    fn test_all_problems_are_reported() {
        let form = SubmissionForm {
            time_in: TimeField::new("800"),
            ..Default::default()
        };
        let problems = form.validate(true).unwrap_err();
        assert_eq!(
            problems,
            vec![
                FieldProblem::MissingName,
                FieldProblem::MissingDate,
                FieldProblem::InvalidTimeIn("800".into()),
                FieldProblem::MissingTimeOut,
                FieldProblem::MissingReason,
            ]
        );
    }

    #[test]
    fn test_reason_optional_when_not_required() {
        let mut form = filled();
        form.reason.clear();
        assert!(form.validate(false).is_ok());
        assert_eq!(form.validate(true).unwrap_err(), vec![FieldProblem::MissingReason]);
    }
}
