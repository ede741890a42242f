// src/error.rs
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

use crate::backing_store::StoreError;
use crate::request::{RequestId, RequestStatus};

/// A single reason a form cannot be submitted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    MissingName,
    MissingDate,
    MissingTimeIn,
    MissingTimeOut,
    InvalidTimeIn(String),
    InvalidTimeOut(String),
    MissingReason,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::MissingName => write!(f, "staff name is required"),
            FieldProblem::MissingDate => write!(f, "date is required"),
            FieldProblem::MissingTimeIn => write!(f, "time in is required"),
            FieldProblem::MissingTimeOut => write!(f, "time out is required"),
            FieldProblem::InvalidTimeIn(v) => write!(f, "time in '{}' is not HH:MM", v),
            FieldProblem::InvalidTimeOut(v) => write!(f, "time out '{}' is not HH:MM", v),
            FieldProblem::MissingReason => write!(f, "reason is required"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Submission blocked: a request for {date} already exists")]
    DuplicateLocked { date: NaiveDate },

    #[error("Form is incomplete: {}", join_problems(.0))]
    Validation(Vec<FieldProblem>),

    #[error("Could not reach the backing store")]
    Transport(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Manager login required (missing or expired session)")]
    Unauthorized,

    #[error("No request with id {0} in the current snapshot")]
    UnknownRequest(RequestId),

    #[error("Request cannot move from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Deletion was not confirmed")]
    NotConfirmed,

    #[error("Could not reach the backing store")]
    Transport(#[source] StoreError),
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
