// src/lifecycle.rs
use tracing::warn;

use crate::error::LifecycleError;
use crate::request::{Request, RequestId, RequestStatus};

/// Checks a manager decision against the current snapshot before anything is
/// sent. Returns the record the decision applies to.
pub fn plan_status_change(
    snapshot: &[Request],
    id: RequestId,
    target: RequestStatus,
) -> Result<&Request, LifecycleError> {
    let request = find_request(snapshot, id)?;
    if !request.status.can_transition_to(target) {
        warn!(
            "Refusing to move request {} from {} to {}",
            id, request.status, target
        );
        return Err(LifecycleError::InvalidTransition {
            from: request.status,
            to: target,
        });
    }
    Ok(request)
}

pub fn find_request(snapshot: &[Request], id: RequestId) -> Result<&Request, LifecycleError> {
    snapshot
        .iter()
        .find(|r| r.id == id)
        .ok_or(LifecycleError::UnknownRequest(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn req(id: i64, status: RequestStatus) -> Request {
        Request {
            id: RequestId(id),
            staff_name: "Meng Mean".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            time_in: Some("08:00".into()),
            time_out: Some("12:00".into()),
            reason: "Clinic".into(),
            status,
        }
    }

    #[test]
    fn test_pending_can_be_decided() {
        let snapshot = vec![req(1, RequestStatus::Pending)];
        let planned = plan_status_change(&snapshot, RequestId(1), RequestStatus::Approved).unwrap();
        assert_eq!(planned.id, RequestId(1));
        assert!(plan_status_change(&snapshot, RequestId(1), RequestStatus::Rejected).is_ok());
    }

    #[test]
    fn test_decided_requests_are_final() {
        let snapshot = vec![
            req(1, RequestStatus::Approved),
            req(2, RequestStatus::Rejected),
        ];
        assert!(matches!(
            plan_status_change(&snapshot, RequestId(1), RequestStatus::Rejected),
            Err(LifecycleError::InvalidTransition {
                from: RequestStatus::Approved,
                to: RequestStatus::Rejected
            })
        ));
        assert!(matches!(
            plan_status_change(&snapshot, RequestId(2), RequestStatus::Approved),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_never_back_to_pending() {
        let snapshot = vec![req(1, RequestStatus::Pending)];
        assert!(plan_status_change(&snapshot, RequestId(1), RequestStatus::Pending).is_err());
    }

    #[test]
    fn test_unknown_id() {
        let snapshot = vec![req(1, RequestStatus::Pending)];
        assert!(matches!(
            plan_status_change(&snapshot, RequestId(9), RequestStatus::Approved),
            Err(LifecycleError::UnknownRequest(RequestId(9)))
        ));
    }
}
