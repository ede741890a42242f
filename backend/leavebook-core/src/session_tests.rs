// src/session_tests.rs

#[cfg(test)]
mod tests {
    use crate::clock::{Clock, TestClock};
    use crate::session::*;
    use chrono::Duration;
    use std::fs;
    use std::path::PathBuf;

    fn get_test_path(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("leavebook_test_session_{}.json", test_name))
    }

    fn teardown(test_name: &str) {
        let _ = fs::remove_file(get_test_path(test_name));
    }

    fn credentials() -> ManagerCredentials {
        ManagerCredentials {
            username: "admin".into(),
            password_sha256: ManagerCredentials::hash_password("s3cret"),
        }
    }

    #[test]
    fn test_validity_window_boundary() {
        let clock = TestClock::new("2024-05-01 08:00:00");
        let session = ManagerSession::started_at(clock.now());
        let ttl = Duration::minutes(30);

        assert!(session.is_valid(clock.now(), ttl));
        clock.advance(Duration::minutes(29) + Duration::seconds(59));
        assert!(session.is_valid(clock.now(), ttl));
        clock.advance(Duration::seconds(1));
        assert!(!session.is_valid(clock.now(), ttl));
    }

    #[test]
    fn test_wrong_credentials_rejected() {
        let creds = credentials();
        assert!(creds.verify("admin", "s3cret").is_ok());
        assert!(matches!(
            creds.verify("admin", "nope"),
            Err(SessionError::InvalidCredentials)
        ));
        assert!(matches!(
            creds.verify("root", "s3cret"),
            Err(SessionError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_login_persists_and_restores() {
        let test_name = "login_persists";
        teardown(test_name);
        let clock = TestClock::new("2024-05-01 08:00:00");
        let file = SessionFile::new(get_test_path(test_name), Duration::minutes(30));

        let session = file.login(&credentials(), "admin", "s3cret", clock.now()).unwrap();
        clock.advance(Duration::minutes(10));
        assert_eq!(file.restore(clock.now()).unwrap(), Some(session));

        teardown(test_name);
    }

    #[test]
    fn test_failed_login_writes_nothing() {
        let test_name = "failed_login";
        teardown(test_name);
        let clock = TestClock::new("2024-05-01 08:00:00");
        let file = SessionFile::new(get_test_path(test_name), Duration::minutes(30));

        assert!(file.login(&credentials(), "admin", "bad", clock.now()).is_err());
        assert!(!file.path().exists());

        teardown(test_name);
    }

    #[test]
    fn test_expired_marker_is_cleared_on_restore() {
        let test_name = "expired_marker";
        teardown(test_name);
        let clock = TestClock::new("2024-05-01 08:00:00");
        let file = SessionFile::new(get_test_path(test_name), Duration::minutes(30));
        file.save(&ManagerSession::started_at(clock.now())).unwrap();

        clock.advance(Duration::minutes(31));
        assert_eq!(file.restore(clock.now()).unwrap(), None);
        assert!(!file.path().exists());

        teardown(test_name);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let test_name = "logout";
        teardown(test_name);
        let clock = TestClock::new("2024-05-01 08:00:00");
        let file = SessionFile::new(get_test_path(test_name), Duration::minutes(30));
        file.save(&ManagerSession::started_at(clock.now())).unwrap();

        file.clear().unwrap();
        file.clear().unwrap();
        assert_eq!(file.load().unwrap(), None);

        teardown(test_name);
    }
}
