//! Who is signed in to the dashboards on this machine.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SessionError, ValidationError};
use crate::forms::check_email;
use crate::normalize::normalize_key;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub email: String,
}

impl Session {
    pub fn login(path: &Path, name: &str, email: &str) -> Result<Session, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        let email = normalize_key(email);
        check_email(&email)?;

        let session = Session {
            name: name.to_string(),
            email,
        };
        let encoded = serde_json::to_string_pretty(&session)?;
        std::fs::write(path, encoded).map_err(|source| SessionError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(email = %session.email, "session stored");
        Ok(session)
    }

    /// Missing or unreadable session files mean nobody is signed in.
    pub fn load(path: &Path) -> Option<Session> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring corrupt session file");
                None
            }
        }
    }

    pub fn logout(path: &Path) -> Result<(), SessionError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Clear {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let session =
            Session::login(&path, " Avery Lee ", " Avery.Lee@GroupScholar.com").expect("login");
        assert_eq!(session.email, "avery.lee@groupscholar.com");
        assert_eq!(Session::load(&path), Some(session));
    }

    #[test]
    fn logout_resets_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        Session::login(&path, "Jules", "jules@example.com").expect("login");
        Session::logout(&path).expect("logout");
        assert_eq!(Session::load(&path), None);
        Session::logout(&path).expect("second logout is a no-op");
    }

    #[test]
    fn corrupt_file_means_signed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "<html>").expect("write");
        assert_eq!(Session::load(&path), None);
    }

    #[test]
    fn login_requires_valid_email() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        assert!(matches!(
            Session::login(&path, "Kiara", "not-an-email"),
            Err(SessionError::Invalid(ValidationError::InvalidField { field: "email", .. }))
        ));
        assert!(!path.exists());
    }
}
