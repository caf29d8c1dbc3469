use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("Database unavailable")] DbUnavailable,
    #[error("User not found")] UserNotFound,
    #[error("Email already registered")] EmailTaken,
    #[error("Incorrect email or password")] InvalidCredentials,
    #[error("Could not validate credentials")] Unauthenticated,
    #[error("Inactive user")] InactiveUser,
    #[error("No study plan found")] StudyPlanNotFound,
    #[error("Study session not found")] SessionNotFound,
    #[error("Invalid input: {0}")] InvalidInput(String),
    #[error("Unknown error")] Unknown,
}

impl StudyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DbUnavailable => "DB-1001",
            Self::UserNotFound => "USR-1001",
            Self::EmailTaken => "USR-1002",
            Self::InvalidCredentials => "AUTH-1001",
            Self::Unauthenticated => "AUTH-1002",
            Self::InactiveUser => "AUTH-1003",
            Self::StudyPlanNotFound => "PLN-1001",
            Self::SessionNotFound => "SES-1001",
            Self::InvalidInput(_) => "REQ-1001",
            Self::Unknown => "GEN-1000",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::DbUnavailable => "The service could not access the SQLite database.",
            Self::UserNotFound => "No user exists for the requested ID.",
            Self::EmailTaken => "Another account already uses this email address.",
            Self::InvalidCredentials => "The email and password combination was rejected.",
            Self::Unauthenticated => "The bearer token is missing, expired, or does not match a user.",
            Self::InactiveUser => "The account exists but has been deactivated.",
            Self::StudyPlanNotFound => "The user has not generated a study plan yet.",
            Self::SessionNotFound => "No study session with this ID belongs to the user.",
            Self::InvalidInput(_) => "The request payload failed validation.",
            Self::Unknown => "An unspecified error occurred.",
        }
    }
}

impl From<rusqlite::Error> for StudyError {
    fn from(err: rusqlite::Error) -> Self {
        log::error!("sqlite error: {err}");
        Self::DbUnavailable
    }
}

impl From<r2d2::Error> for StudyError {
    fn from(err: r2d2::Error) -> Self {
        log::error!("connection pool error: {err}");
        Self::DbUnavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let all = [
            StudyError::DbUnavailable,
            StudyError::UserNotFound,
            StudyError::EmailTaken,
            StudyError::InvalidCredentials,
            StudyError::Unauthenticated,
            StudyError::InactiveUser,
            StudyError::StudyPlanNotFound,
            StudyError::SessionNotFound,
            StudyError::InvalidInput(String::new()),
            StudyError::Unknown,
        ];
        let mut codes: Vec<_> = all.iter().map(StudyError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn invalid_input_carries_detail() {
        let err = StudyError::InvalidInput("end_time must be after start_time".into());
        assert_eq!(err.to_string(), "Invalid input: end_time must be after start_time");
    }
}
