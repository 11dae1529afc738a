use serde::{Deserialize, Serialize};

// ===== Backend Response Types =====

/// Error payload the backend attaches to non-2xx responses
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_message() {
        let body: BackendErrorBody =
            serde_json::from_str(r#"{"message": " MBTI test required "}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("MBTI test required"));

        let body: BackendErrorBody = serde_json::from_str(r#"{"error": "nope"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("nope"));

        let body: BackendErrorBody = serde_json::from_str(r#"{"message": ""}"#).unwrap();
        assert_eq!(body.into_message(), None);
    }

    #[test]
    fn test_login_response() {
        let json = r#"{"token": "abc", "user": {"_id": "u1", "email": "jane@x.com", "name": "Jane"}}"#;
        let login: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(login.user.id, "u1");
        assert_eq!(login.user.role, None);
    }
}
