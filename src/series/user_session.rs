//! Session provider contract and the user record built from it

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// The signed-in user as reported by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user id; the key under `/users`
    pub uid: String,
    /// Display name, if the provider has one
    pub display_name: Option<String>,
    /// Email address, if the provider has one
    pub email: Option<String>,
}

impl UserProfile {
    /// Create a profile with only a uid
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Source of the current user. Must answer synchronously.
pub trait SessionProvider: Send + Sync {
    /// The signed-in user, `None` when signed out
    fn current_user(&self) -> Option<UserProfile>;
}

impl<P: SessionProvider> SessionProvider for Arc<P> {
    fn current_user(&self) -> Option<UserProfile> {
        (**self).current_user()
    }
}

/// Session provider holding a user set by the embedding application
#[derive(Debug, Default)]
pub struct StaticSession {
    user: RwLock<Option<UserProfile>>,
}

impl StaticSession {
    /// Create a signed-out session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session already signed in as `user`
    pub fn signed_in(user: UserProfile) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// Replace the current user
    pub fn sign_in(&self, user: UserProfile) {
        match self.user.write() {
            Ok(mut guard) => *guard = Some(user),
            Err(poisoned) => *poisoned.into_inner() = Some(user),
        }
    }

    /// Clear the current user
    pub fn sign_out(&self) {
        match self.user.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<UserProfile> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Document stored at `/users/{uid}` when the account is created.
///
/// `name` and `email` are always written, empty when the profile lacks them,
/// so the document exists even before the mirror holds anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Display name at creation time
    #[serde(default)]
    pub name: String,
    /// Email at creation time
    #[serde(default)]
    pub email: String,
    /// The user's series mirror, keyed by series id
    #[serde(default)]
    pub series: Map<String, Value>,
}

impl UserRecord {
    /// Build the initial record for a user; the series mirror starts empty
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            name: profile.display_name.clone().unwrap_or_default(),
            email: profile.email.clone().unwrap_or_default(),
            series: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_session() {
        let session = StaticSession::new();
        assert_eq!(session.current_user(), None);

        session.sign_in(UserProfile::new("u1").with_email("a@b.c"));
        assert_eq!(session.current_user().unwrap().uid, "u1");

        session.sign_out();
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn test_shared_session() {
        let session = Arc::new(StaticSession::signed_in(UserProfile::new("u1")));
        let shared = Arc::clone(&session);
        session.sign_in(UserProfile::new("u2"));
        assert_eq!(shared.current_user().unwrap().uid, "u2");
    }

    #[test]
    fn test_user_record_from_profile() {
        let profile = UserProfile::new("u1")
            .with_display_name("Ada")
            .with_email("ada@example.com");
        let record = UserRecord::from_profile(&profile);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"name": "Ada", "email": "ada@example.com", "series": {}})
        );
    }

    #[test]
    fn test_user_record_reads_without_series() {
        let record: UserRecord = serde_json::from_value(json!({"name": "Ada"})).unwrap();
        assert!(record.series.is_empty());
        assert_eq!(record.email, "");
    }

    #[test]
    fn test_user_record_for_uid_only_profile() {
        let record = UserRecord::from_profile(&UserProfile::new("u1"));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"name": "", "email": "", "series": {}})
        );
    }
}
