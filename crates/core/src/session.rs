use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;

/// A privileged reviewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Director,
    Finance,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Finance => "finance",
        }
    }
}

/// Whoever is acting on a request. Staff without a session act as `Anonymous`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Director,
    Finance,
    #[serde(rename = "none")]
    Anonymous,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Finance => "finance",
            Self::Anonymous => "none",
        }
    }

    pub fn is_privileged(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

impl From<Role> for ActorRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Director => Self::Director,
            Role::Finance => Self::Finance,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the acting role for a workflow decision.
pub trait RoleContext {
    fn current_role(&self) -> ActorRole;
}

impl RoleContext for ActorRole {
    fn current_role(&self) -> ActorRole {
        *self
    }
}

#[derive(Clone, Debug)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
    pub role: Role,
}

/// The fixed director/finance identities.
#[derive(Clone, Debug)]
pub struct CredentialTable {
    entries: Vec<Credential>,
}

impl CredentialTable {
    pub fn new(entries: Vec<Credential>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| Credential { username: entry.username.to_ascii_lowercase(), ..entry })
            .collect();
        Self { entries }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(vec![
            Credential {
                username: "director".to_string(),
                password: auth.director_password.clone(),
                role: Role::Director,
            },
            Credential {
                username: "finance".to_string(),
                password: auth.finance_password.clone(),
                role: Role::Finance,
            },
        ])
    }

    /// Username matches case-insensitively; the password must match exactly.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&Credential> {
        let username = username.to_ascii_lowercase();
        self.entries.iter().find(|entry| {
            entry.username == username && entry.password.expose_secret() == password
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub username: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl RoleContext for Session {
    fn current_role(&self) -> ActorRole {
        self.role.into()
    }
}

impl RoleContext for Option<Session> {
    fn current_role(&self) -> ActorRole {
        self.as_ref().map(RoleContext::current_role).unwrap_or(ActorRole::Anonymous)
    }
}

/// Login sessions held in process memory.
#[derive(Clone)]
pub struct SessionRegistry {
    credentials: CredentialTable,
    ttl: Duration,
    sessions: Arc<Mutex<HashMap<SessionToken, Session>>>,
}

impl SessionRegistry {
    pub fn new(credentials: CredentialTable, ttl: Duration) -> Self {
        Self { credentials, ttl, sessions: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(
            CredentialTable::from_config(auth),
            Duration::minutes(i64::from(auth.session_ttl_minutes)),
        )
    }

    pub fn login(&self, username: &str, password: &str, now: DateTime<Utc>) -> Option<Session> {
        let credential = self.credentials.authenticate(username, password)?;
        let session = Session {
            token: SessionToken(Uuid::new_v4().to_string()),
            username: credential.username.clone(),
            role: credential.role,
            issued_at: now,
            expires_at: now + self.ttl,
        };

        self.with_sessions(|sessions| {
            sessions.retain(|_, existing| !existing.is_expired(now));
            sessions.insert(session.token.clone(), session.clone());
        });
        Some(session)
    }

    /// Expired sessions are evicted and resolve to `None`.
    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let key = SessionToken(token.to_string());
        self.with_sessions(|sessions| {
            let expired = match sessions.get(&key) {
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => true,
                None => false,
            };
            if expired {
                sessions.remove(&key);
            }
            None
        })
    }

    pub fn logout(&self, token: &str) -> bool {
        let key = SessionToken(token.to_string());
        self.with_sessions(|sessions| sessions.remove(&key).is_some())
    }

    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.with_sessions(|sessions| {
            sessions.values().filter(|session| !session.is_expired(now)).count()
        })
    }

    fn with_sessions<T>(&self, f: impl FnOnce(&mut HashMap<SessionToken, Session>) -> T) -> T {
        match self.sessions.lock() {
            Ok(mut sessions) => f(&mut sessions),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
