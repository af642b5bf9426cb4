//! Cross-application credential handoff.
//!
//! The admin and client dashboards live on different origins. After login the
//! sending side redirects to the other app with `?token=…&role=…` appended; the
//! landing side imports that parcel into its own session store exactly once and
//! then strips it from the address. A short-lived `?code=…` issued by the
//! backend can be used instead, so the bearer token never appears in a URL.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::session::{Session, SessionError, SessionStore};
use crate::types::Role;

pub const TOKEN_PARAM: &str = "token";
pub const ROLE_PARAM: &str = "role";
pub const CODE_PARAM: &str = "code";

/// The transient (token, role) pair carried across a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffParcel {
    pub token: String,
    pub role: Role,
}

impl From<HandoffParcel> for Session {
    fn from(parcel: HandoffParcel) -> Self {
        Session::new(parcel.token, parcel.role)
    }
}

/// Outcome of scanning a landing URL for a parcel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// No parcel in the URL; nothing changed.
    Absent,
    /// Parcel written to the store and stripped from the URL.
    Imported(HandoffParcel),
    /// Parcel stripped from the URL but not stored (empty token or unknown role).
    Rejected { role: String },
}

/// Import a handoff parcel from `url` into `store`, then remove it from `url`.
///
/// Safe to run on every mount: without both parameters this is a no-op.
pub fn bootstrap_from_url(url: &mut Url, store: &dyn SessionStore) -> Result<Bootstrap, SessionError> {
    let token = query_value(url, TOKEN_PARAM);
    let role = query_value(url, ROLE_PARAM);

    let (token, role) = match (token, role) {
        (Some(token), Some(role)) => (token, role),
        _ => return Ok(Bootstrap::Absent),
    };

    let parsed = role.parse::<Role>().ok().filter(|_| !token.is_empty());
    let outcome = match parsed {
        Some(role) => {
            let parcel = HandoffParcel { token, role };
            store.set(parcel.clone().into())?;
            tracing::info!("Imported {} session from handoff URL", parcel.role);
            Bootstrap::Imported(parcel)
        }
        None => {
            tracing::warn!("Discarding handoff parcel with role {:?}", role);
            Bootstrap::Rejected { role }
        }
    };

    strip_params(url, &[TOKEN_PARAM, ROLE_PARAM]);
    Ok(outcome)
}

/// Remove and return a one-time handoff code from `url`, if any.
pub fn take_handoff_code(url: &mut Url) -> Option<String> {
    let code = query_value(url, CODE_PARAM).filter(|c| !c.is_empty());
    if code.is_some() {
        strip_params(url, &[CODE_PARAM]);
    }
    code
}

/// Build the redirect target carrying `parcel` to the other dashboard.
pub fn handoff_url(target: &Url, parcel: &HandoffParcel) -> Url {
    let mut url = target.clone();
    strip_params(&mut url, &[TOKEN_PARAM, ROLE_PARAM]);
    url.query_pairs_mut()
        .append_pair(TOKEN_PARAM, &parcel.token)
        .append_pair(ROLE_PARAM, parcel.role.as_str());
    url
}

/// Build a redirect target carrying only a backend-issued handoff code.
pub fn handoff_code_url(target: &Url, code: &str) -> Url {
    let mut url = target.clone();
    strip_params(&mut url, &[CODE_PARAM]);
    url.query_pairs_mut().append_pair(CODE_PARAM, code);
    url
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn strip_params(url: &mut Url, keys: &[&str]) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !keys.contains(&&**k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn imports_parcel_and_strips_query() {
        let store = MemorySessionStore::new();
        let mut url = Url::parse("https://admin.example.com/dashboard?token=abc123&role=Admin").unwrap();

        let outcome = bootstrap_from_url(&mut url, &store).unwrap();

        assert_eq!(
            outcome,
            Bootstrap::Imported(HandoffParcel {
                token: "abc123".into(),
                role: Role::Admin
            })
        );
        assert_eq!(store.get().unwrap(), Session::new("abc123", Role::Admin));
        assert_eq!(url.query(), None);
        assert_eq!(url.as_str(), "https://admin.example.com/dashboard");
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let store = MemorySessionStore::new();
        let original = Url::parse("https://app.example.com/dashboard?token=abc123&role=Client").unwrap();

        let mut first = original.clone();
        bootstrap_from_url(&mut first, &store).unwrap();
        let mut again = original.clone();
        bootstrap_from_url(&mut again, &store).unwrap();

        assert_eq!(store.get().unwrap(), Session::new("abc123", Role::Client));
        assert_eq!(first, again);

        // stripped URL carries nothing further
        let before = store.get().unwrap();
        assert_eq!(bootstrap_from_url(&mut first, &store).unwrap(), Bootstrap::Absent);
        assert_eq!(store.get().unwrap(), before);
    }

    #[test]
    fn half_a_parcel_is_ignored() {
        let store = MemorySessionStore::with_session(Session::new("existing", Role::Client));
        let mut url = Url::parse("https://app.example.com/?token=abc123&tab=tasks").unwrap();

        assert_eq!(bootstrap_from_url(&mut url, &store).unwrap(), Bootstrap::Absent);
        assert_eq!(url.query(), Some("token=abc123&tab=tasks"));
        assert_eq!(store.token().unwrap().as_deref(), Some("existing"));
    }

    #[test]
    fn unknown_role_is_stripped_but_not_stored() {
        let store = MemorySessionStore::new();
        let mut url = Url::parse("https://app.example.com/?token=abc&role=Root&tab=1").unwrap();

        let outcome = bootstrap_from_url(&mut url, &store).unwrap();

        assert_eq!(outcome, Bootstrap::Rejected { role: "Root".into() });
        assert_eq!(url.query(), Some("tab=1"));
        assert!(!store.get().unwrap().is_authenticated());
    }

    #[test]
    fn handoff_url_replaces_previous_parcel() {
        let target = Url::parse("https://admin.example.com/dashboard?token=old&role=Client&view=kanban").unwrap();
        let parcel = HandoffParcel {
            token: "a b+c".into(),
            role: Role::Admin,
        };

        let url = handoff_url(&target, &parcel);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(
            pairs,
            vec![
                ("view".to_string(), "kanban".to_string()),
                ("token".to_string(), "a b+c".to_string()),
                ("role".to_string(), "Admin".to_string()),
            ]
        );
    }

    #[test]
    fn handoff_code_is_taken_once() {
        let mut url = Url::parse("https://admin.example.com/dashboard?code=xyz").unwrap();
        assert_eq!(take_handoff_code(&mut url).as_deref(), Some("xyz"));
        assert_eq!(url.query(), None);
        assert_eq!(take_handoff_code(&mut url), None);
    }
}
