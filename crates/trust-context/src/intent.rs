use std::fmt;

use crate::context::{keys, TrustContext};

/// Classified purpose of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestIntent {
    /// Ordinary resource access: ask for a decision, then forward.
    #[default]
    Generic,
    Login,
    Logout,
    Register,
    RemoveAccount,
}

impl RequestIntent {
    /// Map a `requestType` marker to an intent. Unknown or absent markers
    /// are [`RequestIntent::Generic`].
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some("login") => Self::Login,
            Some("logout") => Self::Logout,
            Some("register") => Self::Register,
            Some("removeAccount") => Self::RemoveAccount,
            _ => Self::Generic,
        }
    }

    /// Inspect the `requestType` field of `ctx`. Non-string values count as
    /// absent.
    pub fn classify(ctx: &TrustContext) -> Self {
        Self::from_marker(ctx.get_str(keys::REQUEST_TYPE))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Register => "register",
            Self::RemoveAccount => "removeAccount",
        }
    }

    /// Whether the gateway answers the request itself instead of forwarding.
    pub fn is_identity_lifecycle(&self) -> bool {
        !matches!(self, Self::Generic)
    }
}

impl fmt::Display for RequestIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: serde_json::Value) -> RequestIntent {
        RequestIntent::classify(&serde_json::from_value(value).unwrap())
    }

    #[test]
    fn known_markers() {
        assert_eq!(classify(json!({"requestType": "login"})), RequestIntent::Login);
        assert_eq!(classify(json!({"requestType": "logout"})), RequestIntent::Logout);
        assert_eq!(classify(json!({"requestType": "register"})), RequestIntent::Register);
        assert_eq!(
            classify(json!({"requestType": "removeAccount"})),
            RequestIntent::RemoveAccount
        );
    }

    #[test]
    fn missing_marker_is_generic() {
        assert_eq!(classify(json!({"user": "alice"})), RequestIntent::Generic);
    }

    #[test]
    fn unknown_marker_is_generic() {
        assert_eq!(classify(json!({"requestType": "unknownThing"})), RequestIntent::Generic);
        assert_eq!(classify(json!({"requestType": "LOGIN"})), RequestIntent::Generic);
    }

    #[test]
    fn non_string_marker_is_generic() {
        assert_eq!(classify(json!({"requestType": 1})), RequestIntent::Generic);
        assert_eq!(classify(json!({"requestType": null})), RequestIntent::Generic);
    }

    #[test]
    fn marker_round_trips_through_as_str() {
        for intent in [
            RequestIntent::Login,
            RequestIntent::Logout,
            RequestIntent::Register,
            RequestIntent::RemoveAccount,
        ] {
            assert_eq!(RequestIntent::from_marker(Some(intent.as_str())), intent);
            assert!(intent.is_identity_lifecycle());
        }
        assert!(!RequestIntent::Generic.is_identity_lifecycle());
    }
}
