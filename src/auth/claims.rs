use serde::{Deserialize, Serialize};

/// Identity extracted from a validated token.
///
/// Inserted into request extensions by the auth stage; handlers read it
/// with `Option<Extension<UserClaims>>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub client_id: String,
}

/// Raw token payload. Only the fields we read are declared.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
    /// NumericDate, which may carry a fractional part
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<serde_json::Value>,
}

impl From<TokenClaims> for UserClaims {
    fn from(claims: TokenClaims) -> Self {
        // Non-string role entries are ignored rather than failing the token
        let roles = claims
            .realm_access
            .map(|access| {
                access
                    .roles
                    .into_iter()
                    .filter_map(|r| r.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            subject: claims.sub.unwrap_or_default(),
            email: claims.email.unwrap_or_default(),
            name: claims.name.unwrap_or_default(),
            roles,
            client_id: claims.azp.unwrap_or_default(),
        }
    }
}

impl TokenClaims {
    /// Expiry in whole seconds, fraction dropped.
    pub fn expires_at(&self) -> Option<i64> {
        self.exp.map(|exp| exp.trunc() as i64)
    }
}

impl UserClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_full_claims() {
        let raw: TokenClaims = serde_json::from_value(serde_json::json!({
            "sub": "user-1",
            "email": "ada@example.com",
            "name": "Ada",
            "azp": "taskboard-web",
            "exp": 1,
            "realm_access": {"roles": ["admin", 7, "user"]}
        }))
        .unwrap();

        let claims = UserClaims::from(raw);
        assert_eq!(claims.subject, "user-1");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.client_id, "taskboard-web");
        assert_eq!(claims.roles, vec!["admin", "user"]);
        assert!(claims.has_role("admin"));
    }

    #[test]
    fn test_missing_optional_claims() {
        let raw: TokenClaims = serde_json::from_value(serde_json::json!({"exp": 1})).unwrap();
        let claims = UserClaims::from(raw);

        assert_eq!(claims, UserClaims::default());
    }

    #[test]
    fn test_fractional_expiry_is_truncated() {
        let raw: TokenClaims =
            serde_json::from_value(serde_json::json!({"exp": 1_700_000_000.75})).unwrap();
        assert_eq!(raw.expires_at(), Some(1_700_000_000));

        let raw: TokenClaims = serde_json::from_value(serde_json::json!({"exp": 42})).unwrap();
        assert_eq!(raw.expires_at(), Some(42));
    }
}
