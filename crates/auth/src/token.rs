//! Token Validator: verifies RSA-signed bearer tokens and builds a [`Principal`].

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use relation_core::CompanyId;

use crate::claims::{self, Claims};
use crate::{AuthError, AuthMethod, KeySetCache, Principal, PrincipalId, Role};

/// Algorithms accepted for bearer tokens. Anything else (notably `HS*` and
/// `none`) is rejected before a key is even looked up.
pub const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenValidatorConfig {
    /// Expected audience; matched verbatim or as a substring. Empty skips the check.
    pub client_id: String,
    /// Expected issuer tenant; matched as a substring of `iss`. Empty skips the check.
    pub tenant_id: String,
    /// At least one must be granted when non-empty.
    pub required_scopes: Vec<String>,
    /// Home company for tokens that carry no company claim.
    pub default_company: CompanyId,
    pub leeway_secs: u64,
}

impl Default for TokenValidatorConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant_id: String::new(),
            required_scopes: Vec::new(),
            default_company: CompanyId::Gruppen,
            leeway_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<KeySetCache>,
    config: TokenValidatorConfig,
}

impl TokenValidator {
    pub fn new(keys: Arc<KeySetCache>, config: TokenValidatorConfig) -> Self {
        Self { keys, config }
    }

    pub fn config(&self) -> &TokenValidatorConfig {
        &self.config
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    pub async fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let header =
            decode_header(token).map_err(|_| AuthError::invalid_token("malformed token header"))?;
        if !RSA_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::invalid_token(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| AuthError::invalid_token("missing key id"))?;

        let key = self.keys.get_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = RSA_ALGORITHMS.to_vec();
        validation.leeway = self.config.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::invalid_token(err.to_string()),
            })?
            .claims;

        self.check_audience(&claims)?;
        self.check_issuer(&claims)?;
        if !claims::has_required_scope(&claims.scopes(), &self.config.required_scopes) {
            return Err(AuthError::InvalidScope);
        }

        let principal = self.principal_from(&claims)?;
        debug!(kid = %kid, user_id = %principal.id, "token validated");
        Ok(principal)
    }

    fn check_audience(&self, claims: &Claims) -> Result<(), AuthError> {
        let expected = self.config.client_id.as_str();
        if expected.is_empty() || claims.audiences().iter().any(|aud| aud.contains(expected)) {
            Ok(())
        } else {
            Err(AuthError::invalid_token("audience mismatch"))
        }
    }

    fn check_issuer(&self, claims: &Claims) -> Result<(), AuthError> {
        let expected = self.config.tenant_id.as_str();
        if expected.is_empty() || claims.issuer().is_some_and(|iss| iss.contains(expected)) {
            Ok(())
        } else {
            Err(AuthError::invalid_token("issuer mismatch"))
        }
    }

    fn principal_from(&self, claims: &Claims) -> Result<Principal, AuthError> {
        let email = claims.first_string(claims::EMAIL_CLAIMS).unwrap_or_default();
        let raw_id = claims.first_string(claims::ID_CLAIMS);

        // Stable id claim, then the email, then the opaque subject.
        let id = match raw_id.and_then(|raw| Uuid::parse_str(raw).ok()) {
            Some(uuid) => PrincipalId::from_uuid(uuid),
            None if !email.is_empty() => PrincipalId::from_email(email),
            None => match raw_id {
                Some(raw) => PrincipalId::from_email(raw),
                None => return Err(AuthError::invalid_token("no identity claim")),
            },
        };

        let home_company = match claims.first_string(claims::COMPANY_CLAIMS) {
            Some(raw) => raw
                .parse::<CompanyId>()
                .map_err(|_| AuthError::invalid_token("unknown company claim"))?,
            None => self.config.default_company,
        };

        Ok(Principal {
            id,
            display_name: claims
                .first_string(claims::NAME_CLAIMS)
                .unwrap_or(email)
                .to_string(),
            email: email.to_string(),
            roles: claims.roles().into_iter().map(Role::from).collect(),
            home_company,
            auth_method: AuthMethod::Bearer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, StaticKeySource};
    use serde_json::json;

    const KID: &str = "test-key";

    fn validator_with(config: TokenValidatorConfig) -> TokenValidator {
        let source = Arc::new(StaticKeySource::new(testutil::jwks(&[KID])));
        TokenValidator::new(Arc::new(KeySetCache::new(source)), config)
    }

    fn validator() -> TokenValidator {
        validator_with(TokenValidatorConfig {
            client_id: testutil::CLIENT_ID.into(),
            tenant_id: testutil::TENANT_ID.into(),
            ..TokenValidatorConfig::default()
        })
    }

    #[tokio::test]
    async fn valid_token_yields_principal() {
        let token = testutil::mint(KID, testutil::claims(json!({
            "oid": "6f1d2f7c-5a52-4cf5-9a3c-2b8f0d7b3f11",
            "name": "Kari Nordmann",
            "preferred_username": "kari",
            "email": "kari@example.com",
            "roles": ["manager"],
            "company_id": "stalbygg",
        })));

        let p = validator().validate(&token).await.unwrap();
        assert_eq!(p.id.to_string(), "6f1d2f7c-5a52-4cf5-9a3c-2b8f0d7b3f11");
        assert_eq!(p.display_name, "Kari Nordmann");
        assert_eq!(p.email, "kari@example.com");
        assert_eq!(p.roles, vec![Role::MANAGER]);
        assert_eq!(p.home_company, CompanyId::Stalbygg);
        assert_eq!(p.auth_method, AuthMethod::Bearer);
    }

    #[tokio::test]
    async fn identity_is_stable_across_tokens() {
        let v = validator();
        let body = json!({ "oid": "6f1d2f7c-5a52-4cf5-9a3c-2b8f0d7b3f11", "email": "a@example.com" });
        let a = v.validate(&testutil::mint(KID, testutil::claims(body.clone()))).await.unwrap();
        let b = v.validate(&testutil::mint(KID, testutil::claims(body))).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn identity_is_synthesized_from_email_when_id_claim_missing() {
        let v = validator();
        let a = v
            .validate(&testutil::mint(KID, testutil::claims(json!({ "upn": "ola@example.com" }))))
            .await
            .unwrap();
        let b = v
            .validate(&testutil::mint(KID, testutil::claims(json!({ "email": "ola@example.com", "name": "Ola" }))))
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, PrincipalId::from_email("ola@example.com"));
        assert_eq!(a.home_company, CompanyId::Gruppen);
    }

    #[tokio::test]
    async fn expired_token_is_distinct_from_invalid() {
        let mut claims = testutil::claims(json!({ "email": "a@example.com" }));
        claims["exp"] = json!(testutil::now() - 3600);
        let err = validator().validate(&testutil::mint(KID, claims)).await.unwrap_err();
        assert_eq!(err, AuthError::ExpiredToken);
    }

    #[tokio::test]
    async fn not_yet_valid_token_is_rejected() {
        let mut claims = testutil::claims(json!({ "email": "a@example.com" }));
        claims["nbf"] = json!(testutil::now() + 3600);
        let err = validator().validate(&testutil::mint(KID, claims)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn audience_and_issuer_mismatch_are_invalid() {
        let mut wrong_aud = testutil::claims(json!({ "email": "a@example.com" }));
        wrong_aud["aud"] = json!("api://someone-else");
        let err = validator().validate(&testutil::mint(KID, wrong_aud)).await.unwrap_err();
        assert_eq!(err, AuthError::invalid_token("audience mismatch"));

        let mut wrong_iss = testutil::claims(json!({ "email": "a@example.com" }));
        wrong_iss["iss"] = json!("https://login.example.com/other-tenant/v2.0");
        let err = validator().validate(&testutil::mint(KID, wrong_iss)).await.unwrap_err();
        assert_eq!(err, AuthError::invalid_token("issuer mismatch"));
    }

    #[tokio::test]
    async fn prefixed_audience_is_accepted() {
        let mut claims = testutil::claims(json!({ "email": "a@example.com" }));
        claims["aud"] = json!([format!("api://{}", testutil::CLIENT_ID)]);
        assert!(validator().validate(&testutil::mint(KID, claims)).await.is_ok());
    }

    #[tokio::test]
    async fn missing_required_scope_is_invalid_scope() {
        let v = validator_with(TokenValidatorConfig {
            client_id: testutil::CLIENT_ID.into(),
            tenant_id: testutil::TENANT_ID.into(),
            required_scopes: vec!["access_as_user".into()],
            ..TokenValidatorConfig::default()
        });
        let without = testutil::claims(json!({ "email": "a@example.com", "scp": "read" }));
        assert_eq!(v.validate(&testutil::mint(KID, without)).await.unwrap_err(), AuthError::InvalidScope);

        let with = testutil::claims(json!({ "email": "a@example.com", "scope": "ACCESS_AS_USER" }));
        assert!(v.validate(&testutil::mint(KID, with)).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid_and_garbage_are_invalid() {
        let token = testutil::mint("other-key", testutil::claims(json!({ "email": "a@example.com" })));
        assert!(matches!(validator().validate(&token).await, Err(AuthError::InvalidToken(_))));
        assert!(matches!(validator().validate("not-a-jwt").await, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn symmetric_algorithm_is_rejected() {
        let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
        header.kid = Some(KID.into());
        let token = jsonwebtoken::encode(
            &header,
            &testutil::claims(json!({ "email": "a@example.com" })),
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let err = validator().validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(reason) if reason.contains("unsupported algorithm")));
    }

    #[tokio::test]
    async fn unknown_company_claim_is_rejected() {
        let claims = testutil::claims(json!({ "email": "a@example.com", "company_id": "acme" }));
        let err = validator().validate(&testutil::mint(KID, claims)).await.unwrap_err();
        assert_eq!(err, AuthError::invalid_token("unknown company claim"));
    }
}
