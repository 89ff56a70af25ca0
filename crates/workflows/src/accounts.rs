//! Account management: sign-up, sign-in, session restore and profile edits.

use marketplace::{
    fetch_one, insert_record, update_record, AuthError, AuthSession, EmailAddress, LinkierError,
    NewProfile, Profile, ProfileId, Timestamp, UserRole,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::guard::{optional_text, require_self, required_text};
use crate::Marketplace;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_CHARS: usize = 8;

const MAX_NAME_CHARS: usize = 100;
const MAX_FIELD_CHARS: usize = 200;

/// Sign-up form.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    /// Ignored for landlords.
    pub university: Option<String>,
}

/// Profile edit. `None` leaves a field unchanged; `Some("")` clears an
/// optional field.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub university: Option<String>,
    pub avatar_url: Option<String>,
}

/// Account operations.
pub struct Accounts<'a> {
    market: &'a Marketplace,
}

impl<'a> Accounts<'a> {
    pub(crate) fn new(market: &'a Marketplace) -> Self {
        Self { market }
    }

    /// Creates an account and its profile row.
    #[instrument(skip_all, fields(role = %form.role))]
    pub async fn sign_up(&self, form: SignUp) -> Result<(AuthSession, Profile), LinkierError> {
        let email = parse_email(&form.email)?;
        if form.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(LinkierError::validation(
                "password",
                format!("must be at least {MIN_PASSWORD_CHARS} characters"),
            ));
        }
        let full_name = required_text("full name", &form.full_name, MAX_NAME_CHARS)?;
        let phone = optional_text("phone", form.phone.as_deref(), MAX_FIELD_CHARS)?;
        let university = match form.role {
            UserRole::Student => {
                optional_text("university", form.university.as_deref(), MAX_FIELD_CHARS)?
            }
            UserRole::Landlord => None,
        };

        let session = match self.market.auth().sign_up(&email, &form.password).await {
            Ok(session) => session,
            Err(AuthError::EmailTaken { email: taken }) => self
                .resume_sign_up(&email, &form.password)
                .await?
                .ok_or(AuthError::EmailTaken { email: taken })?,
            Err(err) => return Err(err.into()),
        };
        let inserted = insert_record::<Profile, _>(
            self.market.store(),
            &NewProfile {
                id: session.user_id,
                email: email.clone(),
                full_name,
                role: form.role,
                phone,
                university,
            },
        )
        .await;
        let profile = match inserted {
            Ok(profile) => profile,
            Err(err) => {
                warn!(
                    user_id = %session.user_id,
                    error = %err,
                    "Profile insert failed after sign-up"
                );
                if let Err(sign_out) = self.market.auth().sign_out(&session).await {
                    warn!(error = %sign_out, "Could not revoke the incomplete account's session");
                }
                return Err(LinkierError::IncompleteSignUp {
                    email: email.to_string(),
                    reason: err.to_string(),
                });
            }
        };
        info!(user_id = %profile.id, "Account registered");
        Ok((session, profile))
    }

    /// Signs in to an already registered account that has no profile yet.
    ///
    /// Returns `None` when the credentials do not match or the profile
    /// exists, i.e. the address is genuinely taken.
    async fn resume_sign_up(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<Option<AuthSession>, LinkierError> {
        let session = match self.market.auth().sign_in(email, password).await {
            Ok(session) => session,
            Err(AuthError::InvalidCredentials) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if fetch_one::<Profile>(self.market.store(), session.user_id)
            .await?
            .is_some()
        {
            self.market.auth().sign_out(&session).await?;
            return Ok(None);
        }
        info!(user_id = %session.user_id, "Completing an earlier sign-up");
        Ok(Some(session))
    }

    /// Signs in with e-mail and password.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(AuthSession, Profile), LinkierError> {
        let email = EmailAddress::new(email).ok_or(AuthError::InvalidCredentials)?;
        let session = self.market.auth().sign_in(&email, password).await?;
        let profile = self.profile(session.user_id).await?;
        info!(user_id = %profile.id, "Signed in");
        Ok((session, profile))
    }

    /// Revokes the session with the auth provider.
    pub async fn sign_out(&self, session: &AuthSession) -> Result<(), LinkierError> {
        self.market.auth().sign_out(session).await?;
        info!(user_id = %session.user_id, "Signed out");
        Ok(())
    }

    /// Validates a stored session, refreshing it when expired or revoked,
    /// and loads the profile behind it.
    ///
    /// The returned session may differ from the input; callers should
    /// persist it.
    #[instrument(skip_all, fields(user_id = %session.user_id))]
    pub async fn restore(
        &self,
        session: AuthSession,
    ) -> Result<(AuthSession, Profile), LinkierError> {
        let session = if session.is_expired(Timestamp::now()) {
            self.market.auth().refresh(&session.refresh_token).await?
        } else {
            match self.market.auth().current_user(&session.access_token).await {
                Ok(_) => session,
                Err(AuthError::SessionExpired) => {
                    warn!("Access token rejected, refreshing session");
                    self.market.auth().refresh(&session.refresh_token).await?
                }
                Err(err) => return Err(err.into()),
            }
        };
        let profile = self.profile(session.user_id).await?;
        Ok((session, profile))
    }

    /// Fetches a profile by id.
    pub async fn profile(&self, id: ProfileId) -> Result<Profile, LinkierError> {
        fetch_one::<Profile>(self.market.store(), id)
            .await?
            .ok_or_else(|| LinkierError::not_found("profile", id))
    }

    /// Edits the actor's own profile.
    #[instrument(skip_all, fields(user_id = %actor.id))]
    pub async fn update_profile(
        &self,
        actor: &Profile,
        id: ProfileId,
        update: ProfileUpdate,
    ) -> Result<Profile, LinkierError> {
        require_self(actor, id, "profile")?;

        let mut patch = Map::new();
        if let Some(name) = update.full_name {
            patch.insert(
                "full_name".into(),
                Value::String(required_text("full name", &name, MAX_NAME_CHARS)?),
            );
        }
        for (column, field, value) in [
            ("phone", "phone", update.phone),
            ("university", "university", update.university),
            ("avatar_url", "avatar url", update.avatar_url),
        ] {
            if let Some(value) = value {
                if column == "university" && !actor.is_student() {
                    return Err(LinkierError::validation(
                        "university",
                        "only students list a university",
                    ));
                }
                let cleaned = optional_text(field, Some(&value), MAX_FIELD_CHARS)?;
                patch.insert(column.into(), cleaned.map_or(Value::Null, Value::String));
            }
        }
        if patch.is_empty() {
            return Ok(actor.clone());
        }

        update_record::<Profile>(self.market.store(), id, Value::Object(patch))
            .await?
            .ok_or_else(|| LinkierError::not_found("profile", id))
    }
}

fn parse_email(raw: &str) -> Result<EmailAddress, LinkierError> {
    EmailAddress::new(raw)
        .ok_or_else(|| LinkierError::validation("email", format!("'{}' is not valid", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use marketplace::{id_filter, DataStore, Table};
    use serde_json::json;

    fn form(email: &str, role: UserRole) -> SignUp {
        SignUp {
            email: email.into(),
            password: "long-enough".into(),
            full_name: " Ana Peeters ".into(),
            role,
            phone: Some("".into()),
            university: Some("KU Leuven".into()),
        }
    }

    #[tokio::test]
    async fn sign_up_creates_profile_with_auth_id() {
        let fx = Fixture::new();
        let (session, profile) = fx
            .market
            .accounts()
            .sign_up(form("Ana@Uni.be", UserRole::Student))
            .await
            .unwrap();
        assert_eq!(profile.id, session.user_id);
        assert_eq!(profile.full_name, "Ana Peeters");
        assert_eq!(profile.email.as_str(), "ana@uni.be");
        assert_eq!(profile.university.as_deref(), Some("KU Leuven"));
        assert_eq!(profile.phone, None);
    }

    #[tokio::test]
    async fn landlords_do_not_keep_a_university() {
        let fx = Fixture::new();
        let (_, profile) = fx
            .market
            .accounts()
            .sign_up(form("owner@rent.be", UserRole::Landlord))
            .await
            .unwrap();
        assert_eq!(profile.university, None);
    }

    #[tokio::test]
    async fn sign_up_validates_before_calling_the_provider() {
        let fx = Fixture::new();
        let accounts = fx.market.accounts();

        let mut bad = form("not-an-email", UserRole::Student);
        assert!(matches!(
            accounts.sign_up(bad.clone()).await,
            Err(LinkierError::Validation { field: "email", .. })
        ));

        bad.email = "ana@uni.be".into();
        bad.password = "short".into();
        assert!(matches!(
            accounts.sign_up(bad.clone()).await,
            Err(LinkierError::Validation { field: "password", .. })
        ));

        bad.password = "long-enough".into();
        bad.full_name = "  ".into();
        assert!(matches!(
            accounts.sign_up(bad).await,
            Err(LinkierError::Validation { field: "full name", .. })
        ));

        // Nothing reached the auth provider, so the address is still free.
        assert!(accounts.sign_up(form("ana@uni.be", UserRole::Student)).await.is_ok());
    }

    #[tokio::test]
    async fn failed_profile_insert_is_reported_and_recoverable() {
        let fx = Fixture::new();
        let accounts = fx.market.accounts();
        let squatter = fx
            .backend
            .insert(Table::Profiles, json!({ "email": "ana@uni.be" }))
            .await
            .unwrap();

        let err = accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkierError::IncompleteSignUp { .. }));

        fx.backend
            .delete(Table::Profiles, &[id_filter(squatter["id"].as_str().unwrap())])
            .await
            .unwrap();
        let (session, profile) = accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap();
        assert_eq!(profile.id, session.user_id);
        let (_, signed_in) = accounts.sign_in("ana@uni.be", "long-enough").await.unwrap();
        assert_eq!(signed_in.id, profile.id);
    }

    #[tokio::test]
    async fn registered_addresses_stay_taken() {
        let fx = Fixture::new();
        let accounts = fx.market.accounts();
        accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap();

        for password in ["long-enough", "another-password"] {
            let mut again = form("ana@uni.be", UserRole::Student);
            again.password = password.into();
            assert!(matches!(
                accounts.sign_up(again).await,
                Err(LinkierError::Auth(AuthError::EmailTaken { .. }))
            ));
        }
    }

    #[tokio::test]
    async fn sign_in_returns_profile_and_rejects_bad_credentials() {
        let fx = Fixture::new();
        let accounts = fx.market.accounts();
        accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap();

        let (_, profile) = accounts.sign_in("ana@uni.be", "long-enough").await.unwrap();
        assert_eq!(profile.full_name, "Ana Peeters");

        assert!(matches!(
            accounts.sign_in("ana@uni.be", "wrong-password").await,
            Err(LinkierError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(matches!(
            accounts.sign_in("garbage", "long-enough").await,
            Err(LinkierError::Auth(AuthError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn restore_keeps_valid_sessions_and_refreshes_expired_ones() {
        let fx = Fixture::new();
        let accounts = fx.market.accounts();
        let (session, _) = accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap();
        let (same, profile) = accounts.restore(session.clone()).await.unwrap();
        assert_eq!(same.access_token, session.access_token);
        assert_eq!(profile.id, session.user_id);

        let fx = Fixture::with_session_ttl(-1);
        let accounts = fx.market.accounts();
        let (expired, _) = accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap();
        let (fresh, _) = accounts.restore(expired.clone()).await.unwrap();
        assert_ne!(fresh.access_token, expired.access_token);
        assert_eq!(fresh.user_id, expired.user_id);
    }

    #[tokio::test]
    async fn restore_fails_after_sign_out() {
        let fx = Fixture::new();
        let accounts = fx.market.accounts();
        let (session, _) = accounts
            .sign_up(form("ana@uni.be", UserRole::Student))
            .await
            .unwrap();
        accounts.sign_out(&session).await.unwrap();
        assert!(matches!(
            accounts.restore(session).await,
            Err(LinkierError::Auth(AuthError::SessionExpired))
        ));
    }

    #[tokio::test]
    async fn profile_updates_are_self_only_and_clear_blank_fields() {
        let fx = Fixture::new();
        let ana = fx.student("ana@uni.be").await;
        let bob = fx.student("bob@uni.be").await;
        let accounts = fx.market.accounts();

        let updated = accounts
            .update_profile(
                &ana,
                ana.id,
                ProfileUpdate {
                    phone: Some("+32 470 00 00 00".into()),
                    university: Some(" ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("+32 470 00 00 00"));
        assert_eq!(updated.university, None);

        assert!(matches!(
            accounts
                .update_profile(&bob, ana.id, ProfileUpdate::default())
                .await,
            Err(LinkierError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn landlords_cannot_set_a_university() {
        let fx = Fixture::new();
        let owner = fx.landlord("owner@rent.be").await;
        let err = fx
            .market
            .accounts()
            .update_profile(
                &owner,
                owner.id,
                ProfileUpdate {
                    university: Some("UGent".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LinkierError::Validation { field: "university", .. }));
    }
}
