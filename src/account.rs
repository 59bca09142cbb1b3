//! Account operations behind the `auth.TemporalAuth` RPCs.
//!
//! `register`, `login` and `recover` run without a caller identity. The others
//! take the [`CallContext`] the gate built for the call.

use crate::challenge::ChallengeFlow;
use crate::email::EmailValidator;
use crate::error::AuthError;
use crate::grpc::CallContext;
use crate::store::{Collaborators, EmailSend, StoreError, Tier, Usage, User};
use crate::token::{SessionToken, TokenIssuer};
use std::sync::Arc;
use tracing::{info, instrument};

/// Credits granted when an account moves from Free to Light.
pub const DEFAULT_CREDIT_GRANT: f64 = 0.115;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSettings {
    pub credit_grant: f64,
    pub api_access: bool,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            credit_grant: DEFAULT_CREDIT_GRANT,
            api_access: true,
        }
    }
}

/// What callers get to see of an account.
#[derive(Debug, Clone, PartialEq)]
pub struct UserView {
    pub user: User,
    pub usage: Option<Usage>,
    pub api_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    Password,
    Username,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountUpdate {
    PasswordChange {
        old_password: String,
        new_password: String,
    },
    TierChange,
}

pub struct AccountService {
    issuer: TokenIssuer,
    emails: EmailValidator,
    challenge: Arc<ChallengeFlow>,
    stores: Collaborators,
    settings: AccountSettings,
}

impl AccountService {
    #[must_use]
    pub fn new(
        issuer: TokenIssuer,
        emails: EmailValidator,
        challenge: Arc<ChallengeFlow>,
        stores: Collaborators,
        settings: AccountSettings,
    ) -> Self {
        Self {
            issuer,
            emails,
            challenge,
            stores,
            settings,
        }
    }

    fn view(&self, user: User, usage: Option<Usage>) -> UserView {
        UserView {
            user,
            usage,
            api_access: self.settings.api_access,
        }
    }

    /// Create an account and send its email verification challenge.
    ///
    /// # Errors
    ///
    /// `MalformedRequest` for an unacceptable email, empty fields or a taken
    /// email/username; `Internal` if a collaborator fails.
    #[instrument(skip_all, fields(user = %username, email = %email))]
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<UserView, AuthError> {
        self.emails
            .validate(email)
            .await
            .map_err(|err| AuthError::malformed(err.to_string()))?;

        if email.is_empty() || username.is_empty() || password.is_empty() {
            return Err(AuthError::malformed(
                "email, user, and password cannot be empty",
            ));
        }

        match self
            .stores
            .users
            .new_user_account(username, password, email)
            .await
        {
            Ok(_) => {}
            Err(err @ (StoreError::DuplicateEmail | StoreError::DuplicateUsername)) => {
                return Err(AuthError::malformed(err.to_string()));
            }
            Err(StoreError::Other(err)) => {
                return Err(AuthError::internal(
                    username,
                    "register",
                    err,
                    "failed to create user account",
                ));
            }
        }

        let user = self.challenge.issue(username).await?;
        info!("user account registered");

        let usage = self
            .stores
            .usage
            .new_usage_entry(username, Tier::Free)
            .await
            .map_err(|err| {
                AuthError::internal(
                    username,
                    "register",
                    err,
                    "failed to generate usage limits for user",
                )
            })?;

        Ok(self.view(user, Some(usage)))
    }

    /// Exchange credentials for a session token.
    ///
    /// # Errors
    ///
    /// `MalformedRequest` for empty fields, `Unauthenticated` for bad
    /// credentials, `Internal` if the store or signer fails.
    #[instrument(skip_all, fields(user = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionToken, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::malformed("user and password cannot be empty"));
        }

        let signed_in = self
            .stores
            .users
            .sign_in(username, password)
            .await
            .map_err(|err| AuthError::internal(username, "login", err, "failed to login"))?;
        if !signed_in {
            return Err(AuthError::unauthenticated("invalid credentials provided"));
        }

        self.issuer
            .sign_session_token(username)
            .map_err(|err| AuthError::internal(username, "login", err, "failed to login"))
    }

    /// Email a new password or a username reminder to the owner of `email`.
    ///
    /// # Errors
    ///
    /// `MalformedRequest` for an empty email, `NotFound` for an unknown one,
    /// `FailedPrecondition` if the account has email disabled, `Internal` if a
    /// collaborator fails.
    #[instrument(skip_all, fields(email = %email, kind = ?kind))]
    pub async fn recover(&self, email: &str, kind: RecoveryKind) -> Result<(), AuthError> {
        if email.is_empty() {
            return Err(AuthError::malformed("email cannot be empty"));
        }

        let user = match self.stores.users.find_by_email(email).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::not_found("failed to find user")),
            Err(err) => {
                return Err(AuthError::internal(
                    email,
                    "recover",
                    err,
                    "failed to find user",
                ));
            }
        };
        if !user.email_enabled {
            return Err(AuthError::failed_precondition(
                "account does not have email enabled - unfortunately for security reasons we can't assist in recovery",
            ));
        }

        let message = match kind {
            RecoveryKind::Password => {
                let password = self
                    .stores
                    .users
                    .reset_password(&user.username)
                    .await
                    .map_err(|err| {
                        AuthError::internal(
                            &user.username,
                            "recover",
                            err,
                            "failed to reset password",
                        )
                    })?;
                EmailSend::to_user(&user, "Password Reset", format!("your password is {password}"))
            }
            RecoveryKind::Username => EmailSend::to_user(
                &user,
                "Username Reminder",
                format!("your username is {}", user.username),
            ),
        };

        self.publish(&user.username, "recover", &message).await
    }

    /// # Errors
    ///
    /// `Internal` if the usage store fails.
    #[instrument(skip_all, fields(user = %context.username()))]
    pub async fn account(&self, context: &CallContext) -> Result<UserView, AuthError> {
        let user = context.identity().user();
        let usage = self.find_usage(&user.username, "account").await?;

        info!("account details accessed");
        Ok(self.view(user.clone(), Some(usage)))
    }

    /// Apply `update` to the caller's account.
    ///
    /// # Errors
    ///
    /// * `PermissionDenied` if the old password is wrong.
    /// * `AlreadyExists` if the account is already past the Free tier.
    /// * `Internal` if a collaborator fails.
    #[instrument(skip_all, fields(user = %context.username()))]
    pub async fn update(
        &self,
        context: &CallContext,
        update: AccountUpdate,
    ) -> Result<UserView, AuthError> {
        let user = context.identity().user();
        match update {
            AccountUpdate::PasswordChange {
                old_password,
                new_password,
            } => {
                let changed = self
                    .stores
                    .users
                    .change_password(&user.username, &old_password, &new_password)
                    .await
                    .map_err(|err| {
                        AuthError::internal(
                            &user.username,
                            "change_password",
                            err,
                            "failed to change password",
                        )
                    })?;
                if !changed {
                    return Err(AuthError::permission_denied("invalid password"));
                }
                info!("password changed");
                Ok(self.view(user.clone(), None))
            }
            AccountUpdate::TierChange => self.upgrade_tier(user).await,
        }
    }

    async fn upgrade_tier(&self, user: &User) -> Result<UserView, AuthError> {
        let username = user.username.as_str();
        let current = self.find_usage(username, "upgrade_tier").await?;
        if current.tier != Tier::Free {
            return Err(AuthError::already_exists("account is already upgraded"));
        }

        self.stores
            .usage
            .update_tier(username, Tier::Light)
            .await
            .map_err(|err| {
                AuthError::internal(username, "upgrade_tier", err, "failed to upgrade tier")
            })?;

        let user = self
            .stores
            .credits
            .add_credits(username, self.settings.credit_grant)
            .await
            .map_err(|err| {
                AuthError::internal(username, "upgrade_tier", err, "failed to grant free credits")
            })?;

        let message = EmailSend::to_user(
            &user,
            "Account Upgraded",
            format!(
                "your account has been upgraded to Light tier. Enjoy {} credits on us!",
                self.settings.credit_grant
            ),
        );
        self.publish(username, "upgrade_tier", &message).await?;

        info!("data tier upgraded");
        let usage = self.find_usage(username, "upgrade_tier").await?;
        Ok(self.view(user, Some(usage)))
    }

    /// Sign a fresh session token for the caller.
    ///
    /// # Errors
    ///
    /// `Internal` if signing fails.
    #[instrument(skip_all, fields(user = %context.username()))]
    pub fn refresh(&self, context: &CallContext) -> Result<SessionToken, AuthError> {
        self.issuer
            .sign_session_token(context.username())
            .map_err(|err| {
                AuthError::internal(context.username(), "refresh", err, "failed to refresh token")
            })
    }

    async fn find_usage(
        &self,
        username: &str,
        operation: &'static str,
    ) -> Result<Usage, AuthError> {
        self.stores.usage.find_usage(username).await.map_err(|err| {
            AuthError::internal(
                username,
                operation,
                err,
                "failed to retrieve usage for user",
            )
        })
    }

    async fn publish(
        &self,
        username: &str,
        operation: &'static str,
        message: &EmailSend,
    ) -> Result<(), AuthError> {
        self.stores.publisher.publish(message).await.map_err(|err| {
            AuthError::internal(username, operation, err, "failed to send email")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::DomainResolver;
    use crate::error::ErrorKind;
    use crate::grpc::ResolvedIdentity;
    use crate::store::{MemoryStore, Publisher, UsageStore, UserStore};
    use crate::token::{SigningAlgorithm, SigningConfig, TokenValidator};
    use anyhow::Result;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use tokio::sync::Mutex;

    struct ExampleOnly;

    #[async_trait]
    impl DomainResolver for ExampleOnly {
        async fn resolves(&self, domain: &str) -> bool {
            domain == "example.org"
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<EmailSend>>);

    #[async_trait]
    impl Publisher for Outbox {
        async fn publish(&self, message: &EmailSend) -> anyhow::Result<()> {
            self.0.lock().await.push(message.clone());
            Ok(())
        }
    }

    struct Fixture {
        service: AccountService,
        store: Arc<MemoryStore>,
        outbox: Arc<Outbox>,
        validator: TokenValidator,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(SigningConfig::new(
            SecretString::from("account-test-key".to_string()),
            SigningAlgorithm::Hs512,
        ));
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(Outbox::default());
        let stores = Collaborators::in_memory(store.clone(), outbox.clone());
        let issuer = TokenIssuer::new(config.clone());
        let validator = TokenValidator::new(config);
        let challenge = Arc::new(ChallengeFlow::new(
            issuer.clone(),
            validator.clone(),
            stores.users.clone(),
            stores.publisher.clone(),
            "localhost:8080",
        ));
        let service = AccountService::new(
            issuer,
            EmailValidator::new(Arc::new(ExampleOnly)),
            challenge,
            stores,
            AccountSettings::default(),
        );
        Fixture {
            service,
            store,
            outbox,
            validator,
        }
    }

    async fn context(fixture: &Fixture, username: &str) -> Result<CallContext> {
        let token = fixture.service.login(username, "secret").await?;
        let claims = fixture.validator.validate(&token.token)?;
        let user = fixture
            .store
            .find_by_username(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("missing {username}"))?;
        Ok(CallContext::new(claims, ResolvedIdentity::new(user)))
    }

    fn kind<T>(result: Result<T, AuthError>) -> Option<ErrorKind> {
        result.err().map(|err| err.kind())
    }

    #[tokio::test]
    async fn register_creates_free_account_and_sends_challenge() -> Result<()> {
        let fixture = fixture();
        let view = fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;

        assert_eq!(view.user.username, "alice");
        assert!(!view.user.account_enabled);
        assert!(view.api_access);
        assert_eq!(view.usage.map(|usage| usage.tier), Some(Tier::Free));

        let outbox = fixture.outbox.0.lock().await;
        assert_eq!(outbox.len(), 1);
        assert!(outbox[0].content.contains("/v3/verify?user=alice&token="));
        Ok(())
    }

    #[tokio::test]
    async fn register_rejections() -> Result<()> {
        let fixture = fixture();
        fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;

        let cases = [
            ("alice+x@example.org", "bob", "secret"),
            ("bob.@example.org", "bob", "secret"),
            ("bob@elsewhere.test", "bob", "secret"),
            ("bob@example.org", "", "secret"),
            ("bob@example.org", "bob", ""),
            ("alice@example.org", "bob", "secret"),
            ("bob@example.org", "alice", "secret"),
        ];
        for (email, username, password) in cases {
            assert_eq!(
                kind(fixture.service.register(email, username, password).await),
                Some(ErrorKind::MalformedRequest),
                "{email} {username}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn login() -> Result<()> {
        let fixture = fixture();
        fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;

        let token = fixture.service.login("alice", "secret").await?;
        assert_eq!(fixture.validator.validate(&token.token)?.id, "alice");

        assert_eq!(
            kind(fixture.service.login("alice", "wrong").await),
            Some(ErrorKind::Unauthenticated)
        );
        assert_eq!(
            kind(fixture.service.login("", "secret").await),
            Some(ErrorKind::MalformedRequest)
        );
        Ok(())
    }

    #[tokio::test]
    async fn recover_requires_enabled_email() -> Result<()> {
        let fixture = fixture();
        let view = fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;

        assert_eq!(
            kind(fixture.service.recover("", RecoveryKind::Username).await),
            Some(ErrorKind::MalformedRequest)
        );
        assert_eq!(
            kind(
                fixture
                    .service
                    .recover("nobody@example.org", RecoveryKind::Username)
                    .await
            ),
            Some(ErrorKind::NotFound)
        );
        assert_eq!(
            kind(
                fixture
                    .service
                    .recover("alice@example.org", RecoveryKind::Username)
                    .await
            ),
            Some(ErrorKind::FailedPrecondition)
        );

        let value = view.user.verification_value.unwrap_or_default();
        fixture
            .store
            .consume_verification_value("alice", &value)
            .await?;

        fixture
            .service
            .recover("alice@example.org", RecoveryKind::Username)
            .await?;
        fixture
            .service
            .recover("alice@example.org", RecoveryKind::Password)
            .await?;

        let outbox = fixture.outbox.0.lock().await;
        assert!(outbox.iter().any(|m| m.content == "your username is alice"));
        let reset = outbox
            .iter()
            .find_map(|m| m.content.strip_prefix("your password is "))
            .unwrap_or_default();
        assert!(fixture.store.sign_in("alice", reset).await?);
        assert!(!fixture.store.sign_in("alice", "secret").await?);
        Ok(())
    }

    #[tokio::test]
    async fn account_and_refresh_use_the_call_context() -> Result<()> {
        let fixture = fixture();
        fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;
        let context = context(&fixture, "alice").await?;

        let view = fixture.service.account(&context).await?;
        assert_eq!(view.user.email, "alice@example.org");
        assert!(view.usage.is_some());

        let refreshed = fixture.service.refresh(&context)?;
        assert_eq!(fixture.validator.validate(&refreshed.token)?.id, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn password_change() -> Result<()> {
        let fixture = fixture();
        fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;
        let context = context(&fixture, "alice").await?;

        let wrong = AccountUpdate::PasswordChange {
            old_password: "wrong".to_string(),
            new_password: "next".to_string(),
        };
        assert_eq!(
            kind(fixture.service.update(&context, wrong).await),
            Some(ErrorKind::PermissionDenied)
        );

        let change = AccountUpdate::PasswordChange {
            old_password: "secret".to_string(),
            new_password: "next".to_string(),
        };
        let view = fixture.service.update(&context, change).await?;
        assert_eq!(view.usage, None);
        assert!(fixture.store.sign_in("alice", "next").await?);
        Ok(())
    }

    #[tokio::test]
    async fn tier_upgrade_happens_once() -> Result<()> {
        let fixture = fixture();
        fixture
            .service
            .register("alice@example.org", "alice", "secret")
            .await?;
        let context = context(&fixture, "alice").await?;

        let view = fixture
            .service
            .update(&context, AccountUpdate::TierChange)
            .await?;
        assert_eq!(view.usage.map(|usage| usage.tier), Some(Tier::Light));
        assert!((view.user.credits - DEFAULT_CREDIT_GRANT).abs() < f64::EPSILON);
        assert_eq!(fixture.store.find_usage("alice").await?.tier, Tier::Light);

        assert_eq!(
            kind(
                fixture
                    .service
                    .update(&context, AccountUpdate::TierChange)
                    .await
            ),
            Some(ErrorKind::AlreadyExists)
        );
        Ok(())
    }
}
