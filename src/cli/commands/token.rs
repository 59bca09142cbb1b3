use crate::token::{SigningAlgorithm, SigningConfig};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_JWT_KEY: &str = "jwt-key";
pub const ARG_JWT_ALGORITHM: &str = "jwt-algorithm";
pub const ARG_JWT_REALM: &str = "jwt-realm";
pub const ARG_JWT_TIMEOUT_SECONDS: &str = "jwt-timeout-seconds";
pub const ARG_CHALLENGE_TIMEOUT_SECONDS: &str = "challenge-timeout-seconds";

#[derive(Debug)]
pub struct Options {
    pub key: SecretString,
    pub algorithm: SigningAlgorithm,
    pub realm: String,
    pub timeout: Duration,
    pub challenge_timeout: Duration,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing key is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let key = matches
            .get_one::<String>(ARG_JWT_KEY)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_JWT_KEY}"))?;

        let seconds = |id: &str| {
            Duration::from_secs(matches.get_one::<u64>(id).copied().unwrap_or(86_400))
        };

        Ok(Self {
            key: SecretString::from(key),
            algorithm: matches
                .get_one::<SigningAlgorithm>(ARG_JWT_ALGORITHM)
                .copied()
                .unwrap_or(SigningAlgorithm::Hs512),
            realm: matches
                .get_one::<String>(ARG_JWT_REALM)
                .cloned()
                .unwrap_or_else(|| "authgate".to_string()),
            timeout: seconds(ARG_JWT_TIMEOUT_SECONDS),
            challenge_timeout: seconds(ARG_CHALLENGE_TIMEOUT_SECONDS),
        })
    }

    #[must_use]
    pub fn into_config(self) -> SigningConfig {
        SigningConfig::new(self.key, self.algorithm)
            .with_timeout(self.timeout)
            .with_challenge_timeout(self.challenge_timeout)
            .with_realm(self.realm)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_KEY)
                .long(ARG_JWT_KEY)
                .help("HMAC key used to sign and validate tokens")
                .env("AUTHGATE_JWT_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_ALGORITHM)
                .long(ARG_JWT_ALGORITHM)
                .help("Signing algorithm: HS256, HS384 or HS512")
                .env("AUTHGATE_JWT_ALGORITHM")
                .default_value("HS512")
                .value_parser(|value: &str| value.parse::<SigningAlgorithm>()),
        )
        .arg(
            Arg::new(ARG_JWT_REALM)
                .long(ARG_JWT_REALM)
                .help("Realm name of the token issuer")
                .env("AUTHGATE_JWT_REALM")
                .default_value("authgate"),
        )
        .arg(
            Arg::new(ARG_JWT_TIMEOUT_SECONDS)
                .long(ARG_JWT_TIMEOUT_SECONDS)
                .help("Session token lifetime in seconds")
                .env("AUTHGATE_JWT_TIMEOUT_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TIMEOUT_SECONDS)
                .long(ARG_CHALLENGE_TIMEOUT_SECONDS)
                .help("Email verification token lifetime in seconds")
                .env("AUTHGATE_CHALLENGE_TIMEOUT_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
