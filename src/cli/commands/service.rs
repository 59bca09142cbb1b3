use crate::{
    account::{AccountSettings, DEFAULT_CREDIT_GRANT},
    grpc::{ExemptionSet, DEFAULT_EXEMPT_METHODS},
};
use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;
use url::Url;

pub const ARG_VERIFY_DOMAIN: &str = "verify-domain";
pub const ARG_AUTH_EXEMPT_METHOD: &str = "auth-exempt-method";
pub const ARG_UPGRADE_CREDIT_GRANT: &str = "upgrade-credit-grant";
pub const ARG_API_ACCESS: &str = "api-access";
pub const ARG_EMAIL_LOOKUP_TIMEOUT_SECONDS: &str = "email-lookup-timeout-seconds";
pub const ARG_EMAIL_PUBLISH_URL: &str = "email-publish-url";

#[derive(Debug)]
pub struct Options {
    pub verify_domain: String,
    pub exempt: ExemptionSet,
    pub settings: AccountSettings,
    pub email_lookup_timeout: Duration,
    pub email_publish_url: Option<Url>,
}

impl Options {
    /// # Errors
    /// Returns an error if an exempt method is not a full gRPC method path or
    /// the publish URL does not parse.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let verify_domain = matches
            .get_one::<String>(ARG_VERIFY_DOMAIN)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_VERIFY_DOMAIN}"))?;

        let methods = matches
            .get_many::<String>(ARG_AUTH_EXEMPT_METHOD)
            .unwrap_or_default()
            .map(|method| method.trim())
            .filter(|method| !method.is_empty());
        let exempt = ExemptionSet::new(methods)
            .with_context(|| format!("invalid --{ARG_AUTH_EXEMPT_METHOD}"))?;

        let email_publish_url = matches
            .get_one::<String>(ARG_EMAIL_PUBLISH_URL)
            .filter(|v| !v.trim().is_empty())
            .map(|v| Url::parse(v))
            .transpose()
            .with_context(|| format!("invalid --{ARG_EMAIL_PUBLISH_URL}"))?;

        Ok(Self {
            verify_domain,
            exempt,
            settings: AccountSettings {
                credit_grant: matches
                    .get_one::<f64>(ARG_UPGRADE_CREDIT_GRANT)
                    .copied()
                    .unwrap_or(DEFAULT_CREDIT_GRANT),
                api_access: matches
                    .get_one::<bool>(ARG_API_ACCESS)
                    .copied()
                    .unwrap_or(true),
            },
            email_lookup_timeout: Duration::from_secs(
                matches
                    .get_one::<u64>(ARG_EMAIL_LOOKUP_TIMEOUT_SECONDS)
                    .copied()
                    .unwrap_or(5),
            ),
            email_publish_url,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERIFY_DOMAIN)
                .long(ARG_VERIFY_DOMAIN)
                .help("Host placed in email verification links")
                .env("AUTHGATE_VERIFY_DOMAIN")
                .default_value("localhost:8080"),
        )
        .arg(
            Arg::new(ARG_AUTH_EXEMPT_METHOD)
                .long(ARG_AUTH_EXEMPT_METHOD)
                .help("gRPC method path that skips authentication, e.g. /auth.TemporalAuth/Login")
                .env("AUTHGATE_AUTH_EXEMPT_METHODS")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .default_values(DEFAULT_EXEMPT_METHODS),
        )
        .arg(
            Arg::new(ARG_UPGRADE_CREDIT_GRANT)
                .long(ARG_UPGRADE_CREDIT_GRANT)
                .help("Credits granted when an account upgrades from free to light")
                .env("AUTHGATE_UPGRADE_CREDIT_GRANT")
                .default_value("0.115")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_API_ACCESS)
                .long(ARG_API_ACCESS)
                .help("API access flag reported on every account")
                .env("AUTHGATE_API_ACCESS")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_EMAIL_LOOKUP_TIMEOUT_SECONDS)
                .long(ARG_EMAIL_LOOKUP_TIMEOUT_SECONDS)
                .help("DNS lookup timeout when validating email domains")
                .env("AUTHGATE_EMAIL_LOOKUP_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_PUBLISH_URL)
                .long(ARG_EMAIL_PUBLISH_URL)
                .help("Queue endpoint that receives outgoing emails as JSON; emails are logged when unset")
                .env("AUTHGATE_EMAIL_PUBLISH_URL"),
        )
}
