//! Maps validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{service, token, ARG_GRPC_PORT, ARG_HTTP_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let grpc_port = matches.get_one::<u16>(ARG_GRPC_PORT).copied().unwrap_or(9090);
    let http_port = matches.get_one::<u16>(ARG_HTTP_PORT).copied().unwrap_or(8080);

    let token_opts = token::Options::parse(matches)?;
    let service_opts = service::Options::parse(matches)?;

    Ok(Action::Server(Args {
        grpc_port,
        http_port,
        signing: token_opts.into_config(),
        verify_domain: service_opts.verify_domain,
        exempt: service_opts.exempt,
        settings: service_opts.settings,
        email_lookup_timeout: service_opts.email_lookup_timeout,
        email_publish_url: service_opts.email_publish_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::SigningAlgorithm;
    use std::time::Duration;

    fn clean_env() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("AUTHGATE_JWT_KEY", Some("dispatch-signing-key")),
            ("AUTHGATE_AUTH_EXEMPT_METHODS", None),
            ("AUTHGATE_EMAIL_PUBLISH_URL", None),
            ("AUTHGATE_JWT_ALGORITHM", None),
            ("AUTHGATE_JWT_TIMEOUT_SECONDS", None),
        ]
    }

    #[test]
    fn server_action_from_defaults() {
        temp_env::with_vars(clean_env(), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["authgate"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.grpc_port, 9090);
                assert_eq!(args.http_port, 8080);
                assert_eq!(args.signing.algorithm(), SigningAlgorithm::Hs512);
                assert_eq!(args.signing.timeout(), Duration::from_secs(86_400));
                assert_eq!(args.signing.realm(), "authgate");
                assert_eq!(args.exempt.len(), 3);
                assert!(args.exempt.contains("/auth.TemporalAuth/Recover"));
                assert!(!args.exempt.contains("/auth.TemporalAuth/Account"));
                assert!(args.email_publish_url.is_none());
                assert!(args.settings.api_access);
            }
        });
    }

    #[test]
    fn invalid_exempt_method_fails_startup() {
        temp_env::with_vars(clean_env(), || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "authgate",
                "--auth-exempt-method",
                "Login",
            ]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--auth-exempt-method"));
            }
        });
    }

    #[test]
    fn explicit_exemptions_replace_defaults() {
        temp_env::with_vars(clean_env(), || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "authgate",
                "--auth-exempt-method",
                "/auth.TemporalAuth/Login",
            ]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.exempt.len(), 1);
                assert!(!args.exempt.contains("/auth.TemporalAuth/Register"));
            }
        });
    }

    #[test]
    fn invalid_publish_url_is_rejected() {
        temp_env::with_vars(clean_env(), || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "authgate",
                "--email-publish-url",
                "not a url",
            ]);
            assert!(handler(&matches).is_err());
        });
    }
}
