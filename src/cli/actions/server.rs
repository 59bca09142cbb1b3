use crate::{
    account::{AccountService, AccountSettings},
    api,
    challenge::ChallengeFlow,
    cli::telemetry,
    email::EmailValidator,
    grpc::{AccountServer, AuthGate, AuthLayer, ExemptionSet},
    store::{Collaborators, HttpPublisher, LogPublisher, MemoryStore, Publisher},
    token::{SigningConfig, TokenIssuer, TokenValidator},
};
use anyhow::{Context, Result};
use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{signal, sync::watch};
use tracing::{error, info};
use url::Url;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Args {
    pub grpc_port: u16,
    pub http_port: u16,
    pub signing: SigningConfig,
    pub verify_domain: String,
    pub exempt: ExemptionSet,
    pub settings: AccountSettings,
    pub email_lookup_timeout: Duration,
    pub email_publish_url: Option<Url>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a listener cannot be bound or either server fails.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let signing = Arc::new(args.signing);
    let issuer = TokenIssuer::new(signing.clone());
    let validator = TokenValidator::new(signing);

    let publisher: Arc<dyn Publisher> = match args.email_publish_url {
        Some(url) => Arc::new(
            HttpPublisher::new(url, PUBLISH_TIMEOUT).context("failed to build email publisher")?,
        ),
        None => Arc::new(LogPublisher),
    };
    let stores = Collaborators::in_memory(Arc::new(MemoryStore::new()), publisher);

    let challenge = Arc::new(ChallengeFlow::new(
        issuer.clone(),
        validator.clone(),
        stores.users.clone(),
        stores.publisher.clone(),
        args.verify_domain,
    ));
    let accounts = Arc::new(AccountService::new(
        issuer,
        EmailValidator::system(args.email_lookup_timeout),
        challenge.clone(),
        stores.clone(),
        args.settings,
    ));
    let gate = Arc::new(AuthGate::new(validator, stores.users, args.exempt));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
        let _ = shutdown_tx.send(true);
    });

    let grpc_addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, args.grpc_port));
    info!("gRPC listening on {}", grpc_addr);

    let grpc = tonic::transport::Server::builder()
        .layer(AuthLayer::new(gate))
        .add_service(AccountServer::new(accounts))
        .serve_with_shutdown(grpc_addr, wait_for_shutdown(shutdown_rx.clone()));
    let http = api::serve(args.http_port, challenge, wait_for_shutdown(shutdown_rx));

    let result = tokio::try_join!(
        async { grpc.await.context("gRPC server failed") },
        async { http.await.context("HTTP server failed") },
    );

    telemetry::shutdown_tracer();

    result.map(|_| ())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // a dropped sender also ends the wait
    let _ = rx.wait_for(|stop| *stop).await;
}

fn log_startup_args(args: &Args) {
    info!(
        grpc_port = args.grpc_port,
        http_port = args.http_port,
        algorithm = %args.signing.algorithm(),
        realm = args.signing.realm(),
        session_timeout_secs = args.signing.timeout().as_secs(),
        challenge_timeout_secs = args.signing.challenge_timeout().as_secs(),
        verify_domain = %args.verify_domain,
        exempt_methods = args.exempt.len(),
        publisher = args
            .email_publish_url
            .as_ref()
            .map_or("log", |_| "http"),
        "Starting authgate"
    );
}
