// src/client/main.rs

use crs_auth::client::machine::AuthSession;
use crs_auth::config::init_config;
use crs_auth::errors::AuthResult;

/// CLI driver for the CRS handshake.
///
/// Runs the full sequence against the configured service and prints each
/// phase as it is entered:
/// - resolve the device identity and fetch an encrypted key,
/// - validate the key for an access token,
/// - call the protected endpoint and print its body.
///
/// Exits non-zero on any failure, with the failure reason on the last
/// printed phase line.
#[tokio::main]
async fn main() -> AuthResult<()> {
    let config = init_config()?;

    if config.logging.enabled {
        let level = config
            .logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO);
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    let mut session = AuthSession::from_config()?;

    // Mirror phase changes to stdout while the handshake runs.
    let mut phases = session.subscribe();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            println!("phase: {}", *phases.borrow_and_update());
        }
    });

    let outcome = run_handshake(&mut session).await;

    drop(session);
    let _ = progress.await;

    let body = outcome?;
    println!("secure response: {body}");
    Ok(())
}

async fn run_handshake(session: &mut AuthSession) -> AuthResult<String> {
    session.enroll().await?;
    session.validate().await?;
    session.fetch_secure().await
}
