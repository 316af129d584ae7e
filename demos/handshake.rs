use crs_auth::client::machine::AuthSession;
use crs_auth::client::tokens::TokenClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = TokenClient::new("https://localhost:7121")?;
    let mut session = AuthSession::new(client);

    session.enroll().await?;
    println!("encrypted key issued for device {}", session.device_id().map(|d| d.to_string()).unwrap_or_default());

    session.validate().await?;
    println!("access token validated");

    let body = session.fetch_secure().await?;
    println!("secure endpoint returned: {body}");

    Ok(())
}
