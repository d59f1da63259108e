//! Session commands: sign in, sign out, inspect the account.
//!
//! # Usage
//!
//! ```bash
//! tam login -e jane@example.com -p secret
//! tam whoami
//! tam profile --name "Jane D."
//! tam logout
//! ```

use tamarind_core::UserUpdate;

use super::{CommandError, Context};

/// Sign in with email and password.
pub async fn login(email: &str, password: &str) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    let user = ctx.session.login(email, password).await?;

    tracing::info!("Signed in as {} ({})", user.name.as_deref().unwrap_or("unnamed"), user.email);
    Ok(())
}

/// Sign in by exchanging a Google ID token.
pub async fn login_google(id_token: &str) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    let user = ctx.session.login_with_google(id_token).await?;

    tracing::info!("Signed in as {} ({})", user.name.as_deref().unwrap_or("unnamed"), user.email);
    Ok(())
}

/// Create an account and sign in with it.
pub async fn register(name: &str, email: &str, password: &str) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    let user = ctx.session.register(name, email, password).await?;

    tracing::info!("Account created for {}", user.email);
    Ok(())
}

/// Show the current session.
pub async fn whoami() -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    match ctx.session.current_user() {
        Some(user) => {
            tracing::info!("Signed in ({})", ctx.session.status());
            tracing::info!("  ID:    {}", user.id);
            tracing::info!("  Email: {}", user.email);
            tracing::info!("  Name:  {}", user.name.as_deref().unwrap_or("-"));
            tracing::info!("  Role:  {}", user.role);
        }
        None => tracing::info!("Nobody is signed in ({})", ctx.session.status()),
    }
    Ok(())
}

/// Apply a partial profile update to the session's view of the user.
pub async fn profile(name: Option<String>, avatar_url: Option<String>) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    ctx.session.update_user(UserUpdate {
        name,
        avatar_url,
        ..UserUpdate::default()
    });

    match ctx.session.current_user() {
        Some(user) => {
            tracing::info!("Profile for {}", user.email);
            tracing::info!("  Name:   {}", user.name.as_deref().unwrap_or("-"));
            tracing::info!("  Avatar: {}", user.avatar_url.as_deref().unwrap_or("-"));
        }
        None => tracing::info!("Nobody is signed in, nothing to update"),
    }
    Ok(())
}

/// Sign out and clear stored tokens. Works offline.
pub async fn logout() -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    ctx.session.logout();

    tracing::info!("Signed out");
    Ok(())
}
