use anyhow::{Context, Result};
use bpaf::Bpaf;
use pawhub_client::ShelterClient;
use pawhub_client::session::{AuthSession, AuthStatus};
use pawhub_client::types::Credentials;
use tracing::instrument;

use crate::commands::{remove_session_cookie, write_session_cookie};
use crate::config::Config;
use crate::utils::message;

/// Shelter service authentication commands
#[derive(Bpaf, Clone, Debug)]
pub enum Auth {
    /// Log in to the shelter service
    #[bpaf(command)]
    Login {
        /// Name to register the session under
        #[bpaf(long, argument("name"))]
        name: String,

        /// Email address to register the session under
        #[bpaf(long, argument("email"))]
        email: String,
    },

    /// Log out from the shelter service
    #[bpaf(command)]
    Logout,

    /// Print your current login status
    #[bpaf(command)]
    Status,
}

impl Auth {
    #[instrument(name = "auth", skip_all)]
    pub async fn handle(
        self,
        config: &Config,
        session: &AuthSession<ShelterClient>,
    ) -> Result<()> {
        match self {
            Auth::Login { name, email } => {
                let cookie = session
                    .login(&Credentials { name, email })
                    .await
                    .context("could not log in to the shelter service")?;

                // Persist the issued cookie so later invocations stay
                // logged in; the service owns the credential either way.
                match cookie {
                    Some(cookie) => write_session_cookie(config, &cookie)
                        .context("could not persist the session")?,
                    None => message::warning("The service did not issue a session cookie"),
                }

                message::updated("Login successful");
                Ok(())
            },
            Auth::Logout => {
                session.logout().await;
                remove_session_cookie(config)?;
                message::updated("Logout successful");
                Ok(())
            },
            Auth::Status => {
                match session.check().await {
                    AuthStatus::Authenticated => {
                        message::plain(format!(
                            "You are logged in to {}",
                            session.client().base_url()
                        ));
                    },
                    AuthStatus::Unauthenticated { error: None } => {
                        message::warning("You are not logged in");
                    },
                    AuthStatus::Unauthenticated { error: Some(error) } => {
                        message::warning(format!(
                            "Could not reach the shelter service: {error}"
                        ));
                    },
                    // check() always resolves to a decided state
                    AuthStatus::Unknown | AuthStatus::Checking => unreachable!(),
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::commands::{build_session, read_session_cookie};
    use crate::config::PawhubConfig;

    fn test_config(server: &MockServer, data_dir: &std::path::Path) -> Config {
        Config {
            pawhub: PawhubConfig {
                data_dir: data_dir.to_path_buf(),
                base_url: Some(server.base_url()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn login_persists_the_issued_cookie() {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .header("set-cookie", "shelter-access-token=s3cret; HttpOnly");
        });

        let tempdir = tempfile::tempdir().unwrap();
        let config = test_config(&server, tempdir.path());
        let session = build_session(&config).unwrap();

        Auth::Login {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
        .handle(&config, &session)
        .await
        .unwrap();

        assert_eq!(
            read_session_cookie(&config),
            Some("shelter-access-token=s3cret".to_string())
        );
        login.assert();
    }

    #[tokio::test]
    async fn logout_clears_the_persisted_cookie_even_when_the_call_fails() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/auth/logout");
            then.status(500);
        });

        let tempdir = tempfile::tempdir().unwrap();
        let config = test_config(&server, tempdir.path());
        crate::commands::write_session_cookie(&config, "shelter-access-token=s3cret").unwrap();

        let session = build_session(&config).unwrap();
        Auth::Logout.handle(&config, &session).await.unwrap();

        assert_eq!(read_session_cookie(&config), None);
    }
}
