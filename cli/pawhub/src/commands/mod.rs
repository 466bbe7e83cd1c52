mod auth;
mod favorites;
mod matching;
mod search;

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::{Args, Bpaf, Parser};
use indoc::{formatdoc, indoc};
use pawhub_client::session::AuthSession;
use pawhub_client::{ClientConfig, ShelterClient};
use tracing::debug;

use crate::config::Config;
use crate::utils::message;

/// File in the data directory holding the persisted session cookie.
const SESSION_FILE_NAME: &str = "session";

/// Hint shown when a protected call comes back unauthenticated.
pub(crate) const LOGIN_HINT: &str = "You are not logged in. Run 'pawhub auth login' first.";

static PAWHUB_DESCRIPTION: &str = indoc! {"
    Pawhub is a search and match client for adoptable dogs.

    Browse and filter the shelter listings, keep a set of favorites,
    and let the service pick the dog that was meant for you."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, descr(PAWHUB_DESCRIPTION))]
pub struct PawhubCli(#[bpaf(external(pawhub_args))] pub PawhubArgs);

/// Main pawhub args parser
///
/// To parse the pawhub CLI, use [`PawhubCli`] via [`pawhub_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)] // we don't want this struct to be interpreted as a group
pub struct PawhubArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    /// Print the version of the program
    #[allow(dead_code)] // fake arg, `--version` is checked for separately (see [Version])
    #[bpaf(long, short('V'))]
    version: bool,

    #[bpaf(external(commands), optional)]
    command: Option<Commands>,
}

impl PawhubArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        tokio::fs::create_dir_all(&config.pawhub.data_dir).await?;
        tokio::fs::create_dir_all(&config.pawhub.cache_dir).await?;

        // Given no command, print the welcome message
        let Some(command) = self.command else {
            print_welcome_message();
            return Ok(());
        };

        let session = build_session(&config)?;

        match command {
            Commands::Auth(args) => args.handle(&config, &session).await?,
            Commands::Breeds(args) => args.handle(&session).await?,
            Commands::Search(args) => args.handle(&config, &session).await?,
            Commands::Favorites(args) => args.handle(&config, &session).await?,
            Commands::Match(args) => args.handle(&config, &session).await?,
        }
        Ok(())
    }
}

#[derive(Bpaf, Clone, Debug)]
enum Commands {
    /// Shelter service authentication commands
    #[bpaf(command)]
    Auth(#[bpaf(external(auth::auth))] auth::Auth),

    /// List the available breeds
    #[bpaf(command)]
    Breeds(#[bpaf(external(search::breeds))] search::Breeds),

    /// Search adoptable dogs
    #[bpaf(command)]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Manage your favorited dogs
    #[bpaf(command)]
    Favorites(#[bpaf(external(favorites::favorites))] favorites::Favorites),

    /// Ask the service to pick your match
    #[bpaf(command)]
    Match(#[bpaf(external(matching::matching))] matching::Matching),
}

fn print_welcome_message() {
    let welcome_message = {
        let version = env!("CARGO_PKG_VERSION");
        formatdoc! {r#"
            pawhub version {version}

            Usage: pawhub OPTIONS (auth|breeds|search|favorites|match) [--help]

            Use 'pawhub --help' for full list of commands and more information
        "#}
    };

    message::plain(welcome_message);
}

/// Fake argument used to parse `--version` separately
///
/// bpaf allows `pawhub --invalid option --version`, but common utilities
/// quit early when `--version` is passed, so it is checked for before the
/// main parser runs.
#[derive(Bpaf, Default)]
pub struct Version(#[bpaf(short('V'), long("version"))] bool);

impl Version {
    /// Parses to [Self] and extracts the `--version` flag
    pub fn check() -> bool {
        bpaf::construct!(version(), pawhub_args())
            .to_options()
            .run_inner(Args::current_args())
            .map(|(v, _)| v)
            .unwrap_or_default()
            .0
    }
}

// ---------------------------------------------------------------------------
// Session construction and cookie persistence
// ---------------------------------------------------------------------------

/// Builds the client and auth session for this invocation,
/// loading a session cookie persisted by an earlier `auth login`.
fn build_session(config: &Config) -> Result<AuthSession<ShelterClient>> {
    let client_config = ClientConfig {
        base_url: config.base_url().to_string(),
        session_cookie: read_session_cookie(config),
        extra_headers: Default::default(),
        user_agent: Some(config.user_agent()),
    };
    let client = ShelterClient::new(client_config)
        .context("could not construct the shelter service client")?;
    Ok(AuthSession::new(client))
}

fn session_file_path(config: &Config) -> PathBuf {
    config.pawhub.data_dir.join(SESSION_FILE_NAME)
}

fn read_session_cookie(config: &Config) -> Option<String> {
    let path = session_file_path(config);
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let cookie = contents.trim();
            if cookie.is_empty() {
                None
            } else {
                Some(cookie.to_string())
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            debug!(%err, ?path, "could not read session file");
            None
        },
    }
}

/// Persist the session cookie issued by a login.
/// The file is user-only since it carries the session credential.
pub(crate) fn write_session_cookie(config: &Config, cookie: &str) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let path = session_file_path(config);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(&path)
        .with_context(|| format!("could not open session file {}", path.display()))?;
    writeln!(file, "{cookie}")
        .with_context(|| format!("could not write session file {}", path.display()))?;
    Ok(())
}

pub(crate) fn remove_session_cookie(config: &Config) -> Result<()> {
    let path = session_file_path(config);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("could not remove session file {}", path.display()))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PawhubConfig;

    fn test_config(data_dir: &std::path::Path) -> Config {
        Config {
            pawhub: PawhubConfig {
                data_dir: data_dir.to_path_buf(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn session_cookie_roundtrips_through_the_session_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let config = test_config(tempdir.path());

        assert_eq!(read_session_cookie(&config), None);

        write_session_cookie(&config, "shelter-access-token=s3cret").unwrap();
        assert_eq!(
            read_session_cookie(&config),
            Some("shelter-access-token=s3cret".to_string())
        );

        remove_session_cookie(&config).unwrap();
        assert_eq!(read_session_cookie(&config), None);
        // removing twice is fine
        remove_session_cookie(&config).unwrap();
    }
}
