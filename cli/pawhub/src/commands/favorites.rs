use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use itertools::Itertools;
use pawhub_client::ShelterClient;
use pawhub_client::client::ClientTrait;
use pawhub_client::error::ApiError;
use pawhub_client::session::AuthSession;
use pawhub_core::favorites as store;
use pawhub_core::favorites::{
    acquire_favorites_json_lock,
    favorites_json_path,
    read_favorites_json,
    write_favorites_json,
};
use tracing::{debug, instrument};

use crate::commands::LOGIN_HINT;
use crate::config::Config;
use crate::utils::{display, message};

/// Manage your favorited dogs
#[derive(Bpaf, Clone, Debug)]
pub enum Favorites {
    /// Mark dogs as favorites by id
    #[bpaf(command)]
    Add {
        /// Ids of the dogs to favorite
        #[bpaf(positional("id"), some("provide at least one dog id"))]
        ids: Vec<String>,
    },

    /// Remove dogs from your favorites by id
    #[bpaf(command("rm"))]
    Remove {
        /// Ids of the dogs to remove
        #[bpaf(positional("id"), some("provide at least one dog id"))]
        ids: Vec<String>,
    },

    /// List your favorited dogs
    #[bpaf(command)]
    List {
        /// Display favorites as a JSON array
        #[bpaf(long)]
        json: bool,
    },

    /// Remove every favorite
    #[bpaf(command)]
    Clear {
        /// Reset the favorites file even if it cannot be read
        #[bpaf(long)]
        force: bool,
    },
}

impl Favorites {
    #[instrument(name = "favorites", skip_all)]
    pub async fn handle(
        self,
        config: &Config,
        session: &AuthSession<ShelterClient>,
    ) -> Result<()> {
        let path = favorites_json_path(&config.pawhub.data_dir);

        match self {
            Favorites::Add { ids } => {
                // Resolve before taking the lock so a slow network call
                // doesn't hold up other invocations.
                let dogs = match session.client().resolve_dogs(&ids).await {
                    Ok(dogs) => dogs,
                    Err(ApiError::AuthRequired) => bail!(LOGIN_HINT),
                    Err(err) => return Err(err).context("could not resolve the given ids"),
                };

                let resolved = dogs.iter().map(|dog| dog.id.clone()).collect::<BTreeSet<_>>();
                let missing = ids
                    .iter()
                    .filter(|id| !resolved.contains(*id))
                    .collect::<Vec<_>>();
                if !missing.is_empty() {
                    message::warning(format!(
                        "Unknown ids skipped: {}",
                        missing.iter().join(", ")
                    ));
                }

                let (favorites, lock) = read_favorites_json(&path)?;
                let mut favorites = favorites.unwrap_or_default();
                let mut added = 0;
                for dog in dogs {
                    if favorites.add(dog) {
                        added += 1;
                    }
                }
                write_favorites_json(&favorites, &path, lock)?;

                message::updated(format!("{added} dog(s) added to favorites"));
                Ok(())
            },
            Favorites::Remove { ids } => {
                let (favorites, lock) = read_favorites_json(&path)?;
                let mut favorites = favorites.unwrap_or_default();
                let removed = ids.iter().filter(|id| favorites.remove(id.as_str())).count();
                write_favorites_json(&favorites, &path, lock)?;

                message::deleted(format!("{removed} dog(s) removed from favorites"));
                Ok(())
            },
            Favorites::List { json } => {
                let (favorites, _lock) = read_favorites_json(&path)?;
                let favorites = favorites.unwrap_or_default();

                if json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&favorites.dogs().collect::<Vec<_>>())?
                    );
                    return Ok(());
                }

                if favorites.is_empty() {
                    message::plain(
                        "No favorites yet. Find dogs with 'pawhub search' and add them with \
                         'pawhub favorites add <id>'.",
                    );
                    return Ok(());
                }

                message::plain(display::render_dogs(favorites.dogs()));
                Ok(())
            },
            Favorites::Clear { force } => {
                match read_favorites_json(&path) {
                    Ok((favorites, lock)) => {
                        let mut favorites = favorites.unwrap_or_default();
                        let count = favorites.len();
                        favorites.clear();
                        write_favorites_json(&favorites, &path, lock)?;
                        message::deleted(format!("Cleared {count} favorite(s)"));
                    },
                    Err(err) if force => {
                        debug!(%err, "resetting unreadable favorites file");
                        let lock = acquire_favorites_json_lock(&path)?;
                        write_favorites_json(&store::Favorites::default(), &path, lock)?;
                        message::deleted("Favorites reset");
                    },
                    Err(err) => {
                        return Err(err).context(
                            "could not read the favorites file (use --force to reset it)",
                        );
                    },
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
    use serde_json::json;

    use super::*;
    use crate::commands::build_session;
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
    async fn add_resolves_ids_and_persists_entities() {
        let server = MockServer::start_async().await;
        let details = server.mock(|when, then| {
            when.method(POST).path("/dogs").json_body(json!(["d1"]));
            then.status(200).json_body(json!([{
                "id": "d1",
                "name": "Rex",
                "breed": "Beagle",
                "age": 4,
                "zip_code": "10001",
                "img": "https://img.example/d1.jpg",
            }]));
        });

        let tempdir = tempfile::tempdir().unwrap();
        let config = test_config(&server, tempdir.path());
        let session = build_session(&config).unwrap();

        Favorites::Add {
            ids: vec!["d1".to_string()],
        }
        .handle(&config, &session)
        .await
        .unwrap();

        let path = favorites_json_path(&config.pawhub.data_dir);
        let (favorites, _lock) = read_favorites_json(&path).unwrap();
        let favorites = favorites.unwrap();
        assert!(favorites.contains("d1"));
        assert_eq!(favorites.get("d1").unwrap().name, "Rex");
        details.assert();
    }

    #[tokio::test]
    async fn clear_force_resets_an_unreadable_file() {
        let server = MockServer::start_async().await;
        let tempdir = tempfile::tempdir().unwrap();
        let config = test_config(&server, tempdir.path());

        let path = favorites_json_path(&config.pawhub.data_dir);
        std::fs::write(&path, "not json at all").unwrap();

        let session = build_session(&config).unwrap();
        Favorites::Clear { force: true }
            .handle(&config, &session)
            .await
            .unwrap();

        let (favorites, _lock) = read_favorites_json(&path).unwrap();
        assert_eq!(favorites, Some(store::Favorites::default()));
    }
}
