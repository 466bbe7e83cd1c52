use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use indoc::formatdoc;
use pawhub_client::ShelterClient;
use pawhub_client::client::ClientTrait;
use pawhub_client::error::{ApiError, MatchError};
use pawhub_client::session::AuthSession;
use pawhub_core::favorites::{favorites_json_path, read_favorites_json, write_favorites_json};
use tracing::instrument;

use crate::commands::LOGIN_HINT;
use crate::config::Config;
use crate::utils::message;

// Ask the service to pick your match
#[derive(Bpaf, Clone, Debug)]
pub struct Matching {
    /// Draw from all adoptable dogs instead of your favorites
    #[bpaf(long)]
    random: bool,

    /// Add the matched dog to your favorites
    #[bpaf(long)]
    save: bool,

    /// Display the match as JSON
    #[bpaf(long)]
    json: bool,
}

impl Matching {
    #[instrument(name = "match", skip_all, fields(random = self.random))]
    pub async fn handle(
        self,
        config: &Config,
        session: &AuthSession<ShelterClient>,
    ) -> Result<()> {
        let path = favorites_json_path(&config.pawhub.data_dir);
        let client = session.client();

        let result = if self.random {
            client.random_match().await
        } else {
            let ids = {
                // Only a snapshot is needed; release the lock before the
                // network round trips.
                let (favorites, lock) = read_favorites_json(&path)?;
                drop(lock);
                favorites.unwrap_or_default().ids()
            };
            client.match_from_favorites(&ids).await
        };

        let dog = match result {
            Ok(dog) => dog,
            Err(MatchError::NoFavorites) => bail!(formatdoc! {"
                You have no favorites yet.

                Find dogs with 'pawhub search' and add them with
                'pawhub favorites add <id>', or draw from every adoptable
                dog with 'pawhub match --random'."
            }),
            Err(MatchError::NoCandidates) => {
                bail!("Could not find a match: no dogs are available right now")
            },
            Err(MatchError::Api(ApiError::AuthRequired)) => bail!(LOGIN_HINT),
            Err(err) => return Err(err).context("could not generate a match"),
        };

        if self.save {
            let (favorites, lock) = read_favorites_json(&path)?;
            let mut favorites = favorites.unwrap_or_default();
            // add is idempotent, matching a dog twice keeps one entry
            if favorites.add(dog.clone()) {
                write_favorites_json(&favorites, &path, lock)?;
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&dog)?);
            return Ok(());
        }

        message::created(formatdoc! {"
            It's a match! Meet {name}, a {age} year old {breed} near {zip}.
            Photo: {img}
            Id: {id}",
            name = dog.name,
            age = dog.age,
            breed = dog.breed,
            zip = dog.zip_code,
            img = dog.img,
            id = dog.id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use pawhub_core::dog::Dog;
    use pawhub_core::favorites::acquire_favorites_json_lock;
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

    fn rex() -> Dog {
        Dog {
            id: "abc123".to_string(),
            name: "Rex".to_string(),
            breed: "Beagle".to_string(),
            age: 4,
            zip_code: "10001".to_string(),
            img: "https://img.example/abc123.jpg".to_string(),
        }
    }

    /// Favorites {abc123}, the service matches abc123 and it resolves to
    /// Rex; saving the match again must not duplicate the favorite.
    #[tokio::test]
    async fn favorites_match_resolves_and_stays_deduplicated() {
        let server = MockServer::start_async().await;
        let matching = server.mock(|when, then| {
            when.method(POST)
                .path("/dogs/match")
                .json_body(json!(["abc123"]));
            then.status(200).json_body(json!({"match": "abc123"}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/dogs");
            then.status(200).json_body(json!([rex()]));
        });

        let tempdir = tempfile::tempdir().unwrap();
        let config = test_config(&server, tempdir.path());

        let path = favorites_json_path(&config.pawhub.data_dir);
        let mut favorites = pawhub_core::favorites::Favorites::default();
        favorites.add(rex());
        let lock = acquire_favorites_json_lock(&path).unwrap();
        write_favorites_json(&favorites, &path, lock).unwrap();

        let session = build_session(&config).unwrap();
        Matching {
            random: false,
            save: true,
            json: true,
        }
        .handle(&config, &session)
        .await
        .unwrap();

        let (favorites, _lock) = read_favorites_json(&path).unwrap();
        let favorites = favorites.unwrap();
        assert_eq!(favorites.len(), 1);
        assert!(favorites.contains("abc123"));
        matching.assert();
    }
}
