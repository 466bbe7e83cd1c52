use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use pawhub_client::ShelterClient;
use pawhub_client::client::ClientTrait;
use pawhub_client::error::{ApiError, SearchError};
use pawhub_client::search::SearchSession;
use pawhub_client::session::AuthSession;
use pawhub_client::types::{SearchCriteria, SearchOutcome, SortDirection, SortField, SortSpec};
use tracing::instrument;

use crate::commands::LOGIN_HINT;
use crate::config::Config;
use crate::utils::{display, message};

/// List the available breeds
#[derive(Bpaf, Clone, Debug)]
pub struct Breeds {
    /// Display breeds as a JSON array
    #[bpaf(long)]
    json: bool,
}

impl Breeds {
    #[instrument(name = "breeds", skip_all)]
    pub async fn handle(self, session: &AuthSession<ShelterClient>) -> Result<()> {
        let breeds = match session.client().breeds().await {
            Ok(breeds) => breeds,
            Err(ApiError::AuthRequired) => bail!(LOGIN_HINT),
            Err(err) => return Err(err).context("could not fetch breeds"),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&breeds)?);
        } else {
            for breed in &breeds {
                println!("{breed}");
            }
        }
        Ok(())
    }
}

fn first_page_or_later(page: &u32) -> bool {
    *page >= 1
}

// Search for adoptable dogs
#[derive(Bpaf, Clone, Debug)]
pub struct Search {
    /// Only show dogs of this breed; repeat for multiple breeds
    #[bpaf(long("breed"), argument("breed"))]
    breeds: Vec<String>,

    /// Only show dogs near this zip code; repeat for multiple codes
    #[bpaf(long("zip"), argument("zip"))]
    zip_codes: Vec<String>,

    /// Minimum age in years
    #[bpaf(long, argument("years"))]
    age_min: Option<u32>,

    /// Maximum age in years
    #[bpaf(long, argument("years"))]
    age_max: Option<u32>,

    /// Sort by 'breed', 'name', 'age' or 'zip_code'
    #[bpaf(long, argument("field"), fallback(SortField::Breed))]
    sort: SortField,

    /// Sort in descending order
    #[bpaf(long)]
    desc: bool,

    /// Result page to display (starting at 1)
    #[bpaf(
        long,
        argument("page"),
        fallback(1),
        guard(first_page_or_later, "pages start at 1")
    )]
    page: u32,

    /// Display results as a JSON array
    #[bpaf(long)]
    json: bool,
}

impl Search {
    /// Translate the command line flags into search criteria.
    ///
    /// Filters first, page last: the filter setters reset pagination, the
    /// page flag then selects within those filters.
    fn criteria(&self, page_size: u32) -> SearchCriteria {
        SearchCriteria::new()
            .with_page_size(page_size)
            .with_breeds(self.breeds.clone())
            .with_zip_codes(self.zip_codes.clone())
            .with_age_range(self.age_min, self.age_max)
            .with_sort(SortSpec {
                field: self.sort,
                direction: if self.desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            })
            .with_page(self.page - 1)
    }

    #[instrument(name = "search", skip_all, fields(page = self.page))]
    pub async fn handle(
        self,
        config: &Config,
        session: &AuthSession<ShelterClient>,
    ) -> Result<()> {
        let criteria = self.criteria(config.page_size());
        let searches = SearchSession::new(session.client().clone());

        let outcome = match searches.execute(&criteria).await {
            Ok(outcome) => outcome,
            Err(SearchError::Api(ApiError::AuthRequired)) => bail!(LOGIN_HINT),
            Err(SearchError::Api(err @ ApiError::ExhaustedRetries { .. })) => {
                // Degrade to an empty page rather than blocking the user.
                message::warning(format!(
                    "Search is unavailable right now ({err}). Try again in a moment."
                ));
                SearchOutcome::empty(criteria.page())
            },
            Err(err) => return Err(err).context("search failed"),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome.dogs)?);
            return Ok(());
        }

        message::plain(display::render_dogs(&outcome.dogs));
        if outcome.page_count > 1 {
            message::plain(format!(
                "Page {page} of {pages} ({total} dogs total)",
                page = outcome.page + 1,
                pages = outcome.page_count,
                total = outcome.total,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn search_args() -> Search {
        Search {
            breeds: Vec::new(),
            zip_codes: Vec::new(),
            age_min: None,
            age_max: None,
            sort: SortField::Breed,
            desc: false,
            page: 1,
            json: false,
        }
    }

    #[test]
    fn page_flag_is_one_based() {
        let criteria = search_args().criteria(20);
        assert_eq!(criteria.page(), 0);

        let criteria = Search {
            page: 3,
            ..search_args()
        }
        .criteria(20);
        assert_eq!(criteria.page(), 2);
    }

    #[test]
    fn flags_map_onto_criteria() {
        let args = Search {
            breeds: vec!["Akita".to_string()],
            age_min: Some(2),
            age_max: Some(5),
            sort: SortField::Age,
            desc: true,
            ..search_args()
        };
        let criteria = args.criteria(25);

        assert_eq!(criteria.page_size(), 25);
        let expected = SearchCriteria::new()
            .with_page_size(25)
            .with_breeds(vec!["Akita".to_string()])
            .with_age_range(Some(2), Some(5))
            .with_sort(SortSpec {
                field: SortField::Age,
                direction: SortDirection::Desc,
            });
        assert_eq!(criteria, expected);
    }
}
