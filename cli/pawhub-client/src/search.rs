//! Search execution with stale-response protection.
//!
//! Filter changes can race an in-flight search. Each execution is tagged
//! with a generation counter; a completing execution only installs its
//! outcome as the latest result if no newer execution has started since, so
//! a slow stale response can never overwrite a newer one.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::client::ClientTrait;
use crate::error::SearchError;
use crate::types::{SearchCriteria, SearchOutcome};

#[derive(Debug)]
pub struct SearchSession<C> {
    client: C,
    generation: AtomicU64,
    latest: Mutex<Option<(u64, SearchOutcome)>>,
}

impl<C: ClientTrait> SearchSession<C> {
    pub fn new(client: C) -> Self {
        SearchSession {
            client,
            generation: AtomicU64::new(0),
            latest: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run a search for the given criteria.
    ///
    /// The outcome is returned to the caller either way, but it only
    /// becomes [SearchSession::latest] if this execution is still the
    /// newest one by the time it completes.
    pub async fn execute(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SearchError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.client.search(criteria).await?;
        self.install(generation, outcome.clone());
        Ok(outcome)
    }

    fn install(&self, generation: u64, outcome: SearchOutcome) {
        let mut latest = self.latest.lock().expect("latest outcome mutex poisoned");
        if generation != self.current_generation() {
            debug!(generation, "discarding stale search response");
            return;
        }
        *latest = Some((generation, outcome));
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The most recent outcome that was still current when it completed.
    pub fn latest(&self) -> Option<SearchOutcome> {
        self.latest
            .lock()
            .expect("latest outcome mutex poisoned")
            .as_ref()
            .map(|(_, outcome)| outcome.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use pawhub_core::dog::Dog;
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    use super::*;
    use crate::error::{ApiError, MatchError};
    use crate::types::{Credentials, DogId};

    /// A client whose `search` completes only when the test releases the
    /// corresponding gate, so completion order can be forced.
    struct GatedClient {
        gates: Mutex<VecDeque<oneshot::Receiver<SearchOutcome>>>,
    }

    impl GatedClient {
        fn new(gates: Vec<oneshot::Receiver<SearchOutcome>>) -> Self {
            GatedClient {
                gates: Mutex::new(gates.into()),
            }
        }
    }

    impl ClientTrait for GatedClient {
        async fn search(&self, _criteria: &SearchCriteria) -> Result<SearchOutcome, SearchError> {
            let gate = self
                .gates
                .lock()
                .unwrap()
                .pop_front()
                .expect("one gate per search call");
            Ok(gate.await.expect("gate sender dropped"))
        }

        async fn login(&self, _credentials: &Credentials) -> Result<Option<String>, ApiError> {
            unimplemented!("not used by search session tests")
        }

        async fn logout(&self) -> Result<(), ApiError> {
            unimplemented!("not used by search session tests")
        }

        async fn probe(&self) -> Result<(), ApiError> {
            unimplemented!("not used by search session tests")
        }

        async fn breeds(&self) -> Result<Vec<String>, ApiError> {
            unimplemented!("not used by search session tests")
        }

        async fn resolve_dogs(&self, _ids: &[DogId]) -> Result<Vec<Dog>, ApiError> {
            unimplemented!("not used by search session tests")
        }

        async fn match_from_favorites(&self, _ids: &[DogId]) -> Result<Dog, MatchError> {
            unimplemented!("not used by search session tests")
        }

        async fn random_match(&self) -> Result<Dog, MatchError> {
            unimplemented!("not used by search session tests")
        }
    }

    fn outcome_for_page(page: u32) -> SearchOutcome {
        SearchOutcome {
            dogs: Vec::new(),
            total: 40,
            page,
            page_count: 2,
        }
    }

    #[tokio::test]
    async fn sequential_executions_update_latest() {
        let (release_first, first_gate) = oneshot::channel();
        let (release_second, second_gate) = oneshot::channel();
        let session = SearchSession::new(GatedClient::new(vec![first_gate, second_gate]));

        release_first.send(outcome_for_page(0)).unwrap();
        session.execute(&SearchCriteria::new()).await.unwrap();

        release_second.send(outcome_for_page(1)).unwrap();
        session
            .execute(&SearchCriteria::new().with_page(1))
            .await
            .unwrap();

        assert_eq!(session.latest(), Some(outcome_for_page(1)));
    }

    /// A search that completes after a newer one has started is returned
    /// to its caller but never installed as the latest outcome.
    #[tokio::test]
    async fn stale_completion_does_not_overwrite_a_newer_result() {
        let (release_first, first_gate) = oneshot::channel();
        let (release_second, second_gate) = oneshot::channel();
        let session = Arc::new(SearchSession::new(GatedClient::new(vec![
            first_gate,
            second_gate,
        ])));

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.execute(&SearchCriteria::new()).await }
        });
        while session.current_generation() < 1 {
            tokio::task::yield_now().await;
        }

        let second = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.execute(&SearchCriteria::new().with_page(1)).await }
        });
        while session.current_generation() < 2 {
            tokio::task::yield_now().await;
        }

        // The newer execution completes first and becomes the latest.
        release_second.send(outcome_for_page(1)).unwrap();
        assert_eq!(second.await.unwrap().unwrap(), outcome_for_page(1));
        assert_eq!(session.latest(), Some(outcome_for_page(1)));

        // The stale execution still resolves for its caller, but the
        // displayed result must not regress.
        release_first.send(outcome_for_page(0)).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), outcome_for_page(0));
        assert_eq!(session.latest(), Some(outcome_for_page(1)));
    }
}
