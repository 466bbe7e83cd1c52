use serde::{Deserialize, Serialize};

/// One adoptable dog as returned by the shelter service.
///
/// Snapshots are immutable on the client. A snapshot may go stale relative
/// to the service; it is refreshed by re-fetching, never patched in place.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Dog {
    /// Opaque identifier minted by the service.
    pub id: String,
    pub name: String,
    pub breed: String,
    /// Age in years.
    pub age: u32,
    pub zip_code: String,
    /// URL of the dog's photo.
    pub img: String,
}
