use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use innkeep_core::domain::reservation::{Reservation, ReservationId};
use innkeep_core::domain::session::{ConversationId, Session};

pub mod memory;
pub mod reservation;
pub mod session;

pub use memory::{InMemoryReservationStore, InMemorySessionStore};
pub use reservation::SqlReservationStore;
pub use session::SqlSessionStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Sessions keyed by conversation id. `load_all`/`save_all` operate on the
/// whole collection; `find`/`save` touch a single record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_all(&self) -> Result<HashMap<ConversationId, Session>, RepositoryError>;
    /// Replaces the stored collection with `sessions`.
    async fn save_all(
        &self,
        sessions: &HashMap<ConversationId, Session>,
    ) -> Result<(), RepositoryError>;
    async fn find(&self, id: &ConversationId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: &Session) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn load_all(&self) -> Result<HashMap<ReservationId, Reservation>, RepositoryError>;
    async fn save_all(
        &self,
        reservations: &HashMap<ReservationId, Reservation>,
    ) -> Result<(), RepositoryError>;
    async fn find(&self, id: &ReservationId) -> Result<Option<Reservation>, RepositoryError>;
    async fn save(&self, reservation: &Reservation) -> Result<(), RepositoryError>;
}
