use std::collections::HashMap;

use tokio::sync::RwLock;

use innkeep_core::domain::reservation::{Reservation, ReservationId};
use innkeep_core::domain::session::{ConversationId, Session};

use super::{RepositoryError, ReservationStore, SessionStore};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<ConversationId, Session>>,
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_all(&self) -> Result<HashMap<ConversationId, Session>, RepositoryError> {
        Ok(self.sessions.read().await.clone())
    }

    async fn save_all(
        &self,
        sessions: &HashMap<ConversationId, Session>,
    ) -> Result<(), RepositoryError> {
        *self.sessions.write().await = sessions.clone();
        Ok(())
    }

    async fn find(&self, id: &ConversationId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.conversation_id.clone(), session.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryReservationStore {
    reservations: RwLock<HashMap<ReservationId, Reservation>>,
}

#[async_trait::async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn load_all(&self) -> Result<HashMap<ReservationId, Reservation>, RepositoryError> {
        Ok(self.reservations.read().await.clone())
    }

    async fn save_all(
        &self,
        reservations: &HashMap<ReservationId, Reservation>,
    ) -> Result<(), RepositoryError> {
        *self.reservations.write().await = reservations.clone();
        Ok(())
    }

    async fn find(&self, id: &ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        let reservations = self.reservations.read().await;
        Ok(reservations.get(id).cloned())
    }

    async fn save(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        let mut reservations = self.reservations.write().await;
        reservations.insert(reservation.id.clone(), reservation.clone());
        Ok(())
    }
}
