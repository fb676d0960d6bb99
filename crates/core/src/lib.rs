pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod payments;
pub mod ports;
pub mod pricing;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use catalog::{Catalog, CatalogError, CatalogSource, DirectoryCatalogSource, KnowledgeBase, Retrieval};
pub use domain::reservation::{PaymentStatus, Reservation, ReservationId};
pub use domain::room::{Room, RoomId, Upsell, UpsellId};
pub use domain::session::{ConversationId, Session, SessionState, Slots, StayDate};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use payments::{PaymentError, PaymentEvent, SignatureError, SignatureVerifier};
pub use ports::{ChannelError, CheckoutSession, MessageSender, PaymentProvider};
pub use pricing::{PricingError, StayQuote};
