use serde::{Deserialize, Serialize};

use crate::domain::session::{SessionState, Slots};
use crate::pricing::StayQuote;

/// Side effect requested by a transition. The flow never performs these
/// itself; the runtime executes them in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    Reply(String),
    ConfirmBooking(StayQuote),
    AiFallback { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// `None` when the transition created the session.
    pub from: Option<SessionState>,
    pub to: SessionState,
    pub slots: Slots,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    pub fn changed_state(&self) -> bool {
        self.from != Some(self.to)
    }
}
