use shared::responses::ApiAck;
use shared::types::StaffId;

use crate::error::StaffSyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update(StaffId),
    Delete(StaffId),
}

impl MutationKind {
    pub fn target(&self) -> Option<&StaffId> {
        match self {
            Self::Create => None,
            Self::Update(id) | Self::Delete(id) => Some(id),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    InFlight,
    Committed,
    Failed,
}

/// Prepared mutation that has not been sent.
/// consuming `dispatch` into `InFlightMutation`.
pub struct IdleMutation {
    kind: MutationKind,
}

/// Request sent, awaiting the server.
/// consuming `commit` or `fail` into a terminal state.
pub struct InFlightMutation {
    kind: MutationKind,
}

/// Terminal state: the server confirmed the mutation.
pub struct CommittedMutation {
    kind: MutationKind,
    ack: ApiAck,
}

/// Terminal state: the server or transport rejected the mutation.
pub struct FailedMutation {
    kind: MutationKind,
    error: StaffSyncError,
}

impl IdleMutation {
    pub fn new(kind: MutationKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn status(&self) -> MutationStatus {
        MutationStatus::Idle
    }

    pub fn dispatch(self) -> InFlightMutation {
        InFlightMutation { kind: self.kind }
    }
}

impl InFlightMutation {
    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn status(&self) -> MutationStatus {
        MutationStatus::InFlight
    }

    pub fn commit(self, ack: ApiAck) -> CommittedMutation {
        CommittedMutation {
            kind: self.kind,
            ack,
        }
    }

    pub fn fail(self, error: StaffSyncError) -> FailedMutation {
        FailedMutation {
            kind: self.kind,
            error,
        }
    }
}

impl CommittedMutation {
    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn status(&self) -> MutationStatus {
        MutationStatus::Committed
    }

    pub fn ack(&self) -> &ApiAck {
        &self.ack
    }

    pub fn into_ack(self) -> ApiAck {
        self.ack
    }
}

impl FailedMutation {
    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn status(&self) -> MutationStatus {
        MutationStatus::Failed
    }

    pub fn error(&self) -> &StaffSyncError {
        &self.error
    }

    pub fn into_error(self) -> StaffSyncError {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_in_flight_keeps_target() {
        let idle = IdleMutation::new(MutationKind::Delete(StaffId::from(3)));
        assert_eq!(idle.status(), MutationStatus::Idle);

        let in_flight = idle.dispatch();
        assert_eq!(in_flight.status(), MutationStatus::InFlight);
        assert_eq!(in_flight.kind().target(), Some(&StaffId::from(3)));
    }

    #[test]
    fn in_flight_to_committed_carries_ack() {
        let ack = ApiAck {
            message: Some("Staff added successfully".into()),
            staff_id: Some(StaffId::from(8)),
        };
        let committed = IdleMutation::new(MutationKind::Create)
            .dispatch()
            .commit(ack.clone());

        assert_eq!(committed.status(), MutationStatus::Committed);
        assert_eq!(committed.kind().label(), "create");
        assert_eq!(committed.into_ack(), ack);
    }

    #[test]
    fn in_flight_to_failed_carries_error() {
        let failed = IdleMutation::new(MutationKind::Update(StaffId::from(1)))
            .dispatch()
            .fail(StaffSyncError::Transport("timeout".into()));

        assert_eq!(failed.status(), MutationStatus::Failed);
        assert_eq!(failed.kind().label(), "update");
        assert_eq!(
            failed.into_error(),
            StaffSyncError::Transport("timeout".into())
        );
    }
}
