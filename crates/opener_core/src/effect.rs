use crate::ControlMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistFlag { enabled: bool },
    SendToController(ControlMessage),
    /// Reconnect after the fixed backoff.
    ScheduleReconnect,
}
