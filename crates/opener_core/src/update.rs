use crate::{enabled_or_default, ConnectionState, ControlMessage, Effect, Msg, PanelState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: PanelState, msg: Msg) -> (PanelState, Vec<Effect>) {
    let effects = match msg {
        Msg::StoredFlagLoaded(stored) => {
            state.set_enabled(enabled_or_default(stored));
            state.mark_loaded();
            Vec::new()
        }
        Msg::ToggleChanged(enabled) => {
            state.set_enabled(enabled);
            state.mark_loaded();
            let mut effects = vec![Effect::PersistFlag { enabled }];
            // While disconnected the reconnect handshake carries the new state.
            if state.connection() == ConnectionState::Connected {
                effects.push(Effect::SendToController(ControlMessage::UpdateState {
                    enabled,
                }));
            }
            effects
        }
        Msg::FlagChangedElsewhere(enabled) => {
            state.set_enabled(enabled);
            Vec::new()
        }
        Msg::TabSelected(tab) => {
            state.select_tab(tab);
            Vec::new()
        }
        Msg::Connected => {
            state.set_connection(ConnectionState::Connected);
            vec![Effect::SendToController(ControlMessage::InitState {
                enabled: state.enabled(),
            })]
        }
        Msg::ConnectionLost => {
            if state.connection() == ConnectionState::Reconnecting {
                // A reconnect is already pending.
                return (state, Vec::new());
            }
            state.set_connection(ConnectionState::Reconnecting);
            vec![Effect::ScheduleReconnect]
        }
    };

    (state, effects)
}
