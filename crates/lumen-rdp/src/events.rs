use serde::Deserialize;

use crate::ActorName;

/// One asynchronous notification from the runtime, decoded at the protocol
/// boundary by its `type` tag.
///
/// Unknown tags decode to [`RdpEvent::Unknown`] so a newer runtime never
/// poisons the event stream.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RdpEvent {
    #[serde(rename_all = "camelCase")]
    NewSource {
        actor: ActorName,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        introduction_type: Option<String>,
        #[serde(default)]
        is_black_boxed: bool,
    },

    /// Navigation discards the tab's sources (and their breakpoint actors)
    /// on the runtime side.
    #[serde(rename_all = "camelCase")]
    TabNavigated { state: NavigationState },

    Paused {
        why: PausedReason,
    },

    Resumed,

    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NavigationState {
    Start,
    Stop,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PausedReason {
    /// Pause kind as reported by the runtime (`breakpoint`, `interrupted`,
    /// `debuggerStatement`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Breakpoint actors responsible for the pause, when `kind` is
    /// `breakpoint`.
    #[serde(default)]
    pub actors: Vec<ActorName>,
}
