use std::sync::atomic::{AtomicU8, Ordering};

/// Stream lifecycle state machine.
///
/// State transitions:
/// ```text
/// created → configured → opened → started → running ↔ paused
///              ↓           ↓         ↓          ↓        ↓
///              └───────────┴─────────┴─→ faulted ←───────┘
///
/// any state → destroyed
/// ```
///
/// `Faulted` is absorbing apart from destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamState {
    Created,
    Configured,
    Opened,
    Started,
    Running,
    Paused,
    Faulted,
    Destroyed,
}

impl StreamState {
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Self::Opened | Self::Started | Self::Running | Self::Paused
        )
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started | Self::Running | Self::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Faulted | Self::Destroyed)
    }

    /// Whether Begin/End transfers are accepted. A pause takes effect at the
    /// backend's next cycle boundary, so a paused stream still finishes the
    /// cycle in flight.
    pub fn accepts_transfers(&self) -> bool {
        self.is_started()
    }

    pub fn can_transition_to(&self, next: StreamState) -> bool {
        use StreamState::*;
        match (*self, next) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Faulted, _) => false,
            (Created | Configured, Configured) => true,
            (Configured, Opened) => true,
            (Opened, Started) => true,
            (Started | Paused, Running) => true,
            (Started | Running, Paused) => true,
            (Configured | Opened | Started | Running | Paused, Faulted) => true,
            _ => false,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Configured,
            2 => Self::Opened,
            3 => Self::Started,
            4 => Self::Running,
            5 => Self::Paused,
            6 => Self::Faulted,
            _ => Self::Destroyed,
        }
    }
}

/// [`StreamState`] shared between the control thread and the realtime thread.
#[derive(Debug)]
pub struct AtomicStreamState(AtomicU8);

impl AtomicStreamState {
    pub fn new(state: StreamState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` if the transition is legal from the current state.
    ///
    /// Returns the previous state on success and the state that blocked the
    /// transition on failure.
    pub fn transition(&self, next: StreamState) -> Result<StreamState, StreamState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                StreamState::from_u8(raw)
                    .can_transition_to(next)
                    .then_some(next as u8)
            })
            .map(StreamState::from_u8)
            .map_err(StreamState::from_u8)
    }

    /// Moves to `next` only from `expected`.
    pub fn transition_from(&self, expected: StreamState, next: StreamState) -> bool {
        expected.can_transition_to(next)
            && self
                .0
                .compare_exchange(expected as u8, next as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Returns a stream whose backend refused to start to `Opened`. This is
    /// the only backwards edge and is taken before any callback has run.
    pub(crate) fn abort_start(&self) -> bool {
        self.0
            .compare_exchange(
                StreamState::Started as u8,
                StreamState::Opened as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
