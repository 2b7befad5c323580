// Playback lifecycle state machine

use crate::error::PlayerError;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Freshly created or reset, no source
    #[default]
    Idle,
    /// Source set, engine context created
    Initialized,
    /// Asynchronous preparation in flight
    Preparing,
    /// Ready to start
    Prepared,
    Started,
    Paused,
    Stopped,
    /// End of stream reached without looping
    PlaybackCompleted,
    /// Recoverable only through reset
    Error,
    /// Released, terminal
    End,
}

impl PlaybackState {
    pub const ALL: [PlaybackState; 10] = [
        PlaybackState::Idle,
        PlaybackState::Initialized,
        PlaybackState::Preparing,
        PlaybackState::Prepared,
        PlaybackState::Started,
        PlaybackState::Paused,
        PlaybackState::Stopped,
        PlaybackState::PlaybackCompleted,
        PlaybackState::Error,
        PlaybackState::End,
    ];

    /// Whether an engine handle exists in this state.
    pub fn has_engine(self) -> bool {
        !matches!(self, PlaybackState::Idle | PlaybackState::End)
    }
}

/// Operations guarded by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetDataSource,
    Prepare,
    PrepareAsync,
    Start,
    Pause,
    Stop,
    SeekTo,
    GetCurrentPosition,
    GetDuration,
    GetVideoWidth,
    GetVideoHeight,
    IsPlaying,
    SetVolume,
    SetLooping,
    SetAudioStreamType,
    Reset,
    Release,
}

/// What happens when an operation is issued outside its valid states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Caller bug: fail synchronously, state untouched
    Reject,
    /// Engine-level condition: move to `Error` and notify asynchronously
    Corrupt,
}

impl Operation {
    pub fn policy(self) -> FailurePolicy {
        use Operation::*;
        match self {
            SetDataSource | Prepare | PrepareAsync | SetVolume | SetLooping
            | SetAudioStreamType | Reset | Release => FailurePolicy::Reject,
            Start | Pause | Stop | SeekTo | GetCurrentPosition | GetDuration | GetVideoWidth
            | GetVideoHeight | IsPlaying => FailurePolicy::Corrupt,
        }
    }

    /// The state this operation moves the session to, if it changes it.
    pub fn target(self) -> Option<PlaybackState> {
        use Operation::*;
        match self {
            SetDataSource => Some(PlaybackState::Initialized),
            Prepare => Some(PlaybackState::Prepared),
            PrepareAsync => Some(PlaybackState::Preparing),
            Start => Some(PlaybackState::Started),
            Pause => Some(PlaybackState::Paused),
            Stop => Some(PlaybackState::Stopped),
            Reset => Some(PlaybackState::Idle),
            Release => Some(PlaybackState::End),
            _ => None,
        }
    }

    pub fn is_valid_in(self, state: PlaybackState) -> bool {
        use Operation::*;
        use PlaybackState as S;
        match self {
            SetDataSource => state == S::Idle,
            Prepare | PrepareAsync => matches!(state, S::Initialized | S::Stopped),
            Start => matches!(
                state,
                S::Prepared | S::Started | S::Paused | S::PlaybackCompleted
            ),
            Pause => matches!(state, S::Started | S::Paused),
            Stop => matches!(
                state,
                S::Prepared | S::Started | S::Paused | S::Stopped | S::PlaybackCompleted
            ),
            SeekTo => matches!(
                state,
                S::Prepared | S::Started | S::Paused | S::PlaybackCompleted
            ),
            GetCurrentPosition | GetVideoWidth | GetVideoHeight | IsPlaying => {
                !matches!(state, S::Error | S::End)
            }
            GetDuration => matches!(
                state,
                S::Prepared | S::Started | S::Paused | S::Stopped | S::PlaybackCompleted
            ),
            SetVolume | SetLooping | SetAudioStreamType => state.has_engine(),
            Reset => state != S::End,
            Release => true,
        }
    }
}

/// Outcome of validating an operation against the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Run the operation
    Proceed,
    /// Already in the target state, skip the engine call
    AlreadyThere,
    /// Fail synchronously with this error
    Reject(PlayerError),
    /// Move to `Error` and report asynchronously
    Corrupt,
}

/// Authoritative lifecycle state plus the transition rules
#[derive(Debug, Default)]
pub struct StateMachine {
    state: PlaybackState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn check(&self, op: Operation) -> Verdict {
        let state = self.state;

        // Nothing but release is legal once released, and there is no
        // engine or listener left to carry an asynchronous error.
        if state == PlaybackState::End && op != Operation::Release {
            return Verdict::Reject(PlayerError::InvalidState {
                operation: op,
                state,
            });
        }

        // Preparing is transient; seeking during it is a caller bug.
        if op == Operation::SeekTo && state == PlaybackState::Preparing {
            return Verdict::Reject(PlayerError::InvalidState {
                operation: op,
                state,
            });
        }

        if !op.is_valid_in(state) {
            return match op.policy() {
                FailurePolicy::Reject => Verdict::Reject(PlayerError::InvalidState {
                    operation: op,
                    state,
                }),
                FailurePolicy::Corrupt => Verdict::Corrupt,
            };
        }

        match op {
            Operation::Start | Operation::Pause | Operation::Stop
                if op.target() == Some(state) =>
            {
                Verdict::AlreadyThere
            }
            _ => Verdict::Proceed,
        }
    }

    pub fn transition(&mut self, to: PlaybackState) {
        if self.state != to {
            log::debug!("Playback state changed: {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(state: PlaybackState) -> StateMachine {
        let mut m = StateMachine::new();
        m.transition(state);
        m
    }

    #[test]
    fn test_new_machine_is_idle() {
        assert_eq!(StateMachine::new().state(), PlaybackState::Idle);
    }

    #[test]
    fn test_invalid_ops_never_have_a_third_outcome() {
        let ops = [
            Operation::SetDataSource,
            Operation::Prepare,
            Operation::PrepareAsync,
            Operation::Start,
            Operation::Pause,
            Operation::Stop,
            Operation::SeekTo,
            Operation::GetCurrentPosition,
            Operation::GetDuration,
            Operation::GetVideoWidth,
            Operation::GetVideoHeight,
            Operation::IsPlaying,
        ];
        for state in PlaybackState::ALL {
            if state == PlaybackState::End {
                continue;
            }
            for op in ops {
                if op.is_valid_in(state) {
                    continue;
                }
                let verdict = machine_in(state).check(op);
                match op.policy() {
                    FailurePolicy::Reject => {
                        assert!(matches!(verdict, Verdict::Reject(_)), "{op:?} in {state:?}")
                    }
                    FailurePolicy::Corrupt if op == Operation::SeekTo
                        && state == PlaybackState::Preparing =>
                    {
                        assert!(matches!(verdict, Verdict::Reject(_)))
                    }
                    FailurePolicy::Corrupt => {
                        assert_eq!(verdict, Verdict::Corrupt, "{op:?} in {state:?}")
                    }
                }
            }
        }
    }

    #[test]
    fn test_idempotent_transport_ops() {
        assert_eq!(
            machine_in(PlaybackState::Started).check(Operation::Start),
            Verdict::AlreadyThere
        );
        assert_eq!(
            machine_in(PlaybackState::Paused).check(Operation::Pause),
            Verdict::AlreadyThere
        );
        assert_eq!(
            machine_in(PlaybackState::Stopped).check(Operation::Stop),
            Verdict::AlreadyThere
        );
        assert_eq!(
            machine_in(PlaybackState::Paused).check(Operation::Start),
            Verdict::Proceed
        );
    }

    #[test]
    fn test_end_rejects_everything_but_release() {
        let m = machine_in(PlaybackState::End);
        assert!(matches!(m.check(Operation::Start), Verdict::Reject(_)));
        assert!(matches!(m.check(Operation::Reset), Verdict::Reject(_)));
        assert_eq!(m.check(Operation::Release), Verdict::Proceed);
    }

    #[test]
    fn test_reset_valid_everywhere_but_end() {
        for state in PlaybackState::ALL {
            assert_eq!(
                Operation::Reset.is_valid_in(state),
                state != PlaybackState::End
            );
        }
    }

    #[test]
    fn test_seek_while_preparing_is_rejected() {
        let verdict = machine_in(PlaybackState::Preparing).check(Operation::SeekTo);
        assert_eq!(
            verdict,
            Verdict::Reject(PlayerError::InvalidState {
                operation: Operation::SeekTo,
                state: PlaybackState::Preparing,
            })
        );
    }
}
