/// Lifecycle of a [`ReconstructionSession`](crate::ReconstructionSession).
///
/// `Recording → Stopped → Finalizing → Finalized`. A failed finalize goes
/// back to `Stopped`; `resume` reopens recording from `Stopped` or
/// `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Recording,
    Stopped,
    Finalizing,
    Finalized,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Recording => "recording",
            SessionState::Stopped => "stopped",
            SessionState::Finalizing => "finalizing",
            SessionState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Notifications delivered through
/// [`ReconstructionSession::subscribe`](crate::ReconstructionSession::subscribe).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A frame's points were appended to the session cloud. `frame` is the
    /// arrival index.
    FrameIntegrated {
        frame: u64,
        points_added: usize,
        total_points: usize,
    },
    /// A frame could not be processed and was dropped.
    FrameSkipped { frame: u64, reason: String },
    FinalizeStarted { points: usize, frames: usize },
    /// Finalize progress in `[0, 1]`, non-decreasing within one pass.
    Progress(f32),
    Finalized { vertices: usize, triangles: usize },
    FinalizeFailed { error: String },
}
