//! Resumable handler state machines.
//!
//! A handler that needs to wait returns a [`Continuation`]. The scheduler
//! resumes it with [`Resume::Start`] straight away; every time it returns
//! [`Step::Suspend`] the scheduler parks it on a timer or a reply
//! reservation and resumes it later with the outcome. A continuation never
//! resumes itself and nothing else runs while it executes.

use std::time::Duration;

use sector_protocol::{CorrelationId, Inbound, PacketKind, PlayerId};

/// Why a continuation is being resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// First run, right after the handler returned it.
    Start,
    /// A [`Suspension::Sleep`] elapsed.
    Woke,
    /// The awaited reply arrived.
    Reply(Inbound),
    /// A [`Suspension::AwaitPacket`] deadline passed with no reply.
    TimedOut,
}

/// Where a continuation wants to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suspension {
    /// Resume with [`Resume::Woke`] after this long.
    Sleep(Duration),
    /// Resume with [`Resume::Reply`] when `player` sends a `kind` packet
    /// carrying `correlation`, or with [`Resume::TimedOut`] after `timeout`.
    AwaitPacket {
        player: PlayerId,
        correlation: CorrelationId,
        kind: PacketKind,
        timeout: Duration,
    },
}

/// Result of one resumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Finished; the continuation is dropped.
    Complete,
    /// Park until the suspension resolves.
    Suspend(Suspension),
}

impl Step {
    pub fn sleep(d: Duration) -> Self {
        Self::Suspend(Suspension::Sleep(d))
    }

    pub fn await_packet(
        player: PlayerId,
        correlation: CorrelationId,
        kind: PacketKind,
        timeout: Duration,
    ) -> Self {
        Self::Suspend(Suspension::AwaitPacket {
            player,
            correlation,
            kind,
            timeout,
        })
    }
}

/// A suspended, resumable handler invocation over world state `L`.
pub trait Continuation<L>: Send {
    /// Runs until the next suspension point or completion.
    fn resume(&mut self, logic: &mut L, input: Resume) -> Step;

    /// Short name for logs.
    fn label(&self) -> &'static str;
}

/// What a handler produced.
pub enum Handled<L> {
    /// Ran to completion.
    Done,
    /// Continue as a continuation.
    Spawn(Box<dyn Continuation<L>>),
}

impl<L> Handled<L> {
    /// Boxes a continuation.
    pub fn spawn(c: impl Continuation<L> + 'static) -> Self {
        Self::Spawn(Box::new(c))
    }
}

impl<L> std::fmt::Debug for Handled<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Spawn(c) => write!(f, "Spawn({})", c.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nap;

    impl Continuation<()> for Nap {
        fn resume(&mut self, _: &mut (), input: Resume) -> Step {
            match input {
                Resume::Start => Step::sleep(Duration::from_secs(1)),
                _ => Step::Complete,
            }
        }

        fn label(&self) -> &'static str {
            "nap"
        }
    }

    #[test]
    fn test_handled_debug_shows_label() {
        assert_eq!(format!("{:?}", Handled::<()>::Done), "Done");
        assert_eq!(format!("{:?}", Handled::spawn(Nap)), "Spawn(nap)");
    }

    #[test]
    fn test_step_helpers_build_suspensions() {
        let mut nap = Nap;
        assert_eq!(
            nap.resume(&mut (), Resume::Start),
            Step::Suspend(Suspension::Sleep(Duration::from_secs(1)))
        );
        assert_eq!(nap.resume(&mut (), Resume::Woke), Step::Complete);
        assert_eq!(
            Step::await_packet(
                PlayerId(3),
                CorrelationId(9),
                PacketKind::This,
                Duration::from_secs(60)
            ),
            Step::Suspend(Suspension::AwaitPacket {
                player: PlayerId(3),
                correlation: CorrelationId(9),
                kind: PacketKind::This,
                timeout: Duration::from_secs(60),
            })
        );
    }
}
