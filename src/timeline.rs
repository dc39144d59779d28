//! # Session timeline
//! Submits user messages into a [`Session`] and schedules the paced bot reply.
//!
//! Messages land in completion order: the user message immediately, each bot
//! reply when its delay elapses. Replies are tied to their originating user
//! message through the [`PendingReply`] handle and never coalesced.

use std::sync::Arc;
use std::time::Duration;

use metrics::{gauge, histogram};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::classifier::Verdict;
use crate::engine::TriageEngine;
use crate::error::TriageError;
use crate::random::RandomSource;
use crate::scheduler::{Clock, Scheduler, SystemClock};
use crate::session::{Message, Session, SessionRegistry};

/// Reference "typing" window.
pub const TYPING_MIN: Duration = Duration::from_millis(1000);
pub const TYPING_MAX: Duration = Duration::from_millis(3000);

/// Bounds of the uniformly drawn reply delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Inverted bounds are swapped.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn typing() -> Self {
        Self::new(TYPING_MIN, TYPING_MAX)
    }

    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    fn draw(&self, rng: &dyn RandomSource) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let span = self.max - self.min;
        self.min + span.mul_f64(rng.fraction().clamp(0.0, 1.0))
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::typing()
    }
}

/// Result of [`Timeline::submit`]: the appended user message and the handle
/// of its scheduled reply.
#[derive(Debug)]
pub struct Submission {
    pub user_message: Message,
    pub pending: PendingReply,
}

/// A scheduled, not yet appended bot reply.
///
/// Dropping the handle detaches it; the reply still lands. Use
/// [`PendingReply::cancel`] to drop the reply instead.
#[derive(Debug)]
pub struct PendingReply {
    in_reply_to: Uuid,
    verdict: Verdict,
    delay: Duration,
    handle: JoinHandle<Message>,
}

impl PendingReply {
    /// Id of the user message this reply answers.
    pub fn in_reply_to(&self) -> Uuid {
        self.in_reply_to
    }

    /// Verdict captured at submission; the reply is selected under it.
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the reply to be appended and return it.
    pub async fn resolve(self) -> Result<Message, TriageError> {
        match self.handle.await {
            Ok(message) => Ok(message),
            Err(e) if e.is_cancelled() => Err(TriageError::Cancelled),
            Err(e) => {
                error!(target: "triage", reply_to = %self.in_reply_to, error = %e, "reply task failed");
                Err(TriageError::internal("reply task failed"))
            }
        }
    }

    /// Drop the scheduled reply. Returns true if it was stopped before being
    /// appended, false if it had already landed. Never appends partially.
    pub async fn cancel(self) -> bool {
        self.handle.abort();
        match self.handle.await {
            Err(e) if e.is_cancelled() => {
                debug!(target: "triage", reply_to = %self.in_reply_to, "pending reply cancelled");
                true
            }
            _ => false,
        }
    }
}

/// Decrements the session's pending count when the reply task ends, whether
/// it completed or was aborted.
struct PendingGuard(Arc<Session>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.reply_settled();
        gauge!("triage_pending_replies").decrement(1.0);
    }
}

#[derive(Clone)]
pub struct Timeline {
    engine: Arc<TriageEngine>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    pacing: Pacing,
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("engine", &self.engine)
            .field("pacing", &self.pacing)
            .finish()
    }
}

impl Timeline {
    pub fn new(engine: Arc<TriageEngine>, scheduler: Arc<dyn Scheduler>, pacing: Pacing) -> Self {
        Self {
            engine,
            scheduler,
            clock: Arc::new(SystemClock),
            pacing,
        }
    }

    /// Builder: replace the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch or create the session for `user_id`. A new session opens with
    /// the policy greeting.
    pub fn open_session(&self, registry: &SessionRegistry, user_id: Option<&str>) -> Arc<Session> {
        registry.get_or_create_with(user_id, |s| {
            s.append(Message::bot(self.engine.policy().greeting(), self.clock.now()));
            info!(target: "triage", session = s.id(), "session opened");
        })
    }

    /// Append the user message and schedule its reply.
    ///
    /// Rejects blank text with [`TriageError::InvalidInput`] without touching
    /// the session. Must be called inside a tokio runtime.
    pub fn submit(&self, session: &Arc<Session>, text: &str) -> Result<Submission, TriageError> {
        if text.trim().is_empty() {
            return Err(TriageError::invalid_input("Message is required"));
        }

        let verdict = self.engine.classify(text);
        let user_message = Message::user(text, self.clock.now(), verdict.user_label());
        session.append(user_message.clone());

        let delay = self.pacing.draw(self.engine.random());
        histogram!("triage_reply_delay_ms").record(delay.as_secs_f64() * 1000.0);

        session.reply_scheduled();
        gauge!("triage_pending_replies").increment(1.0);
        let guard = PendingGuard(session.clone());

        // Registered now so the scheduler sees requests in submission order.
        let sleep = self.scheduler.sleep(delay);
        let engine = self.engine.clone();
        let clock = self.clock.clone();
        let target = session.clone();
        let captured = verdict.clone();
        let body = text.to_owned();
        let reply_to = user_message.id;

        let handle = tokio::spawn(async move {
            let _guard = guard;
            sleep.await;
            let reply = engine.reply_for(&body, &captured);
            let bot = Message::bot_reply(reply.text, clock.now(), captured.classification(), reply_to);
            target.append(bot.clone());
            debug!(
                target: "triage",
                session = target.id(),
                reply_to = %reply_to,
                kind = %reply.kind,
                "bot reply appended"
            );
            bot
        });

        Ok(Submission {
            user_message,
            pending: PendingReply {
                in_reply_to: reply_to,
                verdict,
                delay,
                handle,
            },
        })
    }

    /// One submit + resolve pair, as the request/response boundary uses it.
    pub async fn exchange(
        &self,
        session: &Arc<Session>,
        text: &str,
    ) -> Result<(Message, Message), TriageError> {
        let Submission {
            user_message,
            pending,
        } = self.submit(session, text)?;
        let bot = pending.resolve().await?;
        Ok((user_message, bot))
    }
}
