//! Proof of work over event ids (NIP-13).
//!
//! # Algorithm
//!
//! ```text
//! tags += ["nonce", counter, target]
//! id    = sha256(canonical_json(event))
//! valid = leading_zero_bits(id) >= target
//! ```
//!
//! Mining is the only unbounded operation in the crate. It refuses to run
//! without a deadline unless the caller opts in, checks cancellation and the
//! deadline on every iteration, and should run off latency-sensitive threads
//! (see [`mine_async`]).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::nostr::canonical::EventId;
use crate::nostr::error::{NostrError, Result};
use crate::nostr::event::{Event, UnsignedEvent};
use crate::nostr::tags::{Tag, TagBuilder};
use crate::nostr::time::{Clock, SystemClock};

/// Highest possible difficulty: every bit of a 32-byte id is zero.
pub const MAX_DIFFICULTY: u16 = 256;

/// Default number of iterations between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

const NONCE_TAG: &str = "nonce";

/// Counts the leading zero bits of an event id, read as a big-endian bit
/// string.
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::EventId;
/// use haven_protocol::nostr::pow::difficulty;
///
/// let id = EventId::from_hex(
///     "000006d8c378af1779d2feebc7603a125d99eca0ccf1085959b307f64e5dd358",
/// )
/// .unwrap();
/// assert_eq!(difficulty(&id), 21);
/// ```
#[must_use]
pub fn difficulty(id: &EventId) -> u16 {
    let mut bits: u32 = 0;
    for &byte in id.as_bytes() {
        if byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    u16::try_from(bits).unwrap_or(MAX_DIFFICULTY)
}

/// Shared flag used to stop a running miner.
///
/// Clones share the flag, so one clone can be handed to the miner and
/// another kept by the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The miner stops before its next iteration.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Snapshot passed to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningProgress {
    /// Ids computed so far.
    pub iterations: u64,
    /// Time since mining started.
    pub elapsed: Duration,
    /// Highest difficulty seen so far.
    pub best_difficulty: u16,
}

/// Progress observer callback.
pub type ProgressFn = Arc<dyn Fn(&MiningProgress) + Send + Sync>;

/// Parameters for [`mine`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use haven_protocol::nostr::pow::{CancellationToken, MiningOptions};
///
/// let cancel = CancellationToken::new();
/// let options = MiningOptions::new(16)
///     .with_timeout(Duration::from_secs(30))
///     .with_cancel(cancel.clone());
/// assert_eq!(options.target_difficulty, 16);
/// ```
#[derive(Clone)]
pub struct MiningOptions {
    /// Required number of leading zero bits (0..=256).
    pub target_difficulty: u16,
    /// Give up with [`NostrError::MiningTimeout`] once this instant passes.
    pub deadline: Option<Instant>,
    /// Must be set to mine without a deadline.
    pub allow_unbounded: bool,
    /// Checked on every iteration.
    pub cancel: Option<CancellationToken>,
    /// Called every `progress_interval` iterations.
    pub progress: Option<ProgressFn>,
    /// Iterations between progress reports.
    pub progress_interval: u64,
}

impl MiningOptions {
    /// Options with the given target, no deadline and no observers.
    ///
    /// A deadline or [`unbounded`](Self::unbounded) must be added before
    /// mining.
    #[must_use]
    pub fn new(target_difficulty: u16) -> Self {
        Self {
            target_difficulty,
            deadline: None,
            allow_unbounded: false,
            cancel: None,
            progress: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline `timeout` from now.
    ///
    /// A timeout too large to represent as an [`Instant`] (such as
    /// [`Duration::MAX`]) means no deadline and implies
    /// [`unbounded`](Self::unbounded).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => {
                self.deadline = None;
                self.allow_unbounded = true;
                self
            }
        }
    }

    /// Allows mining to run with no deadline.
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.allow_unbounded = true;
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Attaches a progress observer called every `interval` iterations.
    #[must_use]
    pub fn with_progress<F>(mut self, interval: u64, observer: F) -> Self
    where
        F: Fn(&MiningProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(observer));
        self.progress_interval = interval;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.target_difficulty > MAX_DIFFICULTY {
            return Err(NostrError::InvalidArgument(format!(
                "target difficulty {} exceeds maximum {MAX_DIFFICULTY}",
                self.target_difficulty
            )));
        }
        if self.deadline.is_none() && !self.allow_unbounded {
            return Err(NostrError::InvalidArgument(
                "mining requires a deadline unless unbounded mining is allowed".to_string(),
            ));
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

impl fmt::Debug for MiningOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiningOptions")
            .field("target_difficulty", &self.target_difficulty)
            .field("deadline", &self.deadline)
            .field("allow_unbounded", &self.allow_unbounded)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

/// Searches for a nonce that gives `event` an id with at least
/// `options.target_difficulty` leading zero bits.
///
/// Any existing `nonce` tag is replaced by `["nonce", counter, target]`. The
/// input is not modified; on success the returned event carries the winning
/// nonce and can be signed directly.
///
/// # Errors
///
/// - [`NostrError::InvalidArgument`] if the target exceeds 256 or no
///   deadline was given without opting into unbounded mining
/// - [`NostrError::MiningTimeout`] if the deadline passes first, including a
///   deadline that has already passed when mining starts
/// - [`NostrError::MiningCancelled`] if the cancellation token fires
pub fn mine(event: &UnsignedEvent, options: &MiningOptions) -> Result<UnsignedEvent> {
    mine_with_clock(event, options, &SystemClock)
}

/// [`mine`] with an injected clock for deadline checks.
///
/// # Errors
///
/// Same as [`mine`].
pub fn mine_with_clock(
    event: &UnsignedEvent,
    options: &MiningOptions,
    clock: &dyn Clock,
) -> Result<UnsignedEvent> {
    mine_until(event, options, clock, None)
}

/// The mining loop. `abandoned` is an extra stop flag owned by the caller
/// that is checked alongside the token in `options`.
fn mine_until(
    event: &UnsignedEvent,
    options: &MiningOptions,
    clock: &dyn Clock,
    abandoned: Option<&CancellationToken>,
) -> Result<UnsignedEvent> {
    options.validate()?;

    let started = clock.instant();
    if options.deadline.is_some_and(|deadline| started >= deadline) {
        tracing::debug!("mining deadline already passed");
        return Err(NostrError::MiningTimeout);
    }

    let target = options.target_difficulty;
    let mut working = event.clone();
    working.tags.retain(|tag| !is_nonce_tag(tag));
    working.tags.push(TagBuilder::nonce_tag(0, target));
    let nonce_index = working.tags.len() - 1;

    let interval = options.progress_interval.max(1);
    let mut best_difficulty = 0u16;
    let mut iterations = 0u64;

    tracing::debug!(target_difficulty = target, "mining started");

    loop {
        if options.is_cancelled() || abandoned.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(iterations, "mining cancelled");
            return Err(NostrError::MiningCancelled);
        }
        let now = clock.instant();
        if options.deadline.is_some_and(|deadline| now >= deadline) {
            tracing::debug!(
                iterations,
                elapsed_ms = now.saturating_duration_since(started).as_millis(),
                best_difficulty,
                "mining timed out"
            );
            return Err(NostrError::MiningTimeout);
        }

        working.tags[nonce_index][1] = iterations.to_string();
        let found = difficulty(&working.compute_id()?);
        best_difficulty = best_difficulty.max(found);
        iterations += 1;

        if found >= target {
            tracing::debug!(
                iterations,
                elapsed_ms = now.saturating_duration_since(started).as_millis(),
                difficulty = found,
                "mining succeeded"
            );
            return Ok(working);
        }

        if iterations % interval == 0 {
            let progress = MiningProgress {
                iterations,
                elapsed: clock.instant().saturating_duration_since(started),
                best_difficulty,
            };
            tracing::trace!(iterations, best_difficulty, "mining progress");
            if let Some(observer) = &options.progress {
                observer(&progress);
            }
        }

        if iterations == u64::MAX {
            return Err(NostrError::Internal("nonce space exhausted".to_string()));
        }
    }
}

/// Cancels the wrapped token when dropped.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Runs [`mine`] on tokio's blocking thread pool.
///
/// Dropping the returned future (for example when it loses a
/// `tokio::select!` or a `tokio::time::timeout`) stops the search before its
/// next iteration, as if the options' [`CancellationToken`] had fired.
///
/// # Errors
///
/// Same as [`mine`], plus [`NostrError::Internal`] if the blocking task
/// panics or is aborted.
pub async fn mine_async(event: UnsignedEvent, options: MiningOptions) -> Result<UnsignedEvent> {
    let abandoned = CancellationToken::new();
    let _stop_on_drop = CancelOnDrop(abandoned.clone());

    tokio::task::spawn_blocking(move || {
        mine_until(&event, &options, &SystemClock, Some(&abandoned))
    })
    .await
    .map_err(|e| NostrError::Internal(format!("mining task failed: {e}")))?
}

/// Returns `true` if the event's recomputed id has at least `min_difficulty`
/// leading zero bits.
#[must_use]
pub fn verify_proof_of_work(event: &UnsignedEvent, min_difficulty: u16) -> bool {
    event
        .compute_id()
        .is_ok_and(|id| difficulty(&id) >= min_difficulty)
}

/// Like [`verify_proof_of_work`] for a signed event. The stored id is not
/// trusted; it is recomputed from the fields.
#[must_use]
pub fn verify_event_proof_of_work(event: &Event, min_difficulty: u16) -> bool {
    EventId::compute(
        &event.pubkey(),
        event.created_at(),
        event.kind(),
        event.tags(),
        event.content(),
    )
    .is_ok_and(|id| difficulty(&id) >= min_difficulty)
}

/// Reads the target committed in the third element of the `nonce` tag.
///
/// Returns `None` if there is no nonce tag or it carries no parseable
/// target.
#[must_use]
pub fn committed_difficulty(tags: &[Tag]) -> Option<u16> {
    TagBuilder::find(tags, NONCE_TAG)
        .and_then(|tag| tag.get(2))
        .and_then(|target| target.parse().ok())
}

fn is_nonce_tag(tag: &Tag) -> bool {
    tag.first().is_some_and(|name| name == NONCE_TAG)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    use super::*;
    use crate::nostr::keys::Keypair;
    use crate::nostr::kind::Kind;
    use crate::nostr::time::Timestamp;

    /// Monotonic time advances one second on every read.
    struct SteppingClock {
        origin: Instant,
        reads: AtomicU64,
    }

    impl SteppingClock {
        fn new() -> Self {
            Self {
                origin: Instant::now(),
                reads: AtomicU64::new(0),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_secs(0)
        }

        fn instant(&self) -> Instant {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            self.origin + Duration::from_secs(n)
        }
    }

    fn draft() -> UnsignedEvent {
        let keys = Keypair::from_secret_bytes([0x11; 32]).unwrap();
        UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from_secs(1_700_000_000),
            Kind::TEXT_NOTE,
            vec![vec!["t".to_string(), "pow".to_string()]],
            "It's just me mining my own business",
        )
    }

    fn id_with_first_bytes(prefix: &[u8]) -> EventId {
        let mut bytes = [0xff; 32];
        bytes[..prefix.len()].copy_from_slice(prefix);
        EventId::from_bytes(bytes)
    }

    // --- difficulty ---

    #[test]
    fn difficulty_reference_vector() {
        let id = EventId::from_hex(
            "000006d8c378af1779d2feebc7603a125d99eca0ccf1085959b307f64e5dd358",
        )
        .unwrap();
        assert_eq!(difficulty(&id), 21);
    }

    #[test]
    fn difficulty_counts_bits_not_bytes() {
        assert_eq!(difficulty(&id_with_first_bytes(&[0x80])), 0);
        assert_eq!(difficulty(&id_with_first_bytes(&[0x01])), 7);
        assert_eq!(difficulty(&id_with_first_bytes(&[0x00, 0x20])), 10);
        assert_eq!(difficulty(&id_with_first_bytes(&[0x00, 0x00, 0x0f])), 20);
    }

    #[test]
    fn difficulty_of_zero_id_is_256() {
        assert_eq!(difficulty(&EventId::from_bytes([0u8; 32])), MAX_DIFFICULTY);
    }

    #[test]
    fn event_id_difficulty_matches_free_function() {
        let id = id_with_first_bytes(&[0x00, 0x03]);
        assert_eq!(id.difficulty(), difficulty(&id));
    }

    // --- option validation ---

    #[test]
    fn rejects_target_above_256() {
        let options = MiningOptions::new(257).unbounded();
        assert!(matches!(
            mine(&draft(), &options),
            Err(NostrError::InvalidArgument(_))
        ));
    }

    #[test]
    fn requires_deadline_or_opt_in() {
        let options = MiningOptions::new(1);
        assert!(matches!(
            mine(&draft(), &options),
            Err(NostrError::InvalidArgument(_))
        ));
        assert!(mine(&draft(), &options.unbounded()).is_ok());
    }

    #[test]
    fn elapsed_deadline_fails_without_iterating() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let options = MiningOptions::new(0)
            .with_deadline(Instant::now())
            .with_progress(1, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        // Target 0 would succeed on the first iteration if one ran.
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            mine(&draft(), &options),
            Err(NostrError::MiningTimeout)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn timeout_sets_deadline() {
        let before = Instant::now();
        let options = MiningOptions::new(1).with_timeout(Duration::from_secs(5));
        assert!(options.deadline.is_some_and(|deadline| deadline > before));
        assert!(!options.allow_unbounded);
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let options = MiningOptions::new(1).with_timeout(Duration::MAX);
        assert_eq!(options.deadline, None);
        assert!(options.allow_unbounded);
        assert!(mine(&draft(), &options).is_ok());
    }

    // --- mining ---

    #[test]
    fn mines_to_target() {
        let options = MiningOptions::new(8).with_timeout(Duration::from_secs(60));
        let mined = mine(&draft(), &options).unwrap();

        assert!(mined.compute_id().unwrap().difficulty() >= 8);
        assert!(verify_proof_of_work(&mined, 8));
        assert_eq!(committed_difficulty(&mined.tags), Some(8));
    }

    #[test]
    fn mining_preserves_other_fields() {
        let original = draft();
        let options = MiningOptions::new(4).with_timeout(Duration::from_secs(60));
        let mined = mine(&original, &options).unwrap();

        assert_eq!(mined.pubkey, original.pubkey);
        assert_eq!(mined.created_at, original.created_at);
        assert_eq!(mined.kind, original.kind);
        assert_eq!(mined.content, original.content);
        assert_eq!(mined.tags[0], original.tags[0]);
        assert_eq!(original.tags.len(), 1);
    }

    #[test]
    fn replaces_existing_nonce_tag() {
        let mut event = draft();
        event.tags.push(TagBuilder::nonce_tag(999, 30));
        let options = MiningOptions::new(2).with_timeout(Duration::from_secs(60));
        let mined = mine(&event, &options).unwrap();

        let nonce_tags = mined.tags.iter().filter(|tag| is_nonce_tag(tag)).count();
        assert_eq!(nonce_tags, 1);
        assert_eq!(committed_difficulty(&mined.tags), Some(2));
    }

    #[test]
    fn signed_mined_event_keeps_difficulty() {
        let keys = Keypair::from_secret_bytes([0x11; 32]).unwrap();
        let options = MiningOptions::new(6).with_timeout(Duration::from_secs(60));
        let event = mine(&draft(), &options).unwrap().sign(&keys).unwrap();

        assert!(event.verify());
        assert!(event.id().difficulty() >= 6);
        assert!(verify_event_proof_of_work(&event, 6));
    }

    #[test]
    fn deadline_checked_between_iterations() {
        // Each clock read advances one second: start, then one read per loop.
        let clock = SteppingClock::new();
        let deadline = clock.origin + Duration::from_secs(3);
        let options = MiningOptions::new(MAX_DIFFICULTY).with_deadline(deadline);

        assert!(matches!(
            mine_with_clock(&draft(), &options, &clock),
            Err(NostrError::MiningTimeout)
        ));
        assert!(clock.reads.load(Ordering::SeqCst) <= 5);
    }

    #[test]
    fn cancellation_stops_mining() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let options = MiningOptions::new(MAX_DIFFICULTY)
            .unbounded()
            .with_cancel(cancel)
            .with_progress(10, move |progress| {
                if progress.iterations >= 50 {
                    trigger.cancel();
                }
            });

        assert!(matches!(
            mine(&draft(), &options),
            Err(NostrError::MiningCancelled)
        ));
    }

    #[test]
    fn abandoned_flag_stops_mining() {
        let abandoned = CancellationToken::new();
        abandoned.cancel();
        let options = MiningOptions::new(0).unbounded();
        assert!(matches!(
            mine_until(&draft(), &options, &SystemClock, Some(&abandoned)),
            Err(NostrError::MiningCancelled)
        ));
    }

    #[test]
    fn pre_cancelled_token_stops_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = MiningOptions::new(0).unbounded().with_cancel(cancel);
        assert!(matches!(
            mine(&draft(), &options),
            Err(NostrError::MiningCancelled)
        ));
    }

    #[test]
    fn progress_reports_are_monotonic() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let options = MiningOptions::new(MAX_DIFFICULTY)
            .with_timeout(Duration::from_secs(60))
            .with_cancel(cancel)
            .with_progress(25, move |progress| {
                let mut reports = sink.lock().unwrap();
                reports.push(*progress);
                if reports.len() == 4 {
                    trigger.cancel();
                }
            });

        let _ = mine(&draft(), &options);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 4);
        let iterations: Vec<u64> = reports.iter().map(|p| p.iterations).collect();
        assert_eq!(iterations, vec![25, 50, 75, 100]);
        assert!(reports.windows(2).all(|w| w[0].best_difficulty <= w[1].best_difficulty));
    }

    // --- verification helpers ---

    #[test]
    fn verify_rejects_insufficient_difficulty() {
        let options = MiningOptions::new(4).with_timeout(Duration::from_secs(60));
        let mined = mine(&draft(), &options).unwrap();
        let achieved = mined.compute_id().unwrap().difficulty();

        assert!(verify_proof_of_work(&mined, achieved));
        assert!(!verify_proof_of_work(&mined, achieved + 1));
    }

    #[test]
    fn verify_is_pure() {
        let event = draft();
        let before = event.clone();
        let _ = verify_proof_of_work(&event, 1);
        assert_eq!(event, before);
    }

    #[test]
    fn committed_difficulty_handles_missing_or_garbage() {
        assert_eq!(committed_difficulty(&[]), None);
        let tags = vec![vec!["nonce".to_string(), "5".to_string()]];
        assert_eq!(committed_difficulty(&tags), None);
        let tags = vec![vec![
            "nonce".to_string(),
            "5".to_string(),
            "lots".to_string(),
        ]];
        assert_eq!(committed_difficulty(&tags), None);
    }

    #[test]
    fn options_debug_hides_callback() {
        let options = MiningOptions::new(3)
            .unbounded()
            .with_progress(1, |_| {});
        let debug_output = format!("{options:?}");
        assert!(debug_output.contains("target_difficulty: 3"));
        assert!(debug_output.contains("progress: true"));
    }
}
