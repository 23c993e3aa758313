//! Concurrency-bounded execution of one grading job per submission.
//!
//! Every job runs inside the calling task (`join_all`), so each one gets an
//! exclusive `&mut Submission` without locking. A semaphore caps how many
//! jobs are past their start gate at once, and job `i` waits
//! `wave_delay * (i / K)` before even asking for a slot, so requests leave
//! in waves of `K`.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::error;

use crate::llm::CompletionSender;
use crate::ui::RoundProgress;

use super::grader::Grader;
use super::submission::Submission;

#[derive(Debug, Clone)]
pub struct BoundedDispatcher {
    concurrency: usize,
    wave_delay: Duration,
}

impl BoundedDispatcher {
    /// `concurrency` is clamped to at least one slot.
    pub fn new(concurrency: usize, wave_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            wave_delay,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Start delay of the `index`-th submission.
    pub fn start_delay(&self, index: usize) -> Duration {
        self.wave_delay * (index / self.concurrency) as u32
    }

    /// Grade every submission once for `round`. Returns how many gained a
    /// result. Returns only after every job has finished.
    pub async fn dispatch<S: CompletionSender>(
        &self,
        grader: &Grader<S>,
        submissions: &mut [Submission],
        round: u32,
        progress: &RoundProgress,
    ) -> usize {
        let slots = Semaphore::new(self.concurrency);

        let jobs = submissions.iter_mut().enumerate().map(|(i, submission)| {
            let slots = &slots;
            let delay = self.start_delay(i);
            async move {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                let Ok(_permit) = slots.acquire().await else {
                    error!(student = %submission.name, "dispatcher slots closed");
                    return false;
                };

                let name = submission.name.clone();
                let graded = match AssertUnwindSafe(grader.grade(submission, round))
                    .catch_unwind()
                    .await
                {
                    Ok(graded) => graded,
                    Err(panic) => {
                        error!(student = %name, round, "grading job panicked: {}", panic_message(&*panic));
                        false
                    }
                };
                progress.job_done(&name, graded);
                graded
            }
        });

        join_all(jobs).await.into_iter().filter(|graded| *graded).count()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use crate::grading::grader::tests::{renderer, submission};
    use crate::llm::transport::tests::LONG_REPLY;
    use crate::llm::types::ChatRequest;
    use crate::llm::{LlmError, RetryPolicy, RetryingTransport};

    /// Answers after a fixed delay, recording concurrency and call times.
    struct SlowSender {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<Duration>>,
        origin: Instant,
        /// Calls with these 1-based sequence numbers panic.
        panic_on: Vec<usize>,
        calls: AtomicUsize,
        /// Calls with these sequence numbers fail.
        fail_on: Vec<usize>,
    }

    impl SlowSender {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
                origin: Instant::now(),
                panic_on: Vec::new(),
                calls: AtomicUsize::new(0),
                fail_on: Vec::new(),
            }
        }
    }

    impl CompletionSender for SlowSender {
        async fn send_completion(
            &self,
            _req: &ChatRequest,
            _timeout: Duration,
        ) -> Result<String, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on.contains(&call) {
                panic!("sender exploded on call {call}");
            }
            self.started.lock().unwrap().push(self.origin.elapsed());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(500)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                Err(LlmError::ApiError {
                    status: 400,
                    message: "bad request".into(),
                })
            } else {
                Ok(LONG_REPLY.to_string())
            }
        }
    }

    fn grader(sender: SlowSender) -> Grader<SlowSender> {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let transport = RetryingTransport::new(
            sender,
            vec!["m".into()],
            "system".into(),
            100,
            0.0,
            policy,
        );
        Grader::new(transport, renderer())
    }

    fn submissions(n: usize) -> Vec<Submission> {
        (0..n).map(|i| submission(&format!("Student{i}"))).collect()
    }

    #[test]
    fn start_delay_follows_waves() {
        let d = BoundedDispatcher::new(2, Duration::from_secs(2));
        let delays: Vec<u64> = (0..5).map(|i| d.start_delay(i).as_secs()).collect();
        assert_eq!(delays, vec![0, 0, 2, 2, 4]);
        assert_eq!(BoundedDispatcher::new(0, Duration::ZERO).concurrency(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_concurrency() {
        let g = grader(SlowSender::new());
        let mut subs = submissions(10);
        let d = BoundedDispatcher::new(3, Duration::ZERO);

        let graded = d.dispatch(&g, &mut subs, 1, &RoundProgress::hidden()).await;

        assert_eq!(graded, 10);
        let sender = g.transport().sender();
        assert_eq!(sender.peak.load(Ordering::SeqCst), 3);
        assert_eq!(sender.in_flight.load(Ordering::SeqCst), 0);
        assert!(subs.iter().all(|s| s.history().len() == 1 && s.api_calls == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn waves_start_staggered() {
        let g = grader(SlowSender::new());
        let mut subs = submissions(5);
        let d = BoundedDispatcher::new(2, Duration::from_secs(2));

        d.dispatch(&g, &mut subs, 1, &RoundProgress::hidden()).await;

        let mut started: Vec<u64> = g
            .transport()
            .sender()
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_secs())
            .collect();
        started.sort_unstable();
        assert_eq!(started, vec![0, 0, 2, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_does_not_affect_siblings() {
        let mut sender = SlowSender::new();
        sender.panic_on = vec![2];
        let g = grader(sender);
        let mut subs = submissions(4);
        let d = BoundedDispatcher::new(4, Duration::ZERO);

        let graded = d.dispatch(&g, &mut subs, 1, &RoundProgress::hidden()).await;

        assert_eq!(graded, 3);
        let without_result: Vec<&str> = subs
            .iter()
            .filter(|s| s.history().is_empty())
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(without_result.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_leave_submission_untouched() {
        let mut sender = SlowSender::new();
        sender.fail_on = vec![1, 3];
        let g = grader(sender);
        let mut subs = submissions(3);
        let d = BoundedDispatcher::new(1, Duration::ZERO);
        let progress = RoundProgress::hidden();

        let graded = d.dispatch(&g, &mut subs, 4, &progress).await;

        assert_eq!(graded, 1);
        assert_eq!(progress.position(), 3);
        assert!(subs[0].history().is_empty());
        assert_eq!(subs[1].history()[0].round, 4);
        assert!(subs[2].history().is_empty());
        assert!(subs.iter().all(|s| s.api_calls == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_returns_immediately() {
        let g = grader(SlowSender::new());
        let d = BoundedDispatcher::new(2, Duration::from_secs(2));
        assert_eq!(d.dispatch(&g, &mut [], 1, &RoundProgress::hidden()).await, 0);
    }
}
