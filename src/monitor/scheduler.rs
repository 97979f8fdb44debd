use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::{
    MonitorError,
    contracts::EventKind,
    job::{JobQueue, JobSpec, JobType},
    monitor::producer::Producer,
    store::Store,
    types::{Disposition, PersistedEvent},
};

/// Tally of one schedule sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub scheduled: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl ScheduleReport {
    /// Number of events the sweep settled or retried.
    #[must_use]
    pub fn swept(&self) -> usize {
        self.scheduled + self.ignored + self.failed
    }

    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Scheduled(_) => self.scheduled += 1,
            Disposition::Ignored => self.ignored += 1,
            Disposition::Failed => self.failed += 1,
        }
    }
}

/// Jobs seen during one sweep.
#[derive(Debug, Default)]
struct SweepBatch {
    /// Jobs the queue accepted or already knew.
    settled: Vec<JobSpec>,
    /// Jobs that were rejected or never submitted.
    unsettled: Vec<JobSpec>,
}

impl SweepBatch {
    /// True when `event` changes the supply of an offering whose announcement is unsettled.
    ///
    /// Such an event has to wait for the announcement, otherwise its supply job would point at
    /// an offering id the queue never receives.
    fn awaits_announcement(&self, event: &PersistedEvent) -> bool {
        let changes_supply = matches!(
            event.event.kind(),
            Some(
                EventKind::ChannelCreated
                    | EventKind::CooperativeChannelClose
                    | EventKind::UnCooperativeChannelClose
            )
        );
        changes_supply
            && event.event.topic(3).is_some_and(|offering_hash| {
                self.unsettled.iter().any(|job| job.announced_offering(offering_hash).is_some())
            })
    }
}

/// Turns stored events into jobs and records how each one was settled.
pub struct Scheduler<S, Q> {
    pub(crate) store: Arc<S>,
    pub(crate) queue: Arc<Q>,
    pub(crate) producer: Producer<S, Q>,
    pub(crate) cycle_timeout: Duration,
    pub(crate) cancel: CancellationToken,
}

impl<S: Store, Q: JobQueue> Scheduler<S, Q> {
    /// Runs one sweep over the events that have no job reference yet.
    ///
    /// Every event leaves the sweep either with a job reference (a job id or the ignored
    /// marker) or with its failure counter incremented. Reading the events, producing jobs and
    /// submitting them share `cycle_timeout`. Recording an outcome always runs to completion.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::Store`] when the store cannot be read or updated.
    /// * [`MonitorError::CycleTimeout`] when the sweep runs out of time. The event being
    ///   submitted at that point is counted as failed.
    /// * [`MonitorError::Cancelled`] when the monitor stops while a job is being submitted.
    ///
    /// Events settled before the error stay settled.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn schedule_once(&self) -> Result<ScheduleReport, MonitorError> {
        let deadline = Instant::now() + self.cycle_timeout;
        let events = timeout_at(deadline, self.store.unscheduled_events())
            .await
            .map_err(|_| MonitorError::CycleTimeout)??;
        let mut report = ScheduleReport::default();
        let mut batch = SweepBatch::default();

        for event in events {
            if self.cancel.is_cancelled() {
                debug!("Schedule sweep interrupted");
                break;
            }

            let disposition = if batch.awaits_announcement(&event) {
                debug!(event_id = %event.id, "Offering announcement not queued yet");
                Disposition::Failed
            } else {
                match self.settle_before(deadline, &event, &mut batch).await {
                    Err(MonitorError::CycleTimeout) => {
                        error!(event_id = %event.id, "Schedule sweep timed out");
                        self.store.dispose_event(event.id, Disposition::Failed).await?;
                        return Err(MonitorError::CycleTimeout);
                    }
                    result => result?,
                }
            };

            self.store.dispose_event(event.id, disposition).await?;
            report.record(disposition);
        }

        if report.swept() > 0 {
            debug!(
                scheduled = report.scheduled,
                ignored = report.ignored,
                failed = report.failed,
                "Schedule sweep finished"
            );
        }
        Ok(report)
    }

    /// Produces and submits the jobs of `event`, bounded by `deadline` and by cancellation.
    async fn settle_before(
        &self,
        deadline: Instant,
        event: &PersistedEvent,
        batch: &mut SweepBatch,
    ) -> Result<Disposition, MonitorError> {
        let settle = timeout_at(deadline, self.settle(event, batch));
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(MonitorError::Cancelled),
            result = settle => result.map_err(|_| MonitorError::CycleTimeout)?,
        }
    }

    async fn settle(
        &self,
        event: &PersistedEvent,
        batch: &mut SweepBatch,
    ) -> Result<Disposition, MonitorError> {
        let mut jobs = match self.producer.produce(event, &batch.settled).await {
            Ok(jobs) => jobs,
            Err(MonitorError::Payload(e)) => {
                error!(event_id = %event.id, error = %e, "Failed to encode job payload");
                return Ok(Disposition::Failed);
            }
            Err(e) => return Err(e),
        };

        let (disposition, settled) = self.submit(event, &jobs).await;
        batch.unsettled.extend(jobs.split_off(settled));
        batch.settled.extend(jobs);
        Ok(disposition)
    }

    /// Submits the jobs of one event in order.
    ///
    /// The first accepted job decides the job reference. Jobs the queue already knows count as
    /// handled. Any other rejection stops the submission and marks the event for retry.
    ///
    /// Also returns how many leading jobs the queue accepted or already knew.
    async fn submit(&self, event: &PersistedEvent, jobs: &[JobSpec]) -> (Disposition, usize) {
        if jobs.is_empty() {
            debug!(event_id = %event.id, "No job for event");
            return (Disposition::Ignored, 0);
        }

        let mut accepted = None;
        for (settled, job) in jobs.iter().enumerate() {
            match self.queue.add(job.clone()).await {
                Ok(id) => {
                    accepted.get_or_insert(id);
                    if job.job_type == JobType::ClientRecordClosing {
                        self.producer.closing_recorded();
                    }
                }
                Err(e) if e.is_already_handled() => {
                    debug!(
                        event_id = %event.id,
                        job_type = %job.job_type,
                        error = %e,
                        "Job already queued"
                    );
                }
                Err(e) => {
                    error!(
                        event_id = %event.id,
                        job_type = %job.job_type,
                        error = %e,
                        "Failed to add job"
                    );
                    return (Disposition::Failed, settled);
                }
            }
        }

        (accepted.map_or(Disposition::Ignored, Disposition::Scheduled), jobs.len())
    }
}
