//! The ingest pipeline: queue consumer, sole store writer, sole bus publisher.
//!
//! Frames are handled strictly in queue order, so updates for a topic reach
//! the store and the bus in the order the upstream socket delivered them.
//! Every per-frame failure is logged and skipped; nothing short of the stop
//! signal or a closed queue ends the loop.

use pitwall_core::laps::extract_laps;
use pitwall_core::{BusMessage, Context, CoreError, error};
use pitwall_types::{Envelope, FeedState, LapEvent, Topic};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connector::FeedFrame;
use crate::frame::{self, SourceTimestamp, Update};

/// Counters reported when the pipeline stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames taken off the queue.
    pub frames: u64,
    /// Frames dropped as undecodable or misshapen.
    pub rejected_frames: u64,
    /// Individual `M` items skipped for a bad shape.
    pub rejected_items: u64,
    /// Envelopes published on the bus.
    pub published: u64,
    /// Lap events appended to the log.
    pub laps: u64,
}

/// What one frame produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Envelopes published.
    pub published: u64,
    /// `M` items skipped.
    pub rejected_items: u64,
    /// Lap events appended.
    pub laps: u64,
}

/// Consumes the internal queue and applies frames to the store and bus.
pub struct Pipeline {
    ctx: Context,
    queue: mpsc::Receiver<FeedFrame>,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a pipeline over `queue`.
    pub const fn new(ctx: Context, queue: mpsc::Receiver<FeedFrame>) -> Self {
        Self {
            ctx,
            queue,
            stats: PipelineStats {
                frames: 0,
                rejected_frames: 0,
                rejected_items: 0,
                published: 0,
                laps: 0,
            },
        }
    }

    /// Drain the queue until the stop signal fires or every sender is gone,
    /// then publish the stop sentinel.
    pub async fn run(mut self) -> PipelineStats {
        let mut stop = self.ctx.shutdown.listener();

        loop {
            let next = tokio::select! {
                reason = stop.wait() => {
                    debug!(reason = reason.as_str(), "Ingest pipeline stopping");
                    None
                }
                frame = self.queue.recv() => frame,
            };
            let Some(next) = next else { break };
            self.handle(next);
        }

        self.apply_state(FeedState::Disconnected);
        self.ctx.bus.publish(BusMessage::Stop);
        info!(
            frames = self.stats.frames,
            rejected_frames = self.stats.rejected_frames,
            rejected_items = self.stats.rejected_items,
            published = self.stats.published,
            laps = self.stats.laps,
            "Ingest pipeline stopped"
        );
        self.stats
    }

    fn handle(&mut self, next: FeedFrame) {
        match next {
            FeedFrame::State(state) => self.apply_state(state),
            FeedFrame::Text(raw) => {
                self.stats.frames = self.stats.frames.saturating_add(1);
                match apply_frame(&self.ctx, &raw) {
                    Ok(outcome) => {
                        self.stats.published = self.stats.published.saturating_add(outcome.published);
                        self.stats.rejected_items =
                            self.stats.rejected_items.saturating_add(outcome.rejected_items);
                        self.stats.laps = self.stats.laps.saturating_add(outcome.laps);
                    }
                    Err(err) => {
                        self.stats.rejected_frames = self.stats.rejected_frames.saturating_add(1);
                        warn!(error = %err, frame = %error::preview(&raw), "Dropping frame");
                    }
                }
            }
        }
    }

    fn apply_state(&self, state: FeedState) {
        if self.ctx.status.set(state) {
            self.ctx.bus.publish(BusMessage::Status(state));
        }
    }
}

/// Apply one raw frame to the store and publish the resulting envelopes.
///
/// Bulk `R` entries replace their topics. Each valid `M` item is merged and
/// its pre-merge delta published; lap completions found in any item's
/// delta are appended and published as one `LapData` batch per frame.
pub fn apply_frame(ctx: &Context, raw: &str) -> Result<FrameOutcome, CoreError> {
    let parsed = frame::parse(raw)?;
    let mut outcome = FrameOutcome::default();
    if parsed.is_empty() {
        debug!(frame = %error::preview(raw), "Frame carries no data");
        return Ok(outcome);
    }

    for (topic, payload) in parsed.bulk {
        let revision = ctx.store.set(&topic, payload.clone());
        publish(ctx, &mut outcome, revision, Envelope::new(topic, payload));
    }

    let mut laps: Vec<LapEvent> = Vec::new();
    for item in parsed.updates {
        match item {
            Ok(update) => {
                laps.extend(extract_laps(&update.payload));
                apply_update(ctx, &mut outcome, update);
            }
            Err(err) => {
                outcome.rejected_items = outcome.rejected_items.saturating_add(1);
                warn!(error = %err, "Skipping update item");
            }
        }
    }

    if !laps.is_empty() {
        let revision = ctx.store.append_laps(&laps);
        outcome.laps = u64::try_from(laps.len()).unwrap_or(u64::MAX);
        debug!(count = laps.len(), "Lap completions recorded");
        publish(ctx, &mut outcome, revision, Envelope::laps(&laps));
    }

    Ok(outcome)
}

fn apply_update(ctx: &Context, outcome: &mut FrameOutcome, update: Update) {
    let Update {
        topic,
        payload,
        timestamp,
    } = update;
    record_timestamp(ctx, &topic, &timestamp);
    let revision = ctx.store.merge(&topic, payload.clone());
    publish(ctx, outcome, revision, Envelope::new(topic, payload));
}

fn record_timestamp(ctx: &Context, topic: &Topic, timestamp: &SourceTimestamp) {
    match timestamp {
        SourceTimestamp::Parsed(at) => ctx.status.record_source_time(*at),
        SourceTimestamp::Raw(raw) => {
            warn!(topic = %topic, timestamp = %raw, "Unparseable source timestamp");
        }
    }
}

fn publish(ctx: &Context, outcome: &mut FrameOutcome, revision: u64, envelope: Envelope) {
    ctx.bus.publish_update(revision, envelope);
    outcome.published = outcome.published.saturating_add(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pitwall_core::BusReceiver;
    use serde_json::json;

    use super::*;

    async fn next_update(rx: &mut BusReceiver) -> (u64, Envelope) {
        loop {
            if let Some(BusMessage::Update(published)) = rx.recv().await {
                return (published.revision, published.envelope.clone());
            }
        }
    }

    #[tokio::test]
    async fn bulk_snapshot_sets_and_publishes_each_topic() {
        let ctx = Context::in_memory(16);
        let mut rx = ctx.bus.subscribe();

        let outcome = apply_frame(&ctx, r#"{"R": {"DriverList": {"44": {"Tla": "HAM"}}, "SessionInfo": {"Name": "Race"}}}"#).unwrap();
        assert_eq!(outcome.published, 2);
        assert_eq!(ctx.store.get("SessionInfo"), Some(json!({"Name": "Race"})));

        let (rev, first) = next_update(&mut rx).await;
        assert_eq!((rev, first.topic.as_str()), (1, "DriverList"));
    }

    #[tokio::test]
    async fn incremental_update_merges_but_publishes_the_delta() {
        let ctx = Context::in_memory(16);
        apply_frame(&ctx, r#"{"R": {"TimingData": {"Lines": {"44": {"Position": "1", "GapToLeader": ""}}}}}"#).unwrap();

        let mut rx = ctx.bus.subscribe();
        let raw = r#"{"M": [{"A": ["TimingData", {"Lines": {"44": {"Position": "2"}}}, "2024-03-02T15:04:05Z"]}]}"#;
        apply_frame(&ctx, raw).unwrap();

        assert_eq!(
            ctx.store.get("TimingData"),
            Some(json!({"Lines": {"44": {"Position": "2", "GapToLeader": ""}}}))
        );
        let (_, published) = next_update(&mut rx).await;
        assert_eq!(published.payload, json!({"Lines": {"44": {"Position": "2"}}}));
        assert!(ctx.status.last_source_time().is_some());
    }

    #[tokio::test]
    async fn lap_completions_become_one_batch_per_frame() {
        let ctx = Context::in_memory(16);
        let mut rx = ctx.bus.subscribe();
        let raw = r#"{"M": [
            {"A": ["TimingData", {"Lines": {"44": {"NumberOfLaps": 5, "LastLapTime": {"Value": "1:23.456"}}}}, "2024-03-02T15:04:05Z"]},
            {"A": ["TimingData", {"Lines": {"1": {"NumberOfLaps": 5, "LastLapTime": {"Value": "1:22.900"}}}}, "2024-03-02T15:04:06Z"]}
        ]}"#;

        let outcome = apply_frame(&ctx, raw).unwrap();
        assert_eq!(outcome, FrameOutcome { published: 3, rejected_items: 0, laps: 2 });
        assert_eq!(ctx.store.lap_count(), 2);

        next_update(&mut rx).await;
        next_update(&mut rx).await;
        let (rev, batch) = next_update(&mut rx).await;
        assert_eq!(rev, ctx.store.revision());
        assert_eq!(batch.topic.as_str(), "LapData");
        assert_eq!(
            batch.payload,
            json!([
                {"RacingNumber": "44", "LapNumber": 5, "LapTime": "1:23.456"},
                {"RacingNumber": "1", "LapNumber": 5, "LapTime": "1:22.900"}
            ])
        );
    }

    #[tokio::test]
    async fn laps_are_extracted_from_any_topic_with_timing_lines() {
        let ctx = Context::in_memory(16);
        let raw = r#"{"M": [
            {"A": ["TimingDataF1", {"Lines": {"44": {"NumberOfLaps": 5, "LastLapTime": {"Value": "1:23.456"}}}}, "2024-03-02T15:04:05Z"]},
            {"A": ["TrackStatus", {"Status": "1", "Message": "AllClear"}, "2024-03-02T15:04:05Z"]}
        ]}"#;

        let outcome = apply_frame(&ctx, raw).unwrap();
        assert_eq!(outcome.laps, 1);
        let laps = ctx.store.list_laps(&pitwall_core::LapQuery::default());
        let events: Vec<LapEvent> = laps.into_iter().map(|record| record.event).collect();
        assert_eq!(events, vec![LapEvent::new("44", 5, "1:23.456")]);
    }

    #[tokio::test]
    async fn bad_items_are_skipped_and_good_ones_applied() {
        let ctx = Context::in_memory(16);
        let raw = r#"{"M": [
            {"A": ["TrackStatus", "1", "2024-03-02T15:04:05Z"]},
            {"A": ["TrackStatus", {"Status": "2"}, "2024-03-02T15:04:05Z"]}
        ]}"#;
        let outcome = apply_frame(&ctx, raw).unwrap();
        assert_eq!(outcome.rejected_items, 1);
        assert_eq!(ctx.store.get("TrackStatus"), Some(json!({"Status": "2"})));
    }

    #[tokio::test]
    async fn undecodable_frames_leave_state_untouched() {
        let ctx = Context::in_memory(16);
        assert!(apply_frame(&ctx, "{'M': [unterminated").is_err());
        assert_eq!(ctx.store.revision(), 0);
    }

    #[tokio::test]
    async fn run_survives_bad_frames_and_ends_with_stop() {
        let ctx = Context::in_memory(16);
        let mut rx = ctx.bus.subscribe();
        let (tx, queue) = mpsc::channel(8);
        let task = tokio::spawn(Pipeline::new(ctx.clone(), queue).run());

        tx.send(FeedFrame::State(FeedState::Streaming)).await.unwrap();
        tx.send(FeedFrame::Text("garbage".into())).await.unwrap();
        tx.send(FeedFrame::Text("{}".into())).await.unwrap();
        tx.send(FeedFrame::Text(r#"{"R": {"LapCount": {"CurrentLap": 3}}}"#.into())).await.unwrap();
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.rejected_frames, 1);
        assert_eq!(stats.published, 1);

        assert!(matches!(rx.recv().await, Some(BusMessage::Status(FeedState::Streaming))));
        assert!(matches!(rx.recv().await, Some(BusMessage::Update(_))));
        assert!(matches!(rx.recv().await, Some(BusMessage::Status(FeedState::Disconnected))));
        assert!(matches!(rx.recv().await, Some(BusMessage::Stop)));
    }
}
