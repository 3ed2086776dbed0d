use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GenerationFailure;
use crate::gemini::{ImageGenerator, generate_with_timeout};
use crate::jobs::{ItemId, ItemStatus, JobStore};
use crate::request::GenerationTemplate;

/// Default upper bound for one generation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Drives batch items through Pending → Loading → Completed/Failed.
pub struct BatchOrchestrator<G> {
    generator: G,
    timeout: Duration,
}

/// Structured record produced at the end of a batch pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub total: usize,
    /// Items an attempt was made for.
    pub visited: usize,
    /// Items already Completed when the pass reached them.
    pub skipped: usize,
    pub completed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

enum Attempt {
    Finished(ItemStatus),
    Skipped,
    Missing,
}

impl<G: ImageGenerator> BatchOrchestrator<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Visits every item not Completed at pass start, strictly one at a time
    /// and in stored order. Failures stay on their item; the pass always
    /// runs to the end.
    pub async fn run_all(&self, store: &JobStore, template: &GenerationTemplate) -> BatchSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let epoch = store.epoch();
        let snapshot = store.snapshot();
        let total = snapshot.len();
        let queue: Vec<ItemId> = snapshot
            .iter()
            .filter(|item| item.status != ItemStatus::Completed)
            .map(|item| item.id)
            .collect();

        tracing::info!(%run_id, total, queued = queue.len(), "batch pass started");

        let mut summary = BatchSummary {
            run_id,
            total,
            visited: 0,
            skipped: total - queue.len(),
            completed: 0,
            failed: 0,
            started_at,
            finished_at: started_at,
        };

        for id in queue {
            if store.epoch() != epoch {
                tracing::warn!(%run_id, "job store reloaded, stopping pass");
                break;
            }
            match self.attempt(store, id, template, Some(epoch)).await {
                Attempt::Finished(ItemStatus::Completed) => {
                    summary.visited += 1;
                    summary.completed += 1;
                }
                Attempt::Finished(_) => {
                    summary.visited += 1;
                    summary.failed += 1;
                }
                Attempt::Skipped => summary.skipped += 1,
                Attempt::Missing => {}
            }
        }

        summary.finished_at = Utc::now();
        tracing::info!(
            %run_id,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            duration_ms = summary.duration_ms(),
            "batch pass finished"
        );
        summary
    }

    /// Re-runs one item whatever its status. Returns `None` if `id` is not
    /// in the store. Calls for the same id queue up behind each other.
    pub async fn regenerate_one(
        &self,
        store: &JobStore,
        id: ItemId,
        template: &GenerationTemplate,
    ) -> Option<ItemStatus> {
        match self.attempt(store, id, template, None).await {
            Attempt::Finished(status) => Some(status),
            Attempt::Skipped | Attempt::Missing => None,
        }
    }

    async fn attempt(
        &self,
        store: &JobStore,
        id: ItemId,
        template: &GenerationTemplate,
        pass_epoch: Option<u64>,
    ) -> Attempt {
        let skip_completed = pass_epoch.is_some();
        let gate = store.gate(id);
        let _held = gate.lock().await;

        // A regeneration may have finished this item while we waited.
        match store.get(id) {
            None => return Attempt::Missing,
            Some(item) if skip_completed && item.status == ItemStatus::Completed => {
                return Attempt::Skipped;
            }
            Some(_) => {}
        }

        let Some((prompt, epoch)) = store.begin_attempt(id, pass_epoch) else {
            return Attempt::Missing;
        };
        tracing::debug!(item_id = id, "generating");

        let outcome = match template.request(&prompt) {
            Ok(request) => generate_with_timeout(&self.generator, &request, self.timeout).await,
            Err(e) => Err(GenerationFailure::Invalid(e)),
        };

        let written = match outcome {
            Ok(image) => store.finish_attempt(id, epoch, Ok(image)),
            Err(e) => {
                tracing::warn!(item_id = id, error = %e, "item failed");
                store.finish_attempt(id, epoch, Err(&e))
            }
        };
        match written {
            Some(status) => Attempt::Finished(status),
            None => Attempt::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{BatchItem, EditOutcome, ItemPatch};
    use crate::testing::{MockGenerator, Reply, png, template};

    fn store_with(prompts: &[&str]) -> JobStore {
        let store = JobStore::new();
        store.load(
            prompts
                .iter()
                .enumerate()
                .map(|(i, p)| BatchItem::new(i as ItemId + 1, *p))
                .collect(),
        );
        store
    }

    #[tokio::test]
    async fn run_all_visits_every_item_in_order() {
        let store = store_with(&["one", "two", "three"]);
        let orch = BatchOrchestrator::new(MockGenerator::new(Reply::Image("img")));

        let summary = orch.run_all(&store, &template()).await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.visited, 3);
        assert_eq!(summary.completed, 3);
        assert_eq!(orch.generator.prompts(), vec!["one", "two", "three"]);
        assert_eq!(orch.generator.max_in_flight(), 1);
        assert!(store.snapshot().iter().all(|i| i.status == ItemStatus::Completed));
    }

    #[tokio::test]
    async fn failures_are_contained() {
        let store = store_with(&["ok-1", "boom", "empty", "ok-2"]);
        let generator = MockGenerator::new(Reply::Image("img"))
            .on_prompt("boom", Reply::Fail)
            .on_prompt("empty", Reply::Empty);
        let orch = BatchOrchestrator::new(generator);

        let summary = orch.run_all(&store, &template()).await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 2);
        let statuses: Vec<ItemStatus> = store.snapshot().iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            vec![
                ItemStatus::Completed,
                ItemStatus::Failed,
                ItemStatus::Failed,
                ItemStatus::Completed
            ]
        );
        // No automatic retry.
        assert_eq!(orch.generator.calls(), 4);
    }

    #[tokio::test]
    async fn rerun_skips_completed_items() {
        let store = store_with(&["one", "two", "three", "four"]);
        store.update(
            3,
            ItemPatch::status(ItemStatus::Completed).with_images(vec![png("kept")]),
        );
        store.update(2, ItemPatch::status(ItemStatus::Failed));
        let orch = BatchOrchestrator::new(MockGenerator::new(Reply::Image("new")));

        let summary = orch.run_all(&store, &template()).await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.visited, 3);
        assert_eq!(orch.generator.prompts(), vec!["one", "two", "four"]);
        assert_eq!(store.get(3).unwrap().images, vec![png("kept")]);
    }

    #[tokio::test]
    async fn repeated_runs_converge() {
        let store = store_with(&["flaky", "solid"]);
        let generator = MockGenerator::new(Reply::Image("img"))
            .script(vec![(Duration::ZERO, Reply::Fail)]);
        let orch = BatchOrchestrator::new(generator);

        let first = orch.run_all(&store, &template()).await;
        assert_eq!((first.completed, first.failed), (1, 1));

        let second = orch.run_all(&store, &template()).await;
        assert_eq!((second.completed, second.failed, second.skipped), (1, 0, 1));
        assert_eq!(store.progress().completed, 2);

        let third = orch.run_all(&store, &template()).await;
        assert_eq!(third.visited, 0);
        assert_eq!(orch.generator.calls(), 3);
    }

    #[tokio::test]
    async fn empty_store_finishes_immediately() {
        let store = JobStore::new();
        let orch = BatchOrchestrator::new(MockGenerator::new(Reply::Image("img")));
        let summary = orch.run_all(&store, &template()).await;
        assert_eq!(summary.total, 0);
        assert_eq!(orch.generator.calls(), 0);
    }

    #[tokio::test]
    async fn timeout_marks_item_failed() {
        let store = store_with(&["slow", "fast"]);
        let generator = MockGenerator::new(Reply::Image("img")).on_prompt("slow", Reply::Hang);
        let orch = BatchOrchestrator::new(generator).with_timeout(Duration::from_millis(30));

        orch.run_all(&store, &template()).await;

        assert_eq!(store.get(1).unwrap().status, ItemStatus::Failed);
        assert_eq!(store.get(2).unwrap().status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn blank_item_prompt_fails_without_a_call() {
        let store = store_with(&["ok", "placeholder"]);
        assert_eq!(store.edit_prompt(2, "   "), EditOutcome::Applied);
        let orch = BatchOrchestrator::new(MockGenerator::new(Reply::Image("img")));

        orch.run_all(&store, &template()).await;

        assert_eq!(store.get(2).unwrap().status, ItemStatus::Failed);
        assert_eq!(orch.generator.calls(), 1);
    }

    #[tokio::test]
    async fn edited_prompt_is_used_on_next_run() {
        let store = store_with(&["Batman"]);
        let orch = BatchOrchestrator::new(MockGenerator::new(Reply::Image("img")));
        orch.run_all(&store, &template()).await;

        store.edit_prompt(1, "Batman and Robin");
        orch.run_all(&store, &template()).await;

        assert_eq!(orch.generator.prompts(), vec!["Batman", "Batman and Robin"]);
        assert_eq!(store.get(1).unwrap().status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn regenerate_one_targets_a_single_item() {
        let store = store_with(&["one", "two"]);
        let orch = BatchOrchestrator::new(MockGenerator::new(Reply::Image("img")));
        orch.run_all(&store, &template()).await;

        let status = orch.regenerate_one(&store, 2, &template()).await;

        assert_eq!(status, Some(ItemStatus::Completed));
        assert_eq!(orch.generator.prompts(), vec!["one", "two", "two"]);
        assert_eq!(orch.regenerate_one(&store, 99, &template()).await, None);
    }

    #[tokio::test]
    async fn concurrent_regenerations_of_one_id_serialize() {
        let store = store_with(&["a", "b", "c", "d", "five"]);
        let generator = MockGenerator::new(Reply::Image("unused")).script(vec![
            (Duration::from_millis(40), Reply::Image("first")),
            (Duration::from_millis(1), Reply::Image("second")),
        ]);
        let orch = BatchOrchestrator::new(generator);
        let template = template();

        let (a, b) = tokio::join!(
            orch.regenerate_one(&store, 5, &template),
            orch.regenerate_one(&store, 5, &template),
        );

        assert_eq!((a, b), (Some(ItemStatus::Completed), Some(ItemStatus::Completed)));
        assert_eq!(orch.generator.max_in_flight(), 1);
        let item = store.get(5).unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.images, vec![png("second")]);
    }

    #[tokio::test]
    async fn last_completed_write_wins_on_failure() {
        let store = store_with(&["only"]);
        let generator = MockGenerator::new(Reply::Image("unused")).script(vec![
            (Duration::from_millis(20), Reply::Image("good")),
            (Duration::ZERO, Reply::Fail),
        ]);
        let orch = BatchOrchestrator::new(generator);
        let template = template();

        tokio::join!(
            orch.regenerate_one(&store, 1, &template),
            orch.regenerate_one(&store, 1, &template),
        );

        let item = store.get(1).unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert!(item.images.is_empty());
    }

    #[tokio::test]
    async fn regenerate_during_run_all_does_not_interleave() {
        let store = store_with(&["one", "two", "three"]);
        let generator = MockGenerator::new(Reply::Image("img")).script(vec![
            (Duration::from_millis(20), Reply::Image("one")),
            (Duration::from_millis(60), Reply::Image("regen")),
        ]);
        let orch = BatchOrchestrator::new(generator);
        let template = template();

        let (summary, regen) = tokio::join!(
            orch.run_all(&store, &template),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                orch.regenerate_one(&store, 3, &template).await
            },
        );

        assert_eq!(regen, Some(ItemStatus::Completed));
        // Item 3 was completed by the regeneration before the pass got there.
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(store.get(3).unwrap().images, vec![png("regen")]);
        assert_eq!(store.progress().completed, 3);
    }

    #[tokio::test]
    async fn regeneration_result_is_dropped_after_reload() {
        let store = store_with(&["old sheet prompt"]);
        let generator = MockGenerator::new(Reply::Image("unused"))
            .script(vec![(Duration::from_millis(40), Reply::Image("stale"))]);
        let orch = BatchOrchestrator::new(generator);
        let template = template();

        let (status, ()) = tokio::join!(orch.regenerate_one(&store, 1, &template), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.load(vec![BatchItem::new(1, "new sheet prompt")]);
        });

        assert_eq!(status, None);
        let item = store.get(1).unwrap();
        assert_eq!(item.prompt, "new sheet prompt");
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.images.is_empty());
    }

    #[tokio::test]
    async fn run_all_stops_when_the_store_is_reloaded() {
        let store = store_with(&["one", "two", "three"]);
        let generator = MockGenerator::new(Reply::Image("img"))
            .script(vec![(Duration::from_millis(40), Reply::Image("stale"))]);
        let orch = BatchOrchestrator::new(generator);
        let template = template();

        let (summary, ()) = tokio::join!(orch.run_all(&store, &template), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.load(vec![
                BatchItem::new(1, "new one"),
                BatchItem::new(2, "new two"),
            ]);
        });

        assert_eq!(orch.generator.prompts(), vec!["one"]);
        assert_eq!((summary.completed, summary.failed), (0, 0));
        assert!(
            store
                .snapshot()
                .iter()
                .all(|i| i.status == ItemStatus::Pending && i.images.is_empty())
        );
    }

    #[tokio::test]
    async fn progress_events_track_the_pass() {
        let store = store_with(&["one", "boom"]);
        let mut rx = store.subscribe();
        let generator = MockGenerator::new(Reply::Image("img")).on_prompt("boom", Reply::Fail);
        let orch = BatchOrchestrator::new(generator);

        orch.run_all(&store, &template()).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((event.item_id, event.status));
        }
        assert_eq!(
            events,
            vec![
                (1, ItemStatus::Loading),
                (1, ItemStatus::Completed),
                (2, ItemStatus::Loading),
                (2, ItemStatus::Failed),
            ]
        );
    }
}
