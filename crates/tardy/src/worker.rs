use crate::{
    queue::{WorkReceiver, WorkRequest},
    task::Task,
};

/// Worker task responsible for executing queued steps.
///
/// The loop drains its queue strictly in order and runs one step at a time,
/// so steps sharing a worker complete in the order they were enqueued. It exits
/// when the queue is closed (every [`DispatchQueue`](crate::DispatchQueue)
/// handle dropped) or when it receives [`WorkRequest::Shutdown`].
///
/// Steps are executed to completion even if their collector has already given
/// up; nothing is cancelled mid-flight.
///
/// # Arguments
///
/// - `worker_id`: Identifier used in logs and tracing.
/// - `rx`: Receiver through which [`WorkRequest`]s arrive.
pub async fn worker_loop<T: Task>(worker_id: usize, mut rx: WorkReceiver<T>) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    while let Some(work) = rx.recv().await {
        match work {
            WorkRequest::Step(step) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Worker {worker_id} executing step {}", step.index());

                step.execute(worker_id).await;
            }
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DispatchQueue, Error,
        simulator::{LatencySet, ScriptedTask},
        step::{CompletionStatus, Step},
        types::{ProcessingRequest, ProcessingResponse, ResponseState},
    };
    use core::time::Duration;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tokio::time::{Instant, sleep};

    struct PanicOnce {
        inner: ScriptedTask,
    }

    impl Task for PanicOnce {
        async fn run(&self, request: &ProcessingRequest) -> ProcessingResponse {
            if request.content == "explode" {
                panic!("first step failed");
            }
            self.inner.run(request).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn executes_steps_in_enqueue_order() {
        let task = Arc::new(ScriptedTask::new(
            LatencySet::from_millis(&[30, 10, 20]).unwrap(),
        ));
        let request = Arc::new(ProcessingRequest::new("1001", "gifts"));
        let (queue, rx) = DispatchQueue::bounded(3);

        let mut completions = Vec::new();
        for index in 0..3 {
            let (step, completion) = Step::new(index, Arc::clone(&request), Arc::clone(&task));
            queue.enqueue(step).unwrap();
            completions.push(completion);
        }
        drop(queue);

        let start = Instant::now();
        worker_loop(0, rx).await;
        // Sequential execution: the delays add up.
        assert!(start.elapsed() >= Duration::from_millis(60));

        let contents: Vec<_> = completions
            .iter_mut()
            .map(|c| match c.try_take() {
                CompletionStatus::Ready(response) => response.content,
                other => panic!("step not delivered: {other:?}"),
            })
            .collect();
        assert_eq!(
            contents,
            vec!["slept for 30ms", "slept for 10ms", "slept for 20ms"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn survives_a_panicking_step() {
        let task = Arc::new(PanicOnce {
            inner: ScriptedTask::new(LatencySet::from_millis(&[5]).unwrap()),
        });
        let (queue, rx) = DispatchQueue::bounded(2);

        let bad = Arc::new(ProcessingRequest::new("1", "explode"));
        let good = Arc::new(ProcessingRequest::new("2", "gifts"));
        let (first, mut first_done) = Step::new(0, bad, Arc::clone(&task));
        let (second, mut second_done) = Step::new(1, good, task);
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();
        drop(queue);

        worker_loop(0, rx).await;

        match first_done.try_take() {
            CompletionStatus::Ready(response) => assert_eq!(response.state, ResponseState::Failed),
            other => panic!("expected failure, got {other:?}"),
        }
        match second_done.try_take() {
            CompletionStatus::Ready(response) => assert_eq!(response.state, ResponseState::Done),
            other => panic!("expected success, got {other:?}"),
        }
    }

    struct PanicBeforeFuture;

    impl Task for PanicBeforeFuture {
        fn run(
            &self,
            request: &ProcessingRequest,
        ) -> impl Future<Output = ProcessingResponse> + Send {
            assert!(request.content != "explode", "rejected before starting");
            let content = request.content.clone();
            async move { ProcessingResponse::done(content) }
        }
    }

    #[tokio::test]
    async fn survives_a_task_that_panics_before_returning_its_future() {
        let task = Arc::new(PanicBeforeFuture);
        let (queue, rx) = DispatchQueue::bounded(2);

        let bad = Arc::new(ProcessingRequest::new("1", "explode"));
        let good = Arc::new(ProcessingRequest::new("2", "gifts"));
        let (first, mut first_done) = Step::new(0, bad, Arc::clone(&task));
        let (second, mut second_done) = Step::new(1, good, task);
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();
        drop(queue);

        tokio::spawn(worker_loop(0, rx)).await.unwrap();

        match first_done.try_take() {
            CompletionStatus::Ready(response) => {
                assert_eq!(response.state, ResponseState::Failed);
                assert!(response.content.contains("rejected before starting"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        match second_done.try_take() {
            CompletionStatus::Ready(response) => assert_eq!(response.content, "gifts"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acknowledges_shutdown() {
        let (queue, rx) = DispatchQueue::<ScriptedTask>::bounded(1);
        let handle = tokio::spawn(worker_loop(7, rx));

        let (tx, ack) = oneshot::channel();
        queue
            .send(WorkRequest::Shutdown { response: tx })
            .await
            .unwrap();

        ack.await.unwrap();
        handle.await.unwrap();
        assert!(queue.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_rejects_overflow() {
        let task = Arc::new(ScriptedTask::new(LatencySet::from_millis(&[5]).unwrap()));
        let request = Arc::new(ProcessingRequest::new("1001", "gifts"));
        let (queue, _rx) = DispatchQueue::bounded(1);

        let (a, _a) = Step::new(0, Arc::clone(&request), Arc::clone(&task));
        let (b, mut b_done) = Step::new(1, request, task);
        queue.enqueue(a).unwrap();

        assert_eq!(queue.enqueue(b), Err(Error::Saturated));
        // The rejected step was dropped, which closes its completion.
        sleep(Duration::from_millis(1)).await;
        assert_eq!(b_done.try_take(), CompletionStatus::Closed);
    }
}
