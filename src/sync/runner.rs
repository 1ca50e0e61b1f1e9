use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::Instrument;

/// 后台任务执行器
///
/// 提交的任务立即在 tokio 上运行，调用方不等待结果，也没有回传通道；
/// 任务的成败只体现在日志和持久化结果里。进程退出前调用 `drain`
/// 在宽限期内等待任务结束，超时的任务直接中止。
#[derive(Clone, Default)]
pub struct TaskRunner {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        reap_finished(&mut tasks);
        tasks.spawn(task.instrument(tracing::info_span!("background", task = name)));
    }

    pub fn in_flight(&self) -> usize {
        let mut tasks = self.lock();
        reap_finished(&mut tasks);
        tasks.len()
    }

    /// 等待已提交的任务结束，返回超过宽限期后被中止的任务数
    pub async fn drain(&self, grace: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.lock());

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                log_join_error(result);
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let abandoned = tasks.len();
        tracing::warn!(abandoned, "background tasks still running at shutdown, aborting");
        tasks.abort_all();
        while let Some(result) = tasks.join_next().await {
            log_join_error(result);
        }
        abandoned
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        log_join_error(result);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!("background task panicked: {}", e);
        }
    }
}
