use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{AssetSource, LoadedAsset};
use crate::error::LoadError;

/// An asset load running on the blocking pool. Progress and the result are
/// polled from the frame loop; dropping the task abandons the load.
pub struct LoadTask {
    name: String,
    progress: u8,
    progress_rx: mpsc::UnboundedReceiver<u8>,
    result_rx: oneshot::Receiver<Result<LoadedAsset, LoadError>>,
    cancelled: Arc<AtomicBool>,
}

impl LoadTask {
    pub fn spawn(runtime: &tokio::runtime::Handle, source: AssetSource) -> Self {
        let name = source.display_name();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let cancel_flag = cancelled.clone();
        runtime.spawn_blocking(move || {
            log::info!("Loading {}", source.display_name());

            let result = source.format().and_then(|format| {
                let mut report = |percent: u8| {
                    let _ = progress_tx.send(percent.min(100));
                };
                format.loader().load(&source, &mut report)
            });

            let result = if cancel_flag.load(Ordering::Acquire) {
                log::info!("Dropping abandoned load of {}", source.display_name());
                Err(LoadError::Cancelled)
            } else {
                if let Err(err) = &result {
                    log::error!("Failed to load {}: {}", source.display_name(), err);
                }
                result
            };

            // The receiver is gone when the viewer moved on to another load.
            let _ = result_tx.send(result);
        });

        Self {
            name,
            progress: 0,
            progress_rx,
            result_rx,
            cancelled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest reported percentage. Never decreases.
    pub fn progress(&mut self) -> u8 {
        while let Ok(percent) = self.progress_rx.try_recv() {
            self.progress = self.progress.max(percent);
        }
        self.progress
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// The outcome, once the load has finished. A loader that went away
    /// without answering counts as a failed load.
    pub fn poll(&mut self) -> Option<Result<LoadedAsset, LoadError>> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(LoadError::Aborted)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::gltf_loader::tests::bouncing_triangle_glb;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap()
    }

    fn wait_for(task: &mut LoadTask) -> Result<LoadedAsset, LoadError> {
        loop {
            if let Some(result) = task.poll() {
                return result;
            }
            std::thread::yield_now();
        }
    }

    #[test]
    fn background_load_completes_with_full_progress() {
        let runtime = runtime();
        let source = AssetSource::Bytes {
            name: "Bounce.glb".into(),
            data: bouncing_triangle_glb(),
        };

        let mut task = LoadTask::spawn(runtime.handle(), source);
        assert_eq!(task.name(), "Bounce.glb");

        assert!(wait_for(&mut task).is_ok());
        assert_eq!(task.progress(), 100);
    }

    #[test]
    fn unknown_extension_fails_without_loading() {
        let runtime = runtime();
        let source = AssetSource::Path("model.stl".into());

        let mut task = LoadTask::spawn(runtime.handle(), source);

        assert!(matches!(wait_for(&mut task), Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn load_on_stopped_runtime_reports_abort() {
        let stopped = runtime();
        let handle = stopped.handle().clone();
        stopped.shutdown_background();

        let mut task = LoadTask::spawn(&handle, AssetSource::Path("model.glb".into()));

        assert!(matches!(wait_for(&mut task), Err(LoadError::Aborted)));
    }
}
