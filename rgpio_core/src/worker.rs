//! Runs device operations off the caller's thread.
//!
//! Each [`DeviceWorker`] owns one device on a dedicated thread and executes submitted jobs
//! in order. Callers driven by an event loop submit a job and poll or wait on the returned
//! [`Pending`] instead of blocking on the remote daemon themselves.
use crate::device::{Device, DeviceId};
use log::{debug, error};
use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

type Job<D> = Box<dyn FnOnce(&mut D) + Send>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Could not start worker thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("Worker for '{0}' is stopped")]
    Stopped(DeviceId),
    #[error("Worker for '{0}' panicked")]
    Panicked(DeviceId),
}

pub struct DeviceWorker<D: Device + 'static> {
    id: DeviceId,
    jobs: Option<mpsc::Sender<Job<D>>>,
    handle: Option<JoinHandle<D>>,
}

impl<D: Device + 'static> DeviceWorker<D> {
    pub fn spawn(mut device: D) -> Result<Self, WorkerError> {
        let id = device.id().clone();
        let (jobs, queue) = mpsc::channel::<Job<D>>();
        let handle = thread::Builder::new()
            .name(format!("device-{}", id))
            .spawn(move || {
                for job in queue {
                    job(&mut device);
                }
                device
            })?;
        debug!("Started worker for '{}'", id);
        Ok(DeviceWorker {
            id,
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Queue `job` behind every previously submitted job.
    pub fn submit<R, F>(&self, job: F) -> Result<Pending<R>, WorkerError>
    where
        R: Send + 'static,
        F: FnOnce(&mut D) -> R + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let job: Job<D> = Box::new(move |device: &mut D| {
            // The caller may have dropped its Pending.
            let _ = result_tx.send(job(device));
        });
        self.jobs
            .as_ref()
            .ok_or_else(|| WorkerError::Stopped(self.id.clone()))?
            .send(job)
            .map_err(|_| WorkerError::Stopped(self.id.clone()))?;
        Ok(Pending {
            id: self.id.clone(),
            result: result_rx,
        })
    }

    /// Submit `job` and block until it has run.
    pub fn call<R, F>(&self, job: F) -> Result<R, WorkerError>
    where
        R: Send + 'static,
        F: FnOnce(&mut D) -> R + Send + 'static,
    {
        self.submit(job)?.wait()
    }

    /// Finish queued jobs and hand the device back.
    pub fn stop(mut self) -> Result<D, WorkerError> {
        self.jobs.take();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| WorkerError::Stopped(self.id.clone()))?;
        let device = handle.join().map_err(|_| {
            error!("Worker for '{}' panicked", self.id);
            WorkerError::Panicked(self.id.clone())
        })?;
        debug!("Stopped worker for '{}'", self.id);
        Ok(device)
    }
}

impl<D: Device + 'static> Drop for DeviceWorker<D> {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Worker for '{}' panicked", self.id);
            }
        }
    }
}

/// Result of a submitted job.
pub struct Pending<R> {
    id: DeviceId,
    result: mpsc::Receiver<R>,
}

impl<R> Pending<R> {
    pub fn wait(self) -> Result<R, WorkerError> {
        self.result
            .recv()
            .map_err(|_| WorkerError::Panicked(self.id.clone()))
    }

    /// `Ok(None)` when the job has not finished within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<R>, WorkerError> {
        match self.result.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(WorkerError::Panicked(self.id.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_utils::recorder;
    use crate::device::{DeviceState, Switch};
    use crate::hardware::dummy::DummyConnector;
    use crate::hardware::{GpioState, RemoteHost};
    use crate::pin::PinClient;

    fn switch(daemon: &DummyConnector) -> Switch {
        let client = PinClient::new(daemon.clone());
        let output = client
            .acquire_output(&RemoteHost::new("pi", 8888), 23, false)
            .unwrap();
        Switch::new("fan".into(), output)
    }

    #[test]
    fn jobs_run_in_order() {
        let daemon = DummyConnector::new();
        let worker = DeviceWorker::spawn(switch(&daemon)).unwrap();
        assert_eq!(worker.id(), &DeviceId::from("fan"));
        let on = worker.submit(|switch| switch.turn_on()).unwrap();
        let off = worker.submit(|switch| switch.turn_off()).unwrap();
        let state = worker.submit(|switch| switch.state()).unwrap();
        on.wait().unwrap();
        off.wait().unwrap();
        assert_eq!(state.wait().unwrap(), DeviceState::Switch { is_on: false });
        let switch = worker.stop().unwrap();
        assert!(!switch.is_on());
        assert_eq!(
            daemon.output_states(23),
            vec![GpioState::Low, GpioState::High, GpioState::Low]
        );
    }

    #[test]
    fn observer_runs_on_worker() {
        let daemon = DummyConnector::new();
        let mut switch = switch(&daemon);
        let (seen, observer) = recorder();
        switch.set_observer(Box::new(observer));
        let worker = DeviceWorker::spawn(switch).unwrap();
        worker.call(|switch| switch.turn_on()).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn wait_timeout_returns_result() {
        let daemon = DummyConnector::new();
        let worker = DeviceWorker::spawn(switch(&daemon)).unwrap();
        let pending = worker.submit(|switch| switch.is_on()).unwrap();
        assert_eq!(
            pending.wait_timeout(Duration::from_secs(5)).unwrap(),
            Some(false)
        );
    }

    #[test]
    fn panicking_job_stops_worker() {
        let daemon = DummyConnector::new();
        let worker = DeviceWorker::spawn(switch(&daemon)).unwrap();
        let pending = worker
            .submit(|_switch: &mut Switch| -> bool { panic!("job failed") })
            .unwrap();
        assert!(matches!(pending.wait(), Err(WorkerError::Panicked(_))));
        assert!(matches!(worker.stop(), Err(WorkerError::Panicked(_))));
    }
}
