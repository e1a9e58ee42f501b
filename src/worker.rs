use log::{debug, error};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use crate::adc::Channel;
use crate::bus::BusChannel;
use crate::error::{AdcError, Result};
use crate::sampler::{SampleWindow, Sampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    pub channel: Channel,
    pub window: SampleWindow,
}

/// Resolves once the worker has finished the request.
pub type PendingLevel = Receiver<Result<i32>>;

struct Job {
    request: SampleRequest,
    reply: SyncSender<Result<i32>>,
}

/// A dedicated sampling thread fed through a queue.
///
/// Requests run one after another. Dropping the worker closes the queue and
/// waits for the in-flight window to finish.
pub struct SamplerWorker {
    jobs: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl SamplerWorker {
    pub fn spawn<B: BusChannel + 'static>(sampler: Sampler<B>) -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();

        let handle = thread::Builder::new()
            .name("sampler".to_string())
            .spawn(move || {
                for job in queue {
                    let SampleRequest { channel, window } = job.request;
                    let result = sampler.sample_window(channel, window);
                    if job.reply.send(result).is_err() {
                        debug!("Sample result for {} dropped, caller went away", channel);
                    }
                }
                debug!("Sampler worker exiting");
            })?;

        Ok(SamplerWorker {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    pub fn submit(&self, request: SampleRequest) -> Result<PendingLevel> {
        let (reply, pending) = mpsc::sync_channel(1);
        self.jobs
            .as_ref()
            .ok_or(AdcError::WorkerStopped)?
            .send(Job { request, reply })
            .map_err(|_| AdcError::WorkerStopped)?;
        Ok(pending)
    }

    /// Submits and waits for the result.
    pub fn sample(&self, request: SampleRequest) -> Result<i32> {
        self.submit(request)?
            .recv()
            .map_err(|_| AdcError::WorkerStopped)?
    }
}

impl Drop for SamplerWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Sampler worker panicked");
            }
        }
    }
}
