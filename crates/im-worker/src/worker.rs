use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};

use log::debug;

use im_core::progress::ProgressCallback;

use crate::config::ResolvedJob;
use crate::job::{JobOutput, JobRunner};
use crate::sinks::JobSinks;

pub enum WorkerCommand {
    Run { job: ResolvedJob, sinks: JobSinks },
    Shutdown,
}

pub enum WorkerResponse {
    Progress(f32),
    Status(String),
    Finished(JobOutput),
}

/// Forwards pipeline progress to the response channel
struct ChannelProgress<'a> {
    tx: &'a Sender<WorkerResponse>,
}

impl ProgressCallback for ChannelProgress<'_> {
    fn update(&mut self, progress: f32, message: &str) {
        let _ = self.tx.send(WorkerResponse::Progress(progress));
        let _ = self.tx.send(WorkerResponse::Status(message.to_string()));
    }
}

/// Background thread that owns the pipeline and runs one job at a time
pub struct InferenceWorker {
    command_tx: Sender<WorkerCommand>,
    response_rx: Receiver<WorkerResponse>,
    thread_handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    pub fn new(runner: JobRunner) -> Self {
        let (cmd_tx, cmd_rx) = channel::<WorkerCommand>();
        let (resp_tx, resp_rx) = channel::<WorkerResponse>();

        let thread_handle = thread::spawn(move || {
            loop {
                match cmd_rx.recv() {
                    Ok(WorkerCommand::Run { job, sinks }) => {
                        let _ = resp_tx.send(WorkerResponse::Status(format!("Starting job {}", job.job_id)));
                        let mut progress = ChannelProgress { tx: &resp_tx };
                        let output = runner.run(&job, &sinks, &mut progress);
                        let _ = resp_tx.send(WorkerResponse::Finished(output));
                    }

                    Ok(WorkerCommand::Shutdown) | Err(_) => {
                        debug!("Worker shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            command_tx: cmd_tx,
            response_rx: resp_rx,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn submit(&self, job: ResolvedJob, sinks: JobSinks) -> Result<(), String> {
        self.command_tx
            .send(WorkerCommand::Run { job, sinks })
            .map_err(|e| format!("Failed to send job to worker: {}", e))
    }

    /// Block until the next response; `None` once the worker has exited
    pub fn recv_response(&self) -> Option<WorkerResponse> {
        self.response_rx.recv().ok()
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
