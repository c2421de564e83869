#![recursion_limit = "256"]

mod config;
mod job;
mod models;
mod scratch;
mod sinks;
mod worker;

mod tests;

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use burn::tensor::backend::Backend;
use burn::tensor::Device;
use burn_ndarray::NdArray;
use burn_wgpu::{Wgpu, WgpuDevice};
use clap::Parser;
use log::{debug, info, warn};

use im_core::mesh::MeshExport;
use im_recon::model::TriplaneConfig;
use im_recon::service::{SegmentationClient, ServiceConfig, check_service_health};

use crate::config::{JobInput, PipelineSettings, WorkerConfig, parse_job};
use crate::job::JobRunner;
use crate::models::HostedModels;
use crate::sinks::JobSinks;
use crate::worker::{InferenceWorker, WorkerResponse};

/// Single image to textured mesh and orbit video
#[derive(Debug, Parser)]
#[command(name = "instamesh", author, version, about, long_about = None)]
struct Args {
    /// Job records (JSON). Reads one record from stdin when none are given.
    jobs: Vec<PathBuf>,

    /// Run the reconstruction model on the CPU backend
    #[arg(long)]
    cpu: bool,

    /// Export a single vertex-colored OBJ instead of OBJ + MTL + texture
    #[arg(long)]
    vertex_colors: bool,

    /// Skip the orbit video
    #[arg(long)]
    no_video: bool,

    /// Keep the input background
    #[arg(long)]
    keep_background: bool,
}

fn read_jobs(paths: &[PathBuf]) -> anyhow::Result<Vec<JobInput>> {
    if paths.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read job from stdin")?;
        return Ok(vec![parse_job(&text).context("invalid job record on stdin")?]);
    }

    paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_job(&text).with_context(|| format!("invalid job record in {}", path.display()))
        })
        .collect()
}

fn build_runner<B: Backend>(
    config: &WorkerConfig,
    settings: PipelineSettings,
    device: Device<B>,
) -> anyhow::Result<JobRunner> {
    let provider = HostedModels::<B>::new(config, TriplaneConfig::default(), device);
    let segmenter = SegmentationClient::new(ServiceConfig::new(config.segmentation_url.clone()))?;

    Ok(JobRunner::new(
        Box::new(provider),
        Box::new(segmenter),
        settings,
        config.scratch_dir.clone(),
    ))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = WorkerConfig::from_env();
    let settings = PipelineSettings {
        export: if args.vertex_colors {
            MeshExport::VertexColored
        } else {
            MeshExport::TextureMapped
        },
        export_video: !args.no_video,
        remove_background: !args.keep_background,
        ..Default::default()
    };

    let jobs = read_jobs(&args.jobs)?;

    if !check_service_health(&ServiceConfig::new(config.diffusion_url.clone())) {
        warn!("Diffusion service at {} is not responding", config.diffusion_url);
    }

    let runner = if args.cpu {
        info!("Using the CPU backend");
        build_runner::<NdArray>(&config, settings, Default::default())?
    } else {
        build_runner::<Wgpu>(&config, settings, WgpuDevice::default())?
    };
    let mut worker = InferenceWorker::new(runner);

    for job in jobs {
        let job = job.resolve(&config);
        let sinks = JobSinks::http(&config.discord_api, &job.discord, &job.notify);
        worker.submit(job, sinks).map_err(anyhow::Error::msg)?;

        loop {
            match worker.recv_response() {
                Some(WorkerResponse::Progress(p)) => debug!("{:>5.1}%", p * 100.0),
                Some(WorkerResponse::Status(status)) => info!("{status}"),
                Some(WorkerResponse::Finished(output)) => {
                    println!("{}", serde_json::to_string(&output)?);
                    break;
                }
                None => anyhow::bail!("worker exited before finishing the job"),
            }
        }
    }

    worker.shutdown();
    Ok(())
}
