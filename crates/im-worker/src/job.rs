use std::fmt;
use std::path::PathBuf;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use im_core::error::{Error, Result};
use im_core::mesh::MeshExport;
use im_core::pipeline::{ModelProvider, Segmenter, release_synthesizer};
use im_core::progress::{ProgressCallback, ScaledProgress};
use im_recon::preprocessing::{Preprocessor, load_image};
use im_render::camera::{input_cameras, render_cameras};
use im_render::renderer::OrbitRenderer;
use im_render::video::{VideoConfig, encode_video};

use crate::config::{PipelineSettings, ResolvedJob};
use crate::scratch::JobScratch;
use crate::sinks::JobSinks;

/// Lifecycle of a single job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStage {
    Init,
    Preprocess,
    SynthesizeViews,
    ReconstructAndRender,
    ExtractMesh,
    Package,
    Notify,
    Cleanup,
    Done,
    Failed,
}

impl JobStage {
    fn fraction(self) -> f32 {
        match self {
            JobStage::Init => 0.0,
            JobStage::Preprocess => 0.05,
            JobStage::SynthesizeViews => 0.1,
            JobStage::ReconstructAndRender => 0.4,
            JobStage::ExtractMesh => 0.7,
            JobStage::Package => 0.85,
            JobStage::Notify => 0.9,
            JobStage::Cleanup => 0.95,
            JobStage::Done | JobStage::Failed => 1.0,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Init => "init",
            JobStage::Preprocess => "preprocess",
            JobStage::SynthesizeViews => "synthesize views",
            JobStage::ReconstructAndRender => "reconstruct and render",
            JobStage::ExtractMesh => "extract mesh",
            JobStage::Package => "package",
            JobStage::Notify => "notify",
            JobStage::Cleanup => "cleanup",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Done,
    Failed,
}

/// Delivered URLs on success, the error description on failure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Urls(Vec<String>),
    Error(String),
}

/// Record returned to the caller and sent to the status sink
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    pub job_id: String,
    pub result: JobResult,
    pub status: JobStatus,
}

impl JobOutput {
    pub fn done(job_id: &str, urls: Vec<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            result: JobResult::Urls(urls),
            status: JobStatus::Done,
        }
    }

    pub fn failed(job_id: &str, error: &Error) -> Self {
        Self {
            job_id: job_id.to_string(),
            result: JobResult::Error(format!("FAILED: {error}")),
            status: JobStatus::Failed,
        }
    }
}

/// Runs jobs one at a time through the full pipeline
pub struct JobRunner {
    provider: Box<dyn ModelProvider + Send>,
    segmenter: Box<dyn Segmenter + Send>,
    pub settings: PipelineSettings,
    pub preprocessor: Preprocessor,
    /// Encoder executable and codec; fps and frame size always follow `settings`
    pub video: VideoConfig,
    scratch_dir: PathBuf,
}

impl JobRunner {
    pub fn new(
        provider: Box<dyn ModelProvider + Send>,
        segmenter: Box<dyn Segmenter + Send>,
        settings: PipelineSettings,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        let preprocessor = Preprocessor {
            remove_background: settings.remove_background,
            ..Default::default()
        };
        Self {
            provider,
            segmenter,
            settings,
            preprocessor,
            video: VideoConfig::default(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Run `job` to completion. Never fails: errors end up in the returned record.
    pub fn run(
        &self,
        job: &ResolvedJob,
        sinks: &JobSinks,
        progress: &mut dyn ProgressCallback,
    ) -> JobOutput {
        let mut scratch = JobScratch::new(&self.scratch_dir, &job.job_id);
        let mut stage = JobStage::Init;
        enter(&mut stage, JobStage::Init, job, progress);

        let produced = self.produce(job, &mut scratch, &mut stage, progress);
        if let Err(e) = &produced {
            error!("Job {} failed during {stage}: {e}", job.job_id);
        }

        enter(&mut stage, JobStage::Notify, job, progress);
        let output = notify(job, produced, sinks);

        enter(&mut stage, JobStage::Cleanup, job, progress);
        debug!("Job {}: {} scratch path(s) registered", job.job_id, scratch.paths().len());
        scratch.cleanup();

        let last = match output.status {
            JobStatus::Done => JobStage::Done,
            JobStatus::Failed => JobStage::Failed,
        };
        enter(&mut stage, last, job, progress);
        output
    }

    /// Preprocess through Package; returns the files to deliver
    fn produce(
        &self,
        job: &ResolvedJob,
        scratch: &mut JobScratch,
        stage: &mut JobStage,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Vec<PathBuf>> {
        let settings = &self.settings;
        std::fs::create_dir_all(scratch.dir())?;

        enter(stage, JobStage::Preprocess, job, progress);
        let image = load_image(&job.input_image)?;
        let prepared = self.preprocessor.prepare(&image, self.segmenter.as_ref())?;

        enter(stage, JobStage::SynthesizeViews, job, progress);
        let mut synthesizer = self.provider.load_synthesizer()?;
        info!("Sampling views with {}", synthesizer.name());
        let grid = synthesizer.synthesize(&prepared, job.sample_steps, job.seed)?;
        let released = release_synthesizer(self.provider.as_ref(), synthesizer);

        enter(stage, JobStage::ReconstructAndRender, job, progress);
        let model = self.provider.load_reconstructor(released)?;
        let views = grid.tiles();
        let planes = model.forward_planes(&views, &input_cameras(1, settings.input_radius))?;

        let mut files = Vec::new();
        if settings.export_video {
            let cameras = render_cameras(
                1,
                settings.render_views,
                settings.render_radius,
                settings.render_elevation,
                model.camera_mode(),
            )?;
            let mut render_progress = ScaledProgress::new(
                progress,
                JobStage::ReconstructAndRender.fraction(),
                JobStage::ExtractMesh.fraction(),
            );
            let frames = OrbitRenderer::for_cameras(&cameras, settings.render_size).render(
                model.as_ref(),
                &planes,
                &cameras,
                &mut render_progress,
            )?;

            let video = VideoConfig {
                fps: settings.fps,
                frame_size: settings.render_size,
                ..self.video.clone()
            };
            let video_path = scratch.reserve("mp4");
            encode_video(&frames, &video_path, &video)?;
            files.push(video_path);
        }

        enter(stage, JobStage::ExtractMesh, job, progress);
        let geometry_path = scratch.reserve("obj");
        for companion in settings.export.output_paths(&geometry_path) {
            scratch.register(companion);
        }
        let mesh = model.extract_mesh(&planes, settings.export)?;
        files.extend(settings.export.write(mesh, &geometry_path)?);

        enter(stage, JobStage::Package, job, progress);
        drop(model);
        package(&files, settings.export, settings.export_video)?;

        Ok(files)
    }
}

fn enter(stage: &mut JobStage, next: JobStage, job: &ResolvedJob, progress: &mut dyn ProgressCallback) {
    *stage = next;
    info!("Job {}: {next}", job.job_id);
    progress.update(next.fraction(), &next.to_string());
}

/// Check the bundle is complete before anything is delivered
fn package(files: &[PathBuf], export: MeshExport, with_video: bool) -> Result<()> {
    let expected = export.file_count() + usize::from(with_video);
    if files.len() != expected {
        return Err(Error::DataIntegrity(format!(
            "expected {expected} output files, produced {}",
            files.len()
        )));
    }
    for file in files {
        if !file.is_file() {
            return Err(Error::DataIntegrity(format!("missing output {}", file.display())));
        }
    }
    Ok(())
}

/// Deliver assets and report status. Status sink errors are only logged.
fn notify(job: &ResolvedJob, produced: Result<Vec<PathBuf>>, sinks: &JobSinks) -> JobOutput {
    let output = match produced {
        Ok(files) => match sinks.assets.deliver(&job.params().to_string(), &files) {
            Ok(urls) => JobOutput::done(&job.job_id, urls),
            Err(e) => {
                error!("Job {}: {e}", job.job_id);
                JobOutput::failed(&job.job_id, &e)
            }
        },
        Err(e) => JobOutput::failed(&job.job_id, &e),
    };

    match &sinks.status {
        Some(sink) => {
            if let Err(e) = sink.notify(&output) {
                warn!("Job {}: status notification dropped: {e}", job.job_id);
            }
        }
        None => warn!("Job {}: no status sink configured", job.job_id),
    }

    output
}
