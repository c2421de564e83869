#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use image::{Rgb, RgbImage, RgbaImage};

    use im_core::camera::{CameraMode, CameraPose, CameraSet};
    use im_core::error::{Error, Result};
    use im_core::grid::MultiViewGrid;
    use im_core::mesh::{MeshAsset, MeshAttributes, MeshExport};
    use im_core::pipeline::*;
    use im_core::progress::ProgressCallback;

    use crate::config::*;
    use crate::job::{JobOutput, JobResult, JobRunner, JobStatus};
    use crate::scratch::JobScratch;
    use crate::sinks::{AssetSink, JobSinks, StatusSink};
    use crate::worker::{InferenceWorker, WorkerResponse};

    type Events = Arc<Mutex<Vec<String>>>;

    #[derive(Clone, Copy, PartialEq)]
    enum Failure {
        Nothing,
        Synthesize,
        Extract,
    }

    struct StubSynthesizer {
        events: Events,
        fail: bool,
    }

    impl MultiViewSynthesizer for StubSynthesizer {
        fn synthesize(&mut self, _image: &RgbImage, steps: usize, seed: u64) -> Result<MultiViewGrid> {
            self.events.lock().unwrap().push(format!("synthesize {steps} {seed}"));
            if self.fail {
                return Err(Error::Inference("out of memory".to_string()));
            }
            let tiles: Vec<RgbImage> = (0..6u8)
                .map(|k| RgbImage::from_pixel(320, 320, Rgb([k * 40, 0, 0])))
                .collect();
            MultiViewGrid::from_tiles(&tiles)
        }

        fn name(&self) -> &str {
            "stub diffusion"
        }
    }

    impl Drop for StubSynthesizer {
        fn drop(&mut self) {
            self.events.lock().unwrap().push("drop synthesizer".to_string());
        }
    }

    struct StubReconstructor {
        fail_extract: bool,
    }

    impl ReconstructionModel for StubReconstructor {
        fn camera_mode(&self) -> CameraMode {
            CameraMode::ImplicitSurface
        }

        fn forward_planes(&self, views: &[RgbImage], cameras: &CameraSet) -> Result<TriplanePlanes> {
            assert_eq!(views.len(), 6);
            assert_eq!(cameras.len(), 6);
            TriplanePlanes::new(1, 1, vec![0.0; 3])
        }

        fn render(
            &self,
            _planes: &TriplanePlanes,
            cameras: &[CameraPose],
            render_size: u32,
        ) -> Result<Vec<RenderedFrame>> {
            Ok(cameras
                .iter()
                .map(|_| RenderedFrame::filled(render_size, render_size, [0.5, 0.25, 1.0]))
                .collect())
        }

        fn extract_mesh(&self, _planes: &TriplanePlanes, variant: MeshExport) -> Result<MeshAsset> {
            if self.fail_extract {
                return Err(Error::Inference("extraction ran out of memory".to_string()));
            }
            let faces = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
            let attributes = match variant {
                MeshExport::VertexColored => MeshAttributes::VertexColors(vec![[0.5, 0.5, 0.5]; 4]),
                MeshExport::TextureMapped => MeshAttributes::TextureMap {
                    uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                    face_uvs: faces.clone(),
                    texture: RgbImage::from_pixel(4, 4, Rgb([90, 90, 90])),
                },
            };
            Ok(MeshAsset::new(
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                faces,
                attributes,
            ))
        }
    }

    struct StubProvider {
        events: Events,
        failure: Failure,
    }

    impl ModelProvider for StubProvider {
        fn load_synthesizer(&self) -> Result<Box<dyn MultiViewSynthesizer>> {
            self.events.lock().unwrap().push("load synthesizer".to_string());
            Ok(Box::new(StubSynthesizer {
                events: self.events.clone(),
                fail: self.failure == Failure::Synthesize,
            }))
        }

        fn load_reconstructor(&self, _released: SynthesizerReleased) -> Result<Box<dyn ReconstructionModel>> {
            self.events.lock().unwrap().push("load reconstructor".to_string());
            Ok(Box::new(StubReconstructor {
                fail_extract: self.failure == Failure::Extract,
            }))
        }

        fn reclaim_memory(&self) {
            self.events.lock().unwrap().push("reclaim".to_string());
        }
    }

    struct KeepAll;

    impl Segmenter for KeepAll {
        fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
            Ok(image.clone())
        }
    }

    struct Delivery {
        message: String,
        files: Vec<PathBuf>,
        all_present: bool,
    }

    struct RecordingAssets {
        deliveries: Arc<Mutex<Vec<Delivery>>>,
        fail: bool,
    }

    impl AssetSink for RecordingAssets {
        fn deliver(&self, message: &str, files: &[PathBuf]) -> Result<Vec<String>> {
            self.deliveries.lock().unwrap().push(Delivery {
                message: message.to_string(),
                files: files.to_vec(),
                all_present: files.iter().all(|f| f.is_file()),
            });
            if self.fail {
                return Err(Error::Delivery("503 Service Unavailable".to_string()));
            }
            Ok(files
                .iter()
                .map(|f| format!("https://cdn.example.com/{}", f.file_name().unwrap().to_string_lossy()))
                .collect())
        }
    }

    struct RecordingStatus {
        outputs: Arc<Mutex<Vec<JobOutput>>>,
        fail: bool,
    }

    impl StatusSink for RecordingStatus {
        fn notify(&self, output: &JobOutput) -> Result<()> {
            self.outputs.lock().unwrap().push(output.clone());
            if self.fail {
                return Err(Error::Notify("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct StageRecorder {
        messages: Vec<String>,
        fractions: Vec<f32>,
    }

    impl ProgressCallback for StageRecorder {
        fn update(&mut self, progress: f32, message: &str) {
            self.messages.push(message.to_string());
            self.fractions.push(progress);
        }
    }

    const STAGES: [&str; 10] = [
        "init",
        "preprocess",
        "synthesize views",
        "reconstruct and render",
        "extract mesh",
        "package",
        "notify",
        "cleanup",
        "done",
        "failed",
    ];

    impl StageRecorder {
        fn stages(&self) -> Vec<&str> {
            self.messages
                .iter()
                .map(String::as_str)
                .filter(|m| STAGES.contains(m))
                .collect()
        }
    }

    struct Fixture {
        dir: PathBuf,
        events: Events,
        deliveries: Arc<Mutex<Vec<Delivery>>>,
        statuses: Arc<Mutex<Vec<JobOutput>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("im-worker-{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(dir.join("input")).unwrap();
            RgbImage::from_pixel(64, 64, Rgb([200, 180, 160]))
                .save(dir.join("input").join("cat.png"))
                .unwrap();

            Self {
                dir,
                events: Arc::new(Mutex::new(Vec::new())),
                deliveries: Arc::new(Mutex::new(Vec::new())),
                statuses: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn scratch_dir(&self) -> PathBuf {
            self.dir.join("scratch")
        }

        fn runner(&self, failure: Failure, settings: PipelineSettings) -> JobRunner {
            let provider = StubProvider {
                events: self.events.clone(),
                failure,
            };
            JobRunner::new(Box::new(provider), Box::new(KeepAll), settings, self.scratch_dir())
        }

        fn sinks(&self, delivery_fails: bool, status_fails: bool) -> JobSinks {
            JobSinks {
                assets: Box::new(RecordingAssets {
                    deliveries: self.deliveries.clone(),
                    fail: delivery_fails,
                }),
                status: Some(Box::new(RecordingStatus {
                    outputs: self.statuses.clone(),
                    fail: status_fails,
                })),
            }
        }

        fn job(&self) -> ResolvedJob {
            ResolvedJob {
                job_id: "job-42".to_string(),
                input_image: self.dir.join("input").join("cat.png").to_string_lossy().into_owned(),
                sample_steps: 75,
                seed: 42,
                notify: NotifyTarget { uri: None, token: None },
                discord: DiscordTarget {
                    user_id: None,
                    channel: None,
                    token: None,
                },
            }
        }

        fn leftovers(&self) -> Vec<PathBuf> {
            match std::fs::read_dir(self.scratch_dir()) {
                Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
                Err(_) => Vec::new(),
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        /// Shell script standing in for ffmpeg: drains stdin, writes its
        /// output argument and logs that path to `encoded.log`
        #[cfg(unix)]
        fn encoder_script(&self) -> String {
            use std::os::unix::fs::PermissionsExt;

            let path = self.dir.join("fake-ffmpeg.sh");
            let script = format!(
                "#!/bin/sh\ncat > /dev/null\nfor last; do :; done\nprintf mp4 > \"$last\"\necho \"$last\" >> \"{}\"\n",
                self.encoded_log().display()
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn encoded_log(&self) -> PathBuf {
            self.dir.join("encoded.log")
        }

        /// Videos the stand-in encoder wrote, in order
        fn encoded_videos(&self) -> Vec<PathBuf> {
            std::fs::read_to_string(self.encoded_log())
                .unwrap_or_default()
                .lines()
                .map(PathBuf::from)
                .collect()
        }

        #[cfg(unix)]
        fn video_runner(&self, failure: Failure) -> JobRunner {
            let settings = PipelineSettings {
                render_views: 4,
                render_size: 16,
                ..Default::default()
            };
            let mut runner = self.runner(failure, settings);
            runner.video.ffmpeg = self.encoder_script();
            runner
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn mesh_only() -> PipelineSettings {
        PipelineSettings {
            export_video: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_job_delivers_mesh_bundle() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Nothing, mesh_only());
        let mut stages = StageRecorder::default();

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut stages);

        assert_eq!(output.status, JobStatus::Done);
        assert_eq!(output.job_id, "job-42");
        match &output.result {
            JobResult::Urls(urls) => {
                assert_eq!(urls.len(), 3);
                assert!(urls[0].ends_with(".obj"));
                assert!(urls[1].ends_with(".mtl"));
                assert!(urls[2].ends_with(".png"));
            }
            other => panic!("unexpected result {other:?}"),
        }

        let deliveries = fx.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].all_present);
        assert!(deliveries[0].message.contains("\"sample_steps\":75"));
        assert!(deliveries[0].message.contains("\"seed\":42"));
        for file in &deliveries[0].files {
            assert!(file.file_name().unwrap().to_string_lossy().starts_with("job-42-"));
        }

        assert_eq!(*fx.statuses.lock().unwrap(), vec![output.clone()]);
        assert!(fx.leftovers().is_empty());
        assert_eq!(
            stages.stages(),
            vec![
                "init",
                "preprocess",
                "synthesize views",
                "reconstruct and render",
                "extract mesh",
                "package",
                "notify",
                "cleanup",
                "done"
            ]
        );
    }

    #[test]
    #[ignore = "needs ffmpeg with libx264 on PATH"]
    fn test_job_with_real_encoder_delivers_four_files() {
        let fx = Fixture::new();
        let settings = PipelineSettings {
            render_views: 4,
            render_size: 16,
            ..Default::default()
        };
        let runner = fx.runner(Failure::Nothing, settings);

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Done);
        match &output.result {
            JobResult::Urls(urls) => {
                assert_eq!(urls.len(), 4);
                assert!(urls[0].ends_with(".mp4"));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(fx.leftovers().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_job_with_video_delivers_four_files() {
        let fx = Fixture::new();
        let runner = fx.video_runner(Failure::Nothing);
        let mut stages = StageRecorder::default();

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut stages);

        assert_eq!(output.status, JobStatus::Done);
        match &output.result {
            JobResult::Urls(urls) => {
                assert_eq!(urls.len(), 4);
                assert!(urls[0].ends_with(".mp4"));
                assert!(urls[1].ends_with(".obj"));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(fx.deliveries.lock().unwrap()[0].all_present);
        assert!(fx.leftovers().is_empty());

        // Chunk progress stays inside the render stage and never runs backwards
        assert!(stages.messages.iter().any(|m| m.starts_with("Rendered chunk")));
        assert!(stages.fractions.windows(2).all(|w| w[0] <= w[1]), "{:?}", stages.fractions);
        assert_eq!(stages.fractions.last(), Some(&1.0));
    }

    #[cfg(unix)]
    #[test]
    fn test_video_delivery_failure_removes_all_four_files() {
        let fx = Fixture::new();
        let runner = fx.video_runner(Failure::Nothing);

        let output = runner.run(&fx.job(), &fx.sinks(true, false), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Failed);
        let deliveries = fx.deliveries.lock().unwrap();
        assert_eq!(deliveries[0].files.len(), 4);
        assert!(deliveries[0].all_present);
        assert!(deliveries[0].files.iter().all(|f| !f.exists()));
        assert!(fx.leftovers().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_failure_removes_earlier_video() {
        let fx = Fixture::new();
        let runner = fx.video_runner(Failure::Extract);
        let mut stages = StageRecorder::default();

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut stages);

        assert_eq!(output.status, JobStatus::Failed);
        assert!(fx.deliveries.lock().unwrap().is_empty());

        // The video was on disk in the scratch dir before extraction failed
        let videos = fx.encoded_videos();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].parent(), Some(fx.scratch_dir().as_path()));
        assert!(videos[0].to_string_lossy().ends_with(".mp4"));
        assert!(!videos[0].exists());
        assert!(fx.leftovers().is_empty());
        assert!(stages.stages().contains(&"extract mesh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_size_change_after_construction_reaches_encoder() {
        let fx = Fixture::new();
        let mut runner = fx.video_runner(Failure::Nothing);
        runner.settings.render_size = 24;

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Done, "{:?}", output.result);
        assert_eq!(fx.encoded_videos().len(), 1);
    }

    #[test]
    fn test_delivery_failure_fails_job_and_cleans_up() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Nothing, mesh_only());

        let output = runner.run(&fx.job(), &fx.sinks(true, false), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Failed);
        match &output.result {
            JobResult::Error(message) => {
                assert!(message.starts_with("FAILED:"));
                assert!(message.contains("503"));
            }
            other => panic!("unexpected result {other:?}"),
        }

        // Files existed when delivery was attempted and are gone now
        let deliveries = fx.deliveries.lock().unwrap();
        assert!(deliveries[0].all_present);
        assert!(deliveries[0].files.iter().all(|f| !f.exists()));
        assert!(fx.leftovers().is_empty());

        let statuses = fx.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, JobStatus::Failed);
    }

    #[test]
    fn test_extract_failure_skips_delivery_and_cleans_up() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Extract, mesh_only());
        let mut stages = StageRecorder::default();

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut stages);

        assert_eq!(output.status, JobStatus::Failed);
        assert!(matches!(&output.result, JobResult::Error(m) if m.contains("extraction ran out of memory")));
        assert!(fx.deliveries.lock().unwrap().is_empty());
        assert_eq!(fx.statuses.lock().unwrap().len(), 1);
        assert!(fx.leftovers().is_empty());
        assert_eq!(
            stages.stages(),
            vec![
                "init",
                "preprocess",
                "synthesize views",
                "reconstruct and render",
                "extract mesh",
                "notify",
                "cleanup",
                "failed"
            ]
        );
    }

    #[test]
    fn test_status_sink_failure_is_swallowed() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Nothing, mesh_only());

        let output = runner.run(&fx.job(), &fx.sinks(false, true), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Done);
        assert_eq!(fx.statuses.lock().unwrap().len(), 1);
        assert!(fx.leftovers().is_empty());
    }

    #[test]
    fn test_runs_without_status_sink() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Nothing, mesh_only());
        let mut sinks = fx.sinks(false, false);
        sinks.status = None;

        let output = runner.run(&fx.job(), &sinks, &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Done);
        assert!(fx.statuses.lock().unwrap().is_empty());
    }

    #[test]
    fn test_synthesizer_released_before_reconstructor_loads() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Nothing, mesh_only());

        runner.run(&fx.job(), &fx.sinks(false, false), &mut StageRecorder::default());

        assert_eq!(
            fx.events(),
            vec![
                "load synthesizer",
                "synthesize 75 42",
                "drop synthesizer",
                "reclaim",
                "load reconstructor"
            ]
        );
    }

    #[test]
    fn test_synthesis_failure_never_loads_reconstructor() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Synthesize, mesh_only());

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Failed);
        assert_eq!(
            fx.events(),
            vec!["load synthesizer", "synthesize 75 42", "drop synthesizer"]
        );
    }

    #[test]
    fn test_missing_input_image_fails_in_preprocess() {
        let fx = Fixture::new();
        let runner = fx.runner(Failure::Nothing, mesh_only());
        let mut job = fx.job();
        job.input_image = fx.dir.join("input").join("missing.png").to_string_lossy().into_owned();
        let mut stages = StageRecorder::default();

        let output = runner.run(&job, &fx.sinks(false, false), &mut stages);

        assert_eq!(output.status, JobStatus::Failed);
        assert!(fx.events().is_empty());
        assert_eq!(stages.stages(), vec!["init", "preprocess", "notify", "cleanup", "failed"]);
    }

    #[test]
    fn test_vertex_colored_export_delivers_one_mesh_file() {
        let fx = Fixture::new();
        let settings = PipelineSettings {
            export: MeshExport::VertexColored,
            ..mesh_only()
        };
        let runner = fx.runner(Failure::Nothing, settings);

        let output = runner.run(&fx.job(), &fx.sinks(false, false), &mut StageRecorder::default());

        assert_eq!(output.status, JobStatus::Done);
        assert!(matches!(&output.result, JobResult::Urls(urls) if urls.len() == 1));
    }

    #[test]
    fn test_output_record_format() {
        let done = JobOutput::done("j1", vec!["https://a".to_string(), "https://b".to_string()]);
        assert_eq!(
            serde_json::to_string(&done).unwrap(),
            r#"{"jobId":"j1","result":["https://a","https://b"],"status":"DONE"}"#
        );

        let failed = JobOutput::failed("j2", &Error::Delivery("rejected".to_string()));
        let value: serde_json::Value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["jobId"], "j2");
        assert_eq!(value["status"], "FAILED");
        assert!(value["result"].as_str().unwrap().starts_with("FAILED: "));

        let parsed: JobOutput = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, failed);
    }

    #[test]
    fn test_parse_job_envelopes() {
        let bare = parse_job(r#"{"input_image": "cat.png", "sample_steps": 30, "seed": 7}"#).unwrap();
        assert_eq!(bare.input_image, "cat.png");
        assert_eq!((bare.sample_steps, bare.seed), (30, 7));

        let wrapped = parse_job(r#"{"input": {"inputImage": "https://x/cat.png", "jobId": "abc"}}"#).unwrap();
        assert_eq!(wrapped.input_image, "https://x/cat.png");
        assert_eq!(wrapped.job_id.as_deref(), Some("abc"));
        assert_eq!((wrapped.sample_steps, wrapped.seed), (75, 42));

        assert!(parse_job(r#"{"seed": 1}"#).is_err());
    }

    fn env_config() -> WorkerConfig {
        WorkerConfig::from_lookup(|key| match key {
            "com_camenduru_notify_uri" => Some("https://status.example.com/hook".to_string()),
            "com_camenduru_notify_token" => Some("env-token".to_string()),
            "com_camenduru_discord_id" => Some("1234".to_string()),
            "com_camenduru_discord_channel" => Some("5678".to_string()),
            "com_camenduru_discord_token" => Some("bot-token".to_string()),
            "INSTAMESH_DIFFUSION_URL" => Some(String::new()),
            _ => None,
        })
    }

    #[test]
    fn test_sentinels_resolve_to_worker_defaults() {
        let job = parse_job(
            r#"{"input": {
                "input_image": "cat.png",
                "notify_uri": "notify_uri",
                "notify_token": "job-token",
                "discord_id": "discord_id",
                "discord_channel": "999",
                "discord_token": "discord_token",
                "job_id": "job-1"
            }}"#,
        )
        .unwrap();

        let resolved = job.resolve(&env_config());

        assert_eq!(resolved.job_id, "job-1");
        assert_eq!(resolved.notify.uri.as_deref(), Some("https://status.example.com/hook"));
        // Sentinel uri pulls in the default token too
        assert_eq!(resolved.notify.token.as_deref(), Some("env-token"));
        assert_eq!(resolved.discord.user_id.as_deref(), Some("1234"));
        assert_eq!(resolved.discord.channel.as_deref(), Some("999"));
        assert_eq!(resolved.discord.token.as_deref(), Some("bot-token"));
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let job = parse_job(
            r#"{"input_image": "cat.png", "notify_uri": "https://mine", "notify_token": "mine",
                "job_id": "job_id"}"#,
        )
        .unwrap();

        let resolved = job.resolve(&env_config());

        assert_eq!(resolved.notify.uri.as_deref(), Some("https://mine"));
        assert_eq!(resolved.notify.token.as_deref(), Some("mine"));
        // Sentinel job id gets a generated one
        assert_ne!(resolved.job_id, "job_id");
        assert!(uuid::Uuid::parse_str(&resolved.job_id).is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config = env_config();
        assert_eq!(config.diffusion_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.discord_api, DEFAULT_DISCORD_API);
        assert_eq!(config.cache_dir, config.scratch_dir.join("checkpoints"));
        assert!(config.recon_weights.is_none());

        let settings = PipelineSettings::default();
        assert_eq!(settings.render_views, 120);
        assert_eq!(settings.render_size, 384);
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.export, MeshExport::TextureMapped);
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scratch_cleanup_runs_once() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.scratch_dir()).unwrap();
        let mut scratch = JobScratch::new(fx.scratch_dir(), "job-7");

        let video = scratch.reserve("mp4");
        let mesh = scratch.reserve("obj");
        let name = video.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("job-7-") && name.ends_with(".mp4"));
        assert_ne!(video, mesh);

        // The mesh was never written: skipped without error
        touch(&video);
        assert_eq!(scratch.cleanup(), 1);
        assert!(!video.exists());

        touch(&video);
        assert_eq!(scratch.cleanup(), 0);
        assert!(video.exists());
    }

    #[test]
    fn test_scratch_cleans_on_drop() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.scratch_dir()).unwrap();
        let path = {
            let mut scratch = JobScratch::new(fx.scratch_dir(), "job-8");
            let path = scratch.reserve("png");
            scratch.register(path.clone());
            assert_eq!(scratch.paths().len(), 1);
            touch(&path);
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_worker_thread_runs_job() {
        let fx = Fixture::new();
        let mut worker = InferenceWorker::new(fx.runner(Failure::Nothing, mesh_only()));

        worker.submit(fx.job(), fx.sinks(false, false)).unwrap();

        let mut statuses = Vec::new();
        let output = loop {
            match worker.recv_response() {
                Some(WorkerResponse::Finished(output)) => break output,
                Some(WorkerResponse::Status(s)) => statuses.push(s),
                Some(WorkerResponse::Progress(p)) => assert!((0.0..=1.0).contains(&p)),
                None => panic!("worker exited early"),
            }
        };

        assert_eq!(output.status, JobStatus::Done);
        assert!(statuses.iter().any(|s| s == "Starting job job-42"));
        assert!(statuses.iter().any(|s| s == "done"));
        worker.shutdown();
    }
}
