/// Progress callback for long-running stages
pub trait ProgressCallback {
    /// Called with progress fraction (0.0 to 1.0)
    fn update(&mut self, progress: f32, message: &str);
}

/// Maps a nested loop's 0..1 progress into `[start, end]` of the outer callback
pub struct ScaledProgress<'a> {
    inner: &'a mut dyn ProgressCallback,
    start: f32,
    end: f32,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a mut dyn ProgressCallback, start: f32, end: f32) -> Self {
        Self { inner, start, end }
    }
}

impl ProgressCallback for ScaledProgress<'_> {
    fn update(&mut self, progress: f32, message: &str) {
        let progress = progress.clamp(0.0, 1.0);
        self.inner
            .update(self.start + (self.end - self.start) * progress, message);
    }
}

/// Step counter for a loop of known length
pub struct ProgressTracker {
    pub current_step: usize,
    pub total_steps: usize,
    pub message: String,
}

impl ProgressTracker {
    pub fn new(total_steps: usize) -> Self {
        Self {
            current_step: 0,
            total_steps,
            message: String::new(),
        }
    }

    pub fn progress(&self) -> f32 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.current_step as f32 / self.total_steps as f32
        }
    }

    pub fn step(&mut self, message: impl Into<String>) {
        self.current_step += 1;
        self.message = message.into();
    }

    /// Advance and forward the new state to `callback`
    pub fn step_and_report(&mut self, message: impl Into<String>, callback: &mut dyn ProgressCallback) {
        self.step(message);
        callback.update(self.progress(), &self.message);
    }
}
