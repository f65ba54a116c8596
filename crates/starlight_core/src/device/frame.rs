//! Per-frame acquire → record → submit → present cycle
//!
//! [`FrameSubmitter`] walks every frame through [`FrameState`] in order and
//! blocks on the GPU where the cycle requires it. Blocking waits go through a
//! [`WaitPolicy`], which can bound them in time or let another thread cancel
//! them through a [`CancellationToken`].
//!
//! A frame that fails after its image was acquired leaves the shared
//! semaphores in an unknown state. The submitter then stays in the state the
//! failure happened in and refuses further frames with
//! [`VulkanError::FrameAborted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ash::vk;

use super::logical::LogicalDevice;
use super::presentation::Presentation;
use super::queues::QueueRole;
use super::{VulkanError, VulkanResult};

/// Longest single blocking call made by a bounded or cancellable wait
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Phase of the frame currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameState {
    /// No frame in flight
    #[default]
    Idle,
    /// Acquiring a swapchain image and waiting for its fence
    Acquiring,
    /// Recording the image's command buffer
    Recording,
    /// Command buffer submitted to the graphics queue
    Submitted,
    /// Queuing the image for presentation
    Presenting,
}

impl FrameState {
    /// State that follows this one in a successful frame
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Acquiring,
            Self::Acquiring => Self::Recording,
            Self::Recording => Self::Submitted,
            Self::Submitted => Self::Presenting,
            Self::Presenting => Self::Idle,
        }
    }
}

/// Flag another thread can set to abort a blocked frame wait
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every wait observing this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called on this token or a clone
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a wait under a [`WaitPolicy`] gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFailure {
    /// The policy's timeout elapsed
    Timeout,
    /// The policy's token was cancelled
    Cancelled,
    /// The wait itself failed
    Failed(vk::Result),
}

impl WaitFailure {
    /// Convert into a device error, wrapping API failures with `wrap`
    pub fn into_error(self, wrap: fn(vk::Result) -> VulkanError) -> VulkanError {
        match self {
            Self::Timeout => VulkanError::Timeout,
            Self::Cancelled => VulkanError::Cancelled,
            Self::Failed(result) => wrap(result),
        }
    }
}

/// How long frame waits may block and whether they can be cancelled
///
/// The default waits without limit.
#[derive(Debug, Clone, Default)]
pub struct WaitPolicy {
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl WaitPolicy {
    /// Block until the GPU is done, however long that takes
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up with [`VulkanError::Timeout`] after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    /// Also give up with [`VulkanError::Cancelled`] once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Timeout of every individual wait, if bounded
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `attempt` until it succeeds or the policy gives up
    ///
    /// `attempt` receives the number of nanoseconds it may block. It reports
    /// `TIMEOUT` or `NOT_READY` when nothing happened within that time; any
    /// other error ends the wait immediately.
    pub fn wait_with<T>(
        &self,
        mut attempt: impl FnMut(u64) -> Result<T, vk::Result>,
    ) -> Result<T, WaitFailure> {
        if self.timeout.is_none() && self.cancel.is_none() {
            return attempt(u64::MAX).map_err(WaitFailure::Failed);
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(WaitFailure::Cancelled);
            }

            let slice = deadline.map_or(WAIT_SLICE, |deadline| {
                deadline.saturating_duration_since(Instant::now()).min(WAIT_SLICE)
            });

            match attempt(duration_to_ns(slice)) {
                Ok(value) => return Ok(value),
                Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Err(WaitFailure::Timeout);
                    }
                }
                Err(e) => return Err(WaitFailure::Failed(e)),
            }
        }
    }
}

fn duration_to_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Drives frames through the acquire/record/submit/present cycle
#[derive(Debug, Default)]
pub struct FrameSubmitter {
    state: FrameState,
    frames_presented: u64,
    last_image: Option<u32>,
}

impl FrameSubmitter {
    /// Create a submitter with no frame in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; anything but [`FrameState::Idle`] between frames means a frame failed
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of frames successfully queued for presentation
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Swapchain image used by the last presented frame
    pub fn last_image(&self) -> Option<u32> {
        self.last_image
    }

    fn begin(&mut self) -> VulkanResult<()> {
        if self.state != FrameState::Idle {
            return Err(VulkanError::FrameAborted(self.state));
        }
        self.state = FrameState::Acquiring;
        Ok(())
    }

    fn advance(&mut self) {
        self.state = self.state.next();
    }

    fn finish(&mut self, image_index: u32) {
        self.advance();
        debug_assert_eq!(self.state, FrameState::Idle);
        self.frames_presented += 1;
        self.last_image = Some(image_index);
    }

    /// Clear the next swapchain image to `color` and present it
    ///
    /// Returns the index of the presented image.
    pub fn run(
        &mut self,
        logical: &LogicalDevice,
        presentation: &Presentation,
        color: [f32; 4],
        policy: &WaitPolicy,
    ) -> VulkanResult<u32> {
        self.begin()?;

        let device = logical.device();
        let queue = logical.queue(QueueRole::Graphics);
        let swapchain = presentation.swapchain();
        let sync = presentation.sync();

        let acquired = policy.wait_with(|timeout| unsafe {
            swapchain.loader().acquire_next_image(
                swapchain.handle(),
                timeout,
                sync.present_completed.handle(),
                vk::Fence::null(),
            )
        });
        let (image_index, suboptimal) = match acquired {
            Ok(acquired) => acquired,
            Err(failure) => {
                // Nothing was signaled, the next frame may try again
                self.state = FrameState::Idle;
                return Err(failure.into_error(VulkanError::Acquire));
            }
        };
        if suboptimal {
            log::debug!("Acquired suboptimal swapchain image {image_index}");
        }

        let image = image_index as usize;
        let fence = sync.fence(image)?;
        policy
            .wait_with(|timeout| fence.wait(timeout))
            .map_err(|failure| failure.into_error(VulkanError::FenceWait))?;
        fence.reset().map_err(VulkanError::FenceWait)?;

        self.advance();
        let mut recorder = presentation
            .command_buffers(QueueRole::Graphics)
            .record(image)?;
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        {
            // Empty pass: the attachments are only cleared
            let _pass = recorder.begin_render_pass(
                presentation.render_target().render_pass(),
                presentation.render_target().framebuffer(image)?,
                presentation.render_target().render_area(),
                &clear_values,
            )?;
        }
        let command_buffer = recorder.end()?;

        self.advance();
        let wait_semaphores = [sync.present_completed.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_completed.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device
                .queue_submit(queue, &[submit_info], fence.handle())
                .map_err(VulkanError::Submit)?;
        }

        self.advance();
        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe {
            swapchain
                .loader()
                .queue_present(queue, &present_info)
                .map_err(VulkanError::Present)?
        };
        if suboptimal {
            log::debug!("Presented to a suboptimal swapchain");
        }

        self.finish(image_index);
        Ok(image_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cycle() {
        let mut state = FrameState::Idle;
        let mut seen = Vec::new();
        for _ in 0..5 {
            state = state.next();
            seen.push(state);
        }

        assert_eq!(
            seen,
            vec![
                FrameState::Acquiring,
                FrameState::Recording,
                FrameState::Submitted,
                FrameState::Presenting,
                FrameState::Idle,
            ]
        );
    }

    #[test]
    fn test_submitter_counts_finished_frames() {
        let mut submitter = FrameSubmitter::new();
        for image in [0, 1, 0] {
            submitter.begin().unwrap();
            for _ in 0..3 {
                submitter.advance();
            }
            assert_eq!(submitter.state(), FrameState::Presenting);
            submitter.finish(image);
        }

        assert_eq!(submitter.state(), FrameState::Idle);
        assert_eq!(submitter.frames_presented(), 3);
        assert_eq!(submitter.last_image(), Some(0));
    }

    #[test]
    fn test_failed_frame_blocks_later_frames() {
        let mut submitter = FrameSubmitter::new();
        submitter.begin().unwrap();
        submitter.advance();
        // Recording failed here; the state is left as is

        let err = submitter.begin().unwrap_err();
        assert!(matches!(err, VulkanError::FrameAborted(FrameState::Recording)));
        assert_eq!(submitter.frames_presented(), 0);
        assert_eq!(submitter.last_image(), None);
    }

    #[test]
    fn test_unbounded_wait_passes_max_timeout() {
        let mut timeouts = Vec::new();
        let result = WaitPolicy::unbounded().wait_with(|timeout| {
            timeouts.push(timeout);
            Ok::<_, vk::Result>(7)
        });

        assert_eq!(result, Ok(7));
        assert_eq!(timeouts, vec![u64::MAX]);
    }

    #[test]
    fn test_unbounded_wait_propagates_errors() {
        let result: Result<(), _> =
            WaitPolicy::unbounded().wait_with(|_| Err(vk::Result::ERROR_DEVICE_LOST));

        assert_eq!(result, Err(WaitFailure::Failed(vk::Result::ERROR_DEVICE_LOST)));
    }

    #[test]
    fn test_bounded_wait_retries_until_success() {
        let mut calls = 0;
        let result = WaitPolicy::with_timeout(Duration::from_secs(5)).wait_with(|timeout| {
            assert!(timeout <= duration_to_ns(WAIT_SLICE));
            calls += 1;
            if calls < 3 {
                Err(vk::Result::TIMEOUT)
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let result: Result<(), _> = WaitPolicy::with_timeout(Duration::from_millis(30))
            .wait_with(|timeout| {
                std::thread::sleep(Duration::from_nanos(timeout));
                Err(vk::Result::TIMEOUT)
            });

        assert_eq!(result, Err(WaitFailure::Timeout));
    }

    #[test]
    fn test_zero_timeout_still_attempts_once() {
        let mut calls = 0;
        let result: Result<(), _> = WaitPolicy::with_timeout(Duration::ZERO).wait_with(|timeout| {
            calls += 1;
            assert_eq!(timeout, 0);
            Err(vk::Result::NOT_READY)
        });

        assert_eq!(result, Err(WaitFailure::Timeout));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_bounded_wait_propagates_other_errors() {
        let result: Result<(), _> = WaitPolicy::with_timeout(Duration::from_secs(5))
            .wait_with(|_| Err(vk::Result::ERROR_OUT_OF_DATE_KHR));

        assert_eq!(result, Err(WaitFailure::Failed(vk::Result::ERROR_OUT_OF_DATE_KHR)));
    }

    #[test]
    fn test_cancelled_token_stops_wait() {
        let token = CancellationToken::new();
        let policy = WaitPolicy::unbounded().with_cancellation(token.clone());

        let mut calls = 0;
        let result: Result<(), _> = policy.wait_with(|_| {
            calls += 1;
            if calls == 2 {
                token.cancel();
            }
            Err(vk::Result::TIMEOUT)
        });

        assert_eq!(result, Err(WaitFailure::Cancelled));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = CancellationToken::new();
        let policy = WaitPolicy::unbounded().with_cancellation(token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
        let result: Result<(), _> = policy.wait_with(|timeout| {
            std::thread::sleep(Duration::from_nanos(timeout));
            Err(vk::Result::TIMEOUT)
        });
        canceller.join().unwrap();

        assert_eq!(result, Err(WaitFailure::Cancelled));
    }

    #[test]
    fn test_wait_failure_maps_to_device_errors() {
        assert!(matches!(
            WaitFailure::Timeout.into_error(VulkanError::FenceWait),
            VulkanError::Timeout
        ));
        assert!(matches!(
            WaitFailure::Cancelled.into_error(VulkanError::Acquire),
            VulkanError::Cancelled
        ));
        assert!(matches!(
            WaitFailure::Failed(vk::Result::ERROR_DEVICE_LOST).into_error(VulkanError::Acquire),
            VulkanError::Acquire(vk::Result::ERROR_DEVICE_LOST)
        ));
    }
}
