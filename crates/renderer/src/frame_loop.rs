//! Frame loop state machine.
//!
//! [`FrameLoop`] drives one frame at a time against a [`FrameBackend`]. It
//! owns the slot index, the pending-resize flag and the pause state, while the
//! backend owns every GPU object. Keeping the two apart lets the sequencing be
//! exercised against a mock backend without a GPU.
//!
//! One iteration on slot `current_frame`:
//!
//! ```text
//! [resize pending -> recreate_swapchain]
//!        |
//!        v
//! wait_for_slot -> acquire_image --OutOfDate--> recreate_swapchain (abort)
//!                       |
//!                       v
//!          update_uniforms -> record_and_submit -> present
//!                                                     |
//!                            OutOfDate | Suboptimal -> recreate_swapchain
//!                                                     v
//!                                          current_frame = (current_frame + 1) % N
//! ```
//!
//! A recreation the backend cannot perform yet, because the surface currently
//! has a zero extent, is reported as [`RecreateOutcome::Deferred`]. The old
//! swapchain stays alive and the resize stays pending, so the next iteration
//! tries again before touching any slot.

use tracing::{debug, info};

use tessera_rhi::RhiResult;
use tessera_rhi::swapchain::{AcquireOutcome, PresentOutcome};

/// GPU side of the frame loop.
///
/// `slot` is always below the loop's frame count, and the calls for one
/// iteration always happen in the order listed here.
pub trait FrameBackend {
    /// Blocks until the slot's previous submission has completed.
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquires the next swapchain image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    /// Writes this frame's uniform data into the slot's buffer.
    fn update_uniforms(&mut self, slot: usize) -> RhiResult<()>;

    /// Resets the slot's fence, re-records its command buffer for
    /// `image_index` and submits it.
    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Presents `image_index` once the slot's render-finished semaphore
    /// signals.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Waits for the device to go idle and rebuilds every
    /// swapchain-dependent object.
    ///
    /// Returns [`RecreateOutcome::Deferred`] without touching the current
    /// swapchain when the surface has a zero extent.
    fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome>;
}

/// Result of [`FrameBackend::recreate_swapchain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// A new swapchain generation is live.
    Recreated,
    /// The surface has a zero extent. Nothing was rebuilt.
    Deferred,
}

/// What a call to [`FrameLoop::run_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was submitted and presented.
    Presented,
    /// Acquisition reported an out-of-date swapchain. It was recreated and
    /// nothing was submitted.
    Aborted,
    /// The surface has zero size, either reported by the window or found
    /// when recreating. Nothing was submitted.
    Paused,
}

/// Slot bookkeeping for N frames in flight.
#[derive(Debug)]
pub struct FrameLoop {
    frames_in_flight: usize,
    current_frame: usize,
    frames_submitted: u64,
    recreations: u64,
    resize_pending: bool,
    paused: bool,
}

impl FrameLoop {
    /// Creates a loop over `frames_in_flight` slots.
    ///
    /// A count of zero is raised to one.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_frame: 0,
            frames_submitted: 0,
            recreations: 0,
            resize_pending: false,
            paused: false,
        }
    }

    /// Records a new drawable size.
    ///
    /// A zero dimension pauses rendering until a non-zero size arrives. A
    /// non-zero size schedules recreation at the start of the next frame.
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            if !self.paused {
                debug!("Surface has zero size, pausing rendering");
            }
            self.paused = true;
            return;
        }

        if self.paused {
            debug!("Surface is {}x{} again, resuming rendering", width, height);
        }
        self.paused = false;
        self.resize_pending = true;
    }

    /// Runs one iteration of the loop.
    ///
    /// Only out-of-date and suboptimal results lead to recreation. Every other
    /// error propagates, and the slot does not advance.
    pub fn run_frame<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> RhiResult<FrameStatus> {
        if self.paused {
            return Ok(FrameStatus::Paused);
        }

        if self.resize_pending && !self.recreate(backend)? {
            return Ok(FrameStatus::Paused);
        }

        let slot = self.current_frame;
        backend.wait_for_slot(slot)?;

        let (image_index, acquired_suboptimal) = match backend.acquire_image(slot)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date during acquire, recreating");
                self.recreate(backend)?;
                return Ok(FrameStatus::Aborted);
            }
        };

        backend.update_uniforms(slot)?;
        backend.record_and_submit(slot, image_index)?;
        self.frames_submitted += 1;

        let presented = backend.present(slot, image_index)?;
        if presented.needs_recreate() || acquired_suboptimal {
            debug!(
                "Recreating swapchain after present ({:?}, acquire suboptimal: {})",
                presented, acquired_suboptimal
            );
            self.recreate(backend)?;
        }

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(FrameStatus::Presented)
    }

    /// Returns whether a new swapchain is live. A deferred recreation keeps
    /// the resize pending.
    fn recreate<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> RhiResult<bool> {
        match backend.recreate_swapchain()? {
            RecreateOutcome::Recreated => {
                self.resize_pending = false;
                self.recreations += 1;
                info!("Swapchain recreated ({} so far)", self.recreations);
                Ok(true)
            }
            RecreateOutcome::Deferred => {
                if !self.resize_pending {
                    debug!("Surface extent is zero, deferring swapchain recreation");
                }
                self.resize_pending = true;
                Ok(false)
            }
        }
    }

    /// Slot used by the next call to [`run_frame`](Self::run_frame).
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Number of frames submitted to the GPU so far.
    #[inline]
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Number of swapchain recreations so far.
    #[inline]
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    #[inline]
    pub fn is_resize_pending(&self) -> bool {
        self.resize_pending
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_frames_in_flight_is_raised() {
        let frame_loop = FrameLoop::new(0);
        assert_eq!(frame_loop.frames_in_flight(), 1);
    }

    #[test]
    fn test_zero_size_pauses_and_resumes() {
        let mut frame_loop = FrameLoop::new(2);

        frame_loop.notify_resized(0, 600);
        assert!(frame_loop.is_paused());
        assert!(!frame_loop.is_resize_pending());

        frame_loop.notify_resized(800, 600);
        assert!(!frame_loop.is_paused());
        assert!(frame_loop.is_resize_pending());
    }
}
