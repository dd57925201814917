//! Frame loop sequencing against a mock backend.

use std::collections::VecDeque;

use tessera_renderer::{FrameBackend, FrameLoop, FrameStatus, RecreateOutcome, UniformFrameData};
use tessera_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use tessera_rhi::{RhiError, RhiResult, vk};
use tessera_scene::Camera;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Wait(usize),
    Acquire(usize),
    Uniforms(usize),
    Submit { slot: usize, image: u32 },
    Present { slot: usize, image: u32 },
    Recreate,
    RecreateDeferred,
}

/// Records every call and emulates fences and mapped uniform memory.
struct MockBackend {
    events: Vec<Event>,
    /// Fence state per slot. Submission clears it, waiting signals it as if
    /// the GPU had finished.
    fences: Vec<bool>,
    uniforms: Vec<Vec<u8>>,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    image_count: u32,
    next_image: u32,
    /// Number of upcoming recreations that see a zero-extent surface.
    minimized_recreations: usize,
    camera: Camera,
    clock: f32,
}

impl MockBackend {
    fn new(frames_in_flight: usize) -> Self {
        Self {
            events: Vec::new(),
            fences: vec![true; frames_in_flight],
            uniforms: vec![Vec::new(); frames_in_flight],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            image_count: 3,
            next_image: 0,
            minimized_recreations: 0,
            camera: Camera::default(),
            clock: 0.0,
        }
    }

    fn submitted_slots(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Submit { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|event| wanted(event)).count()
    }
}

impl FrameBackend for MockBackend {
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.events.push(Event::Wait(slot));
        self.fences[slot] = true;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        self.events.push(Event::Acquire(slot));
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }

        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal: false,
        })
    }

    fn update_uniforms(&mut self, slot: usize) -> RhiResult<()> {
        assert!(
            self.fences[slot],
            "uniforms of slot {slot} written while its fence is unsignaled"
        );
        self.events.push(Event::Uniforms(slot));

        self.clock += 0.25;
        let data = UniformFrameData::new(&self.camera, self.clock, 800, 600);
        self.uniforms[slot] = data.as_bytes().to_vec();
        Ok(())
    }

    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        self.fences[slot] = false;
        self.events.push(Event::Submit {
            slot,
            image: image_index,
        });
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        self.events.push(Event::Present {
            slot,
            image: image_index,
        });
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome> {
        if self.minimized_recreations > 0 {
            self.minimized_recreations -= 1;
            self.events.push(Event::RecreateDeferred);
            return Ok(RecreateOutcome::Deferred);
        }

        self.events.push(Event::Recreate);
        self.next_image = 0;
        Ok(RecreateOutcome::Recreated)
    }
}

#[test]
fn test_three_frames_cycle_two_slots() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    for _ in 0..3 {
        let status = frame_loop.run_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::Presented);
    }

    assert_eq!(frame_loop.frames_submitted(), 3);
    assert_eq!(backend.submitted_slots(), vec![0, 1, 0]);
    assert_eq!(frame_loop.recreations(), 0);
    assert_eq!(backend.count(|e| matches!(e, Event::Recreate)), 0);
}

#[test]
fn test_iteration_order() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.run_frame(&mut backend).unwrap();

    assert_eq!(
        backend.events,
        vec![
            Event::Wait(0),
            Event::Acquire(0),
            Event::Uniforms(0),
            Event::Submit { slot: 0, image: 0 },
            Event::Present { slot: 0, image: 0 },
        ]
    );
}

#[test]
fn test_current_frame_is_submissions_mod_n() {
    for frames_in_flight in 1..=3 {
        let mut backend = MockBackend::new(frames_in_flight);
        let mut frame_loop = FrameLoop::new(frames_in_flight);

        for k in 1..=10u64 {
            frame_loop.run_frame(&mut backend).unwrap();
            assert_eq!(frame_loop.frames_submitted(), k);
            assert_eq!(
                frame_loop.current_frame() as u64,
                k % frames_in_flight as u64,
                "N = {frames_in_flight}, K = {k}"
            );
        }
    }
}

#[test]
fn test_out_of_date_acquire_aborts_frame() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.run_frame(&mut backend).unwrap();
    backend.acquire_script.push_back(AcquireOutcome::OutOfDate);

    let status = frame_loop.run_frame(&mut backend).unwrap();
    assert_eq!(status, FrameStatus::Aborted);
    assert_eq!(frame_loop.recreations(), 1);
    assert_eq!(frame_loop.frames_submitted(), 1);
    // The slot does not advance for an aborted frame
    assert_eq!(frame_loop.current_frame(), 1);

    // Nothing was submitted, so nothing signals render-finished
    let tail: Vec<Event> = backend.events[5..].to_vec();
    assert_eq!(
        tail,
        vec![Event::Wait(1), Event::Acquire(1), Event::Recreate]
    );

    let status = frame_loop.run_frame(&mut backend).unwrap();
    assert_eq!(status, FrameStatus::Presented);
    assert_eq!(backend.submitted_slots(), vec![0, 1]);
    assert_eq!(backend.count(|e| matches!(e, Event::Recreate)), 1);
}

#[test]
fn test_resize_recreates_once_before_next_submission() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.run_frame(&mut backend).unwrap();
    frame_loop.notify_resized(1024, 768);
    frame_loop.run_frame(&mut backend).unwrap();
    frame_loop.run_frame(&mut backend).unwrap();

    assert_eq!(frame_loop.recreations(), 1);
    assert!(!frame_loop.is_resize_pending());

    let recreate_at = backend
        .events
        .iter()
        .position(|e| *e == Event::Recreate)
        .expect("no recreation recorded");
    // Only the frame before the resize used the old swapchain
    let submits_before = backend.events[..recreate_at]
        .iter()
        .filter(|e| matches!(e, Event::Submit { .. }))
        .count();
    assert_eq!(submits_before, 1);
    assert_eq!(
        &backend.events[recreate_at..recreate_at + 4],
        &[
            Event::Recreate,
            Event::Wait(1),
            Event::Acquire(1),
            Event::Uniforms(1),
        ]
    );
    assert_eq!(backend.submitted_slots(), vec![0, 1, 0]);
}

#[test]
fn test_resize_does_not_recreate_after_present() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.notify_resized(1024, 768);
    frame_loop.run_frame(&mut backend).unwrap();

    assert_eq!(
        backend.events,
        vec![
            Event::Recreate,
            Event::Wait(0),
            Event::Acquire(0),
            Event::Uniforms(0),
            Event::Submit { slot: 0, image: 0 },
            Event::Present { slot: 0, image: 0 },
        ]
    );
}

#[test]
fn test_zero_extent_surface_defers_recreation() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.run_frame(&mut backend).unwrap();

    // Minimized before any resize event arrived
    backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
    backend.minimized_recreations = 2;

    let status = frame_loop.run_frame(&mut backend).unwrap();
    assert_eq!(status, FrameStatus::Aborted);
    assert_eq!(frame_loop.recreations(), 0);
    assert!(frame_loop.is_resize_pending());

    // Still minimized: nothing touches a slot
    let before = backend.events.len();
    let status = frame_loop.run_frame(&mut backend).unwrap();
    assert_eq!(status, FrameStatus::Paused);
    assert_eq!(&backend.events[before..], &[Event::RecreateDeferred]);
    assert!(frame_loop.is_resize_pending());

    // Restored
    let status = frame_loop.run_frame(&mut backend).unwrap();
    assert_eq!(status, FrameStatus::Presented);
    assert_eq!(frame_loop.recreations(), 1);
    assert!(!frame_loop.is_resize_pending());
    assert_eq!(backend.submitted_slots(), vec![0, 1]);
    assert_eq!(frame_loop.current_frame(), 0);
}

#[test]
fn test_suboptimal_present_recreates() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    backend.present_script.push_back(PresentOutcome::Suboptimal);
    backend.present_script.push_back(PresentOutcome::OutOfDate);

    frame_loop.run_frame(&mut backend).unwrap();
    frame_loop.run_frame(&mut backend).unwrap();
    frame_loop.run_frame(&mut backend).unwrap();

    assert_eq!(frame_loop.recreations(), 2);
    assert_eq!(frame_loop.frames_submitted(), 3);
    assert_eq!(frame_loop.current_frame(), 1);
}

#[test]
fn test_suboptimal_acquire_still_renders() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    backend.acquire_script.push_back(AcquireOutcome::Ready {
        image_index: 2,
        suboptimal: true,
    });

    let status = frame_loop.run_frame(&mut backend).unwrap();
    assert_eq!(status, FrameStatus::Presented);
    assert_eq!(
        &backend.events[3..],
        &[
            Event::Submit { slot: 0, image: 2 },
            Event::Present { slot: 0, image: 2 },
            Event::Recreate,
        ]
    );
}

#[test]
fn test_zero_size_pauses_until_resized() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.notify_resized(0, 0);
    for _ in 0..3 {
        assert_eq!(frame_loop.run_frame(&mut backend).unwrap(), FrameStatus::Paused);
    }
    assert!(backend.events.is_empty());

    frame_loop.notify_resized(640, 480);
    assert_eq!(
        frame_loop.run_frame(&mut backend).unwrap(),
        FrameStatus::Presented
    );
    assert_eq!(frame_loop.frames_submitted(), 1);
    assert_eq!(frame_loop.recreations(), 1);
}

#[test]
fn test_uniform_round_trip_after_fence_signaled() {
    let mut backend = MockBackend::new(2);
    let mut frame_loop = FrameLoop::new(2);

    frame_loop.run_frame(&mut backend).unwrap();
    frame_loop.run_frame(&mut backend).unwrap();

    let camera = Camera::default();
    for (slot, clock) in [(0usize, 0.25f32), (1, 0.5)] {
        let expected = UniformFrameData::new(&camera, clock, 800, 600);
        let bytes = &backend.uniforms[slot];
        assert_eq!(bytes.as_slice(), expected.as_bytes());

        let read_back: UniformFrameData = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(read_back, expected);
    }
}

/// Fails the first submission, as a lost device would.
struct FailingBackend {
    inner: MockBackend,
}

impl FrameBackend for FailingBackend {
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.inner.wait_for_slot(slot)
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        self.inner.acquire_image(slot)
    }

    fn update_uniforms(&mut self, slot: usize) -> RhiResult<()> {
        self.inner.update_uniforms(slot)
    }

    fn record_and_submit(&mut self, _slot: usize, _image_index: u32) -> RhiResult<()> {
        Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        self.inner.present(slot, image_index)
    }

    fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome> {
        self.inner.recreate_swapchain()
    }
}

#[test]
fn test_other_errors_propagate() {
    let mut backend = FailingBackend {
        inner: MockBackend::new(2),
    };
    let mut frame_loop = FrameLoop::new(2);

    let err = frame_loop.run_frame(&mut backend).unwrap_err();
    assert!(matches!(
        err,
        RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)
    ));
    assert_eq!(frame_loop.frames_submitted(), 0);
    assert_eq!(frame_loop.current_frame(), 0);
    assert_eq!(frame_loop.recreations(), 0);
}
