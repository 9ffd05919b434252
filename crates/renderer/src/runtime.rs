use std::time::{Duration, Instant};

use colorfx::{FrameContext, ViewGeometry};

/// Paces redraws of animated stacks to an optional FPS cap.
#[derive(Debug, Clone)]
pub(crate) struct FrameScheduler {
    interval: Option<Duration>,
    next_frame: Instant,
}

impl FrameScheduler {
    pub(crate) fn new(target_fps: Option<f32>, now: Instant) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok());
        Self {
            interval,
            next_frame: now,
        }
    }

    pub(crate) fn ready(&self, now: Instant) -> bool {
        now >= self.next_frame
    }

    pub(crate) fn mark_rendered(&mut self, now: Instant) {
        let Some(interval) = self.interval else {
            return;
        };
        // Skip missed slots instead of bursting to catch up.
        self.next_frame = match self.next_frame.checked_add(interval) {
            Some(next) if next > now => next,
            _ => now.checked_add(interval).unwrap_or(now),
        };
    }

    /// Deadline to sleep until, or `None` when uncapped.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.interval.map(|_| self.next_frame)
    }
}

/// Tracks whether the preview is on screen.
#[derive(Debug, Default)]
pub(crate) struct Visibility {
    occluded: bool,
}

impl Visibility {
    /// Records an occlusion change; returns true when a hidden window is shown again.
    pub(crate) fn update(&mut self, occluded: bool) -> bool {
        let reappeared = self.occluded && !occluded;
        self.occluded = occluded;
        reappeared
    }

    pub(crate) fn occluded(&self) -> bool {
        self.occluded
    }
}

/// Stamps successive frames with a monotonically increasing index.
#[derive(Debug, Default)]
pub(crate) struct FrameTimeline {
    next_index: u64,
}

impl FrameTimeline {
    pub(crate) fn next(&mut self, geometry: ViewGeometry, timestamp: Instant) -> FrameContext {
        let frame = FrameContext::new(geometry, timestamp).with_frame_index(self.next_index);
        self.next_index = self.next_index.saturating_add(1);
        frame
    }
}

/// Rolling once-per-second frame rate measurement.
#[derive(Debug)]
pub(crate) struct FrameStats {
    window_start: Instant,
    frames: u32,
}

impl FrameStats {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Records a frame; returns the frame rate whenever a full second has elapsed.
    pub(crate) fn record(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_scheduler_is_always_ready() {
        let start = Instant::now();
        let mut scheduler = FrameScheduler::new(None, start);
        assert!(scheduler.ready(start));
        scheduler.mark_rendered(start);
        assert!(scheduler.ready(start));
        assert!(scheduler.next_deadline().is_none());
    }

    #[test]
    fn capped_scheduler_waits_one_interval() {
        let start = Instant::now();
        let mut scheduler = FrameScheduler::new(Some(10.0), start);
        assert!(scheduler.ready(start));
        scheduler.mark_rendered(start);
        assert!(!scheduler.ready(start + Duration::from_millis(50)));
        assert!(scheduler.ready(start + Duration::from_millis(100)));
        assert_eq!(
            scheduler.next_deadline(),
            Some(start + Duration::from_millis(100))
        );
    }

    #[test]
    fn late_frames_do_not_burst() {
        let start = Instant::now();
        let mut scheduler = FrameScheduler::new(Some(10.0), start);
        let late = start + Duration::from_secs(1);
        scheduler.mark_rendered(late);
        assert_eq!(
            scheduler.next_deadline(),
            Some(late + Duration::from_millis(100))
        );
    }

    #[test]
    fn invalid_fps_is_treated_as_uncapped() {
        let start = Instant::now();
        assert!(FrameScheduler::new(Some(0.0), start).next_deadline().is_none());
        assert!(FrameScheduler::new(Some(f32::NAN), start)
            .next_deadline()
            .is_none());
        assert!(FrameScheduler::new(Some(1e-39), start)
            .next_deadline()
            .is_none());
    }

    #[test]
    fn interval_past_clock_range_does_not_overflow() {
        let start = Instant::now();
        let mut scheduler = FrameScheduler::new(Some(6e-20), start);
        assert!(scheduler.next_deadline().is_some());
        scheduler.mark_rendered(start);
        scheduler.mark_rendered(start);
    }

    #[test]
    fn reappearing_after_occlusion_is_reported_once() {
        let mut visibility = Visibility::default();
        assert!(!visibility.update(false));
        assert!(!visibility.update(true));
        assert!(visibility.occluded());
        assert!(visibility.update(false));
        assert!(!visibility.occluded());
        assert!(!visibility.update(false));
    }

    #[test]
    fn timeline_numbers_frames() {
        let now = Instant::now();
        let mut timeline = FrameTimeline::default();
        let geometry = ViewGeometry::new(10.0, 10.0);
        assert_eq!(timeline.next(geometry, now).frame_index, 0);
        assert_eq!(timeline.next(geometry, now).frame_index, 1);
    }

    #[test]
    fn stats_report_once_per_second() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);
        assert!(stats.record(start + Duration::from_millis(500)).is_none());
        let fps = stats
            .record(start + Duration::from_secs(1))
            .expect("a full second elapsed");
        assert!((fps - 2.0).abs() < 1e-3);
    }
}
