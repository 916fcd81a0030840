//! Modification timestamps and per-resource build markers.
//!
//! Every mutable input (image data, transfer functions) carries a
//! [`TimeStamp`] that is bumped on modification. Every cached GPU resource
//! carries a [`BuildMarker`] recording when it was last built; the resource
//! is stale when its source was modified after that point.

use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL_TIME: AtomicU64 = AtomicU64::new(0);

/// A point on the process-wide monotonic modification clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeStamp(u64);

impl TimeStamp {
    /// Returns a fresh timestamp, strictly later than every previously issued one.
    pub fn now() -> Self {
        Self(GLOBAL_TIME.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Advances this stamp to the current time.
    pub fn modified(&mut self) {
        *self = Self::now();
    }

    /// Raw counter value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// The "last built at" marker of one cached resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildMarker {
    built_at: Option<TimeStamp>,
}

impl BuildMarker {
    /// A marker for a resource that has never been built.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a source modified at `mtime` requires a rebuild.
    #[must_use]
    pub fn is_stale(&self, mtime: TimeStamp) -> bool {
        self.built_at.map_or(true, |built| mtime > built)
    }

    /// Records that the resource was just built.
    pub fn mark_built(&mut self) {
        self.built_at = Some(TimeStamp::now());
    }

    /// Forgets the build, forcing the next check to report stale.
    pub fn invalidate(&mut self) {
        self.built_at = None;
    }

    /// When the resource was last built, if ever.
    #[must_use]
    pub fn built_at(&self) -> Option<TimeStamp> {
        self.built_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_monotonic() {
        let a = TimeStamp::now();
        let b = TimeStamp::now();
        assert!(b > a);

        let mut c = a;
        c.modified();
        assert!(c > b);
    }

    #[test]
    fn test_build_marker_lifecycle() {
        let mut source = TimeStamp::now();
        let mut marker = BuildMarker::new();
        assert!(marker.is_stale(source));

        marker.mark_built();
        assert!(!marker.is_stale(source));

        source.modified();
        assert!(marker.is_stale(source));

        marker.mark_built();
        assert!(!marker.is_stale(source));

        marker.invalidate();
        assert!(marker.is_stale(source));
        assert!(marker.built_at().is_none());
    }
}
