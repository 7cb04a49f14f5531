use crate::raster::TextRaster;

/// The text overlays competing for the display.
///
/// Holds at most one current entry per priority, plus one idle raster that is
/// shown when nothing else is.
#[derive(Debug, Default)]
pub struct OverlayRegistry {
    idle: Option<TextRaster>,
    current: Vec<TextRaster>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Appended,
    Replaced,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `raster`, replacing an existing entry of equal priority.
    pub fn insert_or_replace(&mut self, raster: TextRaster) -> Insertion {
        match self.position_of(raster.priority()) {
            Some(idx) => {
                tracing::debug!(
                    priority = raster.priority(),
                    old = self.current[idx].source(),
                    new = raster.source(),
                    "Replacing overlay"
                );
                self.current[idx] = raster;
                Insertion::Replaced
            }
            None => {
                self.current.push(raster);
                Insertion::Appended
            }
        }
    }

    pub fn set_idle(&mut self, raster: TextRaster) {
        self.idle = Some(raster);
    }

    pub fn idle(&self) -> Option<&TextRaster> {
        self.idle.as_ref()
    }

    /// Source text of the current entry at `priority`, used to append new
    /// text to what is already shown in that bucket.
    pub fn source_at(&self, priority: i32) -> Option<&str> {
        self.position_of(priority)
            .map(|idx| self.current[idx].source())
    }

    fn position_of(&self, priority: i32) -> Option<usize> {
        self.current.iter().position(|r| r.priority() == priority)
    }

    fn active_index(&self) -> Option<usize> {
        let mut best: Option<(usize, i32)> = None;

        for (idx, raster) in self.current.iter().enumerate() {
            match best {
                Some((_, prio)) if raster.priority() <= prio => {}
                _ => best = Some((idx, raster.priority())),
            }
        }

        best.map(|(idx, _)| idx)
    }

    /// Highest priority current entry; first inserted wins ties. Falls back to
    /// the idle raster.
    pub fn select_active(&self) -> Option<&TextRaster> {
        match self.active_index() {
            Some(idx) => self.current.get(idx),
            None => self.idle.as_ref(),
        }
    }

    pub fn select_active_mut(&mut self) -> Option<&mut TextRaster> {
        match self.active_index() {
            Some(idx) => self.current.get_mut(idx),
            None => self.idle.as_mut(),
        }
    }

    /// Drop every current entry whose duration ran out and which completed a
    /// display pass. Returns the number of evicted entries.
    pub fn prune_expired(&mut self) -> usize {
        let before = self.current.len();

        self.current.retain(|raster| {
            let expired = raster.is_expired();
            if expired {
                tracing::info!(text = raster.source(), "Finished overlay");
            }
            !expired
        });

        before - self.current.len()
    }

    pub fn current(&self) -> &[TextRaster] {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Insertion;
    use super::OverlayRegistry;
    use crate::raster::testing::with_priority;

    #[test]
    fn equal_priority_replaces() {
        let mut reg = OverlayRegistry::new();
        assert_eq!(reg.insert_or_replace(with_priority(1)), Insertion::Appended);
        assert_eq!(reg.insert_or_replace(with_priority(1)), Insertion::Replaced);
        assert_eq!(reg.current().len(), 1);
    }

    #[test]
    fn distinct_priorities_coexist_and_highest_wins() {
        for order in [[1, 5], [5, 1]] {
            let mut reg = OverlayRegistry::new();
            for prio in order {
                reg.insert_or_replace(with_priority(prio));
            }

            assert_eq!(reg.current().len(), 2);
            assert_eq!(reg.select_active().map(|r| r.priority()), Some(5));
        }
    }

    #[test]
    fn negative_priorities_are_selectable() {
        let mut reg = OverlayRegistry::new();
        reg.set_idle(with_priority(100));
        reg.insert_or_replace(with_priority(-3));

        assert_eq!(reg.select_active().map(|r| r.priority()), Some(-3));
    }

    #[test]
    fn idle_is_fallback() {
        let mut reg = OverlayRegistry::new();
        assert!(reg.select_active().is_none());

        reg.set_idle(with_priority(0));
        assert_eq!(reg.select_active().map(|r| r.priority()), Some(0));

        reg.insert_or_replace(with_priority(0));
        assert!(std::ptr::eq(
            reg.select_active().unwrap(),
            &reg.current()[0]
        ));
    }

    #[test]
    fn prune_keeps_entries_without_end_of_line() {
        let mut reg = OverlayRegistry::new();
        let mut r = with_priority(1);
        r.decrease_duration(Duration::from_secs(3600));
        reg.insert_or_replace(r);

        assert_eq!(reg.prune_expired(), 0);
        assert_eq!(reg.current().len(), 1);

        reg.select_active_mut().unwrap().set_end_of_line();
        assert_eq!(reg.prune_expired(), 1);
        assert!(reg.current().is_empty());
    }

    #[test]
    fn prune_keeps_entries_with_time_left() {
        let mut reg = OverlayRegistry::new();
        let mut r = with_priority(1);
        r.set_end_of_line();
        reg.insert_or_replace(r);

        assert_eq!(reg.prune_expired(), 0);
    }

    #[test]
    fn source_lookup_by_priority() {
        let mut reg = OverlayRegistry::new();
        reg.insert_or_replace(with_priority(2));
        assert_eq!(reg.source_at(2), Some("solid"));
        assert_eq!(reg.source_at(3), None);
    }
}
