//! Fixed-length, non-overlapping patch walk over the frame sequence.

/// One model-sized group of consecutive frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch {
    pub index: usize,
    pub start_frame: usize,
    pub len: usize,
}

impl Patch {
    pub fn frames(&self) -> std::ops::Range<usize> {
        self.start_frame..self.start_frame + self.len
    }
}

/// Hands out patches in order. A patch is only submitted when its whole hop-aligned
/// sample span `[p*L*H, (p+1)*L*H)` lies inside the signal; the trailing partial patch
/// is dropped and its samples stay silent.
#[derive(Clone, Debug)]
pub struct PatchScheduler {
    patch_length: usize,
    total: usize,
    next: usize,
}

impl PatchScheduler {
    pub fn new(samples: usize, hop: usize, patch_length: usize) -> Self {
        let span = patch_length * hop;
        let total = if span == 0 { 0 } else { samples / span };
        Self {
            patch_length,
            total,
            next: 0,
        }
    }

    /// Patches that will be submitted over the whole conversion.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn done(&self) -> usize {
        self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.total
    }

    /// Frames covered by submitted patches.
    pub fn submitted_frames(&self) -> usize {
        self.total * self.patch_length
    }
}

impl Iterator for PatchScheduler {
    type Item = Patch;

    fn next(&mut self) -> Option<Patch> {
        if self.is_finished() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(Patch {
            index,
            start_frame: index * self.patch_length,
            len: self.patch_length,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PatchScheduler {}
