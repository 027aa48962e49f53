use std::sync::{Mutex, OnceLock};

/// Progress events emitted by [`StemSplitter::split_file`](crate::StemSplitter::split_file).
#[derive(Clone, Debug, PartialEq)]
pub enum SplitProgress {
    Stage(&'static str),
    Patches { done: usize, total: usize, percent: f32 },
    Finished,
}

type ProgressCb = Box<dyn Fn(SplitProgress) + Send + 'static>;

static SPLIT_PROGRESS_CB: OnceLock<Mutex<Option<ProgressCb>>> = OnceLock::new();

/// Register the process-wide progress observer, replacing any previous one.
pub fn set_split_progress_callback(cb: impl Fn(SplitProgress) + Send + 'static) {
    let slot = SPLIT_PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn emit_split_progress(progress: SplitProgress) {
    if let Some(m) = SPLIT_PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(progress);
            }
        }
    }
}
