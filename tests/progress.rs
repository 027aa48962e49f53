mod common;

use std::sync::{Arc, Mutex};

use common::{small_config, tone_pair, Passthrough};
use spectral_stem_splitter::{
    set_split_progress_callback, ModelLoader, Separator, SplitProgress, StemCount, StemSplitter,
};

#[test]
fn split_reports_stages_and_patches() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    set_split_progress_callback(move |p| sink.lock().unwrap().push(p));

    let loader: ModelLoader = Box::new(|n: StemCount| -> anyhow::Result<Box<dyn Separator>> {
        Ok(Box::new(Passthrough::new(n)))
    });
    let mut splitter = StemSplitter::new(loader, small_config());
    splitter
        .split_waveform(StemCount::Two, tone_pair(256 * 3, 256), "mix")
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.first(), Some(&SplitProgress::Stage("infer")));
    let patches: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            SplitProgress::Patches { done, total, .. } => Some((*done, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(patches, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(events.last(), Some(&SplitProgress::Stage("reconstruct")));
}
