use ndarray::{Array1, Array4};
use spectral_stem_splitter::core::mask::{band_extend, MaskAccumulator};

fn patch_masks(stems: usize, frames: usize, bins: usize, offset: f32) -> Vec<Array4<f32>> {
    (0..stems)
        .map(|s| {
            Array4::from_shape_fn((1, frames, bins, 2), |(_, t, f, c)| {
                offset + s as f32 * 0.1 + t as f32 * 0.01 + f as f32 * 0.001 + c as f32 * 0.0001
            })
        })
        .collect()
}

#[test]
fn accumulates_patches_in_order() {
    let mut acc = MaskAccumulator::new(2, 3);
    assert_eq!(acc.stems(), 2);
    assert_eq!(acc.bins(), 3);
    assert_eq!(acc.frames(), 0);

    acc.push_patch(&patch_masks(2, 4, 3, 0.0));
    acc.push_patch(&patch_masks(2, 4, 3, 0.5));
    assert_eq!(acc.frames(), 8);

    // stem 1, right channel, second frame of the second patch
    let row = acc.frame(1, 1, 5);
    let expected: Vec<f32> = (0..3)
        .map(|f| 0.5 + 0.1 + 0.01 + f as f32 * 0.001 + 0.0001)
        .collect();
    assert_eq!(row, expected.as_slice());

    let first = acc.frame(0, 0, 0);
    assert_eq!(first, &[0.0, 0.001, 0.002]);
}

#[test]
fn band_extension_zeroes_above_model_band() {
    let mask = [0.5f32, 1.0, 0.25];
    let original = Array1::from(vec![2.0f32, 3.0, 4.0, 5.0, 6.0]);
    let mut out = vec![9.0f32; 5];
    band_extend(&mask, original.view(), &mut out);
    assert_eq!(out, vec![1.0, 3.0, 1.0, 0.0, 0.0]);
}
