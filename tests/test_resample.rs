mod common;
use common::{max_abs_diff, sine};
use ndarray::Array2;
use somno::resample::resample;
use somno::{ChannelKind, Raw};

#[test]
fn downsample_250_to_100_keeps_slow_waves() {
    let n = 2500;
    let x = sine(5.0, 1.0, 250.0, n);
    let data = Array2::from_shape_vec((1, n), x).unwrap();

    let y = resample(&data, 250.0, 100.0).unwrap();
    assert_eq!(y.dim(), (1, 1000));

    let expected = sine(5.0, 1.0, 100.0, 1000);
    let got = y.row(0).to_vec();
    let err = max_abs_diff(&got[100..900], &expected[100..900]);
    // The 4096-sample padded block maps to round(1638.4) = 1638 samples, so
    // the effective ratio is 0.3999 and the sine drifts by a few hundredths.
    assert!(err < 0.05, "max error {err:.4}");
}

#[test]
fn raw_resample_updates_rate_and_lowpass() {
    let data = Array2::from_shape_fn((2, 5000), |(c, t)| ((c + 1) as f32 * t as f32 * 0.01).sin());
    let mut raw = Raw::new(data, vec!["a".into(), "b".into()], vec![ChannelKind::Eeg; 2], 250.0).unwrap();

    raw.resample(100.0).unwrap();
    assert_eq!(raw.sfreq, 100.0);
    assert_eq!(raw.n_times(), 2000);
    assert_eq!(raw.lowpass, Some(50.0));
    approx::assert_abs_diff_eq!(raw.duration_secs(), 20.0, epsilon = 1e-9);
}

#[test]
fn same_rate_is_identity() {
    let data = Array2::from_shape_fn((1, 300), |(_, t)| t as f32);
    let y = resample(&data, 100.0, 100.0).unwrap();
    assert_eq!(y, data);
}
