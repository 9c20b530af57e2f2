use std::f32::consts::PI;

use approx::assert_abs_diff_eq;
use speechfeat::features::mel::MelFilterBank;
use speechfeat::features::{FLOAT_MIN, EPSILON};
use speechfeat::{
    FbankOptions, FeatureComputer, FeaturePipeline, FrameExtractionOptions, MfccOptions,
    SpectralFeature, SpectrogramOptions,
};

const SAMPLE_RATE: u32 = 16_000;

fn frame_opts() -> FrameExtractionOptions {
    FrameExtractionOptions {
        dither: 0.0,
        ..FrameExtractionOptions::default()
    }
}

fn sine_wave(freq: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
    let len = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..len)
        .map(|n| amplitude * (2.0 * PI * freq * n as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn mfcc_pipeline(frame_opts: FrameExtractionOptions) -> FeaturePipeline {
    let computer = FeatureComputer::mfcc(MfccOptions {
        frame_opts,
        ..MfccOptions::default()
    })
    .expect("default mfcc options are valid");
    FeaturePipeline::new(computer).expect("pipeline builds")
}

#[test]
fn silent_frame_mfcc_matches_floored_energy_and_flat_cepstrum() {
    let features = mfcc_pipeline(frame_opts())
        .compute(&[0.0; 400], SAMPLE_RATE)
        .expect("mfcc on silence");
    assert_eq!(features.dim(), (1, 13));
    assert_abs_diff_eq!(features[[0, 0]], FLOAT_MIN.ln(), epsilon = 1e-4);
    for c in 1..13 {
        assert_abs_diff_eq!(features[[0, c]], 0.0, epsilon = 1e-3);
    }
}

#[test]
fn silent_frame_fbank_is_floored_everywhere() {
    let computer = FeatureComputer::fbank(FbankOptions {
        frame_opts: frame_opts(),
        ..FbankOptions::default()
    })
    .unwrap();
    let features = FeaturePipeline::new(computer)
        .unwrap()
        .compute(&[0.0; 800], SAMPLE_RATE)
        .unwrap();
    assert_eq!(features.dim(), (3, 24));
    for row in features.rows() {
        assert_abs_diff_eq!(row[0], FLOAT_MIN.ln(), epsilon = 1e-4);
        for &value in row.iter().skip(1) {
            assert_abs_diff_eq!(value, EPSILON.ln(), epsilon = 1e-4);
        }
    }
}

#[test]
fn dimensions_follow_options() {
    let wave = sine_wave(300.0, 0.5, 1000.0);
    let cases: Vec<(FeatureComputer, usize)> = vec![
        (
            FeatureComputer::mfcc(MfccOptions {
                frame_opts: frame_opts(),
                ..MfccOptions::default()
            })
            .unwrap(),
            13,
        ),
        (
            FeatureComputer::fbank(FbankOptions {
                frame_opts: frame_opts(),
                use_energy: false,
                ..FbankOptions::default()
            })
            .unwrap(),
            23,
        ),
        (
            FeatureComputer::spectrogram(SpectrogramOptions {
                frame_opts: frame_opts(),
                ..SpectrogramOptions::default()
            })
            .unwrap(),
            257,
        ),
    ];
    for (computer, dim) in cases {
        assert_eq!(computer.dimension(), dim);
        let features = FeaturePipeline::new(computer).unwrap().compute(&wave, SAMPLE_RATE).unwrap();
        // 8000 samples, 400-sample frames every 160 samples
        assert_eq!(features.dim(), (48, dim));
        assert!(features.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn centered_frames_cover_the_whole_waveform() {
    let pipeline = mfcc_pipeline(FrameExtractionOptions {
        snip_edges: false,
        ..frame_opts()
    });
    let features = pipeline.compute(&sine_wave(440.0, 0.0625, 500.0), SAMPLE_RATE).unwrap();
    assert_eq!(features.nrows(), 5);
}

#[test]
fn tone_peaks_in_the_mel_bin_around_its_frequency() {
    let opts = FbankOptions {
        frame_opts: frame_opts(),
        use_energy: false,
        ..FbankOptions::default()
    };
    let bank = MelFilterBank::new(&opts.mel_opts, &opts.frame_opts, 1.0).unwrap();
    let pipeline = FeaturePipeline::new(FeatureComputer::fbank(opts).unwrap()).unwrap();
    let features = pipeline
        .compute(&sine_wave(1_000.0, 0.2, 8000.0), SAMPLE_RATE)
        .unwrap();

    for row in features.rows() {
        let (peak, _) = row
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        let center = bank.center_freqs()[peak];
        assert!(
            (center - 1_000.0).abs() < 150.0,
            "peak bin {peak} centered at {center} Hz"
        );
    }
}

#[test]
fn louder_signal_raises_log_energy_column() {
    let pipeline = mfcc_pipeline(frame_opts());
    let quiet = pipeline.compute(&sine_wave(500.0, 0.1, 100.0), SAMPLE_RATE).unwrap();
    let loud = pipeline.compute(&sine_wave(500.0, 0.1, 1000.0), SAMPLE_RATE).unwrap();
    for t in 0..quiet.nrows() {
        // ten times the amplitude is a hundred times the energy
        assert_abs_diff_eq!(loud[[t, 0]] - quiet[[t, 0]], 100.0_f32.ln(), epsilon = 1e-2);
    }
}

#[test]
fn dithered_output_is_reproducible() {
    let dithered = FrameExtractionOptions {
        dither: 1.0,
        dither_seed: 7,
        ..FrameExtractionOptions::default()
    };
    let wave = sine_wave(200.0, 0.3, 300.0);
    let first = mfcc_pipeline(dithered.clone()).compute(&wave, SAMPLE_RATE).unwrap();
    let second = mfcc_pipeline(dithered.clone()).compute(&wave, SAMPLE_RATE).unwrap();
    assert_eq!(first, second);

    let reseeded = mfcc_pipeline(FrameExtractionOptions {
        dither_seed: 8,
        ..dithered
    })
    .compute(&wave, SAMPLE_RATE)
    .unwrap();
    assert_ne!(first, reseeded);
}

#[test]
fn parallel_rows_match_single_frame_computation() {
    let pipeline = mfcc_pipeline(frame_opts());
    let wave = sine_wave(700.0, 1.0, 2000.0);
    let whole = pipeline.compute(&wave, SAMPLE_RATE).unwrap();
    assert_eq!(whole.nrows(), 98);

    // a waveform cut at frame 50 yields the same first row when snipping edges
    let start = 50 * 160;
    let single = pipeline.compute(&wave[start..start + 400], SAMPLE_RATE).unwrap();
    assert_eq!(single.nrows(), 1);
    for c in 0..13 {
        assert_abs_diff_eq!(single[[0, c]], whole[[50, c]], epsilon = 1e-3);
    }
}

#[test]
fn vtln_warp_changes_mel_features_but_not_the_spectrogram() {
    let wave = sine_wave(1_500.0, 0.1, 1000.0);
    let mfcc = mfcc_pipeline(frame_opts());
    let plain = mfcc.compute_features(&wave, SAMPLE_RATE, 1.0).unwrap();
    let warped = mfcc.compute_features(&wave, SAMPLE_RATE, 0.9).unwrap();
    assert_eq!(plain.dim(), warped.dim());
    assert_ne!(plain, warped);

    let stft = FeaturePipeline::new(
        FeatureComputer::spectrogram(SpectrogramOptions {
            frame_opts: frame_opts(),
            ..SpectrogramOptions::default()
        })
        .unwrap(),
    )
    .unwrap();
    assert_eq!(
        stft.compute_features(&wave, SAMPLE_RATE, 1.0).unwrap(),
        stft.compute_features(&wave, SAMPLE_RATE, 0.9).unwrap()
    );
}

#[test]
fn invalid_options_are_configuration_errors() {
    let err = FeatureComputer::mfcc(MfccOptions {
        num_ceps: 30,
        ..MfccOptions::default()
    })
    .unwrap_err();
    assert!(err.is_configuration());

    let err = FeatureComputer::fbank(FbankOptions {
        frame_opts: FrameExtractionOptions {
            frame_length: 0.05,
            ..frame_opts()
        },
        ..FbankOptions::default()
    })
    .unwrap_err();
    assert!(err.is_configuration());
}
