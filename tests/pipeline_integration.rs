//! End-to-end tests of the speech front end over generated WAV files
//!
//! WAV file -> windowing -> preprocessing -> log energy + MFCC ->
//! derivatives -> labeled-example file.

use std::path::Path;

use has_vocals::analysis::features::{open_speech_frames, FeatureFrame};
use has_vocals::audio::{WavFrameReader, WindowConfig};
use has_vocals::config::FeatureConfig;
use has_vocals::containers::{
    preprocess_corpus, read_frames, write_frames, AudioFrameContainer, FrameContainer,
    LabelManifest, LabeledFrameFile,
};
use has_vocals::error::PipelineError;

fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for i in 0..samples {
        let t = i as f64 / f64::from(sample_rate);
        for channel in 0..channels {
            let frequency = 220.0 * f64::from(channel + 1);
            let sample = 5000.0 * (2.0 * std::f64::consts::PI * frequency * t).sin();
            writer.write_sample(sample as i16).expect("write sample");
        }
    }
    writer.finalize().expect("finalize wav");
}

fn collect(container: &mut dyn FrameContainer) -> Vec<FeatureFrame> {
    container.open().expect("open container");
    let mut frames = Vec::new();
    while container.has_next() {
        frames.push(container.next().expect("next frame"));
    }
    container.close();
    frames
}

#[test]
fn wav_file_to_feature_frames() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tone.wav");
    write_wav(&path, 8_000, 1, 4_000);

    let reader = WavFrameReader::open(&path).expect("open wav");
    let mut frames = open_speech_frames(
        reader,
        &WindowConfig::default(),
        &FeatureConfig::default(),
        vec![1.0],
    )
    .expect("speech frames");

    let mut count = 0;
    while frames.has_next() {
        let frame = frames.next().expect("frame");
        assert_eq!(frame.features().len(), 42);
        assert_eq!(frame.highest_derivative(), 2);
        assert!(!frame.is_pad());
        assert!(frame.features().iter().all(|f| f.is_finite()));
        count += 1;
    }
    assert_eq!(count, 49);
}

#[test]
fn stereo_features_are_concatenated_per_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stereo.wav");
    write_wav(&path, 16_000, 2, 2_000);

    let mut container = AudioFrameContainer::new(
        &path,
        0.0,
        &WindowConfig::default(),
        &FeatureConfig::default(),
    );
    let frames = collect(&mut container);

    // 1 + ceil((2000 - 400) / 160)
    assert_eq!(frames.len(), 11);
    for frame in &frames {
        assert_eq!(frame.base_feature_length(), 28);
        assert_eq!(frame.features().len(), 84);
        assert_eq!(frame.labels(), &[0.0]);
    }
}

#[test]
fn all_supported_rates_produce_frames() {
    let dir = tempfile::tempdir().expect("tempdir");
    for rate in [8_000, 11_000, 16_000, 44_100] {
        let path = dir.path().join(format!("tone_{rate}.wav"));
        write_wav(&path, rate, 1, 3_000);
        let mut container = AudioFrameContainer::new(
            &path,
            1.0,
            &WindowConfig::default(),
            &FeatureConfig::default(),
        );
        let frames = collect(&mut container);
        assert!(!frames.is_empty(), "no frames at {rate} Hz");
        assert!(frames.iter().all(|f| f.features().len() == 42));
    }
}

#[test]
fn unsupported_rate_is_rejected_on_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dat.wav");
    write_wav(&path, 48_000, 1, 1_000);

    let mut container =
        AudioFrameContainer::new(&path, 1.0, &WindowConfig::default(), &FeatureConfig::default());
    assert_eq!(
        container.open(),
        Err(PipelineError::UnsupportedSampleRate { sample_rate: 48_000 })
    );
}

#[test]
fn preprocessed_examples_match_live_extraction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("audio");
    let examples = dir.path().join("examples");
    std::fs::create_dir(&audio).expect("audio dir");
    write_wav(&audio.join("take1.wav"), 11_000, 1, 5_000);

    let manifest = LabelManifest::from_reader(
        "HITId,Input.filename,Answer.label\n1,take1,has-vocals\n".as_bytes(),
    )
    .expect("manifest");
    let written = preprocess_corpus(
        &manifest,
        &[audio.join("take1.wav")],
        &examples,
        &WindowConfig::default(),
        &FeatureConfig::default(),
    )
    .expect("preprocess");
    assert_eq!(written, vec![examples.join("take1.mfc")]);

    let mut live = AudioFrameContainer::new(
        audio.join("take1.wav"),
        1.0,
        &WindowConfig::default(),
        &FeatureConfig::default(),
    );
    let mut stored = LabeledFrameFile::new(&written[0]);
    assert_eq!(collect(&mut stored), collect(&mut live));
}

#[test]
fn labeled_file_round_trip_preserves_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("frames.mfc");
    let frames = vec![
        FeatureFrame::new(vec![0.1, -2.5e-7, 3.0], vec![1.0]),
        FeatureFrame::new(vec![1.0 / 3.0, f64::MAX, -0.0], vec![0.0]).to_pad(),
    ];

    write_frames(&path, &frames[..1], false).expect("write");
    write_frames(&path, &frames[1..], true).expect("append");
    let read = read_frames(&path).expect("read");

    assert_eq!(read, frames);
    assert!(read[1].is_pad());
}
