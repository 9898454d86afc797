//! End-to-end collection analysis over a synthesized corpus
//!
//! Exercises the shipped signal-processing backends against generated WAV
//! files: a stereo click-plus-chord track, a mono tone, and an undecodable
//! file that still must appear in the output tables.

use std::path::Path;
use std::time::Duration;

use wavesift_an::audio::AudioSource;
use wavesift_an::backends::BackendSet;
use wavesift_an::output;
use wavesift_an::{CollectionAnalyzer, TrackAnalysisPipeline};
use wavesift_common::config::{CollectionConfig, ResamplerQuality};
use wavesift_common::tables::load_predictions;

// Puts the 120 BPM beat period on an exact onset-frame boundary
const RATE: u32 = 25_600;

/// 120 BPM clicks over a C major chord, so tempo, key, and loudness all have
/// something to measure.
fn click_chord_samples(seconds: f32) -> Vec<f32> {
    let total = (RATE as f32 * seconds) as usize;
    let period = (RATE as f32 * 0.5) as usize; // 120 BPM
    let mut samples = vec![0.0f32; total];

    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f32 / RATE as f32;
        let tau = 2.0 * std::f32::consts::PI * t;
        *sample = 0.20 * (tau * 261.63).sin() + 0.12 * (tau * 329.63).sin()
            + 0.12 * (tau * 392.0).sin();
    }
    let mut pos = 0;
    while pos < total {
        for i in 0..200.min(total - pos) {
            samples[pos + i] += 0.6 * (-(i as f32) / 40.0).exp();
        }
        pos += period;
    }
    samples
}

fn write_wav(path: &Path, channels: u16, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32 * 0.8) as i16;
        for _ in 0..channels {
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn analyzer() -> CollectionAnalyzer {
    let pipeline = TrackAnalysisPipeline::new(
        AudioSource::new(16_000, ResamplerQuality::Fast),
        BackendSet::signal_only(),
        Duration::from_secs(120),
    );
    CollectionAnalyzer::new(pipeline, 2)
}

#[tokio::test]
async fn collection_run_covers_every_file_and_honors_contracts() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let samples = click_chord_samples(8.0);
    write_wav(&data.join("stereo_click.wav"), 2, &samples);
    write_wav(&data.join("mono_tone.wav"), 1, &samples);
    std::fs::write(data.join("broken.mp3"), b"not an mp3 bitstream").unwrap();

    let table = analyzer().analyze(&data).await.unwrap();
    assert_eq!(table.len(), 3, "every discovered file gets exactly one entry");

    let config = CollectionConfig {
        root: data.clone(),
        embeddings_dir: dir.path().join("embeddings"),
        predictions_dir: dir.path().join("predictions"),
    };
    let (predictions_path, embeddings_path) = output::write_tables(&config, &table).unwrap();
    assert!(embeddings_path.exists());

    let predictions = load_predictions(&predictions_path).unwrap();
    assert_eq!(predictions.len(), 3);

    let stereo_key = data.join("stereo_click.wav").to_string_lossy().into_owned();
    let mono_key = data.join("mono_tone.wav").to_string_lossy().into_owned();
    let broken_key = data.join("broken.mp3").to_string_lossy().into_owned();

    // Stereo track: tempo in contract range, three key profiles, finite loudness
    let stereo = &predictions[&stereo_key];
    let tempo = stereo.tempo.expect("tempo present for stereo track");
    assert!(tempo > 0.0 && tempo <= 300.0, "tempo out of contract: {tempo}");
    assert!((tempo - 120.0).abs() < 15.0, "expected ~120 BPM, got {tempo}");

    let key = stereo.key.as_ref().expect("key present for stereo track");
    assert_eq!(key.len(), 3);
    for profile in ["temperley", "krumhansl", "edma"] {
        assert!(key.contains_key(profile), "missing profile {profile}");
    }

    let loudness = stereo.loudness.expect("loudness present for stereo track");
    assert!(loudness.is_finite());
    assert!(loudness < 0.0, "expected negative LUFS, got {loudness}");

    // Mono track: loudness requires stereo, tempo/key still succeed
    let mono = &predictions[&mono_key];
    assert!(mono.loudness.is_none());
    assert!(mono.tempo.is_some());
    assert!(mono.key.is_some());

    // Undecodable file: present, all descriptors null
    let broken = &predictions[&broken_key];
    assert!(broken.tempo.is_none());
    assert!(broken.key.is_none());
    assert!(broken.loudness.is_none());
    assert!(broken.music_styles.is_none());
    assert!(broken.arousal_and_valence.is_none());
}

#[tokio::test]
async fn rerun_is_idempotent_on_slot_presence() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    write_wav(&data.join("track.wav"), 2, &click_chord_samples(6.0));

    let first = analyzer().analyze(&data).await.unwrap();
    let second = analyzer().analyze(&data).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (path, record) in &first {
        let rerun = &second[path];
        assert_eq!(
            record.present_descriptors(),
            rerun.present_descriptors(),
            "presence set changed across reruns for {}",
            path.display()
        );
    }
}
