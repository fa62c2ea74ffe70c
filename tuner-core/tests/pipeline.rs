use std::f32::consts::PI;

use guitar_tuner_core::audio::BlockAssembler;
use guitar_tuner_core::config::{FFT_SIZE, MIN_AMPLITUDE, SAMPLE_RATE, TunerConfig};
use guitar_tuner_core::feedback::BeepScheduler;
use guitar_tuner_core::fft::{Radix2Fft, RustFftEngine};
use guitar_tuner_core::notes::STRING_FREQUENCIES;
use guitar_tuner_core::sequencer::{AudioSequencer, FeedbackClip};
use guitar_tuner_core::{Direction, TargetSelection, Tuner};

fn sine_block(frequency: f32, amplitude: f32, offset: f32) -> Vec<i16> {
    (0..FFT_SIZE)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (offset + amplitude * (2.0 * PI * frequency * t).sin()).round() as i16
        })
        .collect()
}

fn tuners() -> Vec<Tuner> {
    let config = TunerConfig::default();
    vec![
        Tuner::with_engine(config.clone(), Box::new(RustFftEngine::new(FFT_SIZE).unwrap())).unwrap(),
        Tuner::with_engine(config, Box::new(Radix2Fft::new(FFT_SIZE).unwrap())).unwrap(),
    ]
}

#[test]
fn open_strings_are_detected_within_one_bin() {
    for mut tuner in tuners() {
        for amplitude in [50.0, 80.0, 100.0, 10_000.0] {
            for &frequency in &STRING_FREQUENCIES {
                let detected = tuner.detect_frequency(&sine_block(frequency, amplitude, 0.0));
                assert!(
                    (detected - frequency).abs() <= 20.0,
                    "{} engine: {frequency} Hz at amplitude {amplitude} detected as {detected} Hz",
                    tuner.engine_name()
                );
            }
        }
    }
}

#[test]
fn engines_agree_on_detected_frequency() {
    let mut tuners = tuners();
    for frequency in [90.0, 150.0, 275.0, 430.0, 780.0] {
        let block = sine_block(frequency, 8_000.0, 0.0);
        let a = tuners[0].detect_frequency(&block);
        let b = tuners[1].detect_frequency(&block);
        assert_eq!(a, b, "{frequency} Hz");
    }
}

#[test]
fn weak_signal_is_rejected() {
    for mut tuner in tuners() {
        for frequency in [82.41, 196.0, 329.63, 1000.0] {
            assert_eq!(tuner.detect_frequency(&sine_block(frequency, 10.0, 0.0)), 0.0);
        }
    }
}

#[test]
fn signal_just_under_amplitude_gate_is_rejected() {
    let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
    let mut block = sine_block(196.0, 60.0, 0.0);
    for sample in block.iter_mut() {
        *sample = (*sample).clamp(-(MIN_AMPLITUDE - 1), MIN_AMPLITUDE - 1);
    }
    assert_eq!(tuner.detect_frequency(&block), 0.0);

    let at_gate = tuner.detect_frequency(&sine_block(196.0, MIN_AMPLITUDE as f32, 0.0));
    assert!((at_gate - 196.0).abs() <= 20.0, "detected {at_gate}");
}

#[test]
fn dc_offset_does_not_move_the_peak() {
    let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
    let clean = tuner.detect_frequency(&sine_block(196.0, 6_000.0, 0.0));
    let biased = tuner.detect_frequency(&sine_block(196.0, 6_000.0, 4_000.0));
    assert!((clean - 196.0).abs() <= 20.0);
    assert_eq!(clean, biased);
}

#[test]
fn short_block_is_zero_padded() {
    let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
    let block = sine_block(312.5, 10_000.0, 0.0);
    let detected = tuner.detect_frequency(&block[..200]);
    assert!((detected - 312.5).abs() <= 20.0, "detected {detected}");
}

#[test]
fn full_cycle_drives_feedback() {
    let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
    // 312.5 Hz sits on bin 8 and is well flat of the high E string
    let result = tuner.process(&sine_block(312.5, 10_000.0, 0.0), TargetSelection::Auto);
    assert_eq!(result.detected_frequency, 312.5);
    assert_eq!(result.detected_string, Some(1));
    assert_eq!(result.target_string, Some(1));
    assert_eq!(result.direction, Direction::Up);
    assert_eq!(result.note_name, "D#");
    assert_eq!(result.octave, 4);

    let mut beeps = BeepScheduler::new();
    beeps.set_result(&result);
    let first = beeps.update(0).unwrap();
    assert_eq!(first.interval_ms, 150);
    assert!(beeps.update(100).is_none());
    assert!(beeps.update(150).is_some());

    let mut sequencer = AudioSequencer::new();
    sequencer.start(&result);
    assert_eq!(sequencer.update(), Some(FeedbackClip::StringName(1)));
    assert_eq!(sequencer.update(), Some(FeedbackClip::TwentyCents));
    assert_eq!(sequencer.update(), Some(FeedbackClip::TuneUp));
}

#[test]
fn targeted_mode_measures_against_chosen_string() {
    let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
    let block = sine_block(312.5, 10_000.0, 0.0);
    let result = tuner.process(&block, TargetSelection::String(2));
    assert_eq!(result.target_string, Some(2));
    assert_eq!(result.target_frequency, 246.94);
    assert_eq!(result.detected_string, Some(1));
    assert_eq!(result.direction, Direction::Down);
}

#[test]
fn quiet_block_yields_unknown_and_no_beeps() {
    let mut tuner = Tuner::new(TunerConfig::default()).unwrap();
    let result = tuner.process(&sine_block(110.0, 10.0, 0.0), TargetSelection::Auto);
    assert_eq!(result.direction, Direction::Unknown);
    assert!(!result.is_valid());

    let mut beeps = BeepScheduler::new();
    beeps.set_result(&result);
    assert!(beeps.update(1_000).is_none());
}

#[test]
fn decimated_device_audio_is_analysed_at_its_effective_rate() {
    let device_rate = 44_100;
    let tone = 344.53;
    let input: Vec<f32> = (0..FFT_SIZE * 4)
        .map(|i| 0.3 * (2.0 * PI * tone * i as f32 / device_rate as f32).sin())
        .collect();

    let mut assembler = BlockAssembler::new(FFT_SIZE, device_rate, SAMPLE_RATE);
    assert_eq!(assembler.effective_rate(), 11_025);
    let mut blocks = Vec::new();
    assembler.push(&input, |block| blocks.push(block));
    assert_eq!(blocks.len(), 1);

    let config = TunerConfig {
        sample_rate: assembler.effective_rate(),
        ..TunerConfig::default()
    };
    let mut tuner = Tuner::new(config).unwrap();
    let detected = tuner.detect_frequency(&blocks[0]);
    assert!((detected - tone).abs() < 0.01, "detected {detected}");

    // the same block read at the nominal rate lands a whole bin low
    let mut nominal = Tuner::new(TunerConfig::default()).unwrap();
    assert_eq!(nominal.detect_frequency(&blocks[0]), 312.5);
}
