use crate::infrastructure::config::ChimeConfig;
use crate::infrastructure::error::InfraError;
use std::f64::consts::PI;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

const DING_FILE: &str = "ding.wav";
const SAMPLE_RATE: u32 = 44_100;
const AUTO_PLAYERS: [&str; 3] = ["paplay", "aplay", "afplay"];

pub trait Chime: Send + Sync {
    fn ring(&self) -> Result<(), InfraError>;
}

/// Single sine oscillator with an exponential attack/decay envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f64,
    pub duration_secs: f64,
    pub attack_secs: f64,
    pub peak_gain: f64,
    pub floor_gain: f64,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            frequency_hz: 880.0,
            duration_secs: 0.7,
            attack_secs: 0.02,
            peak_gain: 0.3,
            floor_gain: 0.0001,
        }
    }
}

impl ToneSpec {
    pub fn gain_at(&self, t: f64) -> f64 {
        let ramp = |from: f64, to: f64, progress: f64| {
            from * (to / from).powf(progress.clamp(0.0, 1.0))
        };
        if t <= self.attack_secs {
            ramp(self.floor_gain, self.peak_gain, t / self.attack_secs)
        } else {
            let decay = self.duration_secs - self.attack_secs;
            ramp(self.peak_gain, self.floor_gain, (t - self.attack_secs) / decay)
        }
    }

    pub fn render(&self, sample_rate: u32) -> Vec<i16> {
        let count = (self.duration_secs * sample_rate as f64).round() as usize;
        (0..count)
            .map(|index| {
                let t = index as f64 / sample_rate as f64;
                let sample = (2.0 * PI * self.frequency_hz * t).sin() * self.gain_at(t);
                (sample * i16::MAX as f64).round() as i16
            })
            .collect()
    }
}

/// 16-bit mono PCM WAV.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[derive(Debug, Clone)]
pub struct PlayerChime {
    wav_path: PathBuf,
    players: Vec<String>,
}

impl PlayerChime {
    pub fn prepare(state_dir: &Path, config: &ChimeConfig) -> Result<Self, InfraError> {
        let wav_path = state_dir.join(DING_FILE);
        let samples = ToneSpec::default().render(SAMPLE_RATE);
        fs::write(&wav_path, encode_wav(&samples, SAMPLE_RATE))?;
        let players = match config.player.as_deref() {
            Some(player) => vec![player.to_string()],
            None => AUTO_PLAYERS.iter().map(ToString::to_string).collect(),
        };
        Ok(Self { wav_path, players })
    }

    pub fn wav_path(&self) -> &Path {
        &self.wav_path
    }
}

impl Chime for PlayerChime {
    fn ring(&self) -> Result<(), InfraError> {
        for player in &self.players {
            let spawned = tokio::process::Command::new(player)
                .arg(&self.wav_path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            match spawned {
                Ok(_) => {
                    debug!(player = %player, "chime handed to audio player");
                    return Ok(());
                }
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(InfraError::Notification(format!(
                        "failed launching {player}: {error}"
                    )));
                }
            }
        }
        debug!("no audio player available, ringing terminal bell");
        BellChime.ring()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BellChime;

impl Chime for BellChime {
    fn ring(&self) -> Result<(), InfraError> {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(b"\x07")
            .and_then(|_| stdout.flush())
            .map_err(|error| InfraError::Notification(format!("terminal bell failed: {error}")))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentChime;

impl Chime for SilentChime {
    fn ring(&self) -> Result<(), InfraError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_STATE: AtomicUsize = AtomicUsize::new(0);

    struct TempStateDir {
        path: PathBuf,
    }

    impl TempStateDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_STATE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "task-ticker-chime-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp state dir");
            Self { path }
        }
    }

    impl Drop for TempStateDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn envelope_rises_fast_and_decays_to_floor() {
        let tone = ToneSpec::default();
        assert!((tone.gain_at(0.0) - 0.0001).abs() < 1e-9);
        assert!((tone.gain_at(0.02) - 0.3).abs() < 1e-9);
        assert!((tone.gain_at(0.7) - 0.0001).abs() < 1e-9);
        assert!(tone.gain_at(0.1) > tone.gain_at(0.4));
    }

    #[test]
    fn rendered_tone_has_expected_length_and_headroom() {
        let samples = ToneSpec::default().render(SAMPLE_RATE);
        assert_eq!(samples.len(), 30_870);
        let peak = samples.iter().map(|sample| sample.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > 8_000);
        assert!(peak <= (0.3 * i16::MAX as f64).ceil() as u16);
    }

    #[test]
    fn wav_header_describes_mono_pcm() {
        let bytes = encode_wav(&[0, 1, -1], 8_000);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 42);
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 1);
        assert_eq!(u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]), 8_000);
        assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 6);
        assert_eq!(bytes.len(), 50);
    }

    #[test]
    fn prepare_writes_tone_and_honours_configured_player() {
        let dir = TempStateDir::new();
        let chime = PlayerChime::prepare(
            &dir.path,
            &ChimeConfig {
                enabled: true,
                player: Some("definitely-not-an-audio-player".to_string()),
            },
        )
        .expect("prepare chime");
        let written = fs::read(chime.wav_path()).expect("read tone");
        assert_eq!(&written[0..4], b"RIFF");
        assert_eq!(chime.players, vec!["definitely-not-an-audio-player".to_string()]);
    }
}
