// Audio output for the note event stream.
// Each event becomes a decaying sine voice; the cpal callback mixes the
// active voices into the output buffer and drops the ones that have
// faded out.

use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use crate::sonic::NoteEvent;

const MAX_VOICES: usize = 64;
const MASTER_GAIN: f32 = 0.15;

struct Voice {
    phase: f32,
    step: f32,
    amp: f32,
    pan: f32,
}

pub struct AudioOutput {
    voices: Arc<Mutex<Vec<Voice>>>,
    sample_rate: u32,
    _stream: Stream,
}

pub fn midi_to_hz(note: f64) -> f64 {
    440.0 * 2.0_f64.powf((note - 69.0) / 12.0)
}

impl AudioOutput {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or("no output device available")?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let voices = Arc::new(Mutex::new(Vec::<Voice>::new()));
        let voices_cb = Arc::clone(&voices);

        // roughly 80ms decay regardless of device rate
        let decay = (0.001_f32).powf(1.0 / (0.08 * sample_rate as f32));

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut voices = voices_cb.lock().unwrap();
                for frame in data.chunks_mut(channels) {
                    let mut left = 0.0f32;
                    let mut right = 0.0f32;
                    for v in voices.iter_mut() {
                        let sample = (v.phase * std::f32::consts::TAU).sin() * v.amp;
                        v.phase = (v.phase + v.step).fract();
                        v.amp *= decay;
                        left += sample * (1.0 - v.pan).min(1.0);
                        right += sample * (1.0 + v.pan).min(1.0);
                    }
                    left = (left * MASTER_GAIN).clamp(-1.0, 1.0);
                    right = (right * MASTER_GAIN).clamp(-1.0, 1.0);
                    for (i, out) in frame.iter_mut().enumerate() {
                        *out = if i % 2 == 0 { left } else { right };
                    }
                }
                voices.retain(|v| v.amp > 1e-4);
            },
            |err| eprintln!("audio stream error: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(AudioOutput { voices, sample_rate, _stream: stream })
    }

    /// Queue one frame's events as fresh voices.
    pub fn play(&self, events: &[NoteEvent]) {
        if events.is_empty() {
            return;
        }
        let mut voices = self.voices.lock().unwrap();
        for ev in events {
            let hz = midi_to_hz(ev.pitch);
            voices.push(Voice {
                phase: 0.0,
                step: (hz / self.sample_rate as f64) as f32,
                amp: (ev.volume / 127.0) as f32,
                pan: (ev.pan / 64.0).clamp(-1.0, 1.0) as f32,
            });
        }
        let len = voices.len();
        if len > MAX_VOICES {
            voices.drain(0..len - MAX_VOICES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_hz_reference_points() {
        assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_hz(57.0) - 220.0).abs() < 1e-9);
        assert!((midi_to_hz(81.0) - 880.0).abs() < 1e-9);
    }
}
