//! The callback-side mixer.
//!
//! Owns all playback state. Runs inside the device callback: no
//! allocation, no deallocation (retired resources go out through the
//! garbage ring), no locks beyond the SPSC rings' atomics.

use std::sync::Arc;

use ringbuf::{HeapConsumer, HeapProducer};

use crate::command::{Command, Garbage, VoiceEvent};
use crate::module::ModuleDecoder;
use crate::sound::SoundData;

/// Scratch buffer frames for module rendering, sized for the largest
/// device buffer the runtime requests.
const MODULE_SCRATCH_FRAMES: usize = 4096;

struct ModuleState {
    decoder: Option<Box<dyn ModuleDecoder>>,
    paused: bool,
    volume: f32,
}

struct Voice {
    /// `0` = silent slot.
    id: u64,
    sound: Option<Arc<SoundData>>,
    /// Fractional frame position.
    position: f64,
    volume: f32,
    pan: f32,
    pitch: f32,
    looping: bool,
}

impl Voice {
    const fn empty() -> Self {
        Self {
            id: 0,
            sound: None,
            position: 0.0,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
            looping: false,
        }
    }
}

pub struct Mixer {
    sample_rate: u32,
    commands: HeapConsumer<Command>,
    garbage: HeapProducer<Garbage>,
    events: HeapProducer<VoiceEvent>,
    module: ModuleState,
    voices: Vec<Voice>,
    master: f32,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(
        sample_rate: u32,
        voice_count: u32,
        commands: HeapConsumer<Command>,
        garbage: HeapProducer<Garbage>,
        events: HeapProducer<VoiceEvent>,
    ) -> Self {
        Self {
            sample_rate,
            commands,
            garbage,
            events,
            module: ModuleState {
                decoder: None,
                paused: false,
                volume: 1.0,
            },
            voices: (0..voice_count).map(|_| Voice::empty()).collect(),
            master: 1.0,
            scratch: vec![0.0; MODULE_SCRATCH_FRAMES * 2],
        }
    }

    /// Renders one interleaved stereo buffer.
    pub fn mix(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        self.drain_commands();

        let frames = out.len() / 2;
        self.render_module(out, frames);
        for slot in 0..self.voices.len() {
            self.render_voice(slot, out, frames);
        }

        // Master volume, clamp and NaN/inf sanitize.
        let master = self.master;
        for sample in out.iter_mut() {
            let value = *sample * master;
            *sample = if value.is_finite() {
                value.clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                Command::PlayModule { mut decoder, looping } => {
                    decoder.set_repeat(looping);
                    if let Some(old) = self.module.decoder.replace(decoder) {
                        let _ = self.garbage.push(Garbage::Decoder(old));
                    }
                    self.module.paused = false;
                }
                Command::StopModule => {
                    if let Some(old) = self.module.decoder.take() {
                        let _ = self.garbage.push(Garbage::Decoder(old));
                    }
                }
                Command::PauseModule => self.module.paused = true,
                Command::ResumeModule => self.module.paused = false,
                Command::SetModuleVolume(volume) => self.module.volume = volume,
                Command::SetModuleTempo(factor) => {
                    if let Some(decoder) = self.module.decoder.as_mut() {
                        decoder.set_tempo_factor(factor);
                    }
                }
                Command::SeekModule(seconds) => {
                    if let Some(decoder) = self.module.decoder.as_mut() {
                        decoder.seek(seconds);
                    }
                }
                Command::PlaySound {
                    slot,
                    id,
                    sound,
                    volume,
                    pan,
                    pitch,
                    looping,
                } => {
                    if let Some(voice) = self.voices.get_mut(slot as usize) {
                        if let Some(old) = voice.sound.take() {
                            let _ = self.garbage.push(Garbage::Sound(old));
                        }
                        *voice = Voice {
                            id,
                            sound: Some(sound),
                            position: 0.0,
                            volume,
                            pan,
                            pitch,
                            looping,
                        };
                    }
                }
                Command::StopVoice(id) => {
                    if let Some(slot) = self.find_voice(id) {
                        self.retire_voice(slot);
                    }
                }
                Command::SetVoiceVolume(id, volume) => {
                    if let Some(slot) = self.find_voice(id) {
                        self.voices[slot].volume = volume;
                    }
                }
                Command::SetVoicePan(id, pan) => {
                    if let Some(slot) = self.find_voice(id) {
                        self.voices[slot].pan = pan;
                    }
                }
                Command::SetVoicePitch(id, pitch) => {
                    if let Some(slot) = self.find_voice(id) {
                        self.voices[slot].pitch = pitch;
                    }
                }
                Command::SetMasterVolume(volume) => self.master = volume,
                Command::StopAll => {
                    if let Some(old) = self.module.decoder.take() {
                        let _ = self.garbage.push(Garbage::Decoder(old));
                    }
                    for slot in 0..self.voices.len() {
                        if self.voices[slot].id != 0 {
                            self.retire_voice(slot);
                        }
                    }
                }
            }
        }
    }

    fn find_voice(&self, id: u64) -> Option<usize> {
        self.voices.iter().position(|voice| voice.id == id && id != 0)
    }

    /// Silences a slot and notifies the main thread's voice mirror.
    fn retire_voice(&mut self, slot: usize) {
        let voice = &mut self.voices[slot];
        let id = voice.id;
        voice.id = 0;
        if let Some(sound) = voice.sound.take() {
            let _ = self.garbage.push(Garbage::Sound(sound));
        }
        let _ = self.events.push(VoiceEvent::Ended {
            slot: slot as u32,
            id,
        });
    }

    fn render_module(&mut self, out: &mut [f32], frames: usize) {
        if self.module.paused {
            return;
        }
        let mut module_ended = false;
        {
            let Some(decoder) = self.module.decoder.as_mut() else {
                return;
            };
            let volume = self.module.volume;
            let mut done = 0;
            while done < frames {
                let chunk = (frames - done).min(MODULE_SCRATCH_FRAMES);
                let produced =
                    decoder.read_interleaved_stereo(self.sample_rate, chunk, &mut self.scratch);
                if produced == 0 {
                    // Module ended (and is not set to repeat).
                    module_ended = true;
                    break;
                }
                for frame in 0..produced {
                    out[(done + frame) * 2] += self.scratch[frame * 2] * volume;
                    out[(done + frame) * 2 + 1] += self.scratch[frame * 2 + 1] * volume;
                }
                done += produced;
            }
        }
        if module_ended {
            if let Some(old) = self.module.decoder.take() {
                let _ = self.garbage.push(Garbage::Decoder(old));
            }
        }
    }

    fn render_voice(&mut self, slot: usize, out: &mut [f32], frames: usize) {
        // Copy the parameters out so mixing holds no borrow into the slot
        // (an Arc clone is refcount traffic, not an allocation).
        let (id, sound, mut position, volume, pan, pitch, looping) = {
            let voice = &self.voices[slot];
            (
                voice.id,
                voice.sound.clone(),
                voice.position,
                voice.volume,
                voice.pan,
                voice.pitch,
                voice.looping,
            )
        };
        if id == 0 {
            return;
        }
        let Some(sound) = sound else { return };
        let total = sound.frames();
        if total == 0 {
            self.retire_voice(slot);
            return;
        }

        // Equal-power pan.
        let angle = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
        let gain_l = angle.cos() * volume;
        let gain_r = angle.sin() * volume;
        let step = f64::from(pitch.max(0.0));

        let mut ended = false;
        for frame in 0..frames {
            if position >= (total - 1) as f64 {
                if looping {
                    position %= (total - 1).max(1) as f64;
                } else {
                    ended = true;
                    break;
                }
            }
            let base = position.floor() as usize;
            let frac = (position - base as f64) as f32;
            let (l0, r0) = sound.frame(base);
            let (l1, r1) = sound.frame((base + 1).min(total - 1));
            out[frame * 2] += (l0 + (l1 - l0) * frac) * gain_l;
            out[frame * 2 + 1] += (r0 + (r1 - r0) * frac) * gain_r;
            position += step;
        }
        self.voices[slot].position = position;
        if ended {
            self.retire_voice(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapRb;

    struct CountingDecoder {
        value: f32,
        remaining: usize,
    }

    impl ModuleDecoder for CountingDecoder {
        fn read_interleaved_stereo(&mut self, _rate: u32, frames: usize, out: &mut [f32]) -> usize {
            let produced = frames.min(self.remaining);
            for sample in out[..produced * 2].iter_mut() {
                *sample = self.value;
            }
            self.remaining -= produced;
            produced
        }
        fn seek(&mut self, _seconds: f64) {}
        fn set_tempo_factor(&mut self, _factor: f64) {}
        fn set_repeat(&mut self, _looping: bool) {}
    }

    struct Harness {
        commands: HeapProducer<Command>,
        garbage: HeapConsumer<Garbage>,
        events: HeapConsumer<VoiceEvent>,
        mixer: Mixer,
    }

    fn harness(voices: u32) -> Harness {
        let (cmd_tx, cmd_rx) = HeapRb::new(COMMAND_CAP).split();
        let (garbage_tx, garbage_rx) = HeapRb::new(64).split();
        let (event_tx, event_rx) = HeapRb::new(64).split();
        Harness {
            commands: cmd_tx,
            garbage: garbage_rx,
            events: event_rx,
            mixer: Mixer::new(48_000, voices, cmd_rx, garbage_tx, event_tx),
        }
    }

    const COMMAND_CAP: usize = crate::COMMAND_QUEUE_CAPACITY;

    fn constant_sound(value: f32, frames: usize) -> Arc<SoundData> {
        Arc::new(SoundData::from_stereo_samples(vec![value; frames * 2]))
    }

    fn play(slot: u32, id: u64, sound: Arc<SoundData>) -> Command {
        Command::PlaySound {
            slot,
            id,
            sound,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
            looping: false,
        }
    }

    #[test]
    fn commands_apply_in_issue_order() {
        let mut h = harness(2);
        // Volume set before and after a play: final value wins, but both
        // were applied in order (the last write is what the buffer hears).
        h.commands.push(Command::SetMasterVolume(0.0)).ok().unwrap();
        h.commands
            .push(play(0, 1, constant_sound(1.0, 4_800)))
            .ok()
            .unwrap();
        h.commands.push(Command::SetMasterVolume(0.5)).ok().unwrap();

        let mut out = [0.0_f32; 128];
        h.mixer.mix(&mut out);
        // Equal-power center pan: cos(pi/4) ≈ 0.7071, times master 0.5.
        let expected = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0] - expected).abs() < 1e-3, "got {}", out[0]);
    }

    #[test]
    fn voice_ends_and_reports() {
        let mut h = harness(1);
        h.commands.push(play(0, 7, constant_sound(0.5, 10))).ok().unwrap();
        let mut out = [0.0_f32; 64];
        h.mixer.mix(&mut out);

        // 10-frame sound inside a 32-frame buffer: voice ended.
        let event = h.events.pop();
        assert!(matches!(event, Some(VoiceEvent::Ended { slot: 0, id: 7 })));
        // The sound went out through the garbage ring, not a dealloc.
        assert!(matches!(h.garbage.pop(), Some(Garbage::Sound(_))));

        // Ended voice stays silent afterwards.
        let mut out2 = [0.0_f32; 64];
        h.mixer.mix(&mut out2);
        assert!(out2.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn play_sound_replaces_the_target_slot() {
        let mut h = harness(1);
        h.commands.push(play(0, 1, constant_sound(0.25, 4_800))).ok().unwrap();
        h.commands.push(play(0, 2, constant_sound(0.75, 4_800))).ok().unwrap();
        let mut out = [0.0_f32; 32];
        h.mixer.mix(&mut out);
        // Only the second sound is audible; the first went to garbage.
        let expected = 0.75 * std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0] - expected).abs() < 1e-3);
        assert!(matches!(h.garbage.pop(), Some(Garbage::Sound(_))));
    }

    #[test]
    fn module_mixes_and_retires_on_end() {
        let mut h = harness(1);
        h.commands
            .push(Command::PlayModule {
                decoder: Box::new(CountingDecoder {
                    value: 0.25,
                    remaining: 16,
                }),
                looping: false,
            })
            .ok()
            .unwrap();
        h.commands.push(Command::SetModuleVolume(0.5)).ok().unwrap();

        let mut out = [0.0_f32; 64];
        h.mixer.mix(&mut out);
        assert!((out[0] - 0.125).abs() < 1e-6);
        // Ended inside the buffer: frames past the end stay silent and the
        // decoder box is shipped back through the garbage ring.
        assert_eq!(out[40], 0.0);
        assert!(matches!(h.garbage.pop(), Some(Garbage::Decoder(_))));
    }

    #[test]
    fn output_is_clamped_and_sanitized() {
        let mut h = harness(2);
        h.commands.push(play(0, 1, constant_sound(1.0, 1_000))).ok().unwrap();
        h.commands.push(play(1, 2, constant_sound(1.0, 1_000))).ok().unwrap();
        h.commands.push(Command::SetMasterVolume(10.0)).ok().unwrap();
        let mut out = [0.0_f32; 32];
        h.mixer.mix(&mut out);
        assert!(out.iter().all(|&s| (-1.0..=1.0).contains(&s)));
        assert!(out[0] >= 1.0 - 1e-6);
    }

    #[test]
    fn pitch_advances_position_fractionally() {
        let mut h = harness(1);
        // Ramp sound: frame i has value i / 100.
        let samples: Vec<f32> = (0..100).flat_map(|i| [i as f32 / 100.0; 2]).collect();
        h.commands
            .push(Command::PlaySound {
                slot: 0,
                id: 1,
                sound: Arc::new(SoundData::from_stereo_samples(samples)),
                volume: 1.0,
                pan: 0.0,
                pitch: 0.5,
                looping: false,
            })
            .ok()
            .unwrap();
        let mut out = [0.0_f32; 8];
        h.mixer.mix(&mut out);
        // At pitch 0.5 the second output frame sits halfway between source
        // frames 0 and 1: value 0.005 (times the center-pan gain).
        let gain = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[2] - 0.005 * gain).abs() < 1e-4);
    }
}
