//! Main-thread side of the audio core.
//!
//! Owns the command producer, a mirror of voice occupancy (kept honest by
//! the callback's ended-events), the device stream, and the retirement of
//! resources the callback ships back through the garbage ring.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

use crate::command::{Command, Garbage, VoiceEvent, COMMAND_QUEUE_CAPACITY};
use crate::mixer::Mixer;
use crate::module::ModuleDecoder;
use crate::sound::SoundData;
use crate::{Error, Result};

/// Constructs a [`ModuleDecoder`] from module file bytes. Installed by the
/// host; absent in player builds without a tracker backend.
pub type ModuleDecoderFactory = Box<dyn Fn(&[u8]) -> Option<Box<dyn ModuleDecoder>> + Send>;

/// Mirror of one callback voice slot.
#[derive(Debug, Clone, Copy, Default)]
struct VoiceMirror {
    /// `0` = free.
    id: u64,
    /// Tick the playback started, for oldest-first stealing.
    birth: u64,
}

struct StreamParts {
    commands: HeapProducer<Command>,
    garbage: HeapConsumer<Garbage>,
    events: HeapConsumer<VoiceEvent>,
    stream: cpal::Stream,
    sample_rate: u32,
    error_flag: Arc<std::sync::atomic::AtomicBool>,
}

pub struct AudioSystem {
    commands: HeapProducer<Command>,
    garbage: HeapConsumer<Garbage>,
    events: HeapConsumer<VoiceEvent>,
    /// Kept alive for the device callback; `None` in headless tests.
    _stream: Option<cpal::Stream>,
    sample_rate: u32,
    voice_count: u32,
    voices: Vec<VoiceMirror>,
    /// Monotonic playback counter; combined with the slot to form ids.
    next_playback: u64,
    module_factory: Option<ModuleDecoderFactory>,
    error_flag: Arc<std::sync::atomic::AtomicBool>,
    reinit_attempted: bool,
    device_ok: bool,
}

impl AudioSystem {
    /// Opens the default output device (stereo f32 preferred, i16
    /// fallback) and starts the callback.
    ///
    /// # Errors
    ///
    /// Fails when no output device exists or the stream cannot start; the
    /// runtime then keeps audio bindings failing safely.
    pub fn new(voice_count: u32) -> Result<Self> {
        let parts = open_stream(voice_count)?;
        Ok(Self {
            commands: parts.commands,
            garbage: parts.garbage,
            events: parts.events,
            _stream: Some(parts.stream),
            sample_rate: parts.sample_rate,
            voice_count,
            voices: vec![VoiceMirror::default(); voice_count as usize],
            next_playback: 1,
            module_factory: None,
            error_flag: parts.error_flag,
            reinit_attempted: false,
            device_ok: true,
        })
    }

    /// Headless construction for tests: returns the system plus the
    /// mixer so the test can drive the callback by hand.
    pub fn headless(voice_count: u32, sample_rate: u32) -> (Self, Mixer) {
        let (commands_tx, commands_rx) = HeapRb::new(COMMAND_QUEUE_CAPACITY).split();
        let (garbage_tx, garbage_rx) = HeapRb::new(COMMAND_QUEUE_CAPACITY).split();
        let (events_tx, events_rx) = HeapRb::new(1024).split();
        let mixer = Mixer::new(sample_rate, voice_count, commands_rx, garbage_tx, events_tx);
        (
            Self {
                commands: commands_tx,
                garbage: garbage_rx,
                events: events_rx,
                _stream: None,
                sample_rate,
                voice_count,
                voices: vec![VoiceMirror::default(); voice_count as usize],
                next_playback: 1,
                module_factory: None,
                error_flag: Arc::new(std::sync::atomic::AtomicBool::new(false)),
                reinit_attempted: false,
                device_ok: true,
            },
            mixer,
        )
    }

    pub fn set_module_factory(&mut self, factory: Option<ModuleDecoderFactory>) {
        self.module_factory = factory;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_ok(&self) -> bool {
        self.device_ok
    }

    /// Per-frame maintenance: retire garbage, apply voice-ended events to
    /// the mirror, and handle device loss (one reinit attempt). Must run
    /// on the main thread.
    pub fn pump(&mut self) {
        if self.device_ok && self.error_flag.load(std::sync::atomic::Ordering::Relaxed) {
            if self.reinit_attempted {
                self.device_ok = false;
            } else {
                self.reinit_attempted = true;
                match open_stream(self.voice_count) {
                    Ok(parts) => {
                        self.commands = parts.commands;
                        self.garbage = parts.garbage;
                        self.events = parts.events;
                        self._stream = Some(parts.stream);
                        self.sample_rate = parts.sample_rate;
                        self.error_flag = parts.error_flag;
                        // Playback state did not survive the device.
                        for mirror in &mut self.voices {
                            *mirror = VoiceMirror::default();
                        }
                    }
                    Err(_) => self.device_ok = false,
                }
            }
        }

        while let Some(event) = self.events.pop() {
            match event {
                VoiceEvent::Ended { slot, id } => {
                    if let Some(mirror) = self.voices.get_mut(slot as usize) {
                        if mirror.id == id {
                            mirror.id = 0;
                        }
                    }
                }
            }
        }
        // Dropping here destroys decoder boxes and sound refs on the main
        // thread, as the callback discipline requires.
        while self.garbage.pop().is_some() {}
    }

    fn push(&mut self, command: Command) -> Result<()> {
        if !self.device_ok {
            return Err(Error::Device("audio device lost".to_string()));
        }
        self.commands.push(command).map_err(|_| Error::QueueFull)
    }

    // --- module API ---

    /// Builds a decoder from module bytes and starts it, replacing any
    /// active module.
    pub fn play_module(&mut self, bytes: &[u8], looping: bool) -> Result<()> {
        let factory = self.module_factory.as_ref().ok_or(Error::NoModuleDecoder)?;
        let decoder = factory(bytes)
            .ok_or_else(|| Error::Decode("module data rejected by decoder".to_string()))?;
        self.push(Command::PlayModule { decoder, looping })
    }

    /// Starts an already-constructed decoder (tests, preloaded modules).
    pub fn play_module_decoder(
        &mut self,
        decoder: Box<dyn ModuleDecoder>,
        looping: bool,
    ) -> Result<()> {
        self.push(Command::PlayModule { decoder, looping })
    }

    pub fn stop_module(&mut self) -> Result<()> {
        self.push(Command::StopModule)
    }

    pub fn pause_module(&mut self) -> Result<()> {
        self.push(Command::PauseModule)
    }

    pub fn resume_module(&mut self) -> Result<()> {
        self.push(Command::ResumeModule)
    }

    pub fn set_module_volume(&mut self, volume: f32) -> Result<()> {
        self.push(Command::SetModuleVolume(volume.clamp(0.0, 4.0)))
    }

    pub fn set_module_tempo(&mut self, factor: f64) -> Result<()> {
        self.push(Command::SetModuleTempo(factor.clamp(0.1, 10.0)))
    }

    pub fn seek_module(&mut self, seconds: f64) -> Result<()> {
        self.push(Command::SeekModule(seconds.max(0.0)))
    }

    // --- voice API ---

    /// Starts a sound on a free slot, stealing the oldest voice (smallest
    /// birth tick, lowest slot on ties) when the pool is full. Returns the
    /// voice id.
    pub fn play_sound(
        &mut self,
        sound: Arc<SoundData>,
        volume: f32,
        pan: f32,
        pitch: f32,
        looping: bool,
        now_tick: u64,
    ) -> Result<u64> {
        let slot = choose_slot(&self.voices);
        let id = (self.next_playback << 8) | u64::from(slot);
        self.push(Command::PlaySound {
            slot,
            id,
            sound,
            volume: volume.clamp(0.0, 4.0),
            pan: pan.clamp(-1.0, 1.0),
            pitch: pitch.clamp(0.0, 8.0),
            looping,
        })?;
        self.next_playback += 1;
        self.voices[slot as usize] = VoiceMirror {
            id,
            birth: now_tick,
        };
        Ok(id)
    }

    pub fn stop_voice(&mut self, id: u64) -> Result<()> {
        self.push(Command::StopVoice(id))?;
        if let Some(mirror) = self.voices.iter_mut().find(|mirror| mirror.id == id) {
            mirror.id = 0;
        }
        Ok(())
    }

    pub fn set_voice_volume(&mut self, id: u64, volume: f32) -> Result<()> {
        self.push(Command::SetVoiceVolume(id, volume.clamp(0.0, 4.0)))
    }

    pub fn set_voice_pan(&mut self, id: u64, pan: f32) -> Result<()> {
        self.push(Command::SetVoicePan(id, pan.clamp(-1.0, 1.0)))
    }

    pub fn set_voice_pitch(&mut self, id: u64, pitch: f32) -> Result<()> {
        self.push(Command::SetVoicePitch(id, pitch.clamp(0.0, 8.0)))
    }

    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        self.push(Command::SetMasterVolume(volume.clamp(0.0, 1.0)))
    }

    /// Quiesces all output and clears the voice mirror.
    pub fn stop_all(&mut self) -> Result<()> {
        self.push(Command::StopAll)?;
        for mirror in &mut self.voices {
            mirror.id = 0;
        }
        Ok(())
    }
}

/// Slot choice: first free slot, else the oldest voice (smallest birth
/// tick; ties break to the lowest slot index). Deterministic.
fn choose_slot(voices: &[VoiceMirror]) -> u32 {
    if let Some(free) = voices.iter().position(|mirror| mirror.id == 0) {
        return free as u32;
    }
    let mut best = 0_usize;
    for (slot, mirror) in voices.iter().enumerate().skip(1) {
        if mirror.birth < voices[best].birth {
            best = slot;
        }
    }
    best as u32
}

/// Opens the default device and wires a fresh mixer to it.
fn open_stream(voice_count: u32) -> Result<StreamParts> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Device("no default output device".to_string()))?;
    let config = device
        .default_output_config()
        .map_err(|err| Error::Device(err.to_string()))?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    if channels == 0 {
        return Err(Error::Device("device reports zero channels".to_string()));
    }

    let (commands_tx, commands_rx) = HeapRb::new(COMMAND_QUEUE_CAPACITY).split();
    let (garbage_tx, garbage_rx) = HeapRb::new(COMMAND_QUEUE_CAPACITY).split();
    let (events_tx, events_rx) = HeapRb::new(1024).split();
    let mut mixer = Mixer::new(sample_rate, voice_count, commands_rx, garbage_tx, events_tx);

    let error_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let callback_flag = error_flag.clone();
    let error_handler = move |_err: cpal::StreamError| {
        callback_flag.store(true, std::sync::atomic::Ordering::Relaxed);
    };

    let stream_config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    // The mixer always renders stereo f32; other device shapes get
    // converted in the callback. Scratch buffers grow once and then stay.
    let mut stereo_scratch: Vec<f32> = Vec::new();
    let mut spread_scratch: Vec<f32> = Vec::new();
    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    mix_into(&mut mixer, &mut stereo_scratch, data, channels as usize);
                },
                error_handler,
                None,
            )
            .map_err(|err| Error::Device(err.to_string()))?,
        cpal::SampleFormat::I16 => device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    stereo_scratch.resize(data.len(), 0.0);
                    mix_into(
                        &mut mixer,
                        &mut spread_scratch,
                        &mut stereo_scratch[..],
                        channels as usize,
                    );
                    for (dst, src) in data.iter_mut().zip(stereo_scratch.iter()) {
                        *dst = (src * 32_767.0) as i16;
                    }
                },
                error_handler,
                None,
            )
            .map_err(|err| Error::Device(err.to_string()))?,
        other => {
            return Err(Error::Device(format!(
                "unsupported device sample format {:?}",
                other
            )))
        }
    };
    stream
        .play()
        .map_err(|err| Error::Device(err.to_string()))?;

    Ok(StreamParts {
        commands: commands_tx,
        garbage: garbage_rx,
        events: events_rx,
        stream,
        sample_rate,
        error_flag,
    })
}

/// Spreads the mixer's stereo output over the device's channel count.
fn mix_into(mixer: &mut Mixer, scratch: &mut Vec<f32>, data: &mut [f32], channels: usize) {
    if channels == 2 {
        mixer.mix(data);
        return;
    }
    let frames = data.len() / channels;
    scratch.resize(frames * 2, 0.0);
    mixer.mix(scratch);
    for frame in 0..frames {
        let (l, r) = (scratch[frame * 2], scratch[frame * 2 + 1]);
        for channel in 0..channels {
            data[frame * channels + channel] = match channel {
                0 => l,
                1 => r,
                _ => 0.0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(frames: usize) -> Arc<SoundData> {
        Arc::new(SoundData::from_stereo_samples(vec![0.5; frames * 2]))
    }

    #[test]
    fn voice_stealing_takes_the_oldest() {
        let (mut system, mut mixer) = AudioSystem::headless(2, 48_000);

        let a = system.play_sound(sound(48_000), 1.0, 0.0, 1.0, false, 1).unwrap();
        let b = system.play_sound(sound(48_000), 1.0, 0.0, 1.0, false, 2).unwrap();
        // Pool of two is full; C steals A's slot (oldest).
        let c = system.play_sound(sound(48_000), 1.0, 0.0, 1.0, false, 3).unwrap();

        assert_eq!(a & 0xFF, 0);
        assert_eq!(b & 0xFF, 1);
        // C refers to A's original slot.
        assert_eq!(c & 0xFF, 0);
        assert_ne!(c, a);

        // The mixer agrees: slot 0 now plays C, slot 1 still plays B.
        let mut out = [0.0_f32; 32];
        mixer.mix(&mut out);
        system.pump();

        // Old ids no longer address anything.
        system.set_voice_volume(a, 0.0).unwrap();
        let mut out = [0.0_f32; 32];
        mixer.mix(&mut out);
        // B and C still audible (nonzero output).
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn ended_voices_free_their_mirror_slots() {
        let (mut system, mut mixer) = AudioSystem::headless(1, 48_000);
        system.play_sound(sound(8), 1.0, 0.0, 1.0, false, 1).unwrap();

        let mut out = [0.0_f32; 64];
        mixer.mix(&mut out);
        system.pump();

        // The slot is free again: the next playback does not steal.
        let id = system.play_sound(sound(8), 1.0, 0.0, 1.0, false, 2).unwrap();
        assert_eq!(id & 0xFF, 0);
    }

    #[test]
    fn queue_full_fails_without_blocking() {
        let (mut system, _mixer) = AudioSystem::headless(1, 48_000);
        let mut failed = false;
        for _ in 0..(COMMAND_QUEUE_CAPACITY + 8) {
            if system.set_master_volume(0.5).is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed);
    }

    #[test]
    fn stop_all_clears_the_mirror() {
        let (mut system, _mixer) = AudioSystem::headless(2, 48_000);
        system.play_sound(sound(100), 1.0, 0.0, 1.0, false, 1).unwrap();
        system.stop_all().unwrap();
        let id = system.play_sound(sound(100), 1.0, 0.0, 1.0, false, 2).unwrap();
        assert_eq!(id & 0xFF, 0);
    }
}
