//! `audio` namespace: module music and multi-voice SFX.
//!
//! Every call funnels into the main-thread [`arc_audio::AudioSystem`],
//! which owns the lock-free command queue. When audio is unavailable
//! (permission denied, no device, device lost) every call fails safely.

use std::sync::Arc;

use rhai::{Dynamic, Module};

use arc_audio::SoundData;
use arc_registry::Handle;

use super::native;
use crate::services::{as_finite_f32, fail, Services, Shared};

/// Runs `op` against the audio system or fails the binding.
fn with_audio<T>(
    s: &mut Services,
    func: &'static str,
    failure: T,
    op: impl FnOnce(&mut arc_audio::AudioSystem) -> arc_audio::Result<T>,
) -> T {
    let dev_mode = s.dev_mode;
    match s.audio.as_mut() {
        Some(audio) => match op(audio) {
            Ok(value) => value,
            Err(err) => fail(dev_mode, func, err, failure),
        },
        None => fail(dev_mode, func, "audio is unavailable", failure),
    }
}

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    // --- sounds & voices ---

    native!(module, services, "loadSound", |s, path: &str| {
        let Some(audio) = s.audio.as_ref() else {
            return Ok(fail(s.dev_mode, "audio.loadSound", "audio is unavailable", 0_i64));
        };
        let device_rate = audio.sample_rate();
        let bytes = match s.vfs.read_bytes(path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(fail(s.dev_mode, "audio.loadSound", err, 0_i64)),
        };
        let sound = match SoundData::decode_wav(&bytes, device_rate) {
            Ok(sound) => Arc::new(sound),
            Err(err) => return Ok(fail(s.dev_mode, "audio.loadSound", err, 0_i64)),
        };
        let owner = s.cartridge_id.clone();
        match s.resources.sounds.allocate(&owner, sound) {
            Ok(handle) => handle.as_raw(),
            Err(err) => fail(s.dev_mode, "audio.loadSound", err, 0_i64),
        }
    });
    native!(module, services, "freeSound", |s, handle: i64| {
        s.resources.sounds.free(Handle::from_raw(handle));
    });

    native!(
        module,
        services,
        "playSound",
        |s, sound: i64, volume: Dynamic, pan: Dynamic, pitch: Dynamic, looping: bool| {
            let [volume, pan, pitch] = match (
                as_finite_f32(&volume),
                as_finite_f32(&pan),
                as_finite_f32(&pitch),
            ) {
                (Some(v), Some(p), Some(t)) => [v, p, t],
                _ => {
                    return Ok(fail(
                        s.dev_mode,
                        "audio.playSound",
                        "arguments must be finite numbers",
                        0_i64,
                    ))
                }
            };
            let owner = s.cartridge_id.clone();
            let data = match s
                .resources
                .sounds
                .get(Handle::<Arc<SoundData>>::from_raw(sound), &owner)
            {
                Ok(data) => data.clone(),
                Err(err) => return Ok(fail(s.dev_mode, "audio.playSound", err, 0_i64)),
            };
            let tick = s.tick_count;
            with_audio(&mut s, "audio.playSound", 0_i64, |audio| {
                audio
                    .play_sound(data, volume, pan, pitch, looping, tick)
                    .map(|id| id as i64)
            })
        }
    );

    native!(module, services, "stopVoice", |s, voice: i64| {
        with_audio(&mut s, "audio.stopVoice", false, |audio| {
            audio.stop_voice(voice as u64).map(|()| true)
        })
    });
    native!(module, services, "setVoiceVolume", |s, voice: i64, volume: Dynamic| {
        let Some(volume) = as_finite_f32(&volume) else {
            return Ok(fail(s.dev_mode, "audio.setVoiceVolume", "volume must be finite", false));
        };
        with_audio(&mut s, "audio.setVoiceVolume", false, |audio| {
            audio.set_voice_volume(voice as u64, volume).map(|()| true)
        })
    });
    native!(module, services, "setVoicePan", |s, voice: i64, pan: Dynamic| {
        let Some(pan) = as_finite_f32(&pan) else {
            return Ok(fail(s.dev_mode, "audio.setVoicePan", "pan must be finite", false));
        };
        with_audio(&mut s, "audio.setVoicePan", false, |audio| {
            audio.set_voice_pan(voice as u64, pan).map(|()| true)
        })
    });
    native!(module, services, "setVoicePitch", |s, voice: i64, pitch: Dynamic| {
        let Some(pitch) = as_finite_f32(&pitch) else {
            return Ok(fail(s.dev_mode, "audio.setVoicePitch", "pitch must be finite", false));
        };
        with_audio(&mut s, "audio.setVoicePitch", false, |audio| {
            audio.set_voice_pitch(voice as u64, pitch).map(|()| true)
        })
    });

    // --- module music ---

    native!(module, services, "loadModule", |s, path: &str| {
        let bytes = match s.vfs.read_bytes(path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(fail(s.dev_mode, "audio.loadModule", err, 0_i64)),
        };
        let owner = s.cartridge_id.clone();
        match s.resources.modules.allocate(&owner, bytes) {
            Ok(handle) => handle.as_raw(),
            Err(err) => fail(s.dev_mode, "audio.loadModule", err, 0_i64),
        }
    });
    native!(module, services, "freeModule", |s, handle: i64| {
        s.resources.modules.free(Handle::from_raw(handle));
    });

    native!(module, services, "playModule", |s, handle: i64, looping: bool| {
        let owner = s.cartridge_id.clone();
        let bytes = match s.resources.modules.get(Handle::<Vec<u8>>::from_raw(handle), &owner) {
            Ok(bytes) => bytes.clone(),
            Err(err) => return Ok(fail(s.dev_mode, "audio.playModule", err, false)),
        };
        with_audio(&mut s, "audio.playModule", false, |audio| {
            audio.play_module(&bytes, looping).map(|()| true)
        })
    });
    native!(module, services, "stopModule", |s| {
        with_audio(&mut s, "audio.stopModule", false, |audio| {
            audio.stop_module().map(|()| true)
        })
    });
    native!(module, services, "pauseModule", |s| {
        with_audio(&mut s, "audio.pauseModule", false, |audio| {
            audio.pause_module().map(|()| true)
        })
    });
    native!(module, services, "resumeModule", |s| {
        with_audio(&mut s, "audio.resumeModule", false, |audio| {
            audio.resume_module().map(|()| true)
        })
    });
    native!(module, services, "setModuleVolume", |s, volume: Dynamic| {
        let Some(volume) = as_finite_f32(&volume) else {
            return Ok(fail(s.dev_mode, "audio.setModuleVolume", "volume must be finite", false));
        };
        with_audio(&mut s, "audio.setModuleVolume", false, |audio| {
            audio.set_module_volume(volume).map(|()| true)
        })
    });
    native!(module, services, "setModuleTempo", |s, factor: Dynamic| {
        let Some(factor) = as_finite_f32(&factor) else {
            return Ok(fail(s.dev_mode, "audio.setModuleTempo", "factor must be finite", false));
        };
        with_audio(&mut s, "audio.setModuleTempo", false, |audio| {
            audio.set_module_tempo(f64::from(factor)).map(|()| true)
        })
    });
    native!(module, services, "seekModule", |s, seconds: Dynamic| {
        let Some(seconds) = as_finite_f32(&seconds) else {
            return Ok(fail(s.dev_mode, "audio.seekModule", "position must be finite", false));
        };
        with_audio(&mut s, "audio.seekModule", false, |audio| {
            audio.seek_module(f64::from(seconds)).map(|()| true)
        })
    });

    native!(module, services, "setMasterVolume", |s, volume: Dynamic| {
        let Some(volume) = as_finite_f32(&volume) else {
            return Ok(fail(s.dev_mode, "audio.setMasterVolume", "volume must be finite", false));
        };
        with_audio(&mut s, "audio.setMasterVolume", false, |audio| {
            audio.set_master_volume(volume).map(|()| true)
        })
    });
    native!(module, services, "stopAll", |s| {
        with_audio(&mut s, "audio.stopAll", false, |audio| {
            audio.stop_all().map(|()| true)
        })
    });

    module
}
