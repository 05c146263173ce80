use std::sync::Arc;

use crate::module::ModuleDecoder;
use crate::sound::SoundData;

/// Fixed capacity of the main-to-callback command ring.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// One mixer command. Commands issued within a tick apply in issue order
/// at the next buffer boundary.
pub enum Command {
    PlayModule {
        decoder: Box<dyn ModuleDecoder>,
        looping: bool,
    },
    StopModule,
    PauseModule,
    ResumeModule,
    SetModuleVolume(f32),
    SetModuleTempo(f64),
    SeekModule(f64),
    PlaySound {
        /// Target voice slot, chosen by the main thread (free slot or
        /// stolen oldest).
        slot: u32,
        /// Full voice id; the slot's current id after this command.
        id: u64,
        sound: Arc<SoundData>,
        volume: f32,
        pan: f32,
        pitch: f32,
        looping: bool,
    },
    StopVoice(u64),
    SetVoiceVolume(u64, f32),
    SetVoicePan(u64, f32),
    SetVoicePitch(u64, f32),
    SetMasterVolume(f32),
    StopAll,
}

/// Callback-to-main notifications used to keep the main thread's voice
/// mirror accurate when voices end on their own.
#[derive(Debug, Clone, Copy)]
pub enum VoiceEvent {
    Ended { slot: u32, id: u64 },
}

/// Resources retired by the callback, shipped to the main thread for
/// destruction (the callback must not deallocate).
pub enum Garbage {
    Decoder(Box<dyn ModuleDecoder>),
    Sound(Arc<SoundData>),
}
