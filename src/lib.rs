#![no_std]

pub mod backend;
pub mod color;
pub mod command;
pub mod error;
pub mod fade;
pub mod gamma;
pub mod lightbulb;
pub mod power;
pub mod scheduler;
pub mod storage;

pub use backend::{
    Backend, BackendInfo, CHANNEL_COUNT, COLOR_CHANNEL_MASK, ChannelId, WHITE_CHANNEL_MASK,
};
pub use command::{
    CommandQueue, CommandReceiver, CommandSender, LightCommand, TryReceiveError, TrySendError,
};
pub use error::Error;
pub use fade::{ERROR_COUNT_THRESHOLD, FadeEngine, FadeState, TICK_DURATION, TICK_MS};
pub use gamma::{CurveCoefficients, GammaConfig, GammaGroup, WhiteBalance};
pub use lightbulb::{
    Capability, EffectConfig, EffectType, IoPins, LightStatus, Lightbulb, LightbulbConfig,
    PowerLimit, WorkMode,
};
pub use scheduler::{TickResult, TickScheduler};
pub use storage::{NullStore, STATUS_SCHEMA_VERSION, StatusStore};

pub use color::{KelvinRange, Rgb, hsv2rgb, rgb2hsv};
pub use embassy_time::{Duration, Instant};
