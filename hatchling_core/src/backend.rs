//! The host contract: traits a host implements so `hatchling_core` never
//! has to know about a window, a GPU, a mixer, or a filesystem. The core
//! reaches through these associated types instead of depending on any one
//! windowing or audio crate directly.

use std::fmt::Debug;

/// One surface's worth of raster output: pixel dimensions and a place to
/// submit drawn scanlines/polygon batches each frame. `hatchling_raster`
/// is the one shipped implementation; a hardware backend can provide its
/// own without this crate changing.
pub trait RasterBackend: Debug {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn present(&mut self);
}

/// Sound playback: starting/stopping channels and streaming music.
/// `channel` identifies one of the engine's mixer voices.
pub trait AudioBackend: Debug {
    fn play_sound(&mut self, channel: u8, asset: &str, loop_count: Option<u32>);
    fn stop_sound(&mut self, channel: u8);
    fn set_channel_volume(&mut self, channel: u8, volume: f32);
}

/// Per-frame input sampling: digital buttons plus analog stick axes,
/// queried by player index.
pub trait InputBackend: Debug {
    fn button_down(&self, player: u8, button: u16) -> bool;
    fn axis(&self, player: u8, axis: u8) -> f32;
}

/// File and network access outside the VM's own heap: reading asset
/// bytes, and opening (fire-and-forget) URLs.
pub trait NavigatorBackend: Debug {
    fn read_asset(&self, path: &str) -> std::io::Result<Vec<u8>>;
    fn open_url(&self, url: &str);
}

/// Bundles one concrete choice of backend per concern, the way a host
/// binary assembles its own `Backends` impl and hands it to the scene
/// driver. Swapping `hatchling_cli`'s headless backends for a windowed
/// host means implementing a new `Backends` impl, not touching this
/// crate.
pub trait Backends: Debug + 'static {
    type Raster: RasterBackend;
    type Audio: AudioBackend;
    type Input: InputBackend;
    type Navigator: NavigatorBackend;

    fn raster(&self) -> &Self::Raster;
    fn raster_mut(&mut self) -> &mut Self::Raster;

    fn audio(&self) -> &Self::Audio;
    fn audio_mut(&mut self) -> &mut Self::Audio;

    fn input(&self) -> &Self::Input;

    fn navigator(&self) -> &Self::Navigator;
}

/// A `RasterBackend` that draws nowhere; `AudioBackend`/`InputBackend`/
/// `NavigatorBackend` impls that do nothing or report idle state. Used by
/// `hatchling_cli` when running without a window, and by tests that only
/// care about VM/scene-driver state, not actual pixels.
#[derive(Debug, Default)]
pub struct NullRaster {
    pub width: u32,
    pub height: u32,
}

impl RasterBackend for NullRaster {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn present(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn play_sound(&mut self, _channel: u8, _asset: &str, _loop_count: Option<u32>) {}
    fn stop_sound(&mut self, _channel: u8) {}
    fn set_channel_volume(&mut self, _channel: u8, _volume: f32) {}
}

#[derive(Debug, Default)]
pub struct NullInput;

impl InputBackend for NullInput {
    fn button_down(&self, _player: u8, _button: u16) -> bool {
        false
    }

    fn axis(&self, _player: u8, _axis: u8) -> f32 {
        0.0
    }
}

#[derive(Debug, Default)]
pub struct NullNavigator;

impl NavigatorBackend for NullNavigator {
    fn read_asset(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn open_url(&self, _url: &str) {}
}

#[derive(Debug, Default)]
pub struct HeadlessBackends {
    pub raster: NullRaster,
    pub audio: NullAudio,
    pub input: NullInput,
    pub navigator: NullNavigator,
}

impl Backends for HeadlessBackends {
    type Raster = NullRaster;
    type Audio = NullAudio;
    type Input = NullInput;
    type Navigator = NullNavigator;

    fn raster(&self) -> &Self::Raster {
        &self.raster
    }

    fn raster_mut(&mut self) -> &mut Self::Raster {
        &mut self.raster
    }

    fn audio(&self) -> &Self::Audio {
        &self.audio
    }

    fn audio_mut(&mut self) -> &mut Self::Audio {
        &mut self.audio
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn navigator(&self) -> &Self::Navigator {
        &self.navigator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_backends_present_is_a_no_op() {
        let mut backends = HeadlessBackends::default();
        backends.raster_mut().present();
        assert!(!backends.input().button_down(0, 0));
    }
}
