pub mod asset;
#[cfg(feature = "native-ffmpeg")]
pub mod native;
pub mod probe;

pub use asset::{Asset, AssetProvider, MediaAsset, StreamInfo};
#[cfg(feature = "native-ffmpeg")]
pub use native::NativeProbe;
pub use probe::FfprobeProvider;
