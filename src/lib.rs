//! Workspace facade crate.
//!
//! Exposes feature flags that map onto the individual workspace crates so a
//! host application can depend on `quran-audio-workspace` alone. With the
//! default `desktop-shims` feature the full service (bridges included) is
//! re-exported; `playback-only` exposes just the playback core for hosts that
//! bring every bridge themselves.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "playback-only")]
pub use core_playback as playback;
