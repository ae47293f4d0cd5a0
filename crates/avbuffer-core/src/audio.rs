//! Volume and balance control.
//!
//! [`AudioControls`] is a lightweight handle that can be cloned and shared
//! between the player front-end and an audio sink's callback thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Shared volume / balance / mute state.
#[derive(Clone)]
pub struct AudioControls {
    inner: Arc<AudioControlsInner>,
}

struct AudioControlsInner {
    /// Gain 0.0..=1.0, stored as f32 bits
    volume: AtomicU32,
    /// Left/right balance -1.0..=1.0, stored as f32 bits
    balance: AtomicU32,
    muted: AtomicBool,
}

impl AudioControls {
    /// Creates controls at full volume, centered, unmuted.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AudioControlsInner {
                volume: AtomicU32::new(1.0f32.to_bits()),
                balance: AtomicU32::new(0.0f32.to_bits()),
                muted: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the volume (0.0-1.0).
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.inner.volume.load(Ordering::Relaxed))
    }

    /// Sets the volume, clamped to 0.0-1.0. NaN is treated as silence.
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.inner.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Returns the balance (-1.0 = left only, 1.0 = right only).
    pub fn balance(&self) -> f32 {
        f32::from_bits(self.inner.balance.load(Ordering::Relaxed))
    }

    /// Sets the balance, clamped to -1.0-1.0. NaN centers it.
    pub fn set_balance(&self, balance: f32) {
        let balance = if balance.is_nan() { 0.0 } else { balance.clamp(-1.0, 1.0) };
        self.inner.balance.store(balance.to_bits(), Ordering::Relaxed);
    }

    /// Returns whether audio is muted.
    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::Relaxed)
    }

    /// Sets the mute state.
    pub fn set_muted(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::Relaxed);
    }

    /// Toggles the mute state.
    pub fn toggle_mute(&self) {
        self.inner.muted.fetch_xor(true, Ordering::Relaxed);
    }

    /// Returns the effective volume accounting for mute.
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted() {
            0.0
        } else {
            self.volume()
        }
    }

    /// Returns (left, right) gains combining volume, mute and balance.
    pub fn channel_gains(&self) -> (f32, f32) {
        let volume = self.effective_volume();
        let balance = self.balance();
        let left = if balance > 0.0 { 1.0 - balance } else { 1.0 };
        let right = if balance < 0.0 { 1.0 + balance } else { 1.0 };
        (volume * left, volume * right)
    }
}

impl Default for AudioControls {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AudioControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioControls")
            .field("volume", &self.volume())
            .field("balance", &self.balance())
            .field("muted", &self.is_muted())
            .finish()
    }
}
