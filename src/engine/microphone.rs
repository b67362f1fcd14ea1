//! Exclusive microphone ownership.
//!
//! Detection and calibration sessions sharing one arbiter can never hold
//! the microphone at the same time. The lease releases ownership on drop.

use std::sync::{Arc, Mutex};

use crate::error::AudioError;

#[derive(Debug, Clone, Default)]
pub struct MicrophoneArbiter {
    owner: Arc<Mutex<Option<String>>>,
}

impl MicrophoneArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the microphone for `owner`
    ///
    /// # Errors
    /// `DeviceBusy` naming the current owner when already claimed
    pub fn try_acquire(&self, owner: &str) -> Result<MicrophoneLease, AudioError> {
        let mut current = self.owner.lock().map_err(|_| AudioError::LockPoisoned {
            component: "microphone_arbiter".to_string(),
        })?;

        if let Some(existing) = current.as_ref() {
            return Err(AudioError::DeviceBusy {
                owner: existing.clone(),
            });
        }

        *current = Some(owner.to_string());
        log::debug!("[Microphone] Claimed by {}", owner);

        Ok(MicrophoneLease {
            owner: Arc::clone(&self.owner),
            name: owner.to_string(),
        })
    }

    pub fn current_owner(&self) -> Option<String> {
        self.owner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn is_free(&self) -> bool {
        self.current_owner().is_none()
    }
}

/// Proof of microphone ownership
#[derive(Debug)]
pub struct MicrophoneLease {
    owner: Arc<Mutex<Option<String>>>,
    name: String,
}

impl MicrophoneLease {
    pub fn owner(&self) -> &str {
        &self.name
    }
}

impl Drop for MicrophoneLease {
    fn drop(&mut self) {
        let mut guard = self
            .owner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
        log::debug!("[Microphone] Released by {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_owner() {
        let arbiter = MicrophoneArbiter::new();
        let lease = arbiter.try_acquire("detection").unwrap();
        assert_eq!(lease.owner(), "detection");
        assert_eq!(arbiter.current_owner().as_deref(), Some("detection"));

        let err = arbiter.try_acquire("calibration").unwrap_err();
        assert_eq!(
            err,
            AudioError::DeviceBusy {
                owner: "detection".to_string()
            }
        );
    }

    #[test]
    fn test_drop_releases() {
        let arbiter = MicrophoneArbiter::new();
        {
            let _lease = arbiter.try_acquire("calibration").unwrap();
            assert!(!arbiter.is_free());
        }
        assert!(arbiter.is_free());
        assert!(arbiter.try_acquire("detection").is_ok());
    }

    #[test]
    fn test_clones_share_state() {
        let arbiter = MicrophoneArbiter::new();
        let other = arbiter.clone();
        let _lease = arbiter.try_acquire("detection").unwrap();
        assert!(other.try_acquire("calibration").is_err());
    }
}
