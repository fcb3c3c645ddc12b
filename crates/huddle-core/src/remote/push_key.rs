//! Push key generation
//!
//! Keys are 20 characters: 8 encode the millisecond timestamp, 12 are random.
//! The alphabet is in ASCII order, so keys sort lexicographically by creation
//! time. Keys generated within the same millisecond increment the random
//! part, keeping them strictly ordered.

use std::sync::Mutex;

use crate::models::now_millis;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Default)]
struct KeyState {
    last_millis: i64,
    last_random: [u8; 12],
}

/// Generates unique, time-ordered keys
#[derive(Debug, Default)]
pub struct PushKeyGenerator {
    state: Mutex<KeyState>,
}

impl PushKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a key for the current time
    pub fn generate(&self) -> String {
        self.generate_at(now_millis())
    }

    /// Generate a key for the given time (epoch millis)
    pub fn generate_at(&self, millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if millis == state.last_millis {
            // Same millisecond: increment the random part, carrying over.
            for digit in state.last_random.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            state.last_millis = millis;
            let bytes = uuid::Uuid::new_v4().into_bytes();
            for (digit, byte) in state.last_random.iter_mut().zip(bytes.iter()) {
                *digit = byte % 64;
            }
        }

        let mut key = String::with_capacity(20);
        let mut time = millis.max(0) as u64;
        let mut time_chars = [0u8; 8];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        key.extend(time_chars.iter().map(|&c| c as char));
        key.extend(
            state
                .last_random
                .iter()
                .map(|&d| PUSH_CHARS[d as usize] as char),
        );
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_length_and_alphabet() {
        let generator = PushKeyGenerator::new();
        let key = generator.generate();
        assert_eq!(key.len(), 20);
        assert!(key.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn test_keys_sort_by_time() {
        let generator = PushKeyGenerator::new();
        let early = generator.generate_at(1_000);
        let late = generator.generate_at(2_000);
        assert!(early < late);
    }

    #[test]
    fn test_same_millisecond_keys_are_unique_and_ordered() {
        let generator = PushKeyGenerator::new();
        let keys: Vec<String> = (0..100).map(|_| generator.generate_at(42)).collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }
}
