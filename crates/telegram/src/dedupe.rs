//! Voice-send dedupe: per-(account, chat) sliding windows over content
//! fingerprints.
//!
//! Two-level LRU: at most 500 chats process-wide, at most 50 fingerprints
//! per chat, entries expiring lazily after the configured window. Bounded
//! fan-out means a burst of chats can never grow the maps past the caps.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use sk_domain::TraceEvent;

const MAX_CHATS: usize = 500;
const MAX_FINGERPRINTS_PER_CHAT: usize = 50;
pub const DEFAULT_WINDOW_MS: u64 = 10_000;

/// Content fingerprint: sha256 over the payload bytes.
pub fn sha256_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

struct Seen {
    ts: u64,
}

type ChatState = LruCache<String, Seen>;

pub struct VoiceDeduper {
    chats: Mutex<LruCache<String, ChatState>>,
    window_ms: u64,
}

impl VoiceDeduper {
    pub fn new(window_ms: u64) -> Self {
        Self {
            chats: Mutex::new(LruCache::new(NonZeroUsize::new(MAX_CHATS).unwrap())),
            window_ms,
        }
    }

    /// Returns `true` when this fingerprint was already sent to the chat
    /// within the window (the send should be suppressed). A miss records
    /// the fingerprint and returns `false`.
    pub fn should_dedupe(
        &self,
        account_id: &str,
        chat_id: &str,
        fingerprint: &str,
        now_ms: u64,
    ) -> bool {
        let chat_key = format!("{account_id}:{chat_id}");
        let mut chats = self.chats.lock();

        // Touching the chat moves it to the MRU end; the LruCache cap
        // evicts the coldest chat when a 501st appears.
        if chats.get(&chat_key).is_none() {
            chats.put(
                chat_key.clone(),
                LruCache::new(NonZeroUsize::new(MAX_FINGERPRINTS_PER_CHAT).unwrap()),
            );
        }
        let chat = chats.get_mut(&chat_key).expect("just inserted");

        // Lazy expiry from the LRU end: stop at the first live entry.
        while let Some((_, seen)) = chat.peek_lru() {
            if now_ms.saturating_sub(seen.ts) > self.window_ms {
                chat.pop_lru();
            } else {
                break;
            }
        }

        if let Some(seen) = chat.get_mut(fingerprint) {
            if now_ms.saturating_sub(seen.ts) <= self.window_ms {
                // get_mut refreshed the LRU order.
                TraceEvent::VoiceDeduped {
                    chat_key: chat_key.clone(),
                }
                .emit();
                return true;
            }
            seen.ts = now_ms;
            return false;
        }

        chat.put(fingerprint.to_owned(), Seen { ts: now_ms });
        false
    }

    /// Convenience wrapper hashing the payload itself.
    pub fn should_dedupe_bytes(
        &self,
        account_id: &str,
        chat_id: &str,
        payload: &[u8],
        now_ms: u64,
    ) -> bool {
        self.should_dedupe(account_id, chat_id, &sha256_fingerprint(payload), now_ms)
    }

    pub fn chat_count(&self) -> usize {
        self.chats.lock().len()
    }
}

impl Default for VoiceDeduper {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_identical_send_within_window_is_duplicate() {
        let deduper = VoiceDeduper::default();
        assert!(!deduper.should_dedupe("acc", "123", "fp1", 1_000));
        assert!(deduper.should_dedupe("acc", "123", "fp1", 2_000));
    }

    #[test]
    fn expired_fingerprint_sends_again() {
        let deduper = VoiceDeduper::new(10_000);
        assert!(!deduper.should_dedupe("acc", "123", "fp1", 1_000));
        assert!(!deduper.should_dedupe("acc", "123", "fp1", 12_001));
        // And it is fresh again from the new timestamp.
        assert!(deduper.should_dedupe("acc", "123", "fp1", 13_000));
    }

    #[test]
    fn chats_are_isolated() {
        let deduper = VoiceDeduper::default();
        assert!(!deduper.should_dedupe("acc", "123", "fp1", 1_000));
        assert!(!deduper.should_dedupe("acc", "456", "fp1", 1_000));
        assert!(!deduper.should_dedupe("other", "123", "fp1", 1_000));
    }

    #[test]
    fn chat_map_bounded_at_500() {
        let deduper = VoiceDeduper::default();
        for i in 0..600 {
            deduper.should_dedupe("acc", &format!("chat-{i}"), "fp", 1_000);
        }
        assert_eq!(deduper.chat_count(), 500);

        // The oldest chats were evicted, so their fingerprints are gone.
        assert!(!deduper.should_dedupe("acc", "chat-0", "fp", 1_001));
        // A recent chat still remembers.
        assert!(deduper.should_dedupe("acc", "chat-599", "fp", 1_001));
    }

    #[test]
    fn per_chat_fingerprints_bounded_at_50() {
        let deduper = VoiceDeduper::default();
        for i in 0..60 {
            deduper.should_dedupe("acc", "123", &format!("fp-{i}"), 1_000);
        }
        // fp-0 .. fp-9 were evicted by the per-chat cap.
        assert!(!deduper.should_dedupe("acc", "123", "fp-0", 1_001));
        assert!(deduper.should_dedupe("acc", "123", "fp-59", 1_001));
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = sha256_fingerprint(b"voice-bytes");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, sha256_fingerprint(b"voice-bytes"));
        assert_ne!(fp, sha256_fingerprint(b"other"));
    }
}
