//! History windowing.
//!
//! Bounding what gets transmitted keeps token spend and latency in
//! check; stored history is never mutated, only read through a limit.

use nestchat_core::message::ChatTurn;

/// The trailing `min(n, limit)` turns of `history`, order preserved.
///
/// `limit` is a final turn count; callers derive it from a "rounds"
/// configuration as `rounds * 2` (one round = one user + one assistant
/// turn), but this function is agnostic to that distinction.
pub fn window(history: &[ChatTurn], limit: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(limit);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ChatTurn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("question {i}"))
                } else {
                    ChatTurn::assistant(format!("answer {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn short_history_passes_through() {
        let h = turns(4);
        assert_eq!(window(&h, 10), &h[..]);
        assert_eq!(window(&h, 4), &h[..]);
    }

    #[test]
    fn long_history_keeps_trailing_suffix() {
        // 12 turns, 5 rounds (limit 10) → exactly the last 10 turns.
        let h = turns(12);
        let w = window(&h, 10);
        assert_eq!(w.len(), 10);
        assert_eq!(w[0].content, "question 2");
        assert_eq!(w[9].content, "answer 11");
    }

    #[test]
    fn zero_limit_yields_empty() {
        let h = turns(3);
        assert!(window(&h, 0).is_empty());
    }

    #[test]
    fn empty_history() {
        assert!(window(&[], 10).is_empty());
    }

    #[test]
    fn window_length_is_min_of_len_and_limit() {
        for n in 0..8 {
            for limit in 0..8 {
                let h = turns(n);
                let w = window(&h, limit);
                assert_eq!(w.len(), n.min(limit));
                // Order preserved: suffix matches the source slice.
                assert_eq!(w, &h[n - w.len()..]);
            }
        }
    }
}
