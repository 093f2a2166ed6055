//! Emote compositor: rewrites a raw message body into display fragments
//! given the inline positional annotations supplied upstream.
//!
//! Offsets are UTF-16 code units with inclusive ends, so the body is
//! processed as a code-unit sequence and decoded back per text run.

use crate::models::{EmotePosition, MessageFragment};

/// Image reference for an emote id on the public CDN.
pub fn emote_url(id: &str) -> String {
    format!("https://static-cdn.jtvnw.net/emoticons/v2/{id}/default/dark/1.0")
}

enum Slot {
    Unit(u16),
    Emote(usize),
    /// Swallowed by a splice; contributes nothing to the output.
    Consumed,
}

/// Splices emote annotations into the body, producing the fragment list the
/// renderer consumes.
///
/// Positions are processed sorted by `start` descending: replacing from the
/// end of the string toward the start means earlier replacements never
/// invalidate the offsets of replacements not yet performed, so the result
/// is invariant to the input ordering of `positions`.
///
/// Overlapping ranges are not validated (upstream data is trusted to be
/// well-formed); when they do overlap, the later (leftmost-processed)
/// replacement's splice overwrites the overlapped span. Positions falling
/// outside the body are skipped.
pub fn composite(body: &str, positions: &[EmotePosition]) -> Vec<MessageFragment> {
    let mut slots: Vec<Slot> = body.encode_utf16().map(Slot::Unit).collect();

    let mut ordered: Vec<&EmotePosition> = positions.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    for (index, position) in ordered.iter().enumerate() {
        let start = position.start as usize;
        if start >= slots.len() || position.end < position.start {
            tracing::debug!(
                emote = %position.id,
                start = position.start,
                end = position.end,
                "emote position out of range; skipping"
            );
            continue;
        }
        let end = (position.end as usize).min(slots.len() - 1);
        for slot in &mut slots[start..=end] {
            *slot = Slot::Consumed;
        }
        slots[start] = Slot::Emote(index);
    }

    let mut fragments = Vec::new();
    let mut run: Vec<u16> = Vec::new();
    for slot in slots {
        match slot {
            Slot::Unit(unit) => run.push(unit),
            Slot::Consumed => {}
            Slot::Emote(index) => {
                if !run.is_empty() {
                    fragments.push(MessageFragment::text(String::from_utf16_lossy(&run)));
                    run.clear();
                }
                let position = ordered[index];
                fragments.push(MessageFragment::Emote {
                    id: position.id.clone(),
                    image_url: emote_url(&position.id),
                });
            }
        }
    }
    if !run.is_empty() {
        fragments.push(MessageFragment::text(String::from_utf16_lossy(&run)));
    }
    fragments
}
