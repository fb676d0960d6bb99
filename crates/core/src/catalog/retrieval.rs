use super::KnowledgeBase;

/// Ranked lookup of context snippets for free text.
pub trait Retrieval: Send + Sync {
    fn query(&self, text: &str, top_k: usize) -> Vec<String>;
}

// Scores are kept in half points so ranking stays integral.
const PHRASE_MATCH: u32 = 4;
const WORD_MATCH: u32 = 1;
const ROOM_MATCH: u32 = 2;

impl Retrieval for KnowledgeBase {
    fn query(&self, text: &str, top_k: usize) -> Vec<String> {
        let query = text.trim().to_lowercase();
        if query.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let words = query.split_whitespace().collect::<Vec<_>>();

        let mut matches: Vec<(u32, &str)> = Vec::new();
        for faq in &self.faqs {
            let haystack = format!("{} {}", faq.q, faq.a).to_lowercase();
            let mut score = 0;
            if haystack.contains(&query) {
                score += PHRASE_MATCH;
            }
            score += WORD_MATCH * words.iter().filter(|word| haystack.contains(**word)).count() as u32;
            if score > 0 {
                matches.push((score, faq.a.as_str()));
            }
        }

        for room in &self.rooms {
            let haystack = format!("{} {}", room.name, room.description).to_lowercase();
            if words.iter().any(|word| haystack.contains(*word)) {
                matches.push((ROOM_MATCH, room.description.as_str()));
            }
        }

        // Stable sort keeps load order among equal scores.
        matches.sort_by(|left, right| right.0.cmp(&left.0));
        matches.into_iter().take(top_k).map(|(_, snippet)| snippet.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::Retrieval;
    use crate::catalog::{Faq, KnowledgeBase};
    use crate::domain::room::{Room, RoomId};

    fn knowledge() -> KnowledgeBase {
        KnowledgeBase {
            rooms: vec![Room {
                id: RoomId("deluxe".to_string()),
                name: "Deluxe Suite".to_string(),
                description: "Spacious suite with a sea view balcony.".to_string(),
                price: Decimal::from(120),
            }],
            faqs: vec![
                Faq { q: "What time is check-in?".to_string(), a: "Check-in is from 14:00.".to_string() },
                Faq { q: "Is there parking?".to_string(), a: "Free garage parking on site.".to_string() },
                Faq { q: "Do you allow pets?".to_string(), a: "Small pets are welcome.".to_string() },
            ],
            upsells: Vec::new(),
        }
    }

    #[test]
    fn phrase_matches_outrank_word_matches() {
        let snippets = knowledge().query("Is there parking?", 3);
        assert_eq!(snippets.first().map(String::as_str), Some("Free garage parking on site."));
    }

    #[test]
    fn room_descriptions_are_included_when_words_overlap() {
        let snippets = knowledge().query("sea view", 3);
        assert_eq!(snippets, vec!["Spacious suite with a sea view balcony.".to_string()]);
    }

    #[test]
    fn results_are_capped_at_top_k() {
        let snippets = knowledge().query("is", 2);
        assert_eq!(snippets.len(), 2);
    }

    #[test]
    fn blank_or_unmatched_queries_return_nothing() {
        assert!(knowledge().query("   ", 3).is_empty());
        assert!(knowledge().query("helicopter", 3).is_empty());
    }
}
