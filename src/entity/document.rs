use super::types::NormalizedEntity;

/// Render a normalized entity into the plain-text document that gets
/// embedded and indexed. Optional fields are omitted entirely, never
/// rendered as empty placeholders.
pub fn build_document(entity: &NormalizedEntity) -> String {
    let mut parts = vec![
        format!("Name: {}", entity.name),
        format!("Type: {}", entity.entity_type),
        format!("Country: {}", entity.country),
    ];

    if !entity.description.is_empty() {
        parts.push(format!("Description: {}", entity.description));
    }
    if !entity.services.is_empty() {
        parts.push(format!("Services: {}", entity.services.join(", ")));
    }
    if !entity.supported_currencies.is_empty() {
        parts.push(format!(
            "Supported Currencies: {}",
            entity.supported_currencies.join(", ")
        ));
    }
    if entity.api_available {
        parts.push("API: Available".to_string());
    }
    if !entity.url.is_empty() {
        parts.push(format!("Website: {}", entity.url));
    }

    parts.join("\n")
}

/// Separators tried highest-granularity first when a document has to be
/// split: paragraph, line, sentence, word. Character-level is the implicit
/// last resort.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits oversized documents into bounded, overlapping chunks.
///
/// Pure and deterministic: the same text and configuration always produce
/// the same chunk sequence.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let end = if hard_end < chars.len() {
                self.find_break(&chars, start, hard_end)
            } else {
                hard_end
            };

            let chunk: String = chars[start..end].iter().collect();
            let trimmed = chunk.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end >= chars.len() {
                break;
            }
            // step back by the overlap, but always make forward progress
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        chunks
    }

    /// Pick the break position inside `(start, hard_end]`: the last
    /// occurrence of the highest-priority separator that fits, falling back
    /// to a plain character cut at `hard_end`.
    fn find_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        for sep in SEPARATORS {
            let sep_chars: Vec<char> = sep.chars().collect();
            if let Some(pos) = rfind(chars, &sep_chars, start + 1, hard_end) {
                return pos + sep_chars.len();
            }
        }
        hard_end
    }
}

/// Last occurrence of `needle` fully inside `haystack[from..to]`.
fn rfind(haystack: &[char], needle: &[char], from: usize, to: usize) -> Option<usize> {
    if needle.is_empty() || to < from + needle.len() {
        return None;
    }

    let mut pos = to - needle.len();
    loop {
        if haystack[pos..pos + needle.len()] == *needle {
            return Some(pos);
        }
        if pos == from {
            return None;
        }
        pos -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::types::EntityType;

    fn entity() -> NormalizedEntity {
        NormalizedEntity {
            id: "abc".to_string(),
            name: "Remitly".to_string(),
            entity_type: EntityType::Fintech,
            country: "US".to_string(),
            description: "Digital remittance service for LATAM".to_string(),
            services: vec!["remittances".to_string(), "digital_transfer".to_string()],
            supported_currencies: vec!["USD".to_string(), "MXN".to_string()],
            api_available: true,
            url: "https://www.remitly.com".to_string(),
            rating: 4.7,
            last_updated: String::new(),
            fees: serde_json::Value::Null,
        }
    }

    #[test]
    fn document_renders_present_fields_in_order() {
        let doc = build_document(&entity());
        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines[0], "Name: Remitly");
        assert_eq!(lines[1], "Type: fintech");
        assert_eq!(lines[2], "Country: US");
        assert!(doc.contains("Services: remittances, digital_transfer"));
        assert!(doc.contains("Supported Currencies: USD, MXN"));
        assert!(doc.contains("API: Available"));
        assert!(doc.contains("Website: https://www.remitly.com"));
    }

    #[test]
    fn document_omits_absent_fields() {
        let mut e = entity();
        e.description = String::new();
        e.services.clear();
        e.supported_currencies.clear();
        e.api_available = false;
        e.url = String::new();

        let doc = build_document(&e);
        assert_eq!(doc, "Name: Remitly\nType: fintech\nCountry: US");
        assert!(!doc.contains("Description:"));
        assert!(!doc.contains("API:"));
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = Chunker::new(500, 50);
        let text = "Name: Banesco\nType: bank\nCountry: VE";
        assert_eq!(chunker.split(text), vec![text.to_string()]);
    }

    #[test]
    fn long_text_splits_under_the_size_limit() {
        let chunker = Chunker::new(100, 20);
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let chunks = chunker.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn chunking_is_deterministic_and_overlapping() {
        let chunker = Chunker::new(80, 20);
        let text = "One sentence here. Another sentence there. ".repeat(8);

        let a = chunker.split(&text);
        let b = chunker.split(&text);
        assert_eq!(a, b);

        // adjacent chunks share boundary context
        for pair in a.windows(2) {
            let tail: String = pair[0].chars().rev().take(10).collect::<String>();
            let tail: String = tail.chars().rev().collect();
            assert!(
                pair[1].contains(tail.trim()),
                "expected overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn paragraph_breaks_win_over_word_breaks() {
        let chunker = Chunker::new(40, 0);
        let text = format!("{}\n\n{}", "alpha beta gamma delta", "epsilon zeta eta theta");
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0], "alpha beta gamma delta");
    }
}
