//! Splitting replies into synthesizer-sized pieces.

pub const DEFAULT_CHUNK_CHARS: usize = 4000;

/// Split `text` into chunks of at most `limit` characters.
///
/// Sentences (ending in `.`, `!` or `?` followed by whitespace) are kept
/// whole where they fit. A longer sentence breaks at whitespace, and a single
/// word longer than `limit` is cut hard.
pub fn split_for_speech(text: &str, limit: usize) -> Vec<String> {
    let mut packer = Packer::new(limit.max(1));
    for sentence in sentences(text) {
        if sentence.chars().count() <= packer.limit {
            packer.push(sentence);
            continue;
        }
        for word in sentence.split_whitespace() {
            if word.chars().count() <= packer.limit {
                packer.push(word);
            } else {
                for piece in hard_split(word, packer.limit) {
                    packer.push(&piece);
                }
            }
        }
    }
    packer.finish()
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_at, next)) = chars.peek() {
                if next.is_whitespace() {
                    out.push(&text[start..next_at]);
                    start = next_at;
                }
            }
        }
    }
    out.push(&text[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn hard_split(word: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}

/// Greedy packing of space-joined pieces.
struct Packer {
    limit: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(limit: usize) -> Self {
        Self { limit, chunks: Vec::new(), current: String::new(), current_len: 0 }
    }

    fn push(&mut self, piece: &str) {
        let len = piece.chars().count();
        if self.current_len > 0 && self.current_len + 1 + len > self.limit {
            self.chunks.push(std::mem::take(&mut self.current));
            self.current_len = 0;
        }
        if self.current_len > 0 {
            self.current.push(' ');
            self.current_len += 1;
        }
        self.current.push_str(piece);
        self.current_len += len;
    }

    fn finish(mut self) -> Vec<String> {
        if self.current_len > 0 {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}
