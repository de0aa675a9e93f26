//! Outbound chunking of long text under a transport size limit.
//!
//! Text is split on blank-line paragraph boundaries first; a paragraph that
//! alone exceeds the limit is split on sentence boundaries (`.`, `!`, `?`
//! followed by whitespace). Pieces are packed greedily.
//!
//! No character of the input is rewritten. A chunk boundary that falls
//! between paragraphs consumes exactly one [`PARAGRAPH_SEPARATOR`]; a
//! boundary between sentences consumes nothing, since each sentence keeps
//! its trailing whitespace. Blank lines beyond the separator stay inside
//! the neighbouring paragraph.
//!
//! A single sentence longer than the limit is emitted whole rather than cut
//! mid-sentence.
//!
//! Lengths are counted in `char`s, not bytes.

/// Separator between paragraphs.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Split `text` into chunks of at most `max_len` characters.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut packer = Packer::new(max_len);
    for paragraph in paragraphs(text) {
        if char_len(&paragraph) <= max_len {
            packer.push(&paragraph, PARAGRAPH_SEPARATOR);
            continue;
        }

        packer.flush();
        for sentence in split_sentences(&paragraph) {
            packer.push(sentence, "");
        }
        // The paragraph's last piece stays open so a following short
        // paragraph can still join it.
    }
    packer.finish()
}

/// Paragraphs of `text`, none empty.
///
/// Runs of more than one separator (three or more newlines) fold the extra
/// separators into the previous paragraph, or into the next one at the
/// start of the text, so joining with [`PARAGRAPH_SEPARATOR`] restores it.
fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut leading = String::new();
    for piece in text.split(PARAGRAPH_SEPARATOR) {
        if !piece.is_empty() {
            paragraphs.push(format!("{leading}{piece}"));
            leading.clear();
        } else if let Some(last) = paragraphs.last_mut() {
            last.push_str(PARAGRAPH_SEPARATOR);
        } else {
            leading.push_str(PARAGRAPH_SEPARATOR);
        }
    }
    if !leading.is_empty() {
        paragraphs.push(leading);
    }
    paragraphs
}

struct Packer {
    max_len: usize,
    current: String,
    current_len: usize,
    chunks: Vec<String>,
}

impl Packer {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            current: String::new(),
            current_len: 0,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, piece: &str, separator: &str) {
        let piece_len = char_len(piece);
        if self.current.is_empty() {
            self.current.push_str(piece);
            self.current_len = piece_len;
            return;
        }

        let joined_len = self.current_len + char_len(separator) + piece_len;
        if joined_len <= self.max_len {
            self.current.push_str(separator);
            self.current.push_str(piece);
            self.current_len = joined_len;
        } else {
            self.flush();
            self.current.push_str(piece);
            self.current_len = piece_len;
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }
        self.current_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Split a paragraph after each `.`, `!` or `?` that is followed by whitespace.
///
/// The whitespace run stays with the sentence it follows, so the pieces
/// concatenate back to `paragraph`.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if !chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
            continue;
        }
        let mut end = paragraph.len();
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                end = j;
                break;
            }
            chars.next();
        }
        sentences.push(&paragraph[start..end]);
        start = end;
    }
    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }
    sentences
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
