//! Summary export to a downloadable document.

use std::sync::Arc;

use crate::error::ServiceError;

/// Characters per line in exported documents.
pub const WRAP_WIDTH: usize = 95;

/// Name reported when no renderer is compiled in.
pub const RENDERER_NAME: &str = "lopdf";

pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn file_name(&self) -> &'static str;

    fn render(&self, title: &str, body: &str) -> Result<Vec<u8>, ServiceError>;
}

/// The renderer enabled at build time, if any.
#[cfg(feature = "pdf-export")]
pub fn default_renderer() -> Option<Arc<dyn DocumentRenderer>> {
    Some(Arc::new(pdf::PdfRenderer::default()))
}

#[cfg(not(feature = "pdf-export"))]
pub fn default_renderer() -> Option<Arc<dyn DocumentRenderer>> {
    None
}

/// Line wrapping with the behaviour of Python's `textwrap.wrap`: tabs expand
/// to 8-column stops, other whitespace becomes spaces, runs of spaces inside a
/// line are kept, lines break after hyphens in compound words, and words
/// longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks = split_chunks(&expand_whitespace(text));
    chunks.reverse();
    let mut lines: Vec<String> = Vec::new();

    while !chunks.is_empty() {
        let mut line: Vec<Vec<char>> = Vec::new();
        let mut line_len = 0;

        // Leading whitespace survives only on the first line.
        if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
            chunks.pop();
        }

        while let Some(chunk) = chunks.pop() {
            if line_len + chunk.len() > width {
                chunks.push(chunk);
                break;
            }
            line_len += chunk.len();
            line.push(chunk);
        }

        if let Some(chunk) = chunks.last_mut() {
            if chunk.len() > width {
                line.push(split_long_word(chunk, width - line_len));
            }
        }

        if line.last().is_some_and(|c| is_blank(c)) {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(line.into_iter().flatten().collect());
        }
    }
    lines
}

/// Takes as much of `chunk` as fits in `space_left`, preferring to break
/// after its last hyphen. The taken part may be empty.
fn split_long_word(chunk: &mut Vec<char>, space_left: usize) -> Vec<char> {
    let mut end = space_left;
    if let Some(hyphen) = chunk[..space_left].iter().rposition(|&c| c == '-') {
        if hyphen > 0 && chunk[..hyphen].iter().any(|&c| c != '-') {
            end = hyphen + 1;
        }
    }
    let rest = chunk.split_off(end);
    std::mem::replace(chunk, rest)
}

fn is_wrap_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|&c| c == ' ')
}

fn expand_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0usize;
    for c in text.chars() {
        match c {
            '\t' => {
                let fill = 8 - column % 8;
                out.extend(std::iter::repeat_n(' ', fill));
                column += fill;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            c if is_wrap_space(c) => {
                out.push(' ');
                column += 1;
            }
            c => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Splits into alternating runs of spaces and words; words are further split
/// after compound-word hyphens and around `--` dashes.
fn split_chunks(text: &str) -> Vec<Vec<char>> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let space = chars[start] == ' ';
        let end = chars[start..]
            .iter()
            .position(|&c| (c == ' ') != space)
            .map_or(chars.len(), |n| start + n);
        if space {
            chunks.push(chars[start..end].to_vec());
        } else {
            split_word(&chars[start..end], &mut chunks);
        }
        start = end;
    }
    chunks
}

fn split_word(word: &[char], chunks: &mut Vec<Vec<char>>) {
    let is = |i: usize, f: fn(char) -> bool| word.get(i).is_some_and(|&c| f(c));
    let letter = |i: usize| is(i, |c| c.is_alphabetic() || c == '_');
    let word_char = |i: usize| is(i, |c| c.is_alphanumeric() || c == '_');
    let punct = |i: Option<usize>| {
        i.is_some_and(|i| {
            word_char(i) || is(i, |c| matches!(c, '!' | '"' | '\'' | '&' | '.' | ',' | '?'))
        })
    };
    let dash_run = |i: usize| word[i.min(word.len())..].iter().take_while(|&&c| c == '-').count();
    let dashes_then_word = |i: usize| {
        let run = dash_run(i);
        run >= 2 && word_char(i + run)
    };

    let mut start = 0;
    while start < word.len() {
        if punct(start.checked_sub(1)) && dashes_then_word(start) {
            let run = dash_run(start);
            chunks.push(word[start..start + run].to_vec());
            start += run;
            continue;
        }

        let mut end = start + 1;
        loop {
            if end >= word.len() {
                chunks.push(word[start..].to_vec());
                start = word.len();
                break;
            }
            let hyphenated = word[end] == '-'
                && letter(end - 1)
                && ((end >= 2 && letter(end - 2))
                    || (end >= 3 && word[end - 2] == '-' && letter(end - 3)))
                && letter(end + 1)
                && (letter(end + 2) || (is(end + 2, |c| c == '-') && letter(end + 3)));
            if hyphenated {
                chunks.push(word[start..=end].to_vec());
                start = end + 1;
                break;
            }
            if punct(Some(end - 1)) && dashes_then_word(end) {
                chunks.push(word[start..end].to_vec());
                start = end;
                break;
            }
            end += 1;
        }
    }
}

#[cfg(feature = "pdf-export")]
pub mod pdf {
    use lopdf::{
        Document, Object, ObjectId, Stream,
        content::{Content, Operation},
        dictionary,
    };

    use super::{DocumentRenderer, WRAP_WIDTH, wrap_text};
    use crate::error::ServiceError;

    // US Letter in points.
    const PAGE_WIDTH: i64 = 612;
    const PAGE_HEIGHT: i64 = 792;
    const MARGIN: i64 = 72;
    const TITLE_SIZE: i64 = 14;
    const BODY_SIZE: i64 = 11;
    const TITLE_GAP: i64 = 24;
    const LEADING: i64 = 14;

    #[derive(Debug, Clone)]
    pub struct PdfRenderer {
        pub wrap_width: usize,
    }

    impl Default for PdfRenderer {
        fn default() -> Self {
            Self {
                wrap_width: WRAP_WIDTH,
            }
        }
    }

    impl PdfRenderer {
        /// Splits the wrapped body into pages of text operations.
        fn layout(&self, title: &str, body: &str) -> Vec<Vec<Operation>> {
            let mut pages = Vec::new();
            let mut ops = Vec::new();
            let mut y = PAGE_HEIGHT - MARGIN;

            ops.extend(text_line("F2", TITLE_SIZE, y, title));
            y -= TITLE_GAP;

            for line in wrap_text(body, self.wrap_width) {
                if y < MARGIN {
                    pages.push(std::mem::take(&mut ops));
                    y = PAGE_HEIGHT - MARGIN;
                }
                ops.extend(text_line("F1", BODY_SIZE, y, &line));
                y -= LEADING;
            }
            pages.push(ops);
            pages
        }
    }

    impl DocumentRenderer for PdfRenderer {
        fn content_type(&self) -> &'static str {
            "application/pdf"
        }

        fn file_name(&self) -> &'static str {
            "summary.pdf"
        }

        fn render(&self, title: &str, body: &str) -> Result<Vec<u8>, ServiceError> {
            let mut doc = Document::with_version("1.5");
            let pages_id = doc.new_object_id();

            let regular = doc.add_object(font("Helvetica"));
            let bold = doc.add_object(font("Helvetica-Bold"));
            let resources_id = doc.add_object(dictionary! {
                "Font" => dictionary! {
                    "F1" => regular,
                    "F2" => bold,
                },
            });

            let mut kids: Vec<Object> = Vec::new();
            for operations in self.layout(title, body) {
                let encoded = Content { operations }
                    .encode()
                    .map_err(|e| ServiceError::Export(e.to_string()))?;
                let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                });
                kids.push(Object::Reference(page_id));
            }

            let count = kids.len() as i64;
            let pages = dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(PAGE_WIDTH),
                    Object::Integer(PAGE_HEIGHT),
                ],
            };
            doc.objects.insert(pages_id, Object::Dictionary(pages));

            let catalog_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            });
            doc.trailer.set("Root", catalog_id);
            doc.compress();

            let mut buffer = Vec::new();
            doc.save_to(&mut buffer)
                .map_err(|e| ServiceError::Export(e.to_string()))?;
            Ok(buffer)
        }
    }

    fn font(base: &str) -> lopdf::Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(base.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        }
    }

    fn text_line(font: &str, size: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
            ),
            Operation::new("Td", vec![Object::Integer(MARGIN), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(latin1(text))]),
            Operation::new("ET", vec![]),
        ]
    }

    /// Standard 14 fonts only cover single-byte encodings.
    fn latin1(text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
            .collect()
    }

}
