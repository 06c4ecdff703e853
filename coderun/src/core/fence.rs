//! Fenced code block scanning for documentation files.
//!
//! Scanning is line based. A fence opens on a line whose text (after leading
//! spaces) starts with at least three backticks or tildes, and closes on a line
//! holding only the same character repeated at least as many times. The info
//! string after the opening fence is split into a language tag and attributes.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::core::dialect::Dialect;
use crate::core::types::Expectation;

const SKIP_ATTRIBUTES: [&str; 2] = ["skip-test", "syntax"];
const SHOULD_FAIL_ATTRIBUTE: &str = "should-fail";

/// A fenced block as written in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// 1-based position among all fenced blocks of the document.
    pub ordinal: usize,
    pub tag: Option<String>,
    pub attributes: Vec<String>,
    pub content: String,
}

impl FencedBlock {
    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr == name)
    }

    fn test_set(&self) -> Option<u32> {
        static TEST_SET_RE: LazyLock<regex::Regex> =
            LazyLock::new(|| regex::Regex::new(r"^test-set=(\d+)$").unwrap());
        self.attributes.iter().find_map(|attr| {
            TEST_SET_RE
                .captures(attr)
                .and_then(|caps| caps[1].parse().ok())
        })
    }
}

/// Result of scanning a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub blocks: Vec<FencedBlock>,
    /// Ordinal of a fence still open at end of input, if any.
    pub unterminated: Option<usize>,
}

/// A runnable payload selected from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPayload {
    pub block: usize,
    pub expect: Expectation,
    pub code: String,
}

struct OpenFence {
    marker: char,
    width: usize,
    indent: usize,
    block: FencedBlock,
}

/// Scan `text` for fenced code blocks in document order.
pub fn parse_fenced_blocks(text: &str) -> ParsedDocument {
    let mut blocks = Vec::new();
    let mut open: Option<OpenFence> = None;

    for line in text.split_inclusive('\n') {
        if let Some(fence) = open.as_mut() {
            if !is_closing_fence(line, fence.marker, fence.width) {
                fence.block.content.push_str(strip_indent(line, fence.indent));
                continue;
            }
        } else {
            open = parse_opening_fence(line, blocks.len() + 1);
            continue;
        }
        if let Some(fence) = open.take() {
            blocks.push(fence.block);
        }
    }

    ParsedDocument {
        blocks,
        unterminated: open.map(|fence| fence.block.ordinal),
    }
}

/// Pick the blocks that should run in a `dialect` session.
///
/// Blocks with another tag, no tag, or a skip attribute are dropped. Blocks
/// sharing a `test-set=N` attribute and expectation are concatenated into the
/// payload of the first block in the set. Blank payloads are dropped.
pub fn select_blocks(blocks: &[FencedBlock], dialect: Dialect) -> Vec<BlockPayload> {
    let mut payloads: Vec<BlockPayload> = Vec::new();
    let mut sets: HashMap<(u32, Expectation), usize> = HashMap::new();

    for block in blocks {
        let Some(tag) = block.tag.as_deref() else {
            continue;
        };
        if Dialect::from_tag(tag) != Some(dialect) {
            continue;
        }
        if SKIP_ATTRIBUTES.iter().any(|skip| block.has_attribute(skip)) {
            continue;
        }
        let expect = if block.has_attribute(SHOULD_FAIL_ATTRIBUTE) {
            Expectation::Failure
        } else {
            Expectation::Success
        };

        if let Some(set) = block.test_set() {
            if let Some(&index) = sets.get(&(set, expect)) {
                payloads[index].code.push_str(&block.content);
                continue;
            }
            sets.insert((set, expect), payloads.len());
        }
        payloads.push(BlockPayload {
            block: block.ordinal,
            expect,
            code: block.content.clone(),
        });
    }

    payloads.retain(|payload| !payload.code.trim().is_empty());
    payloads
}

fn parse_opening_fence(line: &str, ordinal: usize) -> Option<OpenFence> {
    let rest = line.trim_start_matches(' ');
    let indent = line.len() - rest.len();
    let marker = rest.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let width = rest.chars().take_while(|c| *c == marker).count();
    if width < 3 {
        return None;
    }
    let info = rest[width..].trim();
    // Backtick info strings cannot contain backticks (that is inline code).
    if marker == '`' && info.contains('`') {
        return None;
    }
    let mut words = info.split_whitespace();
    let tag = words.next().map(str::to_string);
    let attributes = words.map(str::to_string).collect();

    Some(OpenFence {
        marker,
        width,
        indent,
        block: FencedBlock {
            ordinal,
            tag,
            attributes,
            content: String::new(),
        },
    })
}

fn is_closing_fence(line: &str, marker: char, width: usize) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= width && trimmed.chars().all(|c| c == marker)
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let leading = line.len() - line.trim_start_matches(' ').len();
    &line[leading.min(indent)..]
}
