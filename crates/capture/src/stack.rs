use std::backtrace::Backtrace;
use std::sync::LazyLock;

use callscope_core::model::RawFrame;
use regex::Regex;

static FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").expect("valid frame regex"));
static LOCATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at\s+(.+?):(\d+)(?::\d+)?\s*$").expect("valid location regex")
});
static SYMBOL_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("valid hash regex"));

/// Captures the calling thread's stack, innermost frame first.
pub fn capture_current() -> Vec<RawFrame> {
    let trace = Backtrace::force_capture();
    parse_backtrace(&trace.to_string())
        .into_iter()
        .filter(|frame| !is_capture_machinery(frame))
        .collect()
}

/// Parses the text rendering of a [`Backtrace`]. Symbols are split into the
/// owning path (`class`) and the final segment (`function`); the `at` line
/// that follows a symbol supplies file and line.
pub fn parse_backtrace(text: &str) -> Vec<RawFrame> {
    let mut frames: Vec<RawFrame> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = FRAME_LINE.captures(line) {
            let symbol = SYMBOL_HASH.replace(&caps[1], "");
            let (class, function) = split_symbol(&symbol);
            frames.push(RawFrame {
                function,
                class,
                ..RawFrame::default()
            });
        } else if let Some(caps) = LOCATION_LINE.captures(line)
            && let Some(frame) = frames.last_mut()
            && frame.file.is_none()
        {
            frame.file = Some(caps[1].to_string());
            frame.line = caps[2].parse().ok();
        }
    }
    frames
}

// Splits at the last `::` that is not nested inside generic brackets.
fn split_symbol(symbol: &str) -> (Option<String>, String) {
    let bytes = symbol.as_bytes();
    let mut depth = 0usize;
    let mut split = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match split {
        Some(at) if at > 0 => (Some(symbol[..at].to_string()), symbol[at + 2..].to_string()),
        _ => (None, symbol.to_string()),
    }
}

fn is_capture_machinery(frame: &RawFrame) -> bool {
    frame.class.as_deref().is_some_and(|class| {
        class.starts_with("std::backtrace") || class == "callscope_capture::stack"
    })
}
