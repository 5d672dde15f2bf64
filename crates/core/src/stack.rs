use crate::model::frame::{Frame, RawFrame};

/// Prepares captured frames for display.
///
/// Frames whose class lies under one of `internal_namespaces` are dropped.
/// Files below `project_root` become relative to it, other paths are kept as
/// they are. Object references, arguments and the call-type marker never
/// survive. Frame order is preserved.
pub fn sanitize(raw: &[RawFrame], project_root: &str, internal_namespaces: &[String]) -> Vec<Frame> {
    let root = root_prefix(project_root);
    raw.iter()
        .filter(|frame| !is_internal(frame, internal_namespaces))
        .map(|frame| Frame {
            function: frame.function.clone(),
            class: frame.class.clone().filter(|c| !c.is_empty()),
            file: relative_file(frame.file.as_deref(), &root),
            line: frame.line,
        })
        .collect()
}

fn is_internal(frame: &RawFrame, internal_namespaces: &[String]) -> bool {
    let Some(class) = frame.class.as_deref().filter(|c| !c.is_empty()) else {
        return false;
    };
    declaring_paths(class).into_iter().any(|path| {
        internal_namespaces
            .iter()
            .any(|ns| !ns.is_empty() && path.starts_with(ns.as_str()))
    })
}

// A trait-impl class such as `<app::Api as lib::Listener>` is declared by
// both the implementing type and the trait; plain paths are returned as is.
fn declaring_paths(class: &str) -> Vec<&str> {
    let Some(inner) = class.strip_prefix('<') else {
        return vec![class];
    };
    let qualified = &inner[..closing_bracket(inner).unwrap_or(inner.len())];
    let (self_ty, trait_path) = match split_as(qualified) {
        Some((self_ty, trait_path)) => (self_ty, Some(trait_path)),
        None => (qualified, None),
    };
    let self_ty = self_ty
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .trim_start_matches("dyn ")
        .trim();
    std::iter::once(self_ty).chain(trait_path.map(str::trim)).collect()
}

fn closing_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev == '-' => {}
            '>' if depth == 0 => return Some(i),
            '>' => depth -= 1,
            _ => {}
        }
        prev = c;
    }
    None
}

fn split_as(qualified: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut prev = ' ';
    for (i, c) in qualified.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev == '-' => {}
            '>' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 && qualified[i..].starts_with(" as ") => {
                return Some((&qualified[..i], &qualified[i + 4..]));
            }
            _ => {}
        }
        prev = c;
    }
    None
}

fn relative_file(file: Option<&str>, root: &str) -> String {
    match file {
        None | Some("") => String::new(),
        Some(path) if !root.is_empty() => path.strip_prefix(root).unwrap_or(path).to_string(),
        Some(path) => path.to_string(),
    }
}

fn root_prefix(project_root: &str) -> String {
    if project_root.is_empty() || project_root.ends_with('/') || project_root.ends_with('\\') {
        project_root.to_string()
    } else {
        format!("{project_root}{}", std::path::MAIN_SEPARATOR)
    }
}
