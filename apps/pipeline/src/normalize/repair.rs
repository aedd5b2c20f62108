//! Heuristic JSON repair for unreliable model output.
//!
//! Each function here is pure and string-aware (quotes and escapes are
//! respected) so individual repair rules can be tested in isolation. The
//! staging order lives in the parent module.

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Slices from the first `{` to the last `}` inclusive, dropping any prose
/// the model wrapped around the object. Returns `None` when there is no
/// such span.
pub fn slice_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Locates the outermost `{...}` fragment for stage 3 by scanning bracket
/// depth from the first `{`. When the object never closes (truncated model
/// output) the fragment runs to the end of the input and is closed later by
/// [`balance_brackets`].
pub fn extract_fragment(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Applies all heuristic repairs in a fixed order. Idempotent on valid JSON.
pub fn heuristic_repair(text: &str) -> String {
    let quoted = quote_bare_keys(text);
    let joined = insert_missing_commas(&quoted);
    remove_trailing_commas(&joined)
}

/// Removes commas that directly precede a closing `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                // drop the comma when the next significant char closes a scope
                if !(j < chars.len() && (chars[j] == '}' || chars[j] == ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Inserts a comma between adjacent value tokens separated only by
/// whitespace, e.g. `{"a": 1 "b": 2}` or `[{...} {...}]`.
pub fn insert_missing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    // last significant (non-whitespace) char emitted outside a string
    let mut last_sig: Option<char> = None;

    for &c in &chars {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                last_sig = Some('"');
            }
            continue;
        }
        if c == '"' || c == '{' || c == '[' {
            if matches!(last_sig, Some(p) if p == '"' || p == '}' || p == ']' || p.is_ascii_alphanumeric())
            {
                out.push(',');
            }
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            last_sig = Some(c);
            continue;
        }
        out.push(c);
        if !c.is_whitespace() {
            last_sig = Some(c);
        }
    }
    out
}

/// Quotes bare object keys: `{name: "x"}` becomes `{"name": "x"}`.
/// A run of identifier chars is only treated as a key when it follows `{`
/// or `,` and is followed by `:` — `true`/`null` values never match.
pub fn quote_bare_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last_sig: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                last_sig = Some('"');
            }
            i += 1;
            continue;
        }
        if (c.is_ascii_alphabetic() || c == '_')
            && matches!(last_sig, Some('{') | Some(','))
        {
            let mut j = i;
            while j < chars.len()
                && (chars[j].is_ascii_alphanumeric() || chars[j] == '_' || chars[j] == '$')
            {
                j += 1;
            }
            let mut k = j;
            while k < chars.len() && chars[k].is_whitespace() {
                k += 1;
            }
            let ident: String = chars[i..j].iter().collect();
            if k < chars.len() && chars[k] == ':' {
                out.push('"');
                out.push_str(&ident);
                out.push('"');
                last_sig = Some('"');
            } else {
                out.push_str(&ident);
                last_sig = ident.chars().last();
            }
            i = j;
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
        if !c.is_whitespace() {
            last_sig = Some(c);
        }
        i += 1;
    }
    out
}

/// Closes unterminated strings and appends the closing brackets required to
/// balance unmatched `{` / `[`. Dangling trailing commas are dropped first.
pub fn balance_brackets(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    while out.ends_with(',') {
        out.pop();
        while out.ends_with(char::is_whitespace) {
            out.pop();
        }
    }
    for opener in stack.iter().rev() {
        out.push(if *opener == '{' { '}' } else { ']' });
    }
    out
}
