//! Parser for the service-description language contracts publish.
//!
//! Only the parts needed to build a dispatch table are interpreted: service
//! blocks, their methods and parameter lists. Type declarations, constructor
//! blocks and event blocks are skipped.
//!
//! ```text
//! type KeyringData = struct {
//!   address: str,
//!   encoded: str,
//! };
//!
//! service KeyringService {
//!   BindKeyringDataToUserAddress : (user_address: actor_id, signless_data: KeyringData) -> KeyringEvent;
//!   query KeyringAccountData : (keyring_address: actor_id) -> KeyringQueryEvent;
//!
//!   events {
//!     KeyringAccountSet;
//!   }
//! };
//! ```

use crate::error::{InterfaceError, Result};
use crate::registry::{ContractInterface, MethodKind, MethodSchema, ParamSchema, ServiceSchema};

/// Method without a declared output
const UNIT_OUTPUT: &str = "null";

struct Item<'a> {
    offset: usize,
    text: &'a str,
}

pub(crate) fn parse(text: &str) -> Result<ContractInterface> {
    let source = strip_comments(text);
    let mut interface = ContractInterface::default();

    for item in split_items(&source, &source, 0)? {
        match first_word(item.text) {
            "type" | "constructor" => continue,
            "service" => {
                let service = parse_service(&source, &item)?;
                let name = service.name.clone();
                if !interface.insert_service(service) {
                    return Err(error_at(&source, item.offset, format!("duplicate service '{name}'")));
                }
            },
            other => {
                return Err(error_at(
                    &source,
                    item.offset,
                    format!("unexpected item '{other}'"),
                ))
            },
        }
    }

    Ok(interface)
}

//=============================================================================
// Items & Statements
//=============================================================================

/// Split `segment` into top-level items. An item ends at a `;` outside any
/// bracket, or right after a `}` that closes back to the top level.
fn split_items<'a>(source: &str, segment: &'a str, base: usize) -> Result<Vec<Item<'a>>> {
    let mut items = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;

    let push = |items: &mut Vec<Item<'a>>, from: usize, to: usize| {
        let raw = &segment[from..to];
        let text = raw.trim();
        if !text.is_empty() {
            let leading = raw.len() - raw.trim_start().len();
            items.push(Item {
                offset: base + from + leading,
                text,
            });
        }
    };

    for (i, ch) in segment.char_indices() {
        match ch {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(error_at(source, base + i, format!("unbalanced '{ch}'")));
                }
                if depth == 0 && ch == '}' {
                    push(&mut items, start, i + 1);
                    start = i + 1;
                }
            },
            ';' if depth == 0 => {
                push(&mut items, start, i);
                start = i + 1;
            },
            _ => {},
        }
    }

    if depth != 0 {
        return Err(error_at(source, base + segment.len(), "unclosed bracket".to_string()));
    }
    push(&mut items, start, segment.len());

    Ok(items)
}

fn parse_service(source: &str, item: &Item<'_>) -> Result<ServiceSchema> {
    let open = item
        .text
        .find('{')
        .ok_or_else(|| error_at(source, item.offset, "service without body".to_string()))?;
    let close = item
        .text
        .rfind('}')
        .ok_or_else(|| error_at(source, item.offset, "service body not closed".to_string()))?;

    let name = item.text["service".len()..open].trim();
    if !is_ident(name) {
        return Err(error_at(source, item.offset, format!("invalid service name '{name}'")));
    }

    let mut service = ServiceSchema::new(name);
    let body = &item.text[open + 1..close];
    let body_offset = item.offset + open + 1;

    for statement in split_items(source, body, body_offset)? {
        if first_word(statement.text) == "events" {
            continue;
        }
        let method = parse_method(source, name, &statement)?;
        let method_name = method.name.clone();
        if !service.insert(method) {
            return Err(error_at(
                source,
                statement.offset,
                format!("duplicate method '{method_name}' in {name}"),
            ));
        }
    }

    Ok(service)
}

fn parse_method(source: &str, service: &str, statement: &Item<'_>) -> Result<MethodSchema> {
    let (kind, rest) = match strip_keyword(statement.text, "query") {
        Some(rest) => (MethodKind::Query, rest),
        None => (MethodKind::Command, statement.text),
    };

    let colon = rest
        .find(':')
        .ok_or_else(|| error_at(source, statement.offset, "expected ':' after method name".to_string()))?;
    let name = rest[..colon].trim();
    if !is_ident(name) {
        return Err(error_at(source, statement.offset, format!("invalid method name '{name}'")));
    }

    let signature = rest[colon + 1..].trim();
    if !signature.starts_with('(') {
        return Err(error_at(
            source,
            statement.offset,
            format!("expected parameter list for '{name}'"),
        ));
    }
    let close = matching_paren(signature).ok_or_else(|| {
        error_at(source, statement.offset, format!("unclosed parameter list for '{name}'"))
    })?;

    let mut params = Vec::new();
    for raw in split_top_level(&signature[1..close], ',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (param, ty) = raw.split_once(':').ok_or_else(|| {
            error_at(source, statement.offset, format!("parameter '{raw}' has no type"))
        })?;
        params.push(ParamSchema {
            name: param.trim().to_string(),
            ty: ty.trim().to_string(),
        });
    }

    let tail = signature[close + 1..].trim();
    let output = if let Some(output) = tail.strip_prefix("->") {
        output.trim().to_string()
    } else if tail.is_empty() {
        UNIT_OUTPUT.to_string()
    } else {
        return Err(error_at(
            source,
            statement.offset,
            format!("unexpected '{tail}' after parameters of '{name}'"),
        ));
    };

    Ok(MethodSchema {
        service: service.to_string(),
        name: name.to_string(),
        kind,
        params,
        output,
    })
}

//=============================================================================
// Lexical helpers
//=============================================================================

/// Blank out `//` comments, keeping byte offsets stable for line reporting.
fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| match line.find("//") {
            Some(pos) => format!("{}{}", &line[..pos], " ".repeat(line.len() - pos)),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_word(text: &str) -> &str {
    text.split(|c: char| c.is_whitespace() || c == '{' || c == ':')
        .next()
        .unwrap_or("")
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then_some(rest.trim_start())
}

fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Index of the `)` matching the `(` at position 0.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            },
            _ => {},
        }
    }
    None
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    parts.push(&text[start..]);
    parts
}

fn error_at(source: &str, offset: usize, reason: String) -> InterfaceError {
    let offset = offset.min(source.len());
    let line = source.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count() + 1;
    InterfaceError::Parse { line, reason }
}
