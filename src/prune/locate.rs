//! Finds the exact source bytes of a directive block.
//!
//! Works on raw tokens so comments, formatting and unrelated blocks survive
//! the edit untouched.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use super::scanner::{Scanner, Token, TokenKind};
use crate::error::{PruneError, Result};
use crate::terraform::{Directive, DirectiveKind, Identity};

/// End-exclusive byte offsets into one file's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    From,
    To,
    Id,
    Identity,
    Lifecycle,
    Destroy,
}

/// Field values of one block, with string escapes decoded so they compare
/// equal to the resolved directive.
#[derive(Debug, Default)]
struct RawBlock {
    from: Option<String>,
    to: Option<String>,
    id: Option<String>,
    identity: Option<Identity>,
    destroy: Option<String>,
}

impl RawBlock {
    fn matches(&self, directive: &Directive) -> bool {
        match directive {
            Directive::Moved { from, to } => {
                self.from.as_deref() == Some(from.as_str())
                    && self.to.as_deref() == Some(to.as_str())
            }
            // NOTE: identity content is not compared; `to` alone selects the block.
            Directive::Import { to, id, .. } => {
                if self.to.as_deref() != Some(to.as_str()) {
                    return false;
                }
                match &self.id {
                    Some(raw) => id.as_deref().is_some_and(|id| id_matches(raw, id)),
                    None => true,
                }
            }
            Directive::Removed { from, .. } => self.from.as_deref() == Some(from.as_str()),
        }
    }
}

// A plain string id resolves to its bare content, a template to its quoted form.
fn id_matches(raw: &str, id: &str) -> bool {
    raw == id || strip_quotes(raw) == Some(id)
}

fn strip_quotes(value: &str) -> Option<&str> {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"'))
}

/// Locates the first top-level block matching `directive` whose range is not
/// already in `claimed`.
///
/// The range runs from the block keyword through the closing `}` and the line
/// terminator that follows it.
pub fn locate(
    source: &[u8],
    directive: &Directive,
    claimed: &[ByteRange],
) -> Result<Option<ByteRange>> {
    let keyword = directive.kind().keyword();
    let tokens: Vec<Token<'_>> = Scanner::new(source).collect();

    let mut depth = 0usize;
    let mut prev_end: Option<usize> = None;
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];

        let at_line_start = match prev_end {
            None => true,
            Some(end) => source[end..token.start].contains(&b'\n'),
        };
        let opens_block = tokens
            .get(i + 1)
            .is_some_and(|next| next.kind == TokenKind::OpenBrace);

        if depth == 0 && at_line_start && opens_block && token.is_word(keyword) {
            let Some((block, close)) = read_block(&tokens, i + 1, directive.kind())? else {
                return Ok(None);
            };
            let range = ByteRange {
                start: token.start,
                end: line_end(source, tokens[close].end),
            };

            if block.matches(directive) && !claimed.iter().any(|c| c.overlaps(&range)) {
                tracing::debug!(
                    kind = %directive.kind(),
                    start = range.start,
                    end = range.end,
                    destroy = ?block.destroy,
                    identity = ?block.identity,
                    "located directive block"
                );
                return Ok(Some(range));
            }

            prev_end = Some(tokens[close].end);
            i = close + 1;
            continue;
        }

        match token.kind {
            TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseBrace => depth = depth.saturating_sub(1),
            _ => {}
        }
        prev_end = Some(token.end);
        i += 1;
    }

    Ok(None)
}

/// Removes the first block matching `directive`.
///
/// Returns `None` when no block matches; that is not an error since a
/// directive may legitimately stay until it has been applied.
pub fn locate_and_excise(source: &[u8], directive: &Directive) -> Result<Option<Vec<u8>>> {
    let Some(range) = locate(source, directive, &[])? else {
        return Ok(None);
    };

    let mut excised = Vec::with_capacity(source.len() - (range.end - range.start));
    excised.extend_from_slice(&source[..range.start]);
    excised.extend_from_slice(&source[range.end..]);
    Ok(Some(excised))
}

fn line_end(source: &[u8], offset: usize) -> usize {
    if source[offset..].starts_with(b"\r\n") {
        offset + 2
    } else if source[offset..].starts_with(b"\n") {
        offset + 1
    } else {
        offset
    }
}

fn malformed(kind: DirectiveKind, token: &Token<'_>) -> PruneError {
    PruneError::MalformedDirectiveBlock {
        kind: kind.to_string(),
        token: token.text_lossy(),
        offset: token.start,
    }
}

/// Reads the block body starting at the `{` token at `open`.
///
/// Returns the accumulated fields and the index of the closing `}` token, or
/// `None` when the input ends before the block closes.
fn read_block(
    tokens: &[Token<'_>],
    open: usize,
    kind: DirectiveKind,
) -> Result<Option<(RawBlock, usize)>> {
    let mut block = RawBlock::default();
    let mut in_lifecycle = false;
    let mut i = open + 1;

    while let Some(token) = tokens.get(i) {
        match token.kind {
            TokenKind::CloseBrace if in_lifecycle => {
                in_lifecycle = false;
                i += 1;
            }
            TokenKind::CloseBrace => return Ok(Some((block, i))),
            TokenKind::Other if token.text == b"," => i += 1,
            TokenKind::Word => {
                let field = match (in_lifecycle, token.text) {
                    (false, b"from") => Field::From,
                    (false, b"to") => Field::To,
                    (false, b"id") => Field::Id,
                    (false, b"identity") => Field::Identity,
                    (false, b"lifecycle") => Field::Lifecycle,
                    (true, b"destroy") => Field::Destroy,
                    _ => return Err(malformed(kind, token)),
                };

                let Some(next) = tokens.get(i + 1) else {
                    return Ok(None);
                };
                if field == Field::Lifecycle {
                    if next.kind != TokenKind::OpenBrace {
                        return Err(malformed(kind, next));
                    }
                    in_lifecycle = true;
                    i += 2;
                    continue;
                }
                if next.kind != TokenKind::Equals {
                    return Err(malformed(kind, next));
                }

                let Some(first) = tokens.get(i + 2) else {
                    return Ok(None);
                };
                if field == Field::Identity && first.kind == TokenKind::OpenBrace {
                    let Some((identity, close)) = read_identity(tokens, i + 2) else {
                        return Ok(None);
                    };
                    block.identity = Some(identity);
                    i = close + 1;
                    continue;
                }
                if !matches!(first.kind, TokenKind::Word | TokenKind::Other) || first.text == b","
                {
                    return Err(malformed(kind, first));
                }

                let (value, after) = read_value(tokens, i + 2);
                match field {
                    Field::From => block.from = Some(decode_strings(&value)),
                    Field::To => block.to = Some(decode_strings(&value)),
                    Field::Id => block.id = Some(decode_strings(&value)),
                    Field::Destroy => block.destroy = Some(value),
                    Field::Identity => block.identity = Some(Identity::Computed),
                    Field::Lifecycle => return Err(malformed(kind, first)),
                }
                i = after;
            }
            _ => return Err(malformed(kind, token)),
        }
    }

    Ok(None)
}

/// Reads one value expression starting at token `start`, joining its tokens
/// without the whitespace between them.
///
/// Returns the joined text and the index of the first token after the value.
fn read_value(tokens: &[Token<'_>], start: usize) -> (String, usize) {
    let mut text = String::new();
    let mut nesting = 0usize;
    let mut i = start;

    while let Some(token) = tokens.get(i) {
        if i > start && nesting == 0 && !continues(&tokens[i - 1], token) {
            break;
        }
        match token.text {
            b"(" | b"{" => nesting += 1,
            b")" | b"}" => nesting = nesting.saturating_sub(1),
            _ => {}
        }
        text.push_str(&String::from_utf8_lossy(token.text));
        i += 1;
    }

    (text, i)
}

// `aws_instance.x[ 0 ]`, `module.foo ["a"]` and calls span several tokens.
fn continues(prev: &Token<'_>, next: &Token<'_>) -> bool {
    next.text == b"("
        || matches!(prev.text.last(), Some(b'[' | b'.'))
        || matches!(next.text.first(), Some(b'[' | b']' | b'.'))
}

/// Reads `identity = { ... }` from the `{` token at `open`.
///
/// Only `key = literal` entries produce a literal mapping; any other content
/// is skipped up to the closing brace and reported as computed.
fn read_identity(tokens: &[Token<'_>], open: usize) -> Option<(Identity, usize)> {
    let mut mapping = BTreeMap::new();
    let mut computed = false;
    let mut depth = 0usize;
    let mut i = open + 1;

    loop {
        let token = tokens.get(i)?;
        match token.kind {
            TokenKind::CloseBrace if depth == 0 => {
                let identity = if computed {
                    Identity::Computed
                } else {
                    Identity::Literal(mapping)
                };
                return Some((identity, i));
            }
            TokenKind::CloseBrace => depth -= 1,
            TokenKind::OpenBrace => {
                depth += 1;
                computed = true;
            }
            _ if depth > 0 || computed => {}
            TokenKind::Other if token.text == b"," => {}
            TokenKind::Word => match literal_entry(tokens, i) {
                Some((key, value)) => {
                    mapping.insert(key, value);
                    i += 3;
                    continue;
                }
                None => computed = true,
            },
            _ => computed = true,
        }
        i += 1;
    }
}

fn literal_entry(tokens: &[Token<'_>], at: usize) -> Option<(String, String)> {
    let [key, equals, value] = tokens.get(at..at + 3)? else {
        return None;
    };
    if equals.kind != TokenKind::Equals || value.kind != TokenKind::Word {
        return None;
    }
    if let Some(next) = tokens.get(at + 3) {
        let ends_entry = next.kind == TokenKind::CloseBrace
            || next.text == b","
            || (next.kind == TokenKind::Word && !continues(value, next));
        if !ends_entry {
            return None;
        }
    }

    let decoded = decode_strings(&value.text_lossy());
    let literal = match strip_quotes(&decoded) {
        Some(inner) if !inner.contains("${") && !inner.contains("%{") => inner.to_string(),
        Some(_) => return None,
        None if decoded.parse::<f64>().is_ok() || decoded == "true" || decoded == "false" => {
            decoded.clone()
        }
        None => return None,
    };
    let name = decode_strings(&key.text_lossy());
    let name = strip_quotes(&name).map_or_else(|| name.clone(), str::to_string);
    Some((name, literal))
}

/// Decodes HCL escapes inside every quoted literal of `raw`.
///
/// Quotes stay in place and `${ ... }` interpolations keep their source text
/// with surrounding whitespace trimmed.
fn decode_strings(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        decoded.push(ch);
        if ch == '"' {
            decode_literal(&mut chars, &mut decoded);
        }
    }
    decoded
}

// Consumes through the closing quote.
fn decode_literal(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                out.push('"');
                return;
            }
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(marker @ ('u' | 'U')) => {
                    let digits = if marker == 'u' { 4 } else { 8 };
                    let hex: String = chars.by_ref().take(digits).collect();
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => out.push(decoded),
                        None => {
                            out.push('\\');
                            out.push(marker);
                            out.push_str(&hex);
                        }
                    }
                }
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            },
            '$' | '%' if escapes_template(chars, ch) => {
                chars.next();
                chars.next();
                out.push(ch);
                out.push('{');
            }
            '$' | '%' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push(ch);
                out.push('{');
                decode_interpolation(chars, out);
            }
            _ => out.push(ch),
        }
    }
}

// `$${` and `%%{` are literal `${` and `%{`.
fn escapes_template(chars: &Peekable<Chars<'_>>, marker: char) -> bool {
    let mut ahead = chars.clone();
    ahead.next() == Some(marker) && ahead.next() == Some('{')
}

fn decode_interpolation(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    let mut inner = String::new();
    let mut depth = 0usize;
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                inner.push('"');
                decode_literal(chars, &mut inner);
            }
            '{' => {
                depth += 1;
                inner.push(ch);
            }
            '}' if depth == 0 => break,
            '}' => {
                depth -= 1;
                inner.push(ch);
            }
            _ => inner.push(ch),
        }
    }
    out.push_str(inner.trim());
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terraform::{Address, Lifecycle};

    fn moved(from: &str, to: &str) -> Directive {
        Directive::Moved {
            from: Address::from(from),
            to: Address::from(to),
        }
    }

    fn import(to: &str, id: &str) -> Directive {
        Directive::Import {
            to: Address::from(to),
            id: Some(id.to_string()),
            identity: None,
        }
    }

    fn removed(from: &str) -> Directive {
        Directive::Removed {
            from: Address::from(from),
            lifecycle: Some(Lifecycle { destroy: false }),
        }
    }

    fn excise(source: &str, directive: &Directive) -> Option<String> {
        locate_and_excise(source.as_bytes(), directive)
            .unwrap()
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_excise_moved_block() {
        let source = "\naaa\nmoved {\n  from = module.foo.hoge\n  to   = module.foo.piyo\n}\nbbb\n";
        assert_eq!(
            excise(source, &moved("module.foo.hoge", "module.foo.piyo")).as_deref(),
            Some("\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_excise_moved_block_with_index() {
        let source = "\naaa\nmoved {\n  from = module.foo[\"hoge\"]\n  to   = module.foo[\"piyo\"]\n}\nbbb\n";
        assert_eq!(
            excise(
                source,
                &moved(r#"module.foo["hoge"]"#, r#"module.foo["piyo"]"#)
            )
            .as_deref(),
            Some("\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_keyword_in_comment_is_ignored() {
        let source = "\n# moved\naaa\nmoved {\n  from = module.foo.hoge\n  to   = module.foo.piyo\n}\nbbb\n";
        assert_eq!(
            excise(source, &moved("module.foo.hoge", "module.foo.piyo")).as_deref(),
            Some("\n# moved\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_excise_selects_matching_moved_block() {
        let source = r#"
aaa
moved {
  from = module.foo["hoge"]
  to   = module.foo["piyo"]
}
moved {
  from = module.foo["foo"]
  to   = module.foo["bar"]
}
bbb
"#;
        let expected = r#"
aaa
moved {
  from = module.foo["foo"]
  to   = module.foo["bar"]
}
bbb
"#;
        assert_eq!(
            excise(
                source,
                &moved(r#"module.foo["hoge"]"#, r#"module.foo["piyo"]"#)
            )
            .as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn test_excise_import_block() {
        let source = "\naaa\nimport {\n  id = \"resource_id\"\n  to = module.foo.hoge\n}\nbbb\n";
        assert_eq!(
            excise(source, &import("module.foo.hoge", "resource_id")).as_deref(),
            Some("\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_excise_import_block_with_colon_id() {
        let source = "\n# import\naaa\nimport {\n  id = \"1234567890:default:hoge\"\n  to = module.foo[\"hoge\"]\n}\nbbb\n";
        assert_eq!(
            excise(
                source,
                &import(r#"module.foo["hoge"]"#, "1234567890:default:hoge")
            )
            .as_deref(),
            Some("\n# import\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_excise_selects_matching_import_block() {
        let source = r#"
# import
aaa
import {
  id = "1234567890:default:hoge"
  to = module.foo["hoge"]
}
import {
  id = "1234567890:default:piyo"
  to = module.foo["piyo"]
}
bbb
"#;
        let expected = r#"
# import
aaa
import {
  id = "1234567890:default:hoge"
  to = module.foo["hoge"]
}
bbb
"#;
        assert_eq!(
            excise(
                source,
                &import(r#"module.foo["piyo"]"#, "1234567890:default:piyo")
            )
            .as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn test_excise_import_with_template_id() {
        let source = "\n# import\naaa\nimport {\n  id = \"${local.a}-1\"\n  to = module.foo[0]\n}\nbbb\n";
        assert_eq!(
            excise(source, &import("module.foo[0]", r#""${local.a}-1""#)).as_deref(),
            Some("\n# import\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_excise_import_with_path_id() {
        let source = "\naaa\nimport {\n  id = \"/cloudwatch/log/group/hoge\"\n  to = module.foo\n}\nbbb\n";
        assert_eq!(
            excise(source, &import("module.foo", "/cloudwatch/log/group/hoge")).as_deref(),
            Some("\naaa\nbbb\n")
        );
    }

    #[test]
    fn test_import_id_mismatch_is_not_found() {
        let source = "import {\n  id = \"a\"\n  to = aws_s3_bucket.b\n}\n";
        assert_eq!(excise(source, &import("aws_s3_bucket.b", "other")), None);
    }

    #[test]
    fn test_excise_import_with_identity_matches_on_to() {
        let source = r#"aaa
import {
  to = aws_iam_role.admin
  identity = {
    name = "admin"
  }
}
bbb
"#;
        let directive = Directive::Import {
            to: Address::from("aws_iam_role.admin"),
            id: None,
            identity: None,
        };
        assert_eq!(excise(source, &directive).as_deref(), Some("aaa\nbbb\n"));
    }

    #[test]
    fn test_excise_removed_block_with_lifecycle() {
        let source = r#"
resource "null_resource" "aaa" {}
removed {
  from = module.foo.hoge["aaa"]
  lifecycle {
    destroy = false
  }
}
resource "null_resource" "bbb" {}
"#;
        assert_eq!(
            excise(source, &removed(r#"module.foo.hoge["aaa"]"#)).as_deref(),
            Some("\nresource \"null_resource\" \"aaa\" {}\nresource \"null_resource\" \"bbb\" {}\n")
        );
    }

    #[test]
    fn test_nested_from_is_not_outer_field() {
        // `from` inside the lifecycle block is rejected, not read as the address.
        let source = "removed {\n  from = a.b\n  lifecycle {\n    from = c.d\n  }\n}\n";
        let err = locate_and_excise(source.as_bytes(), &removed("a.b")).unwrap_err();
        assert!(matches!(
            err,
            PruneError::MalformedDirectiveBlock { ref token, .. } if token == "from"
        ));
    }

    #[test]
    fn test_keyword_not_at_line_start_is_ignored() {
        let source = "locals { x = 1 } moved {\n  from = a.b\n  to = a.c\n}\n";
        assert_eq!(excise(source, &moved("a.b", "a.c")), None);
    }

    #[test]
    fn test_keyword_inside_other_block_is_ignored() {
        let source = "resource \"x\" \"y\" {\n  moved {\n    from = a.b\n    to = a.c\n  }\n}\n";
        assert_eq!(excise(source, &moved("a.b", "a.c")), None);
    }

    #[test]
    fn test_unexpected_field_is_malformed() {
        let source = "moved {\n  from = a.b\n  bogus = a.c\n}\n";
        let err = locate_and_excise(source.as_bytes(), &moved("a.b", "a.c")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed moved block: unexpected token `bogus` at byte 23"
        );
    }

    #[test]
    fn test_range_covers_crlf_terminator() {
        let source = b"moved {\r\n  from = a.b\r\n  to = a.c\r\n}\r\nx\r\n";
        let range = locate(source, &moved("a.b", "a.c"), &[]).unwrap().unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(&source[range.end..], b"x\r\n");
    }

    #[test]
    fn test_block_at_end_of_file_without_newline() {
        let source = "aaa\nremoved {\n  from = a.b\n}";
        assert_eq!(excise(source, &removed("a.b")).as_deref(), Some("aaa\n"));
    }

    #[test]
    fn test_claimed_range_is_skipped() {
        let block = "moved {\n  from = a.b\n  to = a.c\n}\n";
        let source = format!("{block}{block}");
        let first = locate(source.as_bytes(), &moved("a.b", "a.c"), &[])
            .unwrap()
            .unwrap();
        let second = locate(source.as_bytes(), &moved("a.b", "a.c"), &[first])
            .unwrap()
            .unwrap();
        assert_eq!(first, ByteRange { start: 0, end: block.len() });
        assert_eq!(second, ByteRange { start: block.len(), end: source.len() });
    }

    #[test]
    fn test_one_line_block() {
        let source = "import { id = \"resource_id\" to = module.foo.hoge }\nbbb\n";
        assert_eq!(
            excise(source, &import("module.foo.hoge", "resource_id")).as_deref(),
            Some("bbb\n")
        );
    }

    #[test]
    fn test_identity_with_computed_value_is_skipped() {
        let source = r#"import {
  to = aws_iam_role.admin
  identity = {
    name = lower("Admin")
    tags = { team = "core" }
  }
}
bbb
"#;
        let directive = Directive::Import {
            to: Address::from("aws_iam_role.admin"),
            id: None,
            identity: Some(Identity::Computed),
        };
        assert_eq!(excise(source, &directive).as_deref(), Some("bbb\n"));
    }

    #[test]
    fn test_read_identity_literal_and_computed() {
        let tokens: Vec<_> = Scanner::new(br#"{ name = "admin", "path" = "/x" }"#).collect();
        let (identity, close) = read_identity(&tokens, 0).unwrap();
        assert_eq!(close, tokens.len() - 1);
        let Identity::Literal(mapping) = identity else {
            panic!("expected literal identity");
        };
        assert_eq!(mapping["name"], "admin");
        assert_eq!(mapping["path"], "/x");

        let tokens: Vec<_> = Scanner::new(b"{ name = var.role }").collect();
        assert_eq!(read_identity(&tokens, 0).unwrap().0, Identity::Computed);
    }

    #[test]
    fn test_escaped_id_matches_resolved_value() {
        let source = "import {\n  id = \"a\\\"b\"\n  to = aws_instance.x\n}\n";
        assert_eq!(excise(source, &import("aws_instance.x", "a\"b")).as_deref(), Some(""));

        let source = "import {\n  id = \"C:\\\\x\"\n  to = aws_instance.x\n}\n";
        assert_eq!(excise(source, &import("aws_instance.x", "C:\\x")).as_deref(), Some(""));
    }

    #[test]
    fn test_spaced_index_is_joined() {
        let source = "moved {\n  from = aws_instance.x[ 0 ]\n  to = module.foo [\"a\"]\n}\nbbb\n";
        assert_eq!(
            excise(source, &moved("aws_instance.x[0]", r#"module.foo["a"]"#)).as_deref(),
            Some("bbb\n")
        );
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(decode_strings(r#"module.foo["a\"b"]"#), r#"module.foo["a"b"]"#);
        assert_eq!(decode_strings(r#""tab\there""#), "\"tab\there\"");
        assert_eq!(decode_strings(r#""\u00e9""#), "\"\u{e9}\"");
        assert_eq!(decode_strings(r#""$${x}""#), r#""${x}""#);
        assert_eq!(decode_strings(r#""${ local.a }-1""#), r#""${local.a}-1""#);
        assert_eq!(decode_strings("aws_instance.x"), "aws_instance.x");
    }
}
