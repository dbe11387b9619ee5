use serde_json::{Map, Number, Value};

use super::ToonError;

type Result<T> = std::result::Result<T, ToonError>;

/// Parse a TOON document back into JSON.
pub fn decode(doc: &str) -> Result<Value> {
    let lines = split_lines(doc)?;
    let mut parser = Parser { lines, pos: 0 };
    parser.document()
}

#[derive(Debug)]
struct Line<'a> {
    number: usize,
    depth: usize,
    text: &'a str,
}

struct Header {
    len: usize,
    fields: Option<Vec<String>>,
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

fn split_lines(doc: &str) -> Result<Vec<Line<'_>>> {
    let mut lines = Vec::new();
    for (index, raw) in doc.lines().enumerate() {
        let number = index + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let text = raw.trim_start_matches(' ');
        let spaces = raw.len() - text.len();
        if text.starts_with('\t') {
            return Err(ToonError::syntax(number, "tabs are not allowed in indentation"));
        }
        if spaces % 2 != 0 {
            return Err(ToonError::syntax(number, "indentation must be a multiple of two spaces"));
        }
        lines.push(Line {
            number,
            depth: spaces / 2,
            text,
        });
    }
    Ok(lines)
}

impl<'a> Parser<'a> {
    fn document(&mut self) -> Result<Value> {
        let Some(first) = self.lines.first() else {
            return Ok(Value::Object(Map::new()));
        };
        if first.depth != 0 {
            return Err(ToonError::syntax(first.number, "document must start at column 0"));
        }
        let (number, text) = (first.number, first.text);

        let value = if text.starts_with('[') {
            self.pos = 1;
            let (key, header, rest) = parse_key_header(text, number)?;
            match (key.is_empty(), header) {
                (true, Some(header)) => self.array_body(header, rest, 0, number)?,
                _ => return Err(ToonError::syntax(number, "malformed root array header")),
            }
        } else if self.lines.len() == 1 && !is_field(text) {
            self.pos = 1;
            parse_primitive(text, number)?
        } else {
            Value::Object(self.fields(0)?)
        };

        if let Some(extra) = self.lines.get(self.pos) {
            return Err(ToonError::syntax(extra.number, "unexpected trailing content"));
        }
        Ok(value)
    }

    fn peek_depth(&self) -> Option<usize> {
        self.lines.get(self.pos).map(|line| line.depth)
    }

    fn fields(&mut self, depth: usize) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        while let Some(line) = self.lines.get(self.pos) {
            if line.depth < depth {
                break;
            }
            if line.depth > depth {
                return Err(ToonError::syntax(line.number, "unexpected indentation"));
            }
            if is_list_marker(line.text) {
                return Err(ToonError::syntax(line.number, "list item outside of an array"));
            }
            let (number, text) = (line.number, line.text);
            self.pos += 1;
            let (key, header, rest) = parse_key_header(text, number)?;
            let value = match header {
                Some(header) => self.array_body(header, rest, depth, number)?,
                None => self.field_value(rest, depth, number)?,
            };
            map.insert(key, value);
        }
        Ok(map)
    }

    fn field_value(&mut self, rest: Option<&str>, depth: usize, number: usize) -> Result<Value> {
        match rest {
            Some(token) => parse_primitive(token, number),
            None => self.nested_object(depth),
        }
    }

    /// Children at `depth + 1`, or an empty object when there are none.
    fn nested_object(&mut self, depth: usize) -> Result<Value> {
        if self.peek_depth().is_some_and(|d| d > depth) {
            Ok(Value::Object(self.fields(depth + 1)?))
        } else {
            Ok(Value::Object(Map::new()))
        }
    }

    /// Array contents for a header found on a line at `depth`.
    fn array_body(
        &mut self,
        header: Header,
        rest: Option<&str>,
        depth: usize,
        number: usize,
    ) -> Result<Value> {
        if let Some(fields) = header.fields {
            if rest.is_some() {
                return Err(ToonError::syntax(number, "tabular header cannot carry inline values"));
            }
            let mut rows = Vec::with_capacity(header.len);
            for _ in 0..header.len {
                let line = self.child_line(depth, number, header.len, rows.len())?;
                let (row_number, row_text) = (line.number, line.text);
                self.pos += 1;
                let cells = split_delimited(row_text);
                if cells.len() != fields.len() {
                    return Err(ToonError::LengthMismatch {
                        line: row_number,
                        expected: fields.len(),
                        found: cells.len(),
                    });
                }
                let mut obj = Map::new();
                for (field, cell) in fields.iter().zip(cells) {
                    obj.insert(field.clone(), parse_primitive(cell, row_number)?);
                }
                rows.push(Value::Object(obj));
            }
            return Ok(Value::Array(rows));
        }

        if let Some(inline) = rest {
            let values = split_delimited(inline)
                .into_iter()
                .map(|cell| parse_primitive(cell, number))
                .collect::<Result<Vec<_>>>()?;
            if values.len() != header.len {
                return Err(ToonError::LengthMismatch {
                    line: number,
                    expected: header.len,
                    found: values.len(),
                });
            }
            return Ok(Value::Array(values));
        }

        let mut items = Vec::with_capacity(header.len);
        for _ in 0..header.len {
            self.child_line(depth, number, header.len, items.len())?;
            items.push(self.list_item(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn child_line(
        &self,
        depth: usize,
        header_line: usize,
        expected: usize,
        found: usize,
    ) -> Result<&Line<'a>> {
        match self.lines.get(self.pos) {
            Some(line) if line.depth == depth + 1 => Ok(line),
            _ => Err(ToonError::LengthMismatch {
                line: header_line,
                expected,
                found,
            }),
        }
    }

    fn list_item(&mut self, depth: usize) -> Result<Value> {
        let (number, text) = match self.lines.get(self.pos) {
            Some(line) => (line.number, line.text),
            None => return Err(ToonError::syntax(0, "unexpected end of document")),
        };
        self.pos += 1;
        if text == "-" {
            return self.nested_object(depth);
        }
        let Some(item) = text.strip_prefix("- ") else {
            return Err(ToonError::syntax(number, "expected a list item"));
        };
        if item.starts_with('[') {
            let (key, header, rest) = parse_key_header(item, number)?;
            return match (key.is_empty(), header) {
                (true, Some(header)) => self.array_body(header, rest, depth, number),
                _ => Err(ToonError::syntax(number, "malformed nested array header")),
            };
        }
        parse_primitive(item, number)
    }
}

fn is_list_marker(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

/// Whether a single root line is a `key: ...` field rather than a primitive.
fn is_field(text: &str) -> bool {
    if text.starts_with('"') {
        return match quoted_end(text) {
            Some(end) => matches!(text[end..].chars().next(), Some(':') | Some('[')),
            None => false,
        };
    }
    text.contains(':')
}

/// Split `key[N]{fields}: rest` into its parts.
fn parse_key_header(text: &str, number: usize) -> Result<(String, Option<Header>, Option<&str>)> {
    let (key, mut remainder) = if text.starts_with('"') {
        let end = quoted_end(text)
            .ok_or_else(|| ToonError::syntax(number, "unterminated quoted key"))?;
        (unquote(&text[..end], number)?, &text[end..])
    } else {
        let end = text
            .find(|c: char| c == ':' || c == '[')
            .ok_or_else(|| ToonError::syntax(number, "expected ':' after key"))?;
        (text[..end].to_string(), &text[end..])
    };

    let mut header = None;
    if let Some(after_bracket) = remainder.strip_prefix('[') {
        let close = after_bracket
            .find(']')
            .ok_or_else(|| ToonError::syntax(number, "unterminated array length"))?;
        let len = after_bracket[..close]
            .parse::<usize>()
            .map_err(|_| ToonError::syntax(number, "array length must be a number"))?;
        remainder = &after_bracket[close + 1..];

        let mut fields = None;
        if let Some(after_brace) = remainder.strip_prefix('{') {
            let close = closing_brace(after_brace)
                .ok_or_else(|| ToonError::syntax(number, "unterminated field list"))?;
            let names = split_delimited(&after_brace[..close])
                .into_iter()
                .map(|name| {
                    if name.starts_with('"') {
                        unquote(name, number)
                    } else {
                        Ok(name.to_string())
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            fields = Some(names);
            remainder = &after_brace[close + 1..];
        }
        header = Some(Header { len, fields });
    }

    let Some(after_colon) = remainder.strip_prefix(':') else {
        return Err(ToonError::syntax(number, "expected ':' after key"));
    };
    let rest = match after_colon.strip_prefix(' ') {
        Some(value) if !value.is_empty() => Some(value),
        _ if after_colon.is_empty() || after_colon == " " => None,
        _ => return Err(ToonError::syntax(number, "expected a space after ':'")),
    };
    Ok((key, header, rest))
}

fn parse_primitive(token: &str, number: usize) -> Result<Value> {
    if token.starts_with('"') {
        if quoted_end(token) != Some(token.len()) {
            return Err(ToonError::syntax(number, "malformed quoted string"));
        }
        return Ok(Value::String(unquote(token, number)?));
    }
    match token {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(num) = serde_json::from_str::<Number>(token) {
        return Ok(Value::Number(num));
    }
    Ok(Value::String(token.to_string()))
}

fn unquote(quoted: &str, number: usize) -> Result<String> {
    serde_json::from_str::<String>(quoted)
        .map_err(|e| ToonError::syntax(number, format!("invalid quoted string: {e}")))
}

/// Byte offset just past the closing quote of a string starting at 0.
fn quoted_end(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (index, c) in text.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(index + 1),
            _ => {}
        }
    }
    None
}

fn closing_brace(text: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some(index),
            _ => {}
        }
    }
    None
}

/// Split on commas that are outside quoted strings.
fn split_delimited(text: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(&text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    cells.push(&text[start..]);
    cells
}
