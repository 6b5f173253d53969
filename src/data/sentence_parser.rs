// ============================================================
// Layer 4 — Child Sentence Decoder
// ============================================================
// The `sentences` column holds a serialised list of sentence
// objects. Two spellings show up in real exports:
//
//   JSON:     [{"sent_id": "a1", "sent_text": "Zoos help."}]
//   literal:  [{'sent_id': 'a1', 'sent_text': "Zoos don't help."}]
//
// Both are read by one strict recursive-descent reader that only
// understands lists, dicts, quoted strings, numbers and the
// constants None/True/False/null/true/false. Anything else is
// rejected. The resulting value is then checked against the
// {sent_id, sent_text} schema with serde.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::domain::corpus::ChildSentence;
use crate::domain::error::{Result, StanceError};

const MAX_DEPTH: usize = 32;

#[derive(Deserialize)]
struct RawChild {
    sent_id:   RawId,
    sent_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Int(n)  => n.to_string(),
        }
    }
}

/// Decode the serialised child-sentence list of one group.
pub fn decode_children(raw: &str, group_key: &str) -> Result<Vec<ChildSentence>> {
    let value = parse_literal(raw).map_err(|reason| StanceError::corpus(group_key, reason))?;

    let Value::Array(items) = value else {
        return Err(StanceError::corpus(group_key, "sentences field is not a list"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let child: RawChild = serde_json::from_value(item)
                .map_err(|e| StanceError::corpus(group_key, format!("sentence {i}: {e}")))?;
            Ok(ChildSentence { sent_id: child.sent_id.into_string(), sent_text: child.sent_text })
        })
        .collect()
}

/// Parse one complete literal. Trailing non-whitespace is an error.
pub fn parse_literal(input: &str) -> std::result::Result<Value, String> {
    let mut reader = LiteralReader { chars: input.char_indices().peekable(), input };
    let value = reader.value(0)?;
    reader.skip_ws();
    match reader.chars.peek() {
        None => Ok(value),
        Some(&(pos, c)) => Err(format!("unexpected '{c}' after value at byte {pos}")),
    }
}

struct LiteralReader<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl<'a> LiteralReader<'a> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, want: char) -> std::result::Result<(), String> {
        self.skip_ws();
        match self.chars.next() {
            Some((_, c)) if c == want => Ok(()),
            Some((pos, c)) => Err(format!("expected '{want}' but found '{c}' at byte {pos}")),
            None => Err(format!("expected '{want}' but input ended")),
        }
    }

    fn value(&mut self, depth: usize) -> std::result::Result<Value, String> {
        if depth > MAX_DEPTH {
            return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
        }
        self.skip_ws();
        match self.chars.peek().copied() {
            Some((_, '[')) => self.list(depth),
            Some((_, '{')) => self.dict(depth),
            Some((_, q)) if q == '\'' || q == '"' => self.string().map(Value::String),
            Some((_, c)) if c == '-' || c.is_ascii_digit() => self.number(),
            Some((_, c)) if c.is_ascii_alphabetic() => self.constant(),
            Some((pos, c)) => Err(format!("unexpected '{c}' at byte {pos}")),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn list(&mut self, depth: usize) -> std::result::Result<Value, String> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if let Some((_, ']')) = self.chars.peek() {
                self.chars.next();
                return Ok(Value::Array(items));
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, ']')) => return Ok(Value::Array(items)),
                Some((pos, c)) => return Err(format!("expected ',' or ']' but found '{c}' at byte {pos}")),
                None => return Err("unterminated list".to_string()),
            }
        }
    }

    fn dict(&mut self, depth: usize) -> std::result::Result<Value, String> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.chars.peek().copied() {
                Some((_, '}')) => {
                    self.chars.next();
                    return Ok(Value::Object(map));
                }
                Some((_, q)) if q == '\'' || q == '"' => {}
                Some((pos, c)) => return Err(format!("dict key must be a string, found '{c}' at byte {pos}")),
                None => return Err("unterminated dict".to_string()),
            }
            let key = self.string()?;
            self.expect(':')?;
            let value = self.value(depth + 1)?;
            if map.insert(key.clone(), value).is_some() {
                return Err(format!("duplicate key '{key}'"));
            }
            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, '}')) => return Ok(Value::Object(map)),
                Some((pos, c)) => return Err(format!("expected ',' or '}}' but found '{c}' at byte {pos}")),
                None => return Err("unterminated dict".to_string()),
            }
        }
    }

    fn string(&mut self) -> std::result::Result<String, String> {
        let (start, quote) = self.chars.next().ok_or("expected string")?;
        let mut out = String::new();
        loop {
            let (_, c) = self
                .chars
                .next()
                .ok_or_else(|| format!("unterminated string starting at byte {start}"))?;
            match c {
                c if c == quote => return Ok(out),
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> std::result::Result<char, String> {
        let (pos, c) = self.chars.next().ok_or("dangling escape")?;
        Ok(match c {
            '\\' => '\\',
            '\'' => '\'',
            '"'  => '"',
            '/'  => '/',
            'n'  => '\n',
            't'  => '\t',
            'r'  => '\r',
            'b'  => '\u{8}',
            'f'  => '\u{c}',
            'x'  => self.hex_char(2, pos)?,
            'u'  => self.hex_char(4, pos)?,
            'U'  => self.hex_char(8, pos)?,
            other => return Err(format!("unknown escape '\\{other}' at byte {pos}")),
        })
    }

    fn hex_char(&mut self, digits: usize, pos: usize) -> std::result::Result<char, String> {
        let code = self.hex_code(digits, pos)?;
        // A UTF-16 surrogate pair arrives as two \u escapes.
        if digits == 4 && (0xD800..0xDC00).contains(&code) {
            let mut probe = self.chars.clone();
            if let (Some((_, '\\')), Some((_, 'u'))) = (probe.next(), probe.next()) {
                self.chars.next();
                self.chars.next();
                let low = self.hex_code(4, pos)?;
                if !(0xDC00..0xE000).contains(&low) {
                    return Err(format!("unpaired surrogate at byte {pos}"));
                }
                let joined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(joined).ok_or_else(|| format!("bad surrogate pair at byte {pos}"));
            }
        }
        char::from_u32(code).ok_or_else(|| format!("invalid code point in escape at byte {pos}"))
    }

    fn hex_code(&mut self, digits: usize, pos: usize) -> std::result::Result<u32, String> {
        let mut code = 0u32;
        for _ in 0..digits {
            let (_, c) = self.chars.next().ok_or("truncated hex escape")?;
            let d = c.to_digit(16).ok_or_else(|| format!("bad hex digit '{c}' in escape at byte {pos}"))?;
            code = code.checked_mul(16).and_then(|v| v.checked_add(d)).ok_or("hex escape overflow")?;
        }
        Ok(code)
    }

    fn number(&mut self) -> std::result::Result<Value, String> {
        let start = self.chars.peek().map(|&(p, _)| p).unwrap_or(self.input.len());
        let mut end = start;
        while let Some(&(p, c)) = self.chars.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                end = p + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.input[start..end];
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number '{text}' at byte {start}"))
    }

    fn constant(&mut self) -> std::result::Result<Value, String> {
        let start = self.chars.peek().map(|&(p, _)| p).unwrap_or(self.input.len());
        let mut end = start;
        while let Some(&(p, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                end = p + 1;
                self.chars.next();
            } else {
                break;
            }
        }
        match &self.input[start..end] {
            "None" | "null"  => Ok(Value::Null),
            "True" | "true"  => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            word => Err(format!("unsupported bare word '{word}' at byte {start}")),
        }
    }
}
