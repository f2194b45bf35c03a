/// Decoder for the textual literal form returned by the lookup API.
///
/// The upstream renders its payload as a Python-style repr rather than JSON:
/// `{'mainCategories': [{'name': 'Product', 'parameters': [...]}]}`.
/// Single-quoted strings, `True`/`False`/`None` and tuples are all legal here.
/// Values decode into `serde_json::Value` so everything downstream stays serde-based.
///
/// Grammar (whitespace allowed between tokens):
/// - dict: `{ literal : literal , ... }` (trailing comma allowed)
/// - list: `[ literal , ... ]`
/// - tuple: `()`, `(x,)`, `(x, y, ...)`; a bare `(x)` is just `x`
/// - string: optional `u`/`r` prefix, single or double quotes
/// - number, `True`, `False`, `None`
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0, one_of},
    combinator::{all_consuming, map, map_opt, opt, value},
    error::ErrorKind,
    multi::separated_list0,
    number::complete::recognize_float,
    sequence::{delimited, pair, terminated},
    IResult,
};
use serde_json::{Map, Number, Value};

type Res<'a, T> = IResult<&'a str, T>;

#[derive(Debug, thiserror::Error)]
#[error("invalid literal at byte {offset}: {reason}")]
pub struct LiteralError {
    /// Byte offset into the input where decoding stopped.
    pub offset: usize,
    pub reason: String,
}

/// Decode one complete literal. Leading and trailing whitespace is ignored;
/// any other trailing input is an error.
pub fn decode_literal(input: &str) -> Result<Value, LiteralError> {
    match all_consuming(delimited(multispace0, |i| literal(i, 0), multispace0))(input) {
        Ok((_, decoded)) => Ok(decoded),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(LiteralError {
            offset: input.len() - e.input.len(),
            reason: describe(e.code),
        }),
        Err(nom::Err::Incomplete(_)) => Err(LiteralError {
            offset: input.len(),
            reason: "incomplete input".to_string(),
        }),
    }
}

/// Containers nested deeper than this are rejected instead of recursing further.
const MAX_DEPTH: usize = 64;

fn describe(code: ErrorKind) -> String {
    match code {
        ErrorKind::Eof => "unexpected trailing input".to_string(),
        ErrorKind::Escaped => "invalid escape sequence".to_string(),
        ErrorKind::Char => "unterminated string or missing delimiter".to_string(),
        ErrorKind::TooLarge => format!("nesting deeper than {MAX_DEPTH} levels"),
        other => format!("unexpected token ({other:?})"),
    }
}

fn literal<'a>(input: &'a str, depth: usize) -> Res<'a, Value> {
    alt((
        |i: &'a str| dict(i, depth),
        |i: &'a str| list(i, depth),
        |i: &'a str| tuple_or_group(i, depth),
        map(string, Value::String),
        keyword,
        number,
    ))(input)
}

/// A literal one container level below `depth`.
fn nested<'a>(depth: usize) -> impl FnMut(&'a str) -> Res<'a, Value> {
    ws(move |i: &'a str| literal(i, depth + 1))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Match the opening delimiter of a container at `depth`.
fn open<'a>(delimiter: char, depth: usize) -> impl FnMut(&'a str) -> Res<'a, char> {
    move |input: &'a str| {
        let (rest, c) = char::<&'a str, nom::error::Error<&'a str>>(delimiter)(input)?;
        if depth >= MAX_DEPTH {
            return Err(failure(input, ErrorKind::TooLarge));
        }
        Ok((rest, c))
    }
}

fn dict(input: &str, depth: usize) -> Res<'_, Value> {
    let entry = pair(terminated(nested(depth), char(':')), nested(depth));
    let (input, entries) = delimited(
        open('{', depth),
        terminated(
            separated_list0(char(','), entry),
            pair(opt(char(',')), multispace0),
        ),
        char('}'),
    )(input)?;

    let mut object = Map::new();
    for (key, val) in entries {
        object.insert(key_string(key), val);
    }
    Ok((input, Value::Object(object)))
}

/// Non-string keys (ints, `True`, `None`, ...) are stringified.
fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn list(input: &str, depth: usize) -> Res<'_, Value> {
    map(
        delimited(
            open('[', depth),
            terminated(
                separated_list0(char(','), nested(depth)),
                pair(opt(char(',')), multispace0),
            ),
            char(']'),
        ),
        Value::Array,
    )(input)
}

fn tuple_or_group(input: &str, depth: usize) -> Res<'_, Value> {
    let (input, _) = pair(open('(', depth), multispace0)(input)?;
    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>(')')(input) {
        return Ok((rest, Value::Array(Vec::new())));
    }

    let (input, first) = nested(depth)(input)?;
    let (input, comma) = opt(char(','))(input)?;
    if comma.is_none() {
        let (input, _) = char(')')(input)?;
        return Ok((input, first));
    }

    let (input, rest) = separated_list0(char(','), nested(depth))(input)?;
    let (input, _) = pair(opt(char(',')), multispace0)(input)?;
    let (input, _) = char(')')(input)?;

    let mut items = Vec::with_capacity(rest.len() + 1);
    items.push(first);
    items.extend(rest);
    Ok((input, Value::Array(items)))
}

fn keyword(input: &str) -> Res<'_, Value> {
    alt((
        value(Value::Bool(true), tag("True")),
        value(Value::Bool(false), tag("False")),
        value(Value::Null, tag("None")),
    ))(input)
}

fn number(input: &str) -> Res<'_, Value> {
    map(map_opt(recognize_float, parse_number), Value::Number)(input)
}

fn parse_number(text: &str) -> Option<Number> {
    let is_float = text.contains(|c: char| matches!(c, '.' | 'e' | 'E'));
    if !is_float {
        if let Ok(int) = text.parse::<i64>() {
            return Some(Number::from(int));
        }
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn string(input: &str) -> Res<'_, String> {
    let (input, prefix) = opt(one_of("uUrR"))(input)?;
    let raw = matches!(prefix, Some('r' | 'R'));
    let (input, quote) = one_of("'\"")(input)?;
    string_body(input, quote, raw)
}

fn failure(input: &str, kind: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, kind))
}

/// Consume everything up to and including the closing `quote`.
///
/// Once the opening quote is seen, errors are failures: no other literal
/// form can start with a quote, so backtracking would only hide the offset.
fn string_body(input: &str, quote: char, raw: bool) -> Res<'_, String> {
    let mut out = String::new();
    let mut pos = 0;

    while let Some(c) = input[pos..].chars().next() {
        let start = pos;
        pos += c.len_utf8();

        if c == quote {
            return Ok((&input[pos..], out));
        }

        match c {
            '\n' => return Err(failure(&input[start..], ErrorKind::Char)),
            '\\' => {
                let Some(esc) = input[pos..].chars().next() else {
                    break;
                };
                pos += esc.len_utf8();

                if raw {
                    out.push('\\');
                    out.push(esc);
                    continue;
                }

                match esc {
                    '\\' | '\'' | '"' => out.push(esc),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    'a' => out.push('\u{7}'),
                    // line continuation
                    '\n' => {}
                    '0'..='7' => {
                        let digits_start = pos - 1;
                        let mut end = pos;
                        while end < input.len()
                            && end - digits_start < 3
                            && matches!(input.as_bytes()[end], b'0'..=b'7')
                        {
                            end += 1;
                        }
                        let decoded = u32::from_str_radix(&input[digits_start..end], 8)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| failure(&input[start..], ErrorKind::Escaped))?;
                        out.push(decoded);
                        pos = end;
                    }
                    'x' | 'u' | 'U' => {
                        let width = match esc {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let decoded = input
                            .get(pos..pos + width)
                            .filter(|digits| digits.bytes().all(|b| b.is_ascii_hexdigit()))
                            .and_then(|digits| u32::from_str_radix(digits, 16).ok())
                            .and_then(char::from_u32)
                            .ok_or_else(|| failure(&input[start..], ErrorKind::Escaped))?;
                        out.push(decoded);
                        pos += width;
                    }
                    // Unknown escapes are kept verbatim.
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            _ => out.push(c),
        }
    }

    Err(failure(&input[input.len()..], ErrorKind::Char))
}
