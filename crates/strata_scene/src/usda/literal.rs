//! Literal values found on the right-hand side of USDA statements.
//!
//! Literals are parsed into an untyped tree first and converted to a
//! [`Value`] once the declared attribute type is known.

use strata_math::{DMat4, DVec2, DVec3, DVec4};

use crate::value::Value;

/// Untyped literal as written in the file.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    /// `</Some/Path>` or `</Some/Path.property>`
    Path(String),
    /// `@./file.usda@`, optionally followed by `</Prim>`
    Asset(String, Option<String>),
    Ident(String),
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
    /// `{ time: value, ... }` used by `.timeSamples`
    Samples(Vec<(f64, Literal)>),
}

/// Cursor over the text of a single statement.
pub struct LiteralReader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralReader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Remaining unparsed text.
    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn is_at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace, commas between items are handled by the callers.
    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                // comment to end of line
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Whether `c` is the next non-blank character, without consuming it.
    pub fn next_is(&mut self, c: char) -> bool {
        self.skip_ws();
        self.peek() == Some(c)
    }

    /// Consume `expected` if it is the next non-blank character.
    pub fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Read an identifier (letters, digits, `_`, `:` and `.`).
    pub fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == ':' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        (self.pos > start).then(|| &self.src[start..self.pos])
    }

    /// Parse one literal. Returns `None` on malformed input.
    pub fn literal(&mut self) -> Option<Literal> {
        self.skip_ws();
        match self.peek()? {
            '"' | '\'' => self.string().map(Literal::Str),
            '<' => self.path().map(Literal::Path),
            '@' => {
                let asset = self.asset()?;
                let mut save = self.pos;
                self.skip_ws();
                let prim = if self.peek() == Some('<') {
                    save = self.pos;
                    self.path()
                } else {
                    None
                };
                if prim.is_none() {
                    self.pos = save;
                }
                Some(Literal::Asset(asset, prim))
            }
            '(' => self.sequence('(', ')').map(Literal::Tuple),
            '[' => self.sequence('[', ']').map(Literal::List),
            '{' => self.samples(),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number().map(Literal::Number),
            _ => {
                let word = self.ident()?;
                match word {
                    "inf" => Some(Literal::Number(f64::INFINITY)),
                    "nan" => Some(Literal::Number(f64::NAN)),
                    _ => Some(Literal::Ident(word.to_string())),
                }
            }
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => {
                    let escaped = self.bump()?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn path(&mut self) -> Option<String> {
        self.bump(); // '<'
        let start = self.pos;
        while let Some(c) = self.bump() {
            if c == '>' {
                return Some(self.src[start..self.pos - 1].to_string());
            }
        }
        None
    }

    fn asset(&mut self) -> Option<String> {
        self.bump(); // '@'
        let start = self.pos;
        while let Some(c) = self.bump() {
            if c == '@' {
                return Some(self.src[start..self.pos - 1].to_string());
            }
        }
        None
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        match text {
            "-" if self.src[self.pos..].starts_with("inf") => {
                self.pos += 3;
                Some(f64::NEG_INFINITY)
            }
            _ => text.parse().ok(),
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Option<Vec<Literal>> {
        debug_assert_eq!(self.peek(), Some(open));
        self.bump();
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Some(items);
            }
            items.push(self.literal()?);
            if !self.eat(',') {
                return self.eat(close).then_some(items);
            }
        }
    }

    fn samples(&mut self) -> Option<Literal> {
        self.bump(); // '{'
        let mut samples = Vec::new();
        loop {
            if self.eat('}') {
                return Some(Literal::Samples(samples));
            }
            self.skip_ws();
            let time = self.number()?;
            if !self.eat(':') {
                return None;
            }
            samples.push((time, self.literal()?));
            if !self.eat(',') {
                return self.eat('}').then_some(Literal::Samples(samples));
            }
        }
    }
}

impl Literal {
    fn number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            Literal::Ident(word) => match word.as_str() {
                "true" => Some(1.0),
                "false" => Some(0.0),
                _ => None,
            },
            _ => None,
        }
    }

    fn numbers<const N: usize>(&self) -> Option<[f64; N]> {
        match self {
            Literal::Tuple(items) if items.len() == N => {
                let mut out = [0.0; N];
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = item.number()?;
                }
                Some(out)
            }
            _ => None,
        }
    }

    fn matrix(&self) -> Option<DMat4> {
        match self {
            Literal::Tuple(rows) if rows.len() == 4 => {
                let mut cols = [0.0; 16];
                for (r, row) in rows.iter().enumerate() {
                    let row = row.numbers::<4>()?;
                    cols[r * 4..r * 4 + 4].copy_from_slice(&row);
                }
                // USD writes row-vector matrices; each row is one glam column.
                Some(DMat4::from_cols_array(&cols))
            }
            _ => None,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Literal::Str(s) | Literal::Path(s) | Literal::Ident(s) => Some(s.clone()),
            Literal::Asset(asset, _) => Some(asset.clone()),
            _ => None,
        }
    }

    fn scalar(&self, kind: ScalarKind) -> Option<Value> {
        Some(match kind {
            ScalarKind::Bool => Value::Bool(self.number()? != 0.0),
            ScalarKind::Int => Value::Int(self.number()? as i64),
            ScalarKind::Float => Value::Float(self.number()?),
            ScalarKind::String => Value::String(self.text()?),
            ScalarKind::Vec2 => Value::Vec2(DVec2::from_array(self.numbers::<2>()?)),
            ScalarKind::Vec3 => Value::Vec3(DVec3::from_array(self.numbers::<3>()?)),
            ScalarKind::Vec4 => Value::Vec4(DVec4::from_array(self.numbers::<4>()?)),
            ScalarKind::Matrix => Value::Matrix(self.matrix()?),
        })
    }

    /// Convert to a typed value given the declared type name.
    pub fn to_value(&self, type_name: &str, is_array: bool) -> Option<Value> {
        let kind = ScalarKind::from_type_name(type_name);
        if !is_array {
            return self.scalar(kind);
        }
        let items = match self {
            Literal::List(items) => items,
            _ => return None,
        };
        macro_rules! collect {
            ($variant:ident, $pat:pat => $out:expr) => {
                Value::$variant(
                    items
                        .iter()
                        .map(|item| match item.scalar(kind)? {
                            $pat => Some($out),
                            _ => None,
                        })
                        .collect::<Option<Vec<_>>>()?,
                )
            };
        }
        Some(match kind {
            ScalarKind::Bool => collect!(BoolArray, Value::Bool(b) => b),
            ScalarKind::Int => collect!(IntArray, Value::Int(i) => i),
            ScalarKind::Float => collect!(FloatArray, Value::Float(f) => f),
            ScalarKind::String => collect!(StringArray, Value::String(s) => s),
            ScalarKind::Vec2 => collect!(Vec2Array, Value::Vec2(v) => v),
            ScalarKind::Vec3 => collect!(Vec3Array, Value::Vec3(v) => v),
            ScalarKind::Vec4 => collect!(Vec4Array, Value::Vec4(v) => v),
            ScalarKind::Matrix => collect!(MatrixArray, Value::Matrix(m) => m),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    Vec2,
    Vec3,
    Vec4,
    Matrix,
}

impl ScalarKind {
    fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "bool" => ScalarKind::Bool,
            "int" | "uint" | "int64" | "uint64" | "uchar" => ScalarKind::Int,
            "float" | "double" | "half" | "timecode" => ScalarKind::Float,
            "matrix4d" | "matrix4f" | "frame4d" => ScalarKind::Matrix,
            t if t.ends_with('2') || t.ends_with("2f") || t.ends_with("2d") || t.ends_with("2h") => ScalarKind::Vec2,
            t if t.starts_with("quat") || t.starts_with("color4") || t.ends_with('4') || t.ends_with("4f") || t.ends_with("4d") => {
                ScalarKind::Vec4
            }
            t if t.ends_with('3') || t.ends_with("3f") || t.ends_with("3d") || t.ends_with("3h") => ScalarKind::Vec3,
            _ => ScalarKind::String,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Literal {
        LiteralReader::new(text).literal().unwrap()
    }

    #[test]
    fn test_parse_tuple_list() {
        let lit = parse("[(0, 0, 0), (1, 2.5, -3e1)]");
        let value = lit.to_value("point3f", true).unwrap();
        assert_eq!(
            value,
            Value::Vec3Array(vec![DVec3::ZERO, DVec3::new(1.0, 2.5, -30.0)])
        );
    }

    #[test]
    fn test_parse_time_samples() {
        let lit = parse("{ 0: (0, 0, 0), 10: (10, 0, 0), }");
        match lit {
            Literal::Samples(samples) => {
                assert_eq!(samples.len(), 2);
                assert_eq!(samples[1].0, 10.0);
            }
            other => panic!("expected samples, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_path_and_asset() {
        assert_eq!(parse("</World/Mat.outputs:surface>"), Literal::Path("/World/Mat.outputs:surface".to_string()));
        assert_eq!(
            parse("@./cube.usda@</Cube>"),
            Literal::Asset("./cube.usda".to_string(), Some("/Cube".to_string()))
        );
    }

    #[test]
    fn test_string_escapes() {
        let lit = parse(r#""a \"quoted\" word""#);
        assert_eq!(lit, Literal::Str("a \"quoted\" word".to_string()));
    }

    #[test]
    fn test_matrix_rows_become_columns() {
        let lit = parse("( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (5, 6, 7, 1) )");
        let m = lit.to_value("matrix4d", false).unwrap().as_matrix().unwrap();
        assert_eq!(m.w_axis.truncate(), DVec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_bool_idents() {
        assert_eq!(parse("true").to_value("bool", false), Some(Value::Bool(true)));
        assert_eq!(parse("0").to_value("bool", false), Some(Value::Bool(false)));
    }
}
