//! The one concrete [`super::MetadataSource`] this crate ships: a
//! restricted-subset TSDL text parser (`SPEC_FULL.md §1.1`).
//!
//! Supports the `trace`, `clock`, `stream`, and `event` top-level blocks, and
//! the `integer`, `floating_point`, `enum`, `string`, `struct`, `variant`
//! type expressions, struct member arrays (`type name[N];`) and sequences
//! (`type name[len_field];`). Anything else (typedefs, `env {}`,
//! `callsite {}`, custom clock classes with nested field references) is
//! rejected with [`Error::MetadataParseError`] rather than silently
//! misparsed.

use super::{ClockDecl, EventClassDecl, MetadataSource, StreamClassDecl, TraceMetadata};
use crate::decl::{
    ArrayDecl, Declaration, EnumDecl, EnumMappingRange, FieldRef, FloatDecl, IntegerDecl,
    SequenceDecl, StructDecl, VariantDecl,
};
use crate::error::Error;
use crate::types::{ByteOrder, PreferredDisplayBase};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Symbol(char),
}

fn lex(text: &str) -> Result<Vec<Token>, Error> {
    let bytes: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && bytes.get(i + 1) == Some(&'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == '*' && bytes.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
            continue;
        }
        if c == '/' && bytes.get(i + 1) == Some(&'/') {
            while i < bytes.len() && bytes[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '"' {
            i += 1;
            let mut s = String::new();
            while i < bytes.len() && bytes[i] != '"' {
                if bytes[i] == '\\' && i + 1 < bytes.len() {
                    i += 1;
                }
                s.push(bytes[i]);
                i += 1;
            }
            i += 1;
            tokens.push(Token::Str(s));
            continue;
        }
        if c.is_ascii_digit() || (c == '-' && bytes.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            if c == '-' {
                i += 1;
            }
            if bytes.get(i) == Some(&'0') && (bytes.get(i + 1) == Some(&'x') || bytes.get(i + 1) == Some(&'X')) {
                i += 2;
                while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let s: String = bytes[start..i].iter().collect();
                let v = i64::from_str_radix(s.trim_start_matches('-').trim_start_matches("0x").trim_start_matches("0X"), 16)
                    .map_err(|e| Error::MetadataParseError(e.to_string()))?;
                tokens.push(Token::Int(if s.starts_with('-') { -v } else { v }));
                continue;
            }
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let s: String = bytes[start..i].iter().collect();
            let v: i64 = s.parse().map_err(|_| Error::MetadataParseError(format!("bad integer literal '{s}'")))?;
            tokens.push(Token::Int(v));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_alphanumeric() || bytes[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(bytes[start..i].iter().collect()));
            continue;
        }
        if "{}[]()<>;:=,.".contains(c) {
            tokens.push(Token::Symbol(c));
            i += 1;
            continue;
        }
        return Err(Error::MetadataParseError(format!("unexpected character '{c}'")));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_symbol(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Symbol(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), Error> {
        if self.eat_symbol(c) {
            Ok(())
        } else {
            Err(Error::MetadataParseError(format!(
                "expected '{c}', found {:?} at token {}",
                self.peek(),
                self.pos
            )))
        }
    }

    fn peek_is_ident(&self, s: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(i)) if i == s)
    }

    fn eat_ident(&mut self, s: &str) -> bool {
        if self.peek_is_ident(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident_any(&mut self) -> Result<String, Error> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(Error::MetadataParseError(format!("expected identifier, found {other:?}"))),
        }
    }

    /// A possibly dotted key, e.g. `packet.header`, `event.context`.
    fn expect_dotted_key(&mut self) -> Result<String, Error> {
        let mut s = self.expect_ident_any()?;
        while self.eat_symbol('.') {
            s.push('.');
            s.push_str(&self.expect_ident_any()?);
        }
        Ok(s)
    }

    fn expect_int(&mut self) -> Result<i64, Error> {
        match self.advance() {
            Some(Token::Int(v)) => Ok(v),
            other => Err(Error::MetadataParseError(format!("expected integer, found {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String, Error> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(s),
            other => Err(Error::MetadataParseError(format!("expected string literal, found {other:?}"))),
        }
    }

    /// A value that may be written as a bare identifier or a quoted string
    /// (TSDL allows both for names).
    fn expect_ident_or_string(&mut self) -> Result<String, Error> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            Some(Token::Str(s)) => Ok(s),
            other => Err(Error::MetadataParseError(format!("expected identifier or string, found {other:?}"))),
        }
    }

    /// Consumes one scalar value (ident, int, or string) without interpreting it.
    fn skip_value(&mut self) -> Result<(), Error> {
        match self.advance() {
            Some(_) => Ok(()),
            None => Err(Error::MetadataParseError("unexpected end of metadata".into())),
        }
    }

    fn expect_bool_like(&mut self) -> Result<bool, Error> {
        match self.advance() {
            Some(Token::Int(v)) => Ok(v != 0),
            Some(Token::Ident(s)) if s == "true" => Ok(true),
            Some(Token::Ident(s)) if s == "false" => Ok(false),
            other => Err(Error::MetadataParseError(format!("expected boolean, found {other:?}"))),
        }
    }

    fn expect_byte_order(&mut self) -> Result<ByteOrder, Error> {
        let s = self.expect_ident_any()?;
        match s.as_str() {
            "le" => Ok(ByteOrder::Little),
            "be" | "network" => Ok(ByteOrder::Big),
            other => Err(Error::MetadataParseError(format!("unrecognized byte_order '{other}'"))),
        }
    }

    fn expect_base(&mut self) -> Result<PreferredDisplayBase, Error> {
        let s = self.expect_ident_any()?;
        match s.as_str() {
            "2" | "b" | "bin" | "binary" => Ok(PreferredDisplayBase::Binary),
            "8" | "o" | "oct" | "octal" => Ok(PreferredDisplayBase::Octal),
            "10" | "d" | "dec" | "decimal" => Ok(PreferredDisplayBase::Decimal),
            "16" | "x" | "hex" | "hexadecimal" => Ok(PreferredDisplayBase::Hexadecimal),
            other => Err(Error::MetadataParseError(format!("unrecognized base '{other}'"))),
        }
    }

    fn parse_integer_decl(&mut self) -> Result<IntegerDecl, Error> {
        self.expect_symbol('{')?;
        let mut size = 32usize;
        let mut signed = false;
        let mut byte_order = None;
        let mut base = PreferredDisplayBase::Decimal;
        while !self.eat_symbol('}') {
            let key = self.expect_dotted_key()?;
            self.expect_symbol('=')?;
            match key.as_str() {
                "size" => size = self.expect_int()? as usize,
                "signed" => signed = self.expect_bool_like()?,
                "byte_order" => byte_order = Some(self.expect_byte_order()?),
                "base" => base = self.expect_base()?,
                _ => self.skip_value()?,
            }
            self.expect_symbol(';')?;
        }
        Ok(IntegerDecl { size, signed, byte_order, base })
    }

    fn parse_float_decl(&mut self) -> Result<FloatDecl, Error> {
        self.expect_symbol('{')?;
        let mut mant_dig = 24usize;
        let mut exp_dig = 8usize;
        let mut byte_order = None;
        while !self.eat_symbol('}') {
            let key = self.expect_dotted_key()?;
            self.expect_symbol('=')?;
            match key.as_str() {
                "mant_dig" => mant_dig = self.expect_int()? as usize,
                "exp_dig" => exp_dig = self.expect_int()? as usize,
                "byte_order" => byte_order = Some(self.expect_byte_order()?),
                _ => self.skip_value()?,
            }
            self.expect_symbol(';')?;
        }
        let size = if mant_dig + exp_dig <= 32 { 32 } else { 64 };
        Ok(FloatDecl { size, byte_order })
    }

    fn parse_enum_decl(&mut self) -> Result<EnumDecl, Error> {
        if self.eat_symbol(':') {
            // named container type, fallthrough
        }
        let integer = if self.eat_ident("integer") {
            self.parse_integer_decl()?
        } else {
            return Err(Error::MetadataParseError("enum must declare an integer container type".into()));
        };
        self.expect_symbol('{')?;
        let mut mappings: BTreeMap<String, Vec<EnumMappingRange>> = BTreeMap::new();
        let mut next_value = 0i64;
        while !self.eat_symbol('}') {
            let label = self.expect_ident_any()?;
            let range = if self.eat_symbol('=') {
                let lo = self.expect_int()?;
                if self.eat_symbol('.') {
                    self.expect_symbol('.')?;
                    let hi = self.expect_int()?;
                    next_value = hi + 1;
                    EnumMappingRange::Range(lo..=hi)
                } else {
                    next_value = lo + 1;
                    EnumMappingRange::Value(lo)
                }
            } else {
                let v = next_value;
                next_value += 1;
                EnumMappingRange::Value(v)
            };
            mappings.entry(label).or_default().push(range);
            self.eat_symbol(',');
        }
        Ok(EnumDecl { integer, mappings })
    }

    fn parse_variant_decl(&mut self) -> Result<VariantDecl, Error> {
        // optional variant name precedes `<tag>`
        if matches!(self.peek(), Some(Token::Ident(_))) {
            self.advance();
        }
        self.expect_symbol('<')?;
        let tag = self.expect_dotted_key()?;
        self.expect_symbol('>')?;
        self.expect_symbol('{')?;
        let mut arms = Vec::new();
        while !self.eat_symbol('}') {
            let decl = self.parse_type_expr()?;
            let name = self.expect_ident_any()?;
            self.expect_symbol(';')?;
            arms.push((name, decl));
        }
        Ok(VariantDecl { tag: FieldRef::new(tag), arms })
    }

    fn parse_struct_decl(&mut self) -> Result<StructDecl, Error> {
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        while !self.eat_symbol('}') {
            let base_decl = self.parse_type_expr()?;
            let name = self.expect_ident_any()?;
            let decl = if self.eat_symbol('[') {
                if matches!(self.peek(), Some(Token::Int(_))) {
                    let n = self.expect_int()?;
                    self.expect_symbol(']')?;
                    Declaration::Array(ArrayDecl { length: n as usize, element: Box::new(base_decl) })
                } else {
                    let r = self.expect_dotted_key()?;
                    self.expect_symbol(']')?;
                    Declaration::Sequence(SequenceDecl { length: FieldRef::new(r), element: Box::new(base_decl) })
                }
            } else {
                base_decl
            };
            self.expect_symbol(';')?;
            fields.push((name, decl));
        }
        Ok(StructDecl { fields })
    }

    fn parse_type_expr(&mut self) -> Result<Declaration, Error> {
        if self.eat_ident("integer") {
            Ok(Declaration::Integer(self.parse_integer_decl()?))
        } else if self.eat_ident("floating_point") {
            Ok(Declaration::Float(self.parse_float_decl()?))
        } else if self.eat_ident("enum") {
            Ok(Declaration::Enum(self.parse_enum_decl()?))
        } else if self.eat_ident("string") {
            if self.eat_symbol('{') {
                while !self.eat_symbol('}') {
                    self.advance();
                }
            }
            Ok(Declaration::String)
        } else if self.eat_ident("struct") {
            Ok(Declaration::Struct(self.parse_struct_decl()?))
        } else if self.eat_ident("variant") {
            Ok(Declaration::Variant(self.parse_variant_decl()?))
        } else {
            Err(Error::MetadataParseError(format!(
                "unsupported type expression starting at token {}: {:?}",
                self.pos,
                self.peek()
            )))
        }
    }

    /// Skips a balanced `{ ... }` block, used for top-level blocks this
    /// parser doesn't model (`env`, `callsite`, ...).
    fn skip_block(&mut self) -> Result<(), Error> {
        self.expect_symbol('{')?;
        let mut depth = 1;
        while depth > 0 {
            match self.advance() {
                Some(Token::Symbol('{')) => depth += 1,
                Some(Token::Symbol('}')) => depth -= 1,
                Some(_) => {}
                None => return Err(Error::MetadataParseError("unterminated block".into())),
            }
        }
        Ok(())
    }

    fn parse_clock_block(&mut self) -> Result<(String, ClockDecl), Error> {
        self.expect_symbol('{')?;
        let mut name = None;
        let mut decl = ClockDecl::default();
        while !self.eat_symbol('}') {
            let key = self.expect_dotted_key()?;
            self.expect_symbol('=')?;
            match key.as_str() {
                "name" => name = Some(self.expect_ident_or_string()?),
                "uuid" => decl.uuid = Some(Uuid::parse_str(&self.expect_string()?).map_err(|e| Error::MetadataParseError(e.to_string()))?),
                "description" => decl.description = Some(self.expect_string()?),
                "freq" => decl.freq = self.expect_int()? as u64,
                "offset" => decl.offset = self.expect_int()?,
                "precision" => decl.precision = self.expect_int()? as u64,
                _ => self.skip_value()?,
            }
            self.expect_symbol(';')?;
        }
        let name = name.ok_or_else(|| Error::MetadataParseError("clock block missing name".into()))?;
        Ok((name, decl))
    }

    fn parse_trace_block(&mut self, meta: &mut TraceMetadata) -> Result<(), Error> {
        self.expect_symbol('{')?;
        while !self.eat_symbol('}') {
            let key = self.expect_dotted_key()?;
            if self.eat_symbol(':') {
                self.expect_symbol('=')?;
                let decl = self.parse_type_expr()?;
                if key == "packet.header" {
                    meta.packet_header = Some(decl);
                }
            } else {
                self.expect_symbol('=')?;
                match key.as_str() {
                    "byte_order" => meta.byte_order = self.expect_byte_order()?,
                    "uuid" => {
                        meta.uuid = Some(Uuid::parse_str(&self.expect_string()?).map_err(|e| Error::MetadataParseError(e.to_string()))?)
                    }
                    _ => self.skip_value()?,
                }
            }
            self.expect_symbol(';')?;
        }
        Ok(())
    }

    fn parse_stream_block(&mut self) -> Result<StreamClassDecl, Error> {
        self.expect_symbol('{')?;
        let mut decl = StreamClassDecl {
            id: 0,
            event_header: None,
            event_context: None,
            packet_context: None,
            events: BTreeMap::new(),
        };
        while !self.eat_symbol('}') {
            let key = self.expect_dotted_key()?;
            if self.eat_symbol(':') {
                self.expect_symbol('=')?;
                let parsed = self.parse_type_expr()?;
                match key.as_str() {
                    "event.header" => decl.event_header = Some(parsed),
                    "event.context" => decl.event_context = Some(parsed),
                    "packet.context" => decl.packet_context = Some(parsed),
                    _ => {}
                }
            } else {
                self.expect_symbol('=')?;
                match key.as_str() {
                    "id" => decl.id = self.expect_int()? as u64,
                    _ => self.skip_value()?,
                }
            }
            self.expect_symbol(';')?;
        }
        Ok(decl)
    }

    fn parse_event_block(&mut self) -> Result<(u64, EventClassDecl), Error> {
        self.expect_symbol('{')?;
        let mut stream_id = 0u64;
        let mut decl = EventClassDecl {
            id: 0,
            name: String::new(),
            context: None,
            fields: Declaration::Struct(StructDecl { fields: Vec::new() }),
        };
        while !self.eat_symbol('}') {
            let key = self.expect_dotted_key()?;
            if self.eat_symbol(':') {
                self.expect_symbol('=')?;
                let parsed = self.parse_type_expr()?;
                match key.as_str() {
                    "context" => decl.context = Some(parsed),
                    "fields" => decl.fields = parsed,
                    _ => {}
                }
            } else {
                self.expect_symbol('=')?;
                match key.as_str() {
                    "id" => decl.id = self.expect_int()? as u64,
                    "stream_id" => stream_id = self.expect_int()? as u64,
                    "name" => decl.name = self.expect_ident_or_string()?,
                    _ => self.skip_value()?,
                }
            }
            self.expect_symbol(';')?;
        }
        Ok((stream_id, decl))
    }
}

/// A restricted-subset TSDL text parser (`SPEC_FULL.md §1.1`).
#[derive(Default)]
pub struct TextMetadataParser;

impl MetadataSource for TextMetadataParser {
    fn parse(&self, text: &str) -> Result<TraceMetadata, Error> {
        let tokens = lex(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut meta = TraceMetadata {
            uuid: None,
            byte_order: ByteOrder::host(),
            packet_header: None,
            clocks: BTreeMap::new(),
            streams: BTreeMap::new(),
        };

        while parser.peek().is_some() {
            if parser.eat_ident("trace") {
                parser.parse_trace_block(&mut meta)?;
            } else if parser.eat_ident("clock") {
                let (name, decl) = parser.parse_clock_block()?;
                meta.clocks.insert(name, decl);
            } else if parser.eat_ident("stream") {
                let decl = parser.parse_stream_block()?;
                meta.streams.entry(decl.id).or_insert(decl);
            } else if parser.eat_ident("event") {
                let (stream_id, decl) = parser.parse_event_block()?;
                let stream = meta.streams.entry(stream_id).or_insert_with(|| StreamClassDecl {
                    id: stream_id,
                    event_header: None,
                    event_context: None,
                    packet_context: None,
                    events: BTreeMap::new(),
                });
                stream.events.insert(decl.id, decl);
            } else {
                // typedef, env, callsite, or anything else this subset doesn't model
                let _ = parser.expect_ident_any()?;
                if matches!(parser.peek(), Some(Token::Symbol('{'))) {
                    parser.skip_block()?;
                } else {
                    while !matches!(parser.peek(), Some(Token::Symbol(';')) | None) {
                        parser.advance();
                    }
                    parser.eat_symbol(';');
                }
            }
            parser.eat_symbol(';');
        }

        Ok(meta)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_minimal_trace() {
        let text = r#"
            trace {
                major = 1;
                minor = 8;
                byte_order = le;
                uuid = "2a6422d0-6cee-11e0-8c08-cb07d7b3a564";
            };

            clock {
                name = monotonic;
                freq = 1000000000;
                offset = 0;
            };

            stream {
                id = 0;
                event.header := struct {
                    integer { size = 32; signed = false; } id;
                    integer { size = 64; signed = false; } timestamp;
                };
            };

            event {
                id = 0;
                stream_id = 0;
                name = "my_event";
                fields := struct {
                    integer { size = 32; signed = true; base = hex; } x;
                    string field_str;
                };
            };
        "#;
        let meta = TextMetadataParser.parse(text).unwrap();
        assert_eq!(meta.byte_order, ByteOrder::Little);
        assert!(meta.uuid.is_some());
        assert_eq!(meta.clocks.len(), 1);
        let stream = meta.streams.get(&0).unwrap();
        assert!(stream.event_header.is_some());
        let event = stream.events.get(&0).unwrap();
        assert_eq!(event.name, "my_event");
        assert!(matches!(&event.fields, Declaration::Struct(s) if s.fields.len() == 2));
    }

    #[test]
    fn parses_enum_and_variant() {
        let text = r#"
            stream {
                id = 0;
                event.context := struct {
                    enum : integer { size = 8; signed = false; } { A = 0, B = 1, C } tag;
                    variant <tag> {
                        integer { size = 32; signed = false; } A;
                        integer { size = 64; signed = false; } B;
                        string C;
                    } payload;
                };
            };
        "#;
        let meta = TextMetadataParser.parse(text).unwrap();
        let stream = meta.streams.get(&0).unwrap();
        let ctx = stream.event_context.as_ref().unwrap();
        match ctx {
            Declaration::Struct(s) => {
                assert_eq!(s.fields.len(), 2);
                assert!(matches!(&s.fields[1].1, Declaration::Variant(_)));
            }
            _ => panic!("expected struct"),
        }
    }
}
