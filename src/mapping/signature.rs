// JVMS 4.7.9.1 generic signatures, rebuilt with every class name mapped

use crate::classfile::visitor::SignatureKind;
use crate::consts::SIGNATURE_MAX_ITERS;
use crate::error::{Error, Result};

/// Rebuild a signature, passing every internal class name through `map`.
///
/// Inner class segments (`Outer<T>.Inner`) are mapped through their binary
/// name `Outer$Inner`; the emitted segment is what follows the mapped outer
/// name, or the last simple segment when the outer prefix no longer matches.
pub fn remap_signature<F>(signature: &str, kind: SignatureKind, map: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut p = Parser { src: signature, pos: 0, out: String::with_capacity(signature.len()), map, steps: 0 };
    match kind {
        SignatureKind::Class => {
            if p.peek() == Some('<') {
                p.type_parameters()?;
            }
            p.class_type()?;
            while p.more() {
                p.tick()?;
                p.class_type()?;
            }
        }
        SignatureKind::Method => {
            if p.peek() == Some('<') {
                p.type_parameters()?;
            }
            p.expect('(')?;
            while p.peek() != Some(')') {
                p.tick()?;
                p.java_type()?;
            }
            p.expect(')')?;
            if p.peek() == Some('V') {
                p.copy_char()?;
            } else {
                p.java_type()?;
            }
            while p.peek() == Some('^') {
                p.tick()?;
                p.copy_char()?;
                p.reference_type()?;
            }
        }
        SignatureKind::Field => p.java_type()?,
    }
    if p.more() {
        return Err(p.error("trailing characters"));
    }
    Ok(p.out)
}

struct Parser<'a, F> {
    src: &'a str,
    pos: usize,
    out: String,
    map: F,
    steps: usize,
}

impl<'a, F> Parser<'a, F>
where
    F: FnMut(&str) -> Result<String>,
{
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn more(&self) -> bool {
        self.pos < self.src.len()
    }

    fn error(&self, what: &str) -> Error {
        Error::class_format(format!("invalid signature '{}' at {}: {}", self.src, self.pos, what))
    }

    // Safety cap: prevent pathological loops on malformed signatures
    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > SIGNATURE_MAX_ITERS {
            return Err(self.error("too many elements"));
        }
        Ok(())
    }

    fn copy_char(&mut self) -> Result<char> {
        let c = self.peek().ok_or_else(|| self.error("unexpected end"))?;
        self.pos += c.len_utf8();
        self.out.push(c);
        Ok(c)
    }

    fn expect(&mut self, wanted: char) -> Result<()> {
        if self.peek() != Some(wanted) {
            return Err(self.error(&format!("expected '{}'", wanted)));
        }
        self.copy_char().map(|_| ())
    }

    /// Consume an identifier up to (not including) one of the stop characters
    fn identifier(&mut self, stops: &[char]) -> Result<&'a str> {
        let src: &'a str = self.src;
        let rest = &src[self.pos..];
        let end = rest.find(|c| stops.contains(&c)).unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("empty identifier"));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    fn type_parameters(&mut self) -> Result<()> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            self.tick()?;
            let name = self.identifier(&[':', '>', ';'])?;
            self.out.push_str(name);
            self.expect(':')?;
            // class bound may be empty
            if !matches!(self.peek(), Some(':') | Some('>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(':') {
                self.tick()?;
                self.copy_char()?;
                self.reference_type()?;
            }
        }
        self.expect('>')
    }

    fn java_type(&mut self) -> Result<()> {
        match self.peek() {
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => self.copy_char().map(|_| ()),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<()> {
        match self.peek() {
            Some('L') => self.class_type(),
            Some('T') => {
                self.copy_char()?;
                let name = self.identifier(&[';'])?;
                self.out.push_str(name);
                self.expect(';')
            }
            Some('[') => {
                self.copy_char()?;
                self.java_type()
            }
            _ => Err(self.error("expected a reference type")),
        }
    }

    fn class_type(&mut self) -> Result<()> {
        self.expect('L')?;
        let mut binary_name = self.identifier(&['<', '.', ';'])?.to_string();
        let mapped = (self.map)(&binary_name)?;
        self.out.push_str(&mapped);
        if self.peek() == Some('<') {
            self.type_arguments()?;
        }
        while self.peek() == Some('.') {
            self.tick()?;
            self.copy_char()?;
            let simple = self.identifier(&['<', '.', ';'])?;
            let mapped_outer = format!("{}$", (self.map)(&binary_name)?);
            binary_name = format!("{}${}", binary_name, simple);
            let mapped_inner = (self.map)(&binary_name)?;
            let emitted = match mapped_inner.strip_prefix(mapped_outer.as_str()) {
                Some(rest) => rest,
                None => mapped_inner.rsplit(&['$', '/'][..]).next().unwrap_or(&mapped_inner),
            };
            self.out.push_str(emitted);
            if self.peek() == Some('<') {
                self.type_arguments()?;
            }
        }
        self.expect(';')
    }

    fn type_arguments(&mut self) -> Result<()> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            self.tick()?;
            match self.peek() {
                Some('*') => {
                    self.copy_char()?;
                }
                Some('+' | '-') => {
                    self.copy_char()?;
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.expect('>')
    }
}
