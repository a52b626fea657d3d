//! Field and method descriptors (JVMS 4.3)

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// Internal name, e.g. `java/lang/String`
    Object(String),
    /// Element type of a one-dimensional array
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse exactly one field descriptor
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (ty, rest) = parse_field_type(descriptor)?;
        if !rest.is_empty() {
            return Err(bad_descriptor(descriptor));
        }
        Ok(ty)
    }

    /// Occupies two local variable / operand stack slots
    pub fn is_wide(&self) -> bool {
        matches!(self, FieldType::Long | FieldType::Double)
    }

    pub fn descriptor(&self) -> String {
        match self {
            FieldType::Byte => "B".into(),
            FieldType::Char => "C".into(),
            FieldType::Double => "D".into(),
            FieldType::Float => "F".into(),
            FieldType::Int => "I".into(),
            FieldType::Long => "J".into(),
            FieldType::Short => "S".into(),
            FieldType::Boolean => "Z".into(),
            FieldType::Object(name) => format!("L{};", name),
            FieldType::Array(element) => format!("[{}", element.descriptor()),
        }
    }
}

/// Parsed `(params)ret` descriptor; `ret` is `None` for void
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut rest = descriptor
            .strip_prefix('(')
            .ok_or_else(|| bad_descriptor(descriptor))?;
        let mut params = Vec::new();
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            let (ty, after) = parse_field_type(rest).map_err(|_| bad_descriptor(descriptor))?;
            params.push(ty);
            rest = after;
        }
        let ret = if rest == "V" {
            None
        } else {
            Some(FieldType::parse(rest).map_err(|_| bad_descriptor(descriptor))?)
        };
        Ok(Self { params, ret })
    }

    /// Total size of the arguments in slots, without the receiver
    pub fn arg_slots(&self) -> usize {
        self.params.iter().map(|p| if p.is_wide() { 2 } else { 1 }).sum()
    }
}

fn parse_field_type(input: &str) -> Result<(FieldType, &str)> {
    let mut chars = input.chars();
    let ty = match chars.next() {
        Some('B') => FieldType::Byte,
        Some('C') => FieldType::Char,
        Some('D') => FieldType::Double,
        Some('F') => FieldType::Float,
        Some('I') => FieldType::Int,
        Some('J') => FieldType::Long,
        Some('S') => FieldType::Short,
        Some('Z') => FieldType::Boolean,
        Some('L') => {
            let body = &input[1..];
            let end = body.find(';').ok_or_else(|| bad_descriptor(input))?;
            if end == 0 {
                return Err(bad_descriptor(input));
            }
            return Ok((FieldType::Object(body[..end].to_string()), &body[end + 1..]));
        }
        Some('[') => {
            let (element, rest) = parse_field_type(&input[1..])?;
            return Ok((FieldType::Array(Box::new(element)), rest));
        }
        _ => return Err(bad_descriptor(input)),
    };
    Ok((ty, chars.as_str()))
}

fn bad_descriptor(descriptor: &str) -> Error {
    Error::class_format(format!("invalid descriptor '{}'", descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_descriptor() {
        let md = MethodDescriptor::parse("(IJ[Ljava/lang/String;D)Lcom/x/Y;").unwrap();
        assert_eq!(md.params.len(), 4);
        assert_eq!(md.arg_slots(), 6);
        assert_eq!(md.ret, Some(FieldType::Object("com/x/Y".into())));
        assert_eq!(md.params[2].descriptor(), "[Ljava/lang/String;");
    }

    #[test]
    fn test_void_and_errors() {
        assert_eq!(MethodDescriptor::parse("()V").unwrap().ret, None);
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(FieldType::parse("L;").is_err());
        assert!(FieldType::parse("II").is_err());
    }
}
