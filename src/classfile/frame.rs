//! StackMapTable frames (JVMS 4.7.4)

use super::reader::{put_u2, ByteReader};
use crate::error::{Error, Result};

/// VerificationTypeInfo as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(u16),        // cpool index to CONSTANT_Class
    Uninitialized(u16), // offset of the `new` instruction
}

impl VerificationType {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            VerificationType::Top => bytes.push(0),
            VerificationType::Integer => bytes.push(1),
            VerificationType::Float => bytes.push(2),
            VerificationType::Double => bytes.push(3),
            VerificationType::Long => bytes.push(4),
            VerificationType::Null => bytes.push(5),
            VerificationType::UninitializedThis => bytes.push(6),
            VerificationType::Object(cp_index) => {
                bytes.push(7);
                bytes.extend_from_slice(&cp_index.to_be_bytes());
            }
            VerificationType::Uninitialized(offset) => {
                bytes.push(8);
                bytes.extend_from_slice(&offset.to_be_bytes());
            }
        }
        bytes
    }

    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(match r.u1()? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(r.u2()?),
            8 => VerificationType::Uninitialized(r.u2()?),
            tag => return Err(Error::class_format(format!("unknown verification type tag {}", tag))),
        })
    }
}

/// StackMapFrame variants as defined in JVMS 4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    Same { offset_delta: u16 },
    SameLocals1StackItem { offset_delta: u16, stack: VerificationType },
    Chop { k: u8, offset_delta: u16 }, // k in {1,2,3}
    Append { offset_delta: u16, locals: Vec<VerificationType> }, // 1..=3 locals
    Full { offset_delta: u16, locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

impl StackMapFrame {
    /// Pick the most compact frame that turns `previous` locals into `locals`/`stack`.
    /// Both local lists are in compressed form (one entry per long/double).
    pub fn between(
        offset_delta: u16,
        previous: &[VerificationType],
        locals: &[VerificationType],
        stack: &[VerificationType],
    ) -> Self {
        let same_locals = previous == locals;
        match stack.len() {
            0 if same_locals => return StackMapFrame::Same { offset_delta },
            1 if same_locals => {
                return StackMapFrame::SameLocals1StackItem { offset_delta, stack: stack[0].clone() };
            }
            0 => {
                if locals.len() < previous.len()
                    && previous.len() - locals.len() <= 3
                    && previous.starts_with(locals)
                {
                    let k = (previous.len() - locals.len()) as u8;
                    return StackMapFrame::Chop { k, offset_delta };
                }
                if locals.len() > previous.len()
                    && locals.len() - previous.len() <= 3
                    && locals.starts_with(previous)
                {
                    return StackMapFrame::Append { offset_delta, locals: locals[previous.len()..].to_vec() };
                }
            }
            _ => {}
        }
        StackMapFrame::Full { offset_delta, locals: locals.to_vec(), stack: stack.to_vec() }
    }

    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            StackMapFrame::Same { offset_delta } => {
                if *offset_delta <= 63 {
                    bytes.push(*offset_delta as u8);
                } else {
                    bytes.push(251); // same_frame_extended
                    bytes.extend_from_slice(&offset_delta.to_be_bytes());
                }
            }
            StackMapFrame::SameLocals1StackItem { offset_delta, stack } => {
                if *offset_delta <= 63 {
                    bytes.push(64 + *offset_delta as u8);
                } else {
                    bytes.push(247); // same_locals_1_stack_item_frame_extended
                    bytes.extend_from_slice(&offset_delta.to_be_bytes());
                }
                bytes.extend_from_slice(&stack.to_bytes());
            }
            StackMapFrame::Chop { k, offset_delta } => {
                bytes.push(251 - *k);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
            }
            StackMapFrame::Append { offset_delta, locals } => {
                bytes.push(251 + locals.len() as u8);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
                for l in locals {
                    bytes.extend_from_slice(&l.to_bytes());
                }
            }
            StackMapFrame::Full { offset_delta, locals, stack } => {
                bytes.push(255);
                bytes.extend_from_slice(&offset_delta.to_be_bytes());
                bytes.extend_from_slice(&(locals.len() as u16).to_be_bytes());
                for l in locals {
                    bytes.extend_from_slice(&l.to_bytes());
                }
                bytes.extend_from_slice(&(stack.len() as u16).to_be_bytes());
                for s in stack {
                    bytes.extend_from_slice(&s.to_bytes());
                }
            }
        }
        bytes
    }

    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let frame_type = r.u1()?;
        let frame = match frame_type {
            0..=63 => StackMapFrame::Same { offset_delta: frame_type as u16 },
            64..=127 => StackMapFrame::SameLocals1StackItem {
                offset_delta: (frame_type - 64) as u16,
                stack: VerificationType::parse(r)?,
            },
            247 => StackMapFrame::SameLocals1StackItem {
                offset_delta: r.u2()?,
                stack: VerificationType::parse(r)?,
            },
            248..=250 => StackMapFrame::Chop { k: 251 - frame_type, offset_delta: r.u2()? },
            251 => StackMapFrame::Same { offset_delta: r.u2()? },
            252..=254 => {
                let offset_delta = r.u2()?;
                let locals = (0..frame_type - 251)
                    .map(|_| VerificationType::parse(r))
                    .collect::<Result<Vec<_>>>()?;
                StackMapFrame::Append { offset_delta, locals }
            }
            255 => {
                let offset_delta = r.u2()?;
                let nlocals = r.u2()?;
                let locals = (0..nlocals).map(|_| VerificationType::parse(r)).collect::<Result<Vec<_>>>()?;
                let nstack = r.u2()?;
                let stack = (0..nstack).map(|_| VerificationType::parse(r)).collect::<Result<Vec<_>>>()?;
                StackMapFrame::Full { offset_delta, locals, stack }
            }
            reserved => return Err(Error::class_format(format!("reserved frame type {}", reserved))),
        };
        Ok(frame)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StackMapTable {
    pub frames: Vec<StackMapFrame>,
}

impl StackMapTable {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let count = r.u2()?;
        let frames = (0..count).map(|_| StackMapFrame::parse(&mut r)).collect::<Result<Vec<_>>>()?;
        r.expect_end("StackMapTable")?;
        Ok(Self { frames })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        put_u2(&mut bytes, self.frames.len() as u16);
        for f in &self.frames {
            bytes.extend_from_slice(&f.to_bytes());
        }
        bytes
    }

    /// Absolute bytecode offset of every frame
    pub fn offsets(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.frames.len());
        let mut previous: Option<u32> = None;
        for frame in &self.frames {
            let delta = frame.offset_delta() as u32;
            let offset = match previous {
                None => delta,
                Some(p) => p + delta + 1,
            };
            out.push(offset);
            previous = Some(offset);
        }
        out
    }
}

/// Produce human-readable descriptions of frames with absolute bytecode offsets
pub fn describe_stack_map_frames(table: &StackMapTable) -> Vec<String> {
    table
        .frames
        .iter()
        .zip(table.offsets())
        .map(|(frame, pc)| match frame {
            StackMapFrame::Same { offset_delta } => format!("@{:>4} SAME (delta={})", pc, offset_delta),
            StackMapFrame::SameLocals1StackItem { offset_delta, stack } => {
                format!("@{:>4} SAME_LOCALS_1 (delta={}, stack={:?})", pc, offset_delta, stack)
            }
            StackMapFrame::Chop { k, offset_delta } => format!("@{:>4} CHOP{} (delta={})", pc, k, offset_delta),
            StackMapFrame::Append { offset_delta, locals } => {
                format!("@{:>4} APPEND{} (delta={}, locals={:?})", pc, locals.len(), offset_delta, locals)
            }
            StackMapFrame::Full { offset_delta, locals, stack } => format!(
                "@{:>4} FULL (delta={}, locals={:?}, stack={:?})",
                pc, offset_delta, locals, stack
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerificationType as V;

    #[test]
    fn test_frame_choice() {
        let base = vec![V::Object(3), V::Integer];
        assert_eq!(StackMapFrame::between(5, &base, &base, &[]), StackMapFrame::Same { offset_delta: 5 });
        assert_eq!(
            StackMapFrame::between(0, &base, &base, &[V::Null]),
            StackMapFrame::SameLocals1StackItem { offset_delta: 0, stack: V::Null }
        );
        assert_eq!(
            StackMapFrame::between(1, &base, &base[..1], &[]),
            StackMapFrame::Chop { k: 1, offset_delta: 1 }
        );
        let longer = vec![V::Object(3), V::Integer, V::Long];
        assert_eq!(
            StackMapFrame::between(2, &base, &longer, &[]),
            StackMapFrame::Append { offset_delta: 2, locals: vec![V::Long] }
        );
        assert!(matches!(
            StackMapFrame::between(2, &base, &longer, &[V::Integer]),
            StackMapFrame::Full { .. }
        ));
    }

    #[test]
    fn test_encoding_and_offsets() {
        let table = StackMapTable {
            frames: vec![
                StackMapFrame::Same { offset_delta: 9 },
                StackMapFrame::SameLocals1StackItem { offset_delta: 0, stack: V::Object(7) },
                StackMapFrame::Same { offset_delta: 100 },
            ],
        };
        let bytes = table.to_bytes();
        assert_eq!(bytes, vec![0, 3, 9, 64, 7, 0, 7, 251, 0, 100]);
        assert_eq!(StackMapTable::parse(&bytes).unwrap(), table);
        assert_eq!(table.offsets(), vec![9, 10, 111]);
        assert!(describe_stack_map_frames(&table)[1].contains("SAME_LOCALS_1"));
    }
}
