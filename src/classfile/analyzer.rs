//! StackMapTable computation by data-flow analysis over a method body
//!
//! Every instruction start gets an entry state, propagated with a worklist
//! until no state changes. Frames are then emitted at branch targets,
//! exception handlers and after unconditional transfers. Unreachable code is
//! replaced by `nop ... athrow` so that it verifies under a trivial frame.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;

use super::attribute::{CodeAttribute, ExceptionTableEntry};
use super::constpool::{Constant, ConstantPool};
use super::defs::CONSTRUCTOR_METHOD_NAME;
use super::descriptor::{FieldType, MethodDescriptor};
use super::frame::{StackMapFrame, StackMapTable, VerificationType};
use super::opcodes::*;
use crate::consts::{FRAME_MAX_ITERS, JAVA_LANG_OBJECT, JAVA_LANG_THROWABLE};
use crate::error::{Error, Result};

/// Answers least-upper-bound queries between two reference types
pub trait TypeMerger {
    fn common_superclass(&self, a: &str, b: &str) -> Result<String>;
}

/// The method being analyzed, in post-rename form
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
    pub is_static: bool,
}

impl MethodContext<'_> {
    fn label(&self) -> String {
        format!("{}.{}{}", self.class_name, self.name, self.descriptor)
    }
}

/// Slot value during analysis; references carry internal names or array descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Uninitialized(u16),
    Reference(String),
}

impl Value {
    fn of_field(ty: &FieldType) -> Self {
        match ty {
            FieldType::Byte | FieldType::Char | FieldType::Short | FieldType::Int | FieldType::Boolean => {
                Value::Integer
            }
            FieldType::Float => Value::Float,
            FieldType::Long => Value::Long,
            FieldType::Double => Value::Double,
            FieldType::Object(name) => Value::Reference(name.clone()),
            FieldType::Array(_) => Value::Reference(ty.descriptor()),
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long | Value::Double)
    }

    fn object() -> Self {
        Value::Reference(JAVA_LANG_OBJECT.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct State {
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl State {
    fn push(&mut self, value: Value) {
        let wide = value.is_wide();
        self.stack.push(value);
        if wide {
            self.stack.push(Value::Top);
        }
    }
}

struct Handler {
    start: usize,
    end: usize,
    target: usize,
    catch: Value,
}

struct Analysis {
    initial: State,
    states: Vec<Option<State>>,
    frame_points: BTreeSet<usize>,
}

/// Recompute the frames of one method.
///
/// Unreachable code in `code` is overwritten and its exception ranges are
/// removed. Returns `None` when the method needs no frames at all.
pub fn compute_frames(
    code: &mut CodeAttribute,
    pool: &mut ConstantPool,
    method: &MethodContext<'_>,
    merger: &dyn TypeMerger,
) -> Result<Option<StackMapTable>> {
    if code.code.is_empty() {
        return Ok(None);
    }
    let analysis = {
        let analyzer = Analyzer { method, code: &code.code, pool: &*pool, merger, label: method.label() };
        analyzer.run(code.max_locals, &code.exception_table)?
    };

    let dead = dead_blocks(&code.code, &analysis.states)?;
    for &(start, end) in &dead {
        debug!("FRAMES: {} unreachable code [{}, {})", method.label(), start, end);
        code.code[start..end - 1].fill(NOP);
        code.code[end - 1] = ATHROW;
    }
    if !dead.is_empty() {
        code.exception_table = remove_ranges(&code.exception_table, &dead);
        code.max_stack = code.max_stack.max(1);
    }

    let mut points: BTreeMap<usize, State> = BTreeMap::new();
    for &offset in &analysis.frame_points {
        if let Some(state) = &analysis.states[offset] {
            points.insert(offset, state.clone());
        }
    }
    for &(start, _) in &dead {
        let throwable = Value::Reference(JAVA_LANG_THROWABLE.to_string());
        points.insert(start, State { locals: Vec::new(), stack: vec![throwable] });
    }

    let mut previous_locals = verification_types(pool, &compress(&analysis.initial.locals, true))?;
    let mut previous_offset: Option<usize> = None;
    let mut table = StackMapTable::new();
    for (offset, state) in points {
        let locals = verification_types(pool, &compress(&state.locals, true))?;
        let stack = verification_types(pool, &compress(&state.stack, false))?;
        let delta = match previous_offset {
            None => offset,
            Some(p) => offset - p - 1,
        };
        table.frames.push(StackMapFrame::between(delta as u16, &previous_locals, &locals, &stack));
        previous_locals = locals;
        previous_offset = Some(offset);
    }
    Ok((!table.frames.is_empty()).then_some(table))
}

struct Analyzer<'a> {
    method: &'a MethodContext<'a>,
    code: &'a [u8],
    pool: &'a ConstantPool,
    merger: &'a dyn TypeMerger,
    label: String,
}

impl Analyzer<'_> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::frame(self.label.clone(), message)
    }

    fn run(&self, max_locals: u16, exception_table: &[ExceptionTableEntry]) -> Result<Analysis> {
        let code = self.code;
        let offsets = instruction_offsets(code)?;
        let mut is_start = vec![false; code.len()];
        for &pc in &offsets {
            is_start[pc] = true;
            let op = code[pc];
            let effective = if op == WIDE { read_u8(code, pc + 1)? } else { op };
            if matches!(effective, JSR | JSR_W | RET) {
                return Err(Error::UnsupportedBytecode {
                    method: self.label.clone(),
                    message: format!("subroutine instruction 0x{:02x} at offset {}", effective, pc),
                });
            }
        }
        let check_start = |offset: usize, what: &str| -> Result<()> {
            if offset < code.len() && is_start[offset] {
                Ok(())
            } else {
                Err(Error::class_format(format!("{} {} in {} is not an instruction start", what, offset, self.label)))
            }
        };

        let mut handlers = Vec::with_capacity(exception_table.len());
        for entry in exception_table {
            let catch = if entry.catch_type == 0 {
                Value::Reference(JAVA_LANG_THROWABLE.to_string())
            } else {
                Value::Reference(self.pool.class_name(entry.catch_type)?)
            };
            check_start(entry.handler_pc as usize, "handler")?;
            handlers.push(Handler {
                start: entry.start_pc as usize,
                end: entry.end_pc as usize,
                target: entry.handler_pc as usize,
                catch,
            });
        }

        let mut frame_points = BTreeSet::new();
        for &pc in &offsets {
            for target in branch_targets(code, pc)? {
                check_start(target, "branch target")?;
                frame_points.insert(target);
            }
            if is_unconditional_transfer(code[pc]) {
                let next = pc + instruction_length(code, pc)?;
                if next < code.len() {
                    frame_points.insert(next);
                }
            }
        }
        frame_points.extend(handlers.iter().map(|h| h.target));

        let initial = self.initial_state(max_locals)?;
        let mut states: Vec<Option<State>> = vec![None; code.len()];
        let mut queued = vec![false; code.len()];
        let mut worklist = VecDeque::from([0usize]);
        states[0] = Some(initial.clone());
        queued[0] = true;

        let mut steps = 0usize;
        while let Some(pc) = worklist.pop_front() {
            queued[pc] = false;
            steps += 1;
            if steps > FRAME_MAX_ITERS {
                return Err(self.error("analysis does not converge"));
            }
            let entry = match &states[pc] {
                Some(state) => state.clone(),
                None => continue,
            };
            let exit = self.execute(pc, &entry)?;

            let mut successors = branch_targets(code, pc)?;
            if !is_unconditional_transfer(code[pc]) {
                let next = pc + instruction_length(code, pc)?;
                if next >= code.len() {
                    return Err(self.error(format!("execution falls off the end after offset {}", pc)));
                }
                successors.push(next);
            }
            for successor in successors {
                self.flow(&mut states, &mut worklist, &mut queued, successor, exit.clone())?;
            }
            for handler in handlers.iter().filter(|h| h.start <= pc && pc < h.end) {
                let state = State { locals: entry.locals.clone(), stack: vec![handler.catch.clone()] };
                self.flow(&mut states, &mut worklist, &mut queued, handler.target, state)?;
            }
        }
        Ok(Analysis { initial, states, frame_points })
    }

    fn flow(
        &self,
        states: &mut [Option<State>],
        worklist: &mut VecDeque<usize>,
        queued: &mut [bool],
        at: usize,
        incoming: State,
    ) -> Result<()> {
        let merged = match &states[at] {
            None => incoming,
            Some(existing) => {
                let merged = self.merge_states(existing, &incoming, at)?;
                if &merged == existing {
                    return Ok(());
                }
                merged
            }
        };
        states[at] = Some(merged);
        if !queued[at] {
            queued[at] = true;
            worklist.push_back(at);
        }
        Ok(())
    }

    fn initial_state(&self, max_locals: u16) -> Result<State> {
        let descriptor = MethodDescriptor::parse(self.method.descriptor)?;
        let mut locals = Vec::new();
        if !self.method.is_static {
            if self.method.name == CONSTRUCTOR_METHOD_NAME && self.method.class_name != JAVA_LANG_OBJECT {
                locals.push(Value::UninitializedThis);
            } else {
                locals.push(Value::Reference(self.method.class_name.to_string()));
            }
        }
        for param in &descriptor.params {
            let value = Value::of_field(param);
            let wide = value.is_wide();
            locals.push(value);
            if wide {
                locals.push(Value::Top);
            }
        }
        if locals.len() > max_locals as usize {
            return Err(self.error(format!("arguments need {} locals, max_locals is {}", locals.len(), max_locals)));
        }
        locals.resize(max_locals as usize, Value::Top);
        Ok(State { locals, stack: Vec::new() })
    }

    fn merge_states(&self, a: &State, b: &State, at: usize) -> Result<State> {
        if a.stack.len() != b.stack.len() {
            return Err(self.error(format!(
                "stack height mismatch at offset {} ({} vs {})",
                at,
                a.stack.len(),
                b.stack.len()
            )));
        }
        let merge_all = |xs: &[Value], ys: &[Value]| -> Result<Vec<Value>> {
            xs.iter().zip(ys).map(|(x, y)| self.merge_values(x, y)).collect()
        };
        Ok(State { locals: merge_all(&a.locals, &b.locals)?, stack: merge_all(&a.stack, &b.stack)? })
    }

    fn merge_values(&self, a: &Value, b: &Value) -> Result<Value> {
        if a == b {
            return Ok(a.clone());
        }
        Ok(match (a, b) {
            (Value::Null, Value::Reference(_)) => b.clone(),
            (Value::Reference(_), Value::Null) => a.clone(),
            (Value::Reference(x), Value::Reference(y)) => Value::Reference(self.merge_references(x, y)?),
            _ => Value::Top,
        })
    }

    fn merge_references(&self, a: &str, b: &str) -> Result<String> {
        match (a.starts_with('['), b.starts_with('[')) {
            (false, false) => self.merger.common_superclass(a, b),
            (true, true) => self.merge_arrays(a, b),
            _ => Ok(JAVA_LANG_OBJECT.to_string()),
        }
    }

    fn merge_arrays(&self, a: &str, b: &str) -> Result<String> {
        let (dims_a, elem_a) = split_array(a);
        let (dims_b, elem_b) = split_array(b);
        if dims_a == dims_b {
            if let (Some(ca), Some(cb)) = (class_of(elem_a), class_of(elem_b)) {
                let common = self.merger.common_superclass(ca, cb)?;
                return Ok(format!("{}L{};", "[".repeat(dims_a), common));
            }
        }
        // a primitive array is itself an Object, one dimension less
        let effective = |dims: usize, elem: &str| if elem.starts_with('L') { dims } else { dims - 1 };
        let dims = effective(dims_a, elem_a).min(effective(dims_b, elem_b));
        Ok(if dims == 0 {
            JAVA_LANG_OBJECT.to_string()
        } else {
            format!("{}L{};", "[".repeat(dims), JAVA_LANG_OBJECT)
        })
    }

    fn pop(&self, state: &mut State, pc: usize) -> Result<Value> {
        state
            .stack
            .pop()
            .ok_or_else(|| self.error(format!("operand stack underflow at offset {}", pc)))
    }

    fn pop_n(&self, state: &mut State, n: usize, pc: usize) -> Result<()> {
        if state.stack.len() < n {
            return Err(self.error(format!("operand stack underflow at offset {}", pc)));
        }
        state.stack.truncate(state.stack.len() - n);
        Ok(())
    }

    fn set_local(&self, state: &mut State, index: usize, value: Value, pc: usize) -> Result<()> {
        let slots = if value.is_wide() { 2 } else { 1 };
        if index + slots > state.locals.len() {
            return Err(self.error(format!("local {} out of range at offset {}", index, pc)));
        }
        // storing over the upper half of a long/double invalidates it
        if index > 0 && state.locals[index - 1].is_wide() {
            state.locals[index - 1] = Value::Top;
        }
        state.locals[index] = value;
        if slots == 2 {
            state.locals[index + 1] = Value::Top;
        }
        Ok(())
    }

    fn load(&self, state: &mut State, kind: u8, index: usize, pc: usize) -> Result<()> {
        let value = match kind {
            ILOAD => Value::Integer,
            LLOAD => Value::Long,
            FLOAD => Value::Float,
            DLOAD => Value::Double,
            _ => state
                .locals
                .get(index)
                .cloned()
                .ok_or_else(|| self.error(format!("local {} out of range at offset {}", index, pc)))?,
        };
        state.push(value);
        Ok(())
    }

    fn store(&self, state: &mut State, kind: u8, index: usize, pc: usize) -> Result<()> {
        let value = match kind {
            ISTORE => {
                self.pop(state, pc)?;
                Value::Integer
            }
            FSTORE => {
                self.pop(state, pc)?;
                Value::Float
            }
            LSTORE => {
                self.pop_n(state, 2, pc)?;
                Value::Long
            }
            DSTORE => {
                self.pop_n(state, 2, pc)?;
                Value::Double
            }
            _ => self.pop(state, pc)?,
        };
        self.set_local(state, index, value, pc)
    }

    fn ldc(&self, state: &mut State, index: u16) -> Result<()> {
        let value = match self.pool.get(index)? {
            Constant::Integer(_) => Value::Integer,
            Constant::Float(_) => Value::Float,
            Constant::Long(_) => Value::Long,
            Constant::Double(_) => Value::Double,
            Constant::String(_) => Value::Reference("java/lang/String".to_string()),
            Constant::Class(_) => Value::Reference("java/lang/Class".to_string()),
            Constant::MethodType(_) => Value::Reference("java/lang/invoke/MethodType".to_string()),
            Constant::MethodHandle(..) => Value::Reference("java/lang/invoke/MethodHandle".to_string()),
            Constant::Dynamic(_, nat) => {
                let (_, descriptor) = self.pool.name_and_type(*nat)?;
                Value::of_field(&FieldType::parse(&descriptor)?)
            }
            other => return Err(self.error(format!("ldc of unloadable constant {:?}", other))),
        };
        state.push(value);
        Ok(())
    }

    fn push_return(&self, state: &mut State, descriptor: &MethodDescriptor) {
        if let Some(ret) = &descriptor.ret {
            state.push(Value::of_field(ret));
        }
    }

    fn invoke(&self, state: &mut State, op: u8, pc: usize) -> Result<()> {
        let index = read_u16(self.code, pc + 1)?;
        if op == INVOKEDYNAMIC {
            let nat = match self.pool.get(index)? {
                Constant::InvokeDynamic(_, nat) => *nat,
                _ => return Err(self.error(format!("invokedynamic without a call site at offset {}", pc))),
            };
            let (_, descriptor) = self.pool.name_and_type(nat)?;
            let descriptor = MethodDescriptor::parse(&descriptor)?;
            self.pop_n(state, descriptor.arg_slots(), pc)?;
            self.push_return(state, &descriptor);
            return Ok(());
        }

        let member = self.pool.member_ref(index)?;
        let descriptor = MethodDescriptor::parse(&member.descriptor)?;
        self.pop_n(state, descriptor.arg_slots(), pc)?;
        if op != INVOKESTATIC {
            let receiver = self.pop(state, pc)?;
            if op == INVOKESPECIAL && member.name == CONSTRUCTOR_METHOD_NAME {
                let initialized = match &receiver {
                    Value::UninitializedThis => Value::Reference(self.method.class_name.to_string()),
                    Value::Uninitialized(new_pc) => Value::Reference(self.allocated_class(*new_pc as usize)?),
                    _ => receiver.clone(),
                };
                for slot in state.locals.iter_mut().chain(state.stack.iter_mut()) {
                    if *slot == receiver {
                        *slot = initialized.clone();
                    }
                }
            }
        }
        self.push_return(state, &descriptor);
        Ok(())
    }

    /// Class created by the `new` instruction at `pc`
    fn allocated_class(&self, pc: usize) -> Result<String> {
        if read_u8(self.code, pc)? != NEW {
            return Err(self.error(format!("uninitialized value does not come from new at offset {}", pc)));
        }
        self.pool.class_name(read_u16(self.code, pc + 1)?)
    }

    fn field(&self, state: &mut State, op: u8, pc: usize) -> Result<()> {
        let member = self.pool.member_ref(read_u16(self.code, pc + 1)?)?;
        let ty = FieldType::parse(&member.descriptor)?;
        let size = if ty.is_wide() { 2 } else { 1 };
        match op {
            GETSTATIC => state.push(Value::of_field(&ty)),
            PUTSTATIC => self.pop_n(state, size, pc)?,
            GETFIELD => {
                self.pop(state, pc)?;
                state.push(Value::of_field(&ty));
            }
            _ => self.pop_n(state, size + 1, pc)?,
        }
        Ok(())
    }

    fn execute(&self, pc: usize, entry: &State) -> Result<State> {
        let code = self.code;
        let mut s = entry.clone();
        let op = code[pc];
        match op {
            NOP | IINC | GOTO | GOTO_W | RETURN => {}
            ACONST_NULL => s.push(Value::Null),
            ICONST_M1..=ICONST_5 | BIPUSH | SIPUSH => s.push(Value::Integer),
            LCONST_0 | LCONST_1 => s.push(Value::Long),
            FCONST_0..=FCONST_2 => s.push(Value::Float),
            DCONST_0 | DCONST_1 => s.push(Value::Double),
            LDC => self.ldc(&mut s, read_u8(code, pc + 1)? as u16)?,
            LDC_W | LDC2_W => self.ldc(&mut s, read_u16(code, pc + 1)?)?,
            ILOAD..=ALOAD => self.load(&mut s, op, read_u8(code, pc + 1)? as usize, pc)?,
            ILOAD_0..=ALOAD_3 => {
                let n = op - ILOAD_0;
                self.load(&mut s, ILOAD + n / 4, (n % 4) as usize, pc)?;
            }
            IALOAD | BALOAD | CALOAD | SALOAD => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Integer);
            }
            LALOAD => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Long);
            }
            FALOAD => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Float);
            }
            DALOAD => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Double);
            }
            AALOAD => {
                self.pop(&mut s, pc)?;
                let array = self.pop(&mut s, pc)?;
                s.push(element_of(&array));
            }
            ISTORE..=ASTORE => self.store(&mut s, op, read_u8(code, pc + 1)? as usize, pc)?,
            ISTORE_0..=ASTORE_3 => {
                let n = op - ISTORE_0;
                self.store(&mut s, ISTORE + n / 4, (n % 4) as usize, pc)?;
            }
            IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => self.pop_n(&mut s, 3, pc)?,
            LASTORE | DASTORE => self.pop_n(&mut s, 4, pc)?,
            POP => self.pop_n(&mut s, 1, pc)?,
            POP2 => self.pop_n(&mut s, 2, pc)?,
            DUP => {
                let v1 = self.pop(&mut s, pc)?;
                s.stack.extend([v1.clone(), v1]);
            }
            DUP_X1 => {
                let v1 = self.pop(&mut s, pc)?;
                let v2 = self.pop(&mut s, pc)?;
                s.stack.extend([v1.clone(), v2, v1]);
            }
            DUP_X2 => {
                let v1 = self.pop(&mut s, pc)?;
                let v2 = self.pop(&mut s, pc)?;
                let v3 = self.pop(&mut s, pc)?;
                s.stack.extend([v1.clone(), v3, v2, v1]);
            }
            DUP2 => {
                let v1 = self.pop(&mut s, pc)?;
                let v2 = self.pop(&mut s, pc)?;
                s.stack.extend([v2.clone(), v1.clone(), v2, v1]);
            }
            DUP2_X1 => {
                let v1 = self.pop(&mut s, pc)?;
                let v2 = self.pop(&mut s, pc)?;
                let v3 = self.pop(&mut s, pc)?;
                s.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
            }
            DUP2_X2 => {
                let v1 = self.pop(&mut s, pc)?;
                let v2 = self.pop(&mut s, pc)?;
                let v3 = self.pop(&mut s, pc)?;
                let v4 = self.pop(&mut s, pc)?;
                s.stack.extend([v2.clone(), v1.clone(), v4, v3, v2, v1]);
            }
            SWAP => {
                let v1 = self.pop(&mut s, pc)?;
                let v2 = self.pop(&mut s, pc)?;
                s.stack.extend([v1, v2]);
            }
            IADD | ISUB | IMUL | IDIV | IREM | ISHL | ISHR | IUSHR | IAND | IOR | IXOR => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Integer);
            }
            LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR => {
                self.pop_n(&mut s, 4, pc)?;
                s.push(Value::Long);
            }
            LSHL | LSHR | LUSHR => {
                self.pop_n(&mut s, 3, pc)?;
                s.push(Value::Long);
            }
            FADD | FSUB | FMUL | FDIV | FREM => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Float);
            }
            DADD | DSUB | DMUL | DDIV | DREM => {
                self.pop_n(&mut s, 4, pc)?;
                s.push(Value::Double);
            }
            INEG | I2B | I2C | I2S => {
                self.pop_n(&mut s, 1, pc)?;
                s.push(Value::Integer);
            }
            LNEG => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Long);
            }
            FNEG => {
                self.pop_n(&mut s, 1, pc)?;
                s.push(Value::Float);
            }
            DNEG => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Double);
            }
            I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D | D2I | D2L | D2F => {
                let from = if matches!(op, L2I | L2F | L2D | D2I | D2L | D2F) { 2 } else { 1 };
                self.pop_n(&mut s, from, pc)?;
                s.push(match op {
                    L2I | F2I | D2I => Value::Integer,
                    I2L | F2L | D2L => Value::Long,
                    I2F | L2F | D2F => Value::Float,
                    _ => Value::Double,
                });
            }
            LCMP | DCMPL | DCMPG => {
                self.pop_n(&mut s, 4, pc)?;
                s.push(Value::Integer);
            }
            FCMPL | FCMPG => {
                self.pop_n(&mut s, 2, pc)?;
                s.push(Value::Integer);
            }
            IFEQ..=IFLE | IFNULL | IFNONNULL | TABLESWITCH | LOOKUPSWITCH => self.pop_n(&mut s, 1, pc)?,
            IF_ICMPEQ..=IF_ACMPNE => self.pop_n(&mut s, 2, pc)?,
            IRETURN | FRETURN | ARETURN | ATHROW | MONITORENTER | MONITOREXIT => self.pop_n(&mut s, 1, pc)?,
            LRETURN | DRETURN => self.pop_n(&mut s, 2, pc)?,
            GETSTATIC..=PUTFIELD => self.field(&mut s, op, pc)?,
            INVOKEVIRTUAL..=INVOKEDYNAMIC => self.invoke(&mut s, op, pc)?,
            NEW => s.push(Value::Uninitialized(pc as u16)),
            NEWARRAY => {
                self.pop_n(&mut s, 1, pc)?;
                let element = match read_u8(code, pc + 1)? {
                    4 => 'Z',
                    5 => 'C',
                    6 => 'F',
                    7 => 'D',
                    8 => 'B',
                    9 => 'S',
                    10 => 'I',
                    11 => 'J',
                    other => return Err(self.error(format!("newarray with unknown type {} at offset {}", other, pc))),
                };
                s.push(Value::Reference(format!("[{}", element)));
            }
            ANEWARRAY => {
                self.pop_n(&mut s, 1, pc)?;
                let name = self.pool.class_name(read_u16(code, pc + 1)?)?;
                let array = if name.starts_with('[') { format!("[{}", name) } else { format!("[L{};", name) };
                s.push(Value::Reference(array));
            }
            ARRAYLENGTH | INSTANCEOF => {
                self.pop_n(&mut s, 1, pc)?;
                s.push(Value::Integer);
            }
            CHECKCAST => {
                self.pop_n(&mut s, 1, pc)?;
                s.push(Value::Reference(self.pool.class_name(read_u16(code, pc + 1)?)?));
            }
            MULTIANEWARRAY => {
                let dims = read_u8(code, pc + 3)? as usize;
                self.pop_n(&mut s, dims, pc)?;
                s.push(Value::Reference(self.pool.class_name(read_u16(code, pc + 1)?)?));
            }
            WIDE => {
                let inner = read_u8(code, pc + 1)?;
                let index = read_u16(code, pc + 2)? as usize;
                match inner {
                    IINC => {}
                    ILOAD..=ALOAD => self.load(&mut s, inner, index, pc)?,
                    ISTORE..=ASTORE => self.store(&mut s, inner, index, pc)?,
                    other => return Err(self.error(format!("wide {} at offset {}", other, pc))),
                }
            }
            other => return Err(self.error(format!("unexpected opcode 0x{:02x} at offset {}", other, pc))),
        }
        Ok(s)
    }
}

/// Split `[[Lfoo;` into its dimension count and element descriptor
fn split_array(descriptor: &str) -> (usize, &str) {
    let element = descriptor.trim_start_matches('[');
    (descriptor.len() - element.len(), element)
}

fn class_of(element: &str) -> Option<&str> {
    element.strip_prefix('L').and_then(|e| e.strip_suffix(';'))
}

fn element_of(array: &Value) -> Value {
    match array {
        Value::Null => Value::Null,
        Value::Reference(descriptor) => match descriptor.strip_prefix('[') {
            Some(element) if element.starts_with('[') => Value::Reference(element.to_string()),
            Some(element) => class_of(element).map(|c| Value::Reference(c.to_string())).unwrap_or_else(Value::object),
            None => Value::object(),
        },
        _ => Value::object(),
    }
}

/// Drop the implicit second slot of long/double values; for locals also drop trailing tops
fn compress(values: &[Value], trim_tail: bool) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    let mut i = 0;
    while i < values.len() {
        let value = &values[i];
        out.push(value.clone());
        i += if value.is_wide() { 2 } else { 1 };
    }
    if trim_tail {
        while out.last() == Some(&Value::Top) {
            out.pop();
        }
    }
    out
}

fn verification_types(pool: &mut ConstantPool, values: &[Value]) -> Result<Vec<VerificationType>> {
    values
        .iter()
        .map(|value| {
            Ok(match value {
                Value::Top => VerificationType::Top,
                Value::Integer => VerificationType::Integer,
                Value::Float => VerificationType::Float,
                Value::Long => VerificationType::Long,
                Value::Double => VerificationType::Double,
                Value::Null => VerificationType::Null,
                Value::UninitializedThis => VerificationType::UninitializedThis,
                Value::Uninitialized(pc) => VerificationType::Uninitialized(*pc),
                Value::Reference(name) => VerificationType::Object(pool.add_class(name)?),
            })
        })
        .collect()
}

/// Maximal runs `[start, end)` of instructions that were never reached
fn dead_blocks(code: &[u8], states: &[Option<State>]) -> Result<Vec<(usize, usize)>> {
    let mut blocks = Vec::new();
    let mut open: Option<usize> = None;
    for pc in instruction_offsets(code)? {
        match (&states[pc], open) {
            (None, None) => open = Some(pc),
            (Some(_), Some(start)) => {
                blocks.push((start, pc));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        blocks.push((start, code.len()));
    }
    Ok(blocks)
}

/// Cut `ranges` out of every protected range, dropping entries that become empty
fn remove_ranges(table: &[ExceptionTableEntry], ranges: &[(usize, usize)]) -> Vec<ExceptionTableEntry> {
    let mut out = Vec::with_capacity(table.len());
    for entry in table {
        let end = entry.end_pc as usize;
        let mut start = entry.start_pc as usize;
        for &(dead_start, dead_end) in ranges {
            if dead_end <= start || dead_start >= end {
                continue;
            }
            if dead_start > start {
                out.push(ExceptionTableEntry { start_pc: start as u16, end_pc: dead_start as u16, ..*entry });
            }
            start = dead_end;
        }
        if start < end {
            out.push(ExceptionTableEntry { start_pc: start as u16, ..*entry });
        }
    }
    out
}
