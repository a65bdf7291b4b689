//! Binary encoding of [`DebugInfo`].
//!
//! The encoding is a byte stream of LEB128 integers and length-prefixed
//! UTF-8 strings:
//!
//! ```text
//! header     "OSDI" version:u8 code_section_offset:uleb
//! files      count { name:str }
//! methods    count { class:str name:str }
//! lines      count { start:sleb length method command_count { tag:u8 delta payload } }
//! flow       count { start:sleb length entry_count { delta flags:u8 [count { target:sleb }] } }
//! variables  count { name:str type:u8 slot start:uleb length }
//! layouts    count { tag:u8 payload }
//! ```
//!
//! Addresses are stored as deltas: a function's start relative to the end of
//! the previous function, commands and entries relative to the previous one,
//! branch targets relative to their entry. Files and methods are referenced
//! by index.

use std::{collections::HashMap, sync::Arc};

use crate::{
    debuginfo::{
        ClassLayout, ClassLayoutInfo, ControlFlowEntry, ControlFlowInfo, DebugInfo, FieldInfo,
        FieldType, FileInfo, FunctionControlFlow, LineInfo, LineInfoCommand, LineInfoSequence,
        MethodInfo, PrimitiveKind, TypeLayout, VariableInfo, VariableRangeInfo, VariableType,
        VariablesInfo,
    },
    Error, Result,
};

const MAGIC: &[u8; 4] = b"OSDI";
const VERSION: u8 = 1;

const CMD_ENTER: u8 = 0;
const CMD_EXIT: u8 = 1;
const CMD_FILE: u8 = 2;
const CMD_LINE: u8 = 3;

const FLAG_CALL: u8 = 0x01;

const LAYOUT_CLASS: u8 = 0;
const LAYOUT_INTERFACE: u8 = 1;
const LAYOUT_ARRAY: u8 = 2;
const LAYOUT_PRIMITIVE: u8 = 3;
const LAYOUT_UNKNOWN: u8 = 4;

const FIELD_OBJECT: u8 = 8;
const FIELD_ADDRESS: u8 = 9;

impl DebugInfo {
    /// Appends the binary encoding of `self` to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if a table is not in address order, which
    /// only happens for tables assembled by hand.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let strings = Strings::collect(self);

        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        write_uleb(out, u64::from(self.code_section_offset));

        write_len(out, strings.files.len());
        for file in &strings.files {
            write_string(out, &file.name);
        }
        write_len(out, strings.methods.len());
        for method in &strings.methods {
            write_string(out, &method.class_name);
            write_string(out, &method.name);
        }

        let sequences = self.line_info.sequences();
        write_len(out, sequences.len());
        let mut previous_end = 0;
        for sequence in sequences {
            write_span(out, previous_end, sequence.start_address, sequence.end_address)?;
            write_len(out, strings.method(&sequence.method));
            write_len(out, sequence.commands.len());
            let mut address = sequence.start_address;
            for command in &sequence.commands {
                let delta = forward(address, command.address())?;
                address = command.address();
                match command {
                    LineInfoCommand::EnterMethod { method, .. } => {
                        out.push(CMD_ENTER);
                        write_uleb(out, delta);
                        write_len(out, strings.method(method));
                    }
                    LineInfoCommand::ExitMethod { .. } => {
                        out.push(CMD_EXIT);
                        write_uleb(out, delta);
                    }
                    LineInfoCommand::File { file, line, .. } => {
                        out.push(CMD_FILE);
                        write_uleb(out, delta);
                        write_len(out, strings.file(file));
                        write_uleb(out, u64::from(*line));
                    }
                    LineInfoCommand::Line { line, .. } => {
                        out.push(CMD_LINE);
                        write_uleb(out, delta);
                        write_uleb(out, u64::from(*line));
                    }
                }
            }
            previous_end = sequence.end_address;
        }

        let functions = self.control_flow.functions();
        write_len(out, functions.len());
        let mut previous_end = 0;
        for function in functions {
            write_span(out, previous_end, function.start_address, function.end_address)?;
            write_len(out, function.entries().len());
            let mut address = function.start_address;
            for entry in function.entries() {
                write_uleb(out, forward(address, entry.address)?);
                address = entry.address;
                if entry.is_call {
                    out.push(FLAG_CALL);
                    continue;
                }
                out.push(0);
                write_len(out, entry.targets.len());
                for &target in &entry.targets {
                    write_sleb(out, i64::from(target) - i64::from(entry.address));
                }
            }
            previous_end = function.end_address;
        }

        let ranges = self.variables.ranges();
        write_len(out, ranges.len());
        let mut previous_start = 0;
        for range in ranges {
            write_string(out, &range.variable.name);
            out.push(range.variable.ty as u8);
            write_uleb(out, u64::from(range.variable.slot));
            write_uleb(out, forward(previous_start, range.start_address)?);
            write_uleb(out, forward(range.start_address, range.end_address)?);
            previous_start = range.start_address;
        }

        let layouts = self.class_layouts.layouts();
        write_len(out, layouts.len());
        for layout in layouts {
            write_layout(out, layout);
        }
        Ok(())
    }

    /// Decodes debug information written by [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if `data` is empty
    /// - [`Error::OutOfBounds`] if `data` is truncated
    /// - [`Error::NotSupported`] for an unknown format version
    /// - [`Error::Malformed`] for any other inconsistency, including
    ///   trailing bytes
    pub fn read(data: &[u8]) -> Result<DebugInfo> {
        if data.is_empty() {
            return Err(Error::Empty);
        }
        let mut reader = Reader::new(data);

        if reader.read_bytes(MAGIC.len())? != &MAGIC[..] {
            return Err(malformed_error!("Invalid debug-info signature"));
        }
        if reader.read_u8()? != VERSION {
            return Err(Error::NotSupported);
        }
        let code_section_offset = reader.read_uleb()?;

        let mut files = Vec::new();
        for _ in 0..reader.read_count()? {
            files.push(Arc::new(FileInfo::new(reader.read_string()?)));
        }
        let mut methods = Vec::new();
        for _ in 0..reader.read_count()? {
            let class_name = reader.read_string()?;
            let name = reader.read_string()?;
            methods.push(Arc::new(MethodInfo::new(class_name, name)));
        }

        let mut sequences = Vec::new();
        let mut previous_end = 0;
        for _ in 0..reader.read_count()? {
            let (start, end) = reader.read_span(previous_end)?;
            let method = reader.read_ref(&methods)?;
            let mut commands = Vec::new();
            let mut address = start;
            for _ in 0..reader.read_count()? {
                let tag = reader.read_u8()?;
                address = advance(address, reader.read_uleb()?)?;
                let command = match tag {
                    CMD_ENTER => LineInfoCommand::EnterMethod {
                        address,
                        method: reader.read_ref(&methods)?,
                    },
                    CMD_EXIT => LineInfoCommand::ExitMethod { address },
                    CMD_FILE => LineInfoCommand::File {
                        address,
                        file: reader.read_ref(&files)?,
                        line: reader.read_uleb()?,
                    },
                    CMD_LINE => LineInfoCommand::Line {
                        address,
                        line: reader.read_uleb()?,
                    },
                    _ => return Err(malformed_error!("Unknown line command {}", tag)),
                };
                commands.push(command);
            }
            sequences.push(LineInfoSequence::new(start, end, method, commands));
            previous_end = end;
        }

        let mut functions = Vec::new();
        let mut previous_end = 0;
        for _ in 0..reader.read_count()? {
            let (start, end) = reader.read_span(previous_end)?;
            let mut entries = Vec::new();
            let mut address = start;
            for _ in 0..reader.read_count()? {
                address = advance(address, reader.read_uleb()?)?;
                let flags = reader.read_u8()?;
                if flags & FLAG_CALL != 0 {
                    entries.push(ControlFlowEntry::call(address));
                    continue;
                }
                let mut targets = Vec::new();
                for _ in 0..reader.read_count()? {
                    targets.push(offset(address, reader.read_sleb()?)?);
                }
                entries.push(ControlFlowEntry::branch(address, targets));
            }
            functions.push(FunctionControlFlow::new(start, end, entries));
            previous_end = end;
        }

        let mut ranges = Vec::new();
        let mut previous_start = 0;
        for _ in 0..reader.read_count()? {
            let name = reader.read_string()?;
            let tag = reader.read_u8()?;
            let ty = VariableType::from_repr(tag)
                .ok_or_else(|| malformed_error!("Unknown variable type {}", tag))?;
            let slot = reader.read_uleb()?;
            let start = advance(previous_start, reader.read_uleb()?)?;
            let end = advance(start, reader.read_uleb()?)?;
            ranges.push(VariableRangeInfo {
                variable: Arc::new(VariableInfo::new(name, ty, slot)),
                start_address: start,
                end_address: end,
            });
            previous_start = start;
        }

        let mut layouts = Vec::new();
        for _ in 0..reader.read_count()? {
            layouts.push(reader.read_layout()?);
        }

        if reader.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after debug info",
                reader.remaining()
            ));
        }

        Ok(DebugInfo {
            code_section_offset,
            files,
            methods,
            line_info: LineInfo::new(sequences),
            control_flow: ControlFlowInfo::new(functions),
            variables: VariablesInfo::new(ranges),
            class_layouts: ClassLayoutInfo::new(layouts)?,
        })
    }
}

/// File and method tables for writing, seeded with the interned ones.
struct Strings {
    files: Vec<Arc<FileInfo>>,
    file_index: HashMap<String, usize>,
    methods: Vec<Arc<MethodInfo>>,
    method_index: HashMap<(String, String), usize>,
}

impl Strings {
    fn collect(info: &DebugInfo) -> Self {
        let mut strings = Strings {
            files: Vec::new(),
            file_index: HashMap::new(),
            methods: Vec::new(),
            method_index: HashMap::new(),
        };
        for file in &info.files {
            strings.intern_file(file);
        }
        for method in &info.methods {
            strings.intern_method(method);
        }
        for sequence in info.line_info.sequences() {
            strings.intern_method(&sequence.method);
            for command in &sequence.commands {
                match command {
                    LineInfoCommand::EnterMethod { method, .. } => strings.intern_method(method),
                    LineInfoCommand::File { file, .. } => strings.intern_file(file),
                    _ => {}
                }
            }
        }
        strings
    }

    fn intern_file(&mut self, file: &Arc<FileInfo>) {
        if !self.file_index.contains_key(&file.name) {
            self.file_index.insert(file.name.clone(), self.files.len());
            self.files.push(file.clone());
        }
    }

    fn intern_method(&mut self, method: &Arc<MethodInfo>) {
        let key = (method.class_name.clone(), method.name.clone());
        if !self.method_index.contains_key(&key) {
            self.method_index.insert(key, self.methods.len());
            self.methods.push(method.clone());
        }
    }

    fn file(&self, file: &FileInfo) -> usize {
        self.file_index.get(&file.name).copied().unwrap_or_default()
    }

    fn method(&self, method: &MethodInfo) -> usize {
        self.method_index
            .get(&(method.class_name.clone(), method.name.clone()))
            .copied()
            .unwrap_or_default()
    }
}

fn write_layout(out: &mut Vec<u8>, layout: &TypeLayout) {
    match layout {
        TypeLayout::Class(class) => {
            out.push(LAYOUT_CLASS);
            write_string(out, &class.name);
            write_uleb(out, u64::from(class.address));
            write_uleb(out, u64::from(class.size));
            write_len(out, class.super_class.map_or(0, |index| index + 1));
            for fields in [&class.fields, &class.static_fields] {
                write_len(out, fields.len());
                for field in fields {
                    write_string(out, &field.name);
                    write_uleb(out, u64::from(field.offset));
                    out.push(match field.ty {
                        FieldType::Primitive(kind) => kind as u8,
                        FieldType::Object => FIELD_OBJECT,
                        FieldType::Address => FIELD_ADDRESS,
                    });
                }
            }
        }
        TypeLayout::Interface { name, address } => {
            out.push(LAYOUT_INTERFACE);
            write_string(out, name);
            write_uleb(out, u64::from(*address));
        }
        TypeLayout::Array { address, element } => {
            out.push(LAYOUT_ARRAY);
            write_uleb(out, u64::from(*address));
            write_len(out, *element);
        }
        TypeLayout::Primitive { kind, address } => {
            out.push(LAYOUT_PRIMITIVE);
            out.push(*kind as u8);
            write_uleb(out, u64::from(*address));
        }
        TypeLayout::Unknown { address } => {
            out.push(LAYOUT_UNKNOWN);
            write_uleb(out, u64::from(*address));
        }
    }
}

fn write_span(out: &mut Vec<u8>, previous_end: u32, start: u32, end: u32) -> Result<()> {
    write_sleb(out, i64::from(start) - i64::from(previous_end));
    write_uleb(out, forward(start, end)?);
    Ok(())
}

fn forward(from: u32, to: u32) -> Result<u64> {
    to.checked_sub(from)
        .map(u64::from)
        .ok_or_else(|| malformed_error!("Address {:#x} precedes {:#x}", to, from))
}

fn advance(base: u32, delta: u32) -> Result<u32> {
    base.checked_add(delta)
        .ok_or_else(|| malformed_error!("Address {:#x} + {:#x} overflows", base, delta))
}

fn offset(base: u32, delta: i64) -> Result<u32> {
    i64::from(base)
        .checked_add(delta)
        .and_then(|address| u32::try_from(address).ok())
        .ok_or_else(|| malformed_error!("Address {:#x} {:+} out of range", base, delta))
}

fn write_len(out: &mut Vec<u8>, value: usize) {
    write_uleb(out, value as u64);
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_len(out, value.len());
    out.extend_from_slice(value.as_bytes());
}

/// Writes an unsigned LEB128 integer.
pub(crate) fn write_uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Writes a signed LEB128 integer.
pub(crate) fn write_sleb(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Cursor over encoded debug information.
struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, position: 0 }
    }

    fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(out_of_bounds_error!())?;
        self.position += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;
        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Reads an unsigned LEB128 integer of at most 32 bits.
    fn read_uleb(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7F);
            if shift == 28 && bits > 0x0F {
                return Err(malformed_error!(
                    "LEB128 integer overflow at offset {}",
                    self.position - 1
                ));
            }
            value |= bits << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                return Ok(value);
            }
            if shift >= 32 {
                return Err(malformed_error!(
                    "LEB128 integer overflow: value exceeds u32 capacity after {} bits",
                    shift
                ));
            }
        }
    }

    /// Reads a signed LEB128 integer of at most 64 bits.
    fn read_sleb(&mut self) -> Result<i64> {
        let mut value = 0i64;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;
            value |= i64::from(byte & 0x7F) << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    value |= -1i64 << shift;
                }
                return Ok(value);
            }
            if shift >= 64 {
                return Err(malformed_error!(
                    "Signed LEB128 integer overflow at offset {}",
                    self.position - 1
                ));
            }
        }
    }

    /// Reads an element count, rejecting counts larger than the input.
    fn read_count(&mut self) -> Result<usize> {
        let count = self.read_uleb()? as usize;
        if count > self.remaining() {
            return Err(out_of_bounds_error!());
        }
        Ok(count)
    }

    fn read_string(&mut self) -> Result<String> {
        let length = self.read_uleb()? as usize;
        let start = self.position;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                start,
                start + length,
                e.utf8_error()
            )
        })
    }

    fn read_ref<T>(&mut self, table: &[Arc<T>]) -> Result<Arc<T>> {
        let index = self.read_uleb()? as usize;
        table.get(index).cloned().ok_or_else(|| {
            malformed_error!("Index {} out of range for table of {}", index, table.len())
        })
    }

    fn read_span(&mut self, previous_end: u32) -> Result<(u32, u32)> {
        let start = offset(previous_end, self.read_sleb()?)?;
        let end = advance(start, self.read_uleb()?)?;
        Ok((start, end))
    }

    fn read_field_type(&mut self) -> Result<FieldType> {
        match self.read_u8()? {
            FIELD_OBJECT => Ok(FieldType::Object),
            FIELD_ADDRESS => Ok(FieldType::Address),
            tag => PrimitiveKind::from_repr(tag)
                .map(FieldType::Primitive)
                .ok_or_else(|| malformed_error!("Unknown field type {}", tag)),
        }
    }

    fn read_fields(&mut self) -> Result<Vec<FieldInfo>> {
        let mut fields = Vec::new();
        for _ in 0..self.read_count()? {
            let name = self.read_string()?;
            let offset = self.read_uleb()?;
            let ty = self.read_field_type()?;
            fields.push(FieldInfo::new(name, offset, ty));
        }
        Ok(fields)
    }

    fn read_layout(&mut self) -> Result<TypeLayout> {
        let tag = self.read_u8()?;
        let layout = match tag {
            LAYOUT_CLASS => {
                let name = self.read_string()?;
                let address = self.read_uleb()?;
                let size = self.read_uleb()?;
                let super_class = (self.read_uleb()? as usize).checked_sub(1);
                let fields = self.read_fields()?;
                let static_fields = self.read_fields()?;
                TypeLayout::Class(ClassLayout {
                    name,
                    address,
                    size,
                    super_class,
                    fields,
                    static_fields,
                })
            }
            LAYOUT_INTERFACE => TypeLayout::Interface {
                name: self.read_string()?,
                address: self.read_uleb()?,
            },
            LAYOUT_ARRAY => TypeLayout::Array {
                address: self.read_uleb()?,
                element: self.read_uleb()? as usize,
            },
            LAYOUT_PRIMITIVE => {
                let kind_tag = self.read_u8()?;
                let kind = PrimitiveKind::from_repr(kind_tag)
                    .ok_or_else(|| malformed_error!("Unknown primitive kind {}", kind_tag))?;
                TypeLayout::Primitive {
                    kind,
                    address: self.read_uleb()?,
                }
            }
            LAYOUT_UNKNOWN => TypeLayout::Unknown {
                address: self.read_uleb()?,
            },
            _ => return Err(malformed_error!("Unknown layout tag {}", tag)),
        };
        Ok(layout)
    }
}
