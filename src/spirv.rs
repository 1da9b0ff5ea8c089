use std::{
    fmt::{self, Debug},
    io::{self, Read, Write},
};

use smallvec::SmallVec;

/// SPIR-V magic number. First word of every module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Number of words in SPIR-V module header.
pub const SPIRV_HEADER_WORDS: usize = 5;

/// Opcodes this crate inspects.
pub mod op {
    pub const SOURCE_CONTINUED: u16 = 2;
    pub const SOURCE: u16 = 3;
    pub const SOURCE_EXTENSION: u16 = 4;
    pub const NAME: u16 = 5;
    pub const MEMBER_NAME: u16 = 6;
    pub const STRING: u16 = 7;
    pub const EXT_INST_IMPORT: u16 = 11;
    pub const LINE: u16 = 8;
    pub const DECORATE: u16 = 71;
    pub const NO_LINE: u16 = 317;
    pub const MODULE_PROCESSED: u16 = 330;
}

/// Decorations this crate rewrites.
pub mod decoration {
    pub const SPEC_ID: u32 = 1;
    pub const BINDING: u32 = 33;
    pub const DESCRIPTOR_SET: u32 = 34;
}

/// Error that may occur when SPIR-V code is validated.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidShader {
    #[error("Source is empty")]
    EmptySource,

    #[error("Source size is not multiple of 4 bytes")]
    SizeIsNotMultipleOfFour,

    #[error("Wrong spir-v magic. Expected 0x07230203, found 0x{found:x}")]
    WrongMagic { found: u32 },

    #[error("Spir-v header is truncated")]
    TruncatedHeader,

    #[error("Malformed spir-v instruction at word {offset}")]
    MalformedInstruction { offset: usize },
}

/// Error that may occur when SPIR-V code is read from a stream.
#[derive(Debug, thiserror::Error)]
pub enum ReadShaderError {
    #[error(transparent)]
    Io {
        #[from]
        source: io::Error,
    },

    #[error(transparent)]
    InvalidShader {
        #[from]
        source: InvalidShader,
    },
}

/// Validated SPIR-V word stream.
///
/// Header is guaranteed to be present and start with [`SPIRV_MAGIC`].
/// Instruction stream is validated lazily by operations that walk it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SpirvCode {
    words: Vec<u32>,
}

impl Debug for SpirvCode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("SpirvCode")
                .field("words", &self.words.len())
                .finish()
        } else {
            write!(fmt, "SpirvCode({} words)", self.words.len())
        }
    }
}

impl SpirvCode {
    /// Validates bytes and copies them into aligned words.
    /// Byte-swapped modules are converted into host order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidShader> {
        if bytes.is_empty() {
            return Err(InvalidShader::EmptySource);
        }

        if bytes.len() % 4 != 0 {
            return Err(InvalidShader::SizeIsNotMultipleOfFour);
        }

        let mut words = vec![0u32; bytes.len() / 4];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words).copy_from_slice(bytes);

        if words[0] == SPIRV_MAGIC.swap_bytes() {
            for word in &mut words {
                *word = word.swap_bytes();
            }
        }

        Self::from_words(words)
    }

    pub fn from_words(words: Vec<u32>) -> Result<Self, InvalidShader> {
        match words.first() {
            None => return Err(InvalidShader::EmptySource),
            Some(&SPIRV_MAGIC) => {}
            Some(&found) => return Err(InvalidShader::WrongMagic { found }),
        }

        if words.len() < SPIRV_HEADER_WORDS {
            return Err(InvalidShader::TruncatedHeader);
        }

        Ok(SpirvCode { words })
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    pub fn len_bytes(&self) -> usize {
        self.words.len() * 4
    }

    /// Iterates over instructions following the header.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            words: &self.words,
            offset: SPIRV_HEADER_WORDS,
        }
    }

    /// Rewrites literal of every `OpDecorate` with `Binding` or `SpecId` decoration.
    ///
    /// `map` receives the old literal and returns a new one.
    /// Literals for which `map` returns `None` are left untouched.
    /// Returns number of rewritten decorations.
    ///
    /// Instruction stream is validated before any word is modified,
    /// so on error the code is unchanged.
    pub fn remap_bindings<F>(&mut self, mut map: F) -> Result<usize, InvalidShader>
    where
        F: FnMut(u32) -> Option<u32>,
    {
        let mut literals = SmallVec::<[usize; 32]>::new();

        for instruction in self.instructions() {
            let instruction = instruction?;

            if instruction.opcode() != op::DECORATE || instruction.word_count() < 4 {
                continue;
            }

            match instruction.operand(1) {
                Some(decoration::BINDING) | Some(decoration::SPEC_ID) => {
                    literals.push(instruction.offset() + 3);
                }
                _ => {}
            }
        }

        let mut rewritten = 0;
        for index in literals {
            if let Some(new) = map(self.words[index]) {
                self.words[index] = new;
                rewritten += 1;
            }
        }

        Ok(rewritten)
    }

    /// Returns copy of the code without debug instructions.
    ///
    /// `OpString` is kept when a `NonSemantic.*` instruction set is imported,
    /// its extended instructions may reference the strings.
    pub fn strip_debug(&self) -> Result<SpirvCode, InvalidShader> {
        let mut keep_strings = false;
        for instruction in self.instructions() {
            let instruction = instruction?;
            if instruction.opcode() == op::EXT_INST_IMPORT
                && instruction.literal_string(1).starts_with(b"NonSemantic.")
            {
                keep_strings = true;
            }
        }

        let mut words = Vec::with_capacity(self.words.len());
        words.extend_from_slice(&self.words[..SPIRV_HEADER_WORDS]);

        for instruction in self.instructions() {
            let instruction = instruction?;
            let opcode = instruction.opcode();
            if !is_debug_opcode(opcode) || (keep_strings && opcode == op::STRING) {
                words.extend_from_slice(instruction.words());
            }
        }

        Ok(SpirvCode { words })
    }

    /// Writes code as little-endian bytes.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        if cfg!(target_endian = "little") {
            writer.write_all(self.as_bytes())
        } else {
            for word in &self.words {
                writer.write_all(&word.to_le_bytes())?;
            }
            Ok(())
        }
    }

    /// Reads whole stream and validates it as SPIR-V code.
    pub fn read_from(mut reader: impl Read) -> Result<Self, ReadShaderError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(SpirvCode::from_bytes(&bytes)?)
    }
}

fn is_debug_opcode(opcode: u16) -> bool {
    matches!(
        opcode,
        op::SOURCE_CONTINUED
            | op::SOURCE
            | op::SOURCE_EXTENSION
            | op::NAME
            | op::MEMBER_NAME
            | op::STRING
            | op::LINE
            | op::NO_LINE
            | op::MODULE_PROCESSED
    )
}

/// Single instruction of SPIR-V module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction<'a> {
    offset: usize,
    words: &'a [u32],
}

impl<'a> Instruction<'a> {
    /// Offset of the instruction in words from the module start.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn opcode(&self) -> u16 {
        (self.words[0] & 0xffff) as u16
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Returns operand with index `index`, not counting opcode word.
    pub fn operand(&self, index: usize) -> Option<u32> {
        self.words.get(index + 1).copied()
    }

    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Bytes of nul-terminated string literal starting at operand `index`,
    /// without the terminator.
    pub fn literal_string(&self, index: usize) -> Vec<u8> {
        self.words
            .iter()
            .skip(index + 1)
            .flat_map(|word| word.to_le_bytes())
            .take_while(|&byte| byte != 0)
            .collect()
    }
}

/// Iterator over SPIR-V instructions.
///
/// Yields an error once and stops if instruction stream is malformed.
#[derive(Clone, Debug)]
pub struct Instructions<'a> {
    words: &'a [u32],
    offset: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, InvalidShader>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        let first = *self.words.get(offset)?;
        let word_count = (first >> 16) as usize;

        if word_count == 0 || self.words.len() - offset < word_count {
            self.offset = self.words.len();
            return Some(Err(InvalidShader::MalformedInstruction { offset }));
        }

        self.offset += word_count;
        Some(Ok(Instruction {
            offset,
            words: &self.words[offset..offset + word_count],
        }))
    }
}
