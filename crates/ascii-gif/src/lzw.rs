//! GIF-variant LZW encoder: hash-table string matching with linear
//! probing, variable code width, CLEAR/EOF control codes, and
//! 254-byte sub-block packaging.

use ascii_types::AsciiFrameError;

const HSIZE: usize = 5003;
const MAX_BITS: u16 = 12;
const MAX_CODE: u16 = (1 << MAX_BITS) - 1;
const SUBBLOCK_MAX: usize = 254;

const COMPONENT: &str = "LzwEncoder";

/// Packs variable-width codes into a little-endian bitstream, emitting
/// 254-byte GIF sub-blocks (each preceded by its length byte) as it
/// fills.
struct BitPacker {
    out: Vec<u8>,
    current_block: Vec<u8>,
    accum: u32,
    accum_bits: u32,
}

impl BitPacker {
    fn new() -> Self {
        BitPacker { out: Vec::new(), current_block: Vec::new(), accum: 0, accum_bits: 0 }
    }

    fn push_code(&mut self, code: u16, width: u16) {
        self.accum |= (code as u32) << self.accum_bits;
        self.accum_bits += width as u32;
        while self.accum_bits >= 8 {
            self.current_block.push((self.accum & 0xFF) as u8);
            self.accum >>= 8;
            self.accum_bits -= 8;
            if self.current_block.len() == SUBBLOCK_MAX {
                self.flush_block();
            }
        }
    }

    fn flush_block(&mut self) {
        if self.current_block.is_empty() {
            return;
        }
        self.out.push(self.current_block.len() as u8);
        self.out.append(&mut self.current_block);
    }

    fn finish(mut self) -> Vec<u8> {
        if self.accum_bits > 0 {
            self.current_block.push((self.accum & 0xFF) as u8);
        }
        self.flush_block();
        self.out.push(0); // block terminator
        self.out
    }
}

#[derive(Clone, Copy)]
struct TableEntry {
    prefix: i32,
    suffix: u8,
    code: u16,
}

/// Hash-and-linear-probe string table keyed on `(prefix_code, suffix_byte)`.
struct StringTable {
    slots: Vec<Option<TableEntry>>,
}

impl StringTable {
    fn new() -> Self {
        StringTable { slots: vec![None; HSIZE] }
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    fn hash(prefix: i32, suffix: u8) -> usize {
        let key = ((prefix as u32) << 8) ^ suffix as u32;
        (key as usize ^ (key as usize >> 13)) % HSIZE
    }

    fn find(&self, prefix: i32, suffix: u8) -> Option<u16> {
        let start = Self::hash(prefix, suffix);
        for offset in 0..HSIZE {
            let i = (start + offset) % HSIZE;
            match self.slots[i] {
                None => return None,
                Some(entry) if entry.prefix == prefix && entry.suffix == suffix => {
                    return Some(entry.code)
                }
                _ => continue,
            }
        }
        None
    }

    fn insert(&mut self, prefix: i32, suffix: u8, code: u16) {
        let start = Self::hash(prefix, suffix);
        for offset in 0..HSIZE {
            let i = (start + offset) % HSIZE;
            if self.slots[i].is_none() {
                self.slots[i] = Some(TableEntry { prefix, suffix, code });
                return;
            }
        }
    }
}

/// LZW-compresses a stream of palette indices into sub-blocked GIF
/// image data, prefixed by the minimum code size byte.
pub fn encode(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>, AsciiFrameError> {
    if !(2..=8).contains(&min_code_size) {
        return Err(AsciiFrameError::encode(
            COMPONENT,
            format!("min_code_size must be in 2..=8, got {min_code_size}"),
        ));
    }

    let clear_code: u16 = 1 << min_code_size;
    let eof_code: u16 = clear_code + 1;
    let mut next_code: u16 = eof_code + 1;
    let mut code_width: u16 = min_code_size as u16 + 1;

    let mut table = StringTable::new();
    let mut packer = BitPacker::new();

    let mut out = Vec::new();
    out.push(min_code_size);

    packer.push_code(clear_code, code_width);

    if indices.is_empty() {
        packer.push_code(eof_code, code_width);
        out.extend(packer.finish());
        return Ok(out);
    }

    let mut prefix: i32 = indices[0] as i32;

    for &byte in &indices[1..] {
        if let Some(code) = table.find(prefix, byte) {
            prefix = code as i32;
            continue;
        }

        packer.push_code(prefix as u16, code_width);

        if next_code > MAX_CODE {
            packer.push_code(clear_code, code_width);
            table.clear();
            next_code = eof_code + 1;
            code_width = min_code_size as u16 + 1;
        } else {
            table.insert(prefix, byte, next_code);
            if next_code == (1 << code_width) && code_width < MAX_BITS {
                code_width += 1;
            }
            next_code += 1;
        }

        prefix = byte as i32;
    }

    packer.push_code(prefix as u16, code_width);
    packer.push_code(eof_code, code_width);

    out.extend(packer.finish());
    Ok(out)
}
