//! The data decoder: typed constants and automatic detection.
//!
//! Every emitted constant records its byte length so finalization can
//! widen fields that later instruction operands address with a longer
//! length. The auto-detect mode partitions a slice into EBCDIC text and
//! binary runs; the "friendly form" thresholds (|n| <= 4096 renders as a
//! decimal halfword/fullword) are heuristic and kept as-is.

use crate::dsect::BaseBinding;
use crate::ebcdic;
use crate::engine::{hex_upper, Disassembler};
use crate::statement::Statement;
use crate::tags::DataType;

/// Longest character constant emitted on one line.
const CHAR_CHUNK: usize = 50;
/// Longest hex constant emitted on one line.
const HEX_CHUNK: usize = 12;
/// Friendly-form magnitude cutoff for decimal rendering.
const FRIENDLY_MAX: i64 = 4096;
/// Shortest printable run the auto-detector renders as text.
const TEXT_RUN_MIN: usize = 3;
/// How far the packed scan looks for a sign nibble.
const PACKED_SPAN: usize = 8;

/// Big-endian signed value of a 1-8 byte chunk.
fn signed_be(chunk: &[u8]) -> i64 {
    let mut value = 0i64;
    for &b in chunk {
        value = (value << 8) | i64::from(b);
    }
    let bits = 8 * chunk.len() as u32;
    if bits < 64 && value & (1 << (bits - 1)) != 0 {
        value - (1 << bits)
    } else {
        value
    }
}

/// Big-endian unsigned value of a 1-4 byte chunk.
fn unsigned_be(chunk: &[u8]) -> u32 {
    chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

impl Disassembler<'_> {
    /// Decodes one data slice under the current data type.
    pub(crate) fn decode_data(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.dtype {
            Some(DataType::Adcon) => self.data_adcon(bytes),
            Some(DataType::Bit) => self.data_bit(bytes),
            Some(DataType::Char) => self.data_char(bytes),
            Some(DataType::Full) => self.data_full(bytes),
            Some(DataType::Half) => self.data_half(bytes),
            Some(DataType::Packed) => self.data_packed(bytes),
            Some(DataType::Scon) => self.data_scon(bytes),
            Some(DataType::Hex) => self.data_hex(bytes),
            None => self.data_auto(bytes),
        }
    }

    /// Emits one `DC` statement and advances the location counter.
    fn emit_dc(&mut self, chunk: &[u8], operands: String, letter: char, comment: String) {
        let mut stmt = Statement::source(self.loc, "DC", operands, comment, hex_upper(chunk));
        stmt.format = letter.to_string();
        stmt.dc_len = Some(chunk.len() as u32);
        self.emit_source(stmt);
        self.loc += chunk.len() as u32;
    }

    /// `A` - address constants; referencing materializes target labels.
    fn data_adcon(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while bytes.len() - i >= 4 {
            let chunk = &bytes[i..i + 4];
            let target = unsigned_be(chunk);
            let label = self.labels.refer(target, self.loc, 0, "DC");
            let text = if self.loc % 4 == 0 {
                format!("A({label})")
            } else {
                format!("AL4({label})")
            };
            self.emit_dc(chunk, text, 'A', String::new());
            i += 4;
        }
        let rem = bytes.len() - i;
        if rem == 3 {
            let chunk = &bytes[i..];
            let target = unsigned_be(chunk);
            let label = self.labels.refer(target, self.loc, 0, "DC");
            self.emit_dc(chunk, format!("AL3({label})"), 'A', String::new());
        } else if rem > 0 {
            let chunk = &bytes[i..];
            let text = format!("AL{rem}({})", unsigned_be(chunk));
            self.emit_dc(chunk, text, 'A', String::new());
        }
    }

    /// `B` - one constant per byte.
    fn data_bit(&mut self, bytes: &[u8]) {
        for i in 0..bytes.len() {
            let chunk = &bytes[i..=i];
            self.emit_dc(chunk, format!("B'{:08b}'", chunk[0]), 'B', String::new());
        }
    }

    /// `C` - character lines with trailing-blank compression.
    fn data_char(&mut self, bytes: &[u8]) {
        for start in (0..bytes.len()).step_by(CHAR_CHUNK) {
            let chunk = &bytes[start..bytes.len().min(start + CHAR_CHUNK)];
            let kept = chunk.len() - chunk.iter().rev().take_while(|&&b| b == 0x40).count();
            let text = if kept < chunk.len() {
                let lit = ebcdic::to_literal(&chunk[..kept]);
                let lit = if lit.is_empty() { " ".to_string() } else { lit };
                format!("CL{}'{lit}'", chunk.len())
            } else {
                format!("C'{}'", ebcdic::to_literal(chunk))
            };
            self.emit_dc(chunk, text, 'C', String::new());
        }
    }

    /// `F` - fullwords, `F'dec'` only when aligned and whole.
    fn data_full(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let take = (bytes.len() - i).min(4);
            let chunk = &bytes[i..i + take];
            let value = signed_be(chunk);
            let text = if take == 4 && self.loc % 4 == 0 {
                format!("F'{value}'")
            } else {
                format!("FL{take}'{value}'")
            };
            self.emit_dc(chunk, text, 'F', String::new());
            i += take;
        }
    }

    /// `H` - halfwords, `H'dec'` only when aligned and whole.
    fn data_half(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let take = (bytes.len() - i).min(2);
            let chunk = &bytes[i..i + take];
            let value = signed_be(chunk);
            let text = if take == 2 && self.loc % 2 == 0 {
                format!("H'{value}'")
            } else {
                format!("HL{take}'{value}'")
            };
            self.emit_dc(chunk, text, 'H', String::new());
            i += take;
        }
    }

    /// `P` - packed decimal; falls back to binary when no sign nibble
    /// turns up within eight bytes.
    fn data_packed(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            match packed_scan(&bytes[i..]) {
                Some((take, text)) => {
                    let chunk = &bytes[i..i + take];
                    self.emit_dc(chunk, text, 'P', String::new());
                    i += take;
                }
                None => {
                    let rest = bytes[i..].to_vec();
                    self.data_friendly(&rest);
                    return;
                }
            }
        }
    }

    /// `S` - base+displacement constants; a run pointing at its own
    /// location collapses to `nS(*)`.
    fn data_scon(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i + 2 <= bytes.len() {
            let value = u16::from_be_bytes([bytes[i], bytes[i + 1]]);
            let base = (value >> 12) as u8;
            let disp = u32::from(value & 0xFFF);
            let here = self.loc;
            let target = match self.dsects.binding(base) {
                Some(&BaseBinding::Csect(b)) => Some(b.wrapping_add(disp)),
                _ => None,
            };
            if target == Some(here) {
                let mut n = 1;
                while i + 2 * (n + 1) <= bytes.len()
                    && bytes[i + 2 * n..i + 2 * n + 2] == bytes[i..i + 2]
                {
                    n += 1;
                }
                let text = if n > 1 {
                    format!("{n}S(*)")
                } else {
                    "S(*)".to_string()
                };
                let chunk = bytes[i..i + 2 * n].to_vec();
                self.emit_dc(&chunk, text, 'S', String::new());
                i += 2 * n;
            } else {
                let chunk = bytes[i..i + 2].to_vec();
                let text = format!("S(X'{disp:X}'(R{base}))");
                self.emit_dc(&chunk, text, 'S', String::new());
                i += 2;
            }
        }
        if i < bytes.len() {
            let chunk = bytes[i..].to_vec();
            let text = format!("AL1({})", chunk[0]);
            self.emit_dc(&chunk, text, 'S', String::new());
        }
    }

    /// `X` - raw hex in bounded chunks.
    fn data_hex(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(HEX_CHUNK) {
            let text = format!("XL{}'{}'", chunk.len(), hex_upper(chunk));
            self.emit_dc(chunk, text, 'X', String::new());
        }
    }

    /// Auto-detect: partition into printable and binary runs; printable
    /// runs of at least three bytes decode as text, everything else as
    /// friendly-form binary.
    fn data_auto(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let printable = ebcdic::is_printable(bytes[i]);
            let mut j = i + 1;
            while j < bytes.len() && ebcdic::is_printable(bytes[j]) == printable {
                j += 1;
            }
            if printable && j - i >= TEXT_RUN_MIN {
                let run = bytes[i..j].to_vec();
                self.data_char(&run);
                i = j;
                continue;
            }
            // Binary run; absorb following short printable runs too.
            let mut k = j;
            while k < bytes.len() {
                let p = ebcdic::is_printable(bytes[k]);
                let mut m = k + 1;
                while m < bytes.len() && ebcdic::is_printable(bytes[m]) == p {
                    m += 1;
                }
                if p && m - k >= TEXT_RUN_MIN {
                    break;
                }
                k = m;
            }
            let run = bytes[i..k].to_vec();
            self.data_friendly(&run);
            i = k;
        }
    }

    /// Alignment-aware fullword/halfword/hex rendering of binary data.
    ///
    /// Alignment is taken relative to the start of the run.
    pub(crate) fn data_friendly(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let rem = bytes.len() - i;
            if i % 4 == 0 && rem >= 4 {
                let word = [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];
                let value = i32::from_be_bytes(word);
                let halves_split = u32::from_be_bytes(word) & 0xFFFF_0000 == 0
                    || u32::from_be_bytes(word) & 0xFFFF == 0
                    || (word[1] == 0 && word[3] == 0);
                if i64::from(value).abs() <= FRIENDLY_MAX {
                    self.emit_dc(&word, format!("F'{value}'"), 'F', String::new());
                } else if halves_split {
                    self.friendly_half(&word[..2]);
                    self.friendly_half(&word[2..]);
                } else {
                    let text = format!("XL4'{}'", hex_upper(&word));
                    self.emit_dc(&word, text, 'X', String::new());
                }
                i += 4;
            } else if i % 2 == 0 && rem >= 2 {
                let pair = [bytes[i], bytes[i + 1]];
                self.friendly_half(&pair);
                i += 2;
            } else {
                let one = [bytes[i]];
                self.emit_dc(&one, format!("AL1({})", one[0]), 'A', String::new());
                i += 1;
            }
        }
    }

    fn friendly_half(&mut self, pair: &[u8]) {
        let value = i16::from_be_bytes([pair[0], pair[1]]);
        if i64::from(value).abs() <= FRIENDLY_MAX {
            self.emit_dc(pair, format!("H'{value}'"), 'H', String::new());
        } else {
            let text = format!("XL2'{}'", hex_upper(pair));
            self.emit_dc(pair, text, 'X', String::new());
        }
    }
}

/// Finds one packed-decimal constant at the front of `rest`.
///
/// The sign nibble (A-F) must be the low nibble of one of the first eight
/// bytes and every other nibble must be a decimal digit.
fn packed_scan(rest: &[u8]) -> Option<(usize, String)> {
    for (j, &byte) in rest.iter().take(PACKED_SPAN).enumerate() {
        let sign = byte & 0xF;
        if sign < 0xA {
            if byte >> 4 > 9 {
                return None;
            }
            continue;
        }
        let mut digits = String::new();
        for (k, &b) in rest[..=j].iter().enumerate() {
            let hi = b >> 4;
            if hi > 9 {
                return None;
            }
            digits.push(char::from(b'0' + hi));
            if k < j {
                let lo = b & 0xF;
                if lo > 9 {
                    return None;
                }
                digits.push(char::from(b'0' + lo));
            }
        }
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        let minus = if sign == 0xB || sign == 0xD { "-" } else { "" };
        return Some((j + 1, format!("PL{}'{minus}{digits}'", j + 1)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{packed_scan, signed_be, unsigned_be};

    #[test]
    fn signed_values_extend_from_chunk_width() {
        assert_eq!(signed_be(&[0x00, 0x22]), 0x22);
        assert_eq!(signed_be(&[0xFF, 0xFE]), -2);
        assert_eq!(signed_be(&[0xFF]), -1);
        assert_eq!(signed_be(&[0x00, 0x00, 0x00, 0x01]), 1);
        assert_eq!(signed_be(&[0x80, 0x00, 0x00, 0x00]), i64::from(i32::MIN));
    }

    #[test]
    fn unsigned_values() {
        assert_eq!(unsigned_be(&[0x01, 0x02]), 0x0102);
        assert_eq!(unsigned_be(&[0xFF]), 0xFF);
    }

    #[test]
    fn packed_scan_finds_sign_nibble() {
        // 19365C = +19365, three bytes.
        let (take, text) = packed_scan(&[0x19, 0x36, 0x5C]).expect("packed");
        assert_eq!(take, 3);
        assert_eq!(text, "PL3'19365'");
    }

    #[test]
    fn packed_scan_negative_and_zero() {
        let (take, text) = packed_scan(&[0x12, 0x3D]).expect("packed");
        assert_eq!(take, 2);
        assert_eq!(text, "PL2'-123'");
        let (_, text) = packed_scan(&[0x00, 0x0C]).expect("packed zero");
        assert_eq!(text, "PL2'0'");
    }

    #[test]
    fn packed_scan_rejects_bad_digits() {
        assert_eq!(packed_scan(&[0xA9, 0x36, 0x5C]), None);
        assert_eq!(packed_scan(&[0x19, 0xF6, 0x5C]), None);
    }

    #[test]
    fn packed_scan_gives_up_after_eight_bytes() {
        assert_eq!(packed_scan(&[0x11; 16]), None);
    }
}
