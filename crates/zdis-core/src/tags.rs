//! Input scanning and annotation parsing.
//!
//! The input is a character stream of hex digits, whitespace, action
//! characters, and parenthesized tag groups. Scanning is line-oriented:
//! three or more consecutive blanks terminate a line's significant
//! content. Hex runs merge across whitespace and line breaks until an
//! action character or tag group splits them.

/// Data constant types selectable by tag letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `A` - address constants.
    Adcon,
    /// `B` - bit constants.
    Bit,
    /// `C` - character data.
    Char,
    /// `F` - fullwords.
    Full,
    /// `H` - halfwords.
    Half,
    /// `P` - packed decimal.
    Packed,
    /// `S` - S-type address constants.
    Scon,
    /// `X` - raw hex.
    Hex,
}

impl DataType {
    /// The tag letter for this type.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Adcon => 'A',
            Self::Bit => 'B',
            Self::Char => 'C',
            Self::Full => 'F',
            Self::Half => 'H',
            Self::Packed => 'P',
            Self::Scon => 'S',
            Self::Hex => 'X',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        Some(match c {
            'A' => Self::Adcon,
            'B' => Self::Bit,
            'C' => Self::Char,
            'F' => Self::Full,
            'H' => Self::Half,
            'P' => Self::Packed,
            'S' => Self::Scon,
            'X' => Self::Hex,
            _ => return None,
        })
    }
}

/// Steering action characters interleaved with the hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `,` - enter CODE mode and reset the data type.
    Code,
    /// `.` - enter DATA mode, keeping the current data type.
    Data,
    /// `/` - enter DATA mode and reset the data type.
    DataReset,
    /// `|` - keep the current mode, suppress the auto-label.
    Bare,
}

/// What a `USING` tag binds against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsingTarget {
    /// The current location (`USING *`).
    Here,
    /// An explicit hex offset.
    Loc(u32),
    /// A named label.
    Label(String),
}

/// One parsed tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// Empty tag: reset the data type, switch to DATA mode.
    Reset,
    /// Data-type letter: set the type, switch to DATA mode.
    Type(DataType),
    /// `"text"` - boxed section banner at the current location.
    Banner(String),
    /// `'text'` - short dashed comment block at the current location.
    Note(String),
    /// `@hex` - relocate the location counter.
    Org(u32),
    /// `Rn[+Rm..]` with an optional `=` target - bind base registers.
    Using {
        /// Registers in binding order.
        regs: Vec<u8>,
        /// Binding target.
        target: UsingTarget,
    },
    /// `Rn[+Rm..]=` - unbind base registers.
    Drop {
        /// Registers to unbind.
        regs: Vec<u8>,
    },
    /// `Rn[+Rm..]=>name['desc']` - bind registers to a DSECT.
    DsectBind {
        /// Registers in binding order.
        regs: Vec<u8>,
        /// DSECT name.
        name: String,
        /// Optional description.
        desc: Option<String>,
    },
    /// Bare label or `label=hex` definition.
    Define {
        /// The label name.
        name: String,
        /// Explicit location; the current location when `None`.
        loc: Option<u32>,
    },
}

impl Tag {
    /// Parses one raw tag string.
    ///
    /// # Errors
    ///
    /// Returns the offending text when the tag matches no known form.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(Self::Reset);
        }
        if text.len() == 1 {
            if let Some(t) = DataType::from_letter(text.chars().next().unwrap_or(' ')) {
                return Ok(Self::Type(t));
            }
        }
        if let Some(body) = text.strip_prefix('"') {
            return Ok(Self::Banner(body.strip_suffix('"').unwrap_or(body).to_string()));
        }
        if let Some(body) = text.strip_prefix('\'') {
            return Ok(Self::Note(body.strip_suffix('\'').unwrap_or(body).to_string()));
        }
        if let Some(body) = text.strip_prefix('@') {
            return u32::from_str_radix(body, 16)
                .map(Self::Org)
                .map_err(|_| format!("bad ORG offset: {text}"));
        }
        if let Some((left, right)) = text.split_once("=>") {
            let regs = parse_registers(left).ok_or_else(|| format!("bad register list: {text}"))?;
            let (name, desc) = match right.split_once('\'') {
                Some((n, d)) => (n, Some(d.strip_suffix('\'').unwrap_or(d).to_string())),
                None => (right, None),
            };
            if name.is_empty() || !is_label(name) {
                return Err(format!("bad DSECT name: {text}"));
            }
            return Ok(Self::DsectBind {
                regs,
                name: name.to_string(),
                desc,
            });
        }
        if let Some((left, right)) = text.split_once('=') {
            if let Some(regs) = parse_registers(left) {
                if right.is_empty() {
                    return Ok(Self::Drop { regs });
                }
                let target = match u32::from_str_radix(right, 16) {
                    Ok(loc) => UsingTarget::Loc(loc),
                    Err(_) if is_label(right) => UsingTarget::Label(right.to_string()),
                    Err(_) => return Err(format!("bad USING target: {text}")),
                };
                return Ok(Self::Using { regs, target });
            }
            if is_label(left) {
                return u32::from_str_radix(right, 16)
                    .map(|loc| Self::Define {
                        name: left.to_string(),
                        loc: Some(loc),
                    })
                    .map_err(|_| format!("bad label offset: {text}"));
            }
            return Err(format!("unrecognized tag: {text}"));
        }
        if let Some(regs) = parse_registers(text) {
            return Ok(Self::Using {
                regs,
                target: UsingTarget::Here,
            });
        }
        if is_label(text) {
            return Ok(Self::Define {
                name: text.to_string(),
                loc: None,
            });
        }
        Err(format!("unrecognized tag: {text}"))
    }
}

/// Parses `Rn[+Rm..]` into register numbers.
fn parse_registers(text: &str) -> Option<Vec<u8>> {
    let mut regs = Vec::new();
    for part in text.split('+') {
        let digits = part.strip_prefix('R').or_else(|| part.strip_prefix('r'))?;
        let n: u8 = digits.parse().ok()?;
        if n > 15 {
            return None;
        }
        regs.push(n);
    }
    if regs.is_empty() {
        None
    } else {
        Some(regs)
    }
}

/// Valid assembler label: letter or national character first, then
/// alphanumerics, nationals, or underscores.
fn is_label(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let national = |c: char| matches!(c, '#' | '$' | '@');
    (first.is_ascii_alphabetic() || national(first))
        && chars.all(|c| c.is_ascii_alphanumeric() || national(c) || c == '_')
}

/// One scanned input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    /// A maximal hex run (whitespace removed, case preserved).
    Hex(String),
    /// An action character.
    Action(Action),
    /// The raw tags of one parenthesized group, comma-split.
    Tags(Vec<String>),
    /// A word that is neither hex nor annotation.
    Junk(String),
}

/// Scans annotated input into items.
///
/// Whitespace joins adjacent hex; three or more consecutive blanks cut a
/// line short; quoted tag text keeps its blanks and commas.
#[must_use]
pub fn scan(input: &str) -> Vec<ScanItem> {
    let mut items = Vec::new();
    let mut hex = String::new();
    let mut word = String::new();

    let flush_word = |items: &mut Vec<ScanItem>, hex: &mut String, word: &mut String| {
        if word.is_empty() {
            return;
        }
        if word.chars().all(|c| c.is_ascii_hexdigit()) {
            hex.push_str(word);
        } else {
            if !hex.is_empty() {
                items.push(ScanItem::Hex(std::mem::take(hex)));
            }
            items.push(ScanItem::Junk(std::mem::take(word)));
        }
        word.clear();
    };
    let flush_hex = |items: &mut Vec<ScanItem>, hex: &mut String| {
        if !hex.is_empty() {
            items.push(ScanItem::Hex(std::mem::take(hex)));
        }
    };

    for line in input.lines() {
        let line = significant(line);
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                ',' | '.' | '/' | '|' => {
                    flush_word(&mut items, &mut hex, &mut word);
                    flush_hex(&mut items, &mut hex);
                    items.push(ScanItem::Action(match c {
                        ',' => Action::Code,
                        '.' => Action::Data,
                        '/' => Action::DataReset,
                        _ => Action::Bare,
                    }));
                }
                '(' => {
                    flush_word(&mut items, &mut hex, &mut word);
                    flush_hex(&mut items, &mut hex);
                    items.push(ScanItem::Tags(scan_group(&mut chars)));
                }
                c if c.is_whitespace() => flush_word(&mut items, &mut hex, &mut word),
                c => word.push(c),
            }
        }
        flush_word(&mut items, &mut hex, &mut word);
    }
    flush_word(&mut items, &mut hex, &mut word);
    flush_hex(&mut items, &mut hex);
    items
}

/// Cuts a line at the first run of three or more blanks outside quoted
/// tag text (a vendor report artifact terminates significant content).
fn significant(line: &str) -> &str {
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut blanks = 0;
    for (idx, c) in line.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            blanks = 0;
            continue;
        }
        match c {
            '(' => {
                depth += 1;
                blanks = 0;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                blanks = 0;
            }
            '\'' | '"' if depth > 0 => {
                quote = Some(c);
                blanks = 0;
            }
            ' ' => {
                blanks += 1;
                if blanks == 3 {
                    return &line[..idx - 2];
                }
            }
            _ => blanks = 0,
        }
    }
    line
}

/// Consumes a tag group up to its closing parenthesis, splitting on
/// commas outside quotes. Blanks survive only inside quotes.
fn scan_group(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Vec<String> {
    let mut tags = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in chars.by_ref() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                ')' => {
                    tags.push(current);
                    return tags;
                }
                ',' => tags.push(std::mem::take(&mut current)),
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                c if c.is_whitespace() => {}
                c => current.push(c),
            },
        }
    }
    tags.push(current);
    tags
}
