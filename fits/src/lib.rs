// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

//! Reading and writing the narrow subset of FITS binary tables used by the
//! mcal catalog collation tools.
//!
//! This is not a general FITS library. It reads the first `BINTABLE`
//! extension of a file into an in-memory [`Table`], optionally restricted
//! to named columns or explicit row indices, and it writes a single-table
//! file through a streaming, appending [`TableWriter`]. Scalar integer and
//! float columns, fixed-width vector columns, and `TDIMn` matrix columns
//! are supported; anything fancier is rejected up front.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use mcal_core::table::{Column, Table};
use ndarray::{Array2, Array3, Axis};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// FITS files are structured in fixed-size blocks of this many bytes.
pub const BLOCK_SIZE: usize = 2880;

const CARD_SIZE: usize = 80;
const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// An error type for malformed or mismatched FITS table files.
#[derive(Error, Debug)]
pub enum FitsFormatError {
    /// A catch-all for structural problems in the byte stream.
    #[error("{0}")]
    Generic(String),

    /// An appended batch's schema differed from the schema the table was
    /// created with.
    #[error("appended table schema does not match the schema the file was created with")]
    SchemaMismatch,

    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Header bytes that should have been ASCII text were not.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

macro_rules! fitserr {
    ($( $fmt_args:expr ),*) => {
        Err(FitsFormatError::Generic(format!($( $fmt_args ),*)))
    }
}

// Header cards.

/// The value of a single 80-byte header card.
#[derive(Clone, Debug, PartialEq)]
enum CardValue {
    /// A fixed-format logical value.
    Logical(bool),

    /// A fixed-format integer value.
    Integer(i64),

    /// A quoted string value, with trailing blanks removed.
    Str(String),

    /// No value: a commentary card, a blank card, or `END`.
    None,
}

fn format_card(key: &str, value: &CardValue) -> Result<[u8; CARD_SIZE], FitsFormatError> {
    let mut card = [b' '; CARD_SIZE];

    if key.len() > 8
        || !key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        return fitserr!("illegal FITS header keyword \"{}\"", key);
    }

    card[..key.len()].copy_from_slice(key.as_bytes());

    match value {
        CardValue::None => {}

        CardValue::Logical(b) => {
            card[8] = b'=';
            card[29] = if *b { b'T' } else { b'F' };
        }

        CardValue::Integer(n) => {
            card[8] = b'=';
            let text = format!("{:>20}", n);
            card[10..30].copy_from_slice(text.as_bytes());
        }

        CardValue::Str(s) => {
            card[8] = b'=';

            if !s.bytes().all(|b| (0x20..=0x7E).contains(&b) && b != b'\'') {
                return fitserr!("unrepresentable header string value {:?}", s);
            }

            // string values are blank-padded to at least eight characters
            let text = format!("'{:<8}'", s);

            if text.len() > CARD_SIZE - 10 {
                return fitserr!("header string value {:?} is too long", s);
            }

            card[10..10 + text.len()].copy_from_slice(text.as_bytes());
        }
    }

    Ok(card)
}

fn parse_card(card: &[u8]) -> Result<(String, CardValue), FitsFormatError> {
    let key = std::str::from_utf8(&card[..8])?.trim_end().to_owned();

    if card[8] != b'=' || card[9] != b' ' {
        return Ok((key, CardValue::None));
    }

    let text = std::str::from_utf8(&card[10..])?;
    let trimmed = text.trim_start();

    if let Some(inner) = trimmed.strip_prefix('\'') {
        let end = match inner.find('\'') {
            Some(i) => i,
            None => return fitserr!("unterminated string value in header card {}", key),
        };

        return Ok((key, CardValue::Str(inner[..end].trim_end().to_owned())));
    }

    let valpart = match text.find('/') {
        Some(i) => &text[..i],
        None => text,
    };

    let value = match valpart.trim() {
        "" => CardValue::None,
        "T" => CardValue::Logical(true),
        "F" => CardValue::Logical(false),
        other => match other.parse::<i64>() {
            Ok(n) => CardValue::Integer(n),
            Err(_) => {
                return fitserr!("cannot parse header value \"{}\" for keyword {}", other, key);
            }
        },
    };

    Ok((key, value))
}

fn header_int(cards: &[(String, CardValue)], key: &str) -> Result<i64, FitsFormatError> {
    for (k, v) in cards {
        if k == key {
            if let CardValue::Integer(n) = v {
                return Ok(*n);
            }

            return fitserr!("header keyword {} should have an integer value", key);
        }
    }

    fitserr!("required header keyword {} is missing", key)
}

fn header_int_or(cards: &[(String, CardValue)], key: &str, default: i64) -> i64 {
    for (k, v) in cards {
        if k == key {
            if let CardValue::Integer(n) = v {
                return *n;
            }
        }
    }

    default
}

fn header_str<'a>(
    cards: &'a [(String, CardValue)],
    key: &str,
) -> Result<&'a str, FitsFormatError> {
    for (k, v) in cards {
        if k == key {
            if let CardValue::Str(s) = v {
                return Ok(s);
            }

            return fitserr!("header keyword {} should have a string value", key);
        }
    }

    fitserr!("required header keyword {} is missing", key)
}

// Column layout.

/// Storage type of one binary-table column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FitsType {
    I32,
    I64,
    F32,
    F64,
    Text,
}

impl FitsType {
    fn from_code(code: char) -> Result<Self, FitsFormatError> {
        match code {
            'J' => Ok(FitsType::I32),
            'K' => Ok(FitsType::I64),
            'E' => Ok(FitsType::F32),
            'D' => Ok(FitsType::F64),
            'A' => Ok(FitsType::Text),
            other => fitserr!("unsupported TFORM type code '{}'", other),
        }
    }

    fn code(self) -> char {
        match self {
            FitsType::I32 => 'J',
            FitsType::I64 => 'K',
            FitsType::F32 => 'E',
            FitsType::F64 => 'D',
            FitsType::Text => 'A',
        }
    }

    fn n_bytes(self) -> usize {
        match self {
            FitsType::I32 => 4,
            FitsType::I64 => 8,
            FitsType::F32 => 4,
            FitsType::F64 => 8,
            FitsType::Text => 1,
        }
    }
}

/// Layout of one column as declared by the TTYPE/TFORM/TDIM headers.
#[derive(Clone, Debug, PartialEq)]
struct ColSpec {
    name: String,
    ftype: FitsType,
    repeat: usize,
    dims: Option<(usize, usize)>,
}

impl ColSpec {
    fn n_bytes(&self) -> usize {
        self.repeat * self.ftype.n_bytes()
    }

    fn tform(&self) -> String {
        format!("{}{}", self.repeat, self.ftype.code())
    }

    fn parse_tform(text: &str) -> Result<(usize, FitsType), FitsFormatError> {
        let text = text.trim();
        let split = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
        let (digits, code) = text.split_at(split);

        let mut chars = code.chars();
        let code = match chars.next() {
            Some(c) => c,
            None => return fitserr!("malformed TFORM value \"{}\"", text),
        };

        // anything after the type code is an option we don't support
        if chars.next().is_some() {
            return fitserr!("unsupported TFORM value \"{}\"", text);
        }

        let repeat = if digits.is_empty() {
            1
        } else {
            match digits.parse::<usize>() {
                Ok(n) => n,
                Err(_) => return fitserr!("malformed TFORM repeat count in \"{}\"", text),
            }
        };

        Ok((repeat, FitsType::from_code(code)?))
    }

    fn parse_tdim(text: &str) -> Result<(usize, usize), FitsFormatError> {
        let inner = text
            .trim()
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'));

        let parts: Option<Vec<usize>> = inner.and_then(|t| {
            t.split(',')
                .map(|p| p.trim().parse::<usize>().ok())
                .collect::<Option<Vec<usize>>>()
        });

        match parts.as_deref() {
            Some(&[d0, d1]) => Ok((d0, d1)),
            _ => fitserr!("unsupported TDIM value \"{}\"", text),
        }
    }
}

// Reading.

struct BlockReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read + Seek> BlockReader<R> {
    fn new(inner: R) -> Self {
        BlockReader { inner, pos: 0 }
    }

    /// Read one full block. Returns Ok(false) on a clean EOF at a block
    /// boundary; EOF mid-block is an error.
    fn read_block(&mut self, buf: &mut [u8; BLOCK_SIZE]) -> Result<bool, FitsFormatError> {
        let mut ofs = 0;

        while ofs < BLOCK_SIZE {
            let n = match self.inner.read(&mut buf[ofs..]) {
                Ok(n) => n,
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }

                    return Err(e.into());
                }
            };

            if n == 0 {
                if ofs == 0 {
                    return Ok(false);
                }

                return fitserr!("truncated FITS file");
            }

            ofs += n;
        }

        self.pos += BLOCK_SIZE as u64;
        Ok(true)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FitsFormatError> {
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn seek_to(&mut self, pos: u64) -> Result<(), FitsFormatError> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Read header cards up to END. Returns None on a clean EOF before the
    /// first block.
    fn read_header(&mut self) -> Result<Option<Vec<(String, CardValue)>>, FitsFormatError> {
        let mut buf = [0u8; BLOCK_SIZE];

        if !self.read_block(&mut buf)? {
            return Ok(None);
        }

        let mut cards = Vec::new();

        loop {
            for i in 0..CARDS_PER_BLOCK {
                let (key, value) = parse_card(&buf[i * CARD_SIZE..(i + 1) * CARD_SIZE])?;

                if key == "END" {
                    return Ok(Some(cards));
                }

                if key.is_empty() {
                    continue;
                }

                cards.push((key, value));
            }

            if !self.read_block(&mut buf)? {
                return fitserr!("FITS header is missing its END card");
            }
        }
    }
}

fn padded(nbytes: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (nbytes + block - 1) / block * block
}

/// The size in bytes of the data area following an already-parsed header.
fn hdu_data_size(cards: &[(String, CardValue)]) -> Result<u64, FitsFormatError> {
    let bitpix = header_int(cards, "BITPIX")?;
    let naxis = header_int(cards, "NAXIS")?;

    if !(0..=999).contains(&naxis) {
        return fitserr!("unsupported NAXIS value {}", naxis);
    }

    let mut prod: u64 = if naxis == 0 { 0 } else { 1 };

    for i in 1..=naxis {
        let n = header_int(cards, &format!("NAXIS{}", i))?;

        if n < 0 {
            return fitserr!("illegal negative NAXIS{} value {}", i, n);
        }

        prod *= n as u64;
    }

    let pcount = header_int_or(cards, "PCOUNT", 0);
    let gcount = header_int_or(cards, "GCOUNT", 1);

    if pcount < 0 || gcount < 1 {
        return fitserr!("illegal PCOUNT/GCOUNT values");
    }

    Ok((bitpix.unsigned_abs() / 8) * gcount as u64 * (pcount as u64 + prod))
}

/// Read the first binary-table extension of a FITS file into a [`Table`].
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table, FitsFormatError> {
    read_table_selection(path, None, None)
}

/// Read only the named columns of the first binary-table extension.
pub fn read_table_columns<P: AsRef<Path>>(
    path: P,
    columns: &[&str],
) -> Result<Table, FitsFormatError> {
    read_table_selection(path, Some(columns), None)
}

/// Read only the given rows (in the given order) of the first binary-table
/// extension.
pub fn read_table_rows<P: AsRef<Path>>(path: P, rows: &[u64]) -> Result<Table, FitsFormatError> {
    read_table_selection(path, None, Some(rows))
}

/// Read the first binary-table extension, optionally restricted to named
/// columns and/or explicit row indices.
pub fn read_table_selection<P: AsRef<Path>>(
    path: P,
    columns: Option<&[&str]>,
    rows: Option<&[u64]>,
) -> Result<Table, FitsFormatError> {
    let file = File::open(path)?;
    let mut reader = BlockReader::new(BufReader::new(file));

    let cards = match reader.read_header()? {
        Some(cards) => cards,
        None => return fitserr!("empty FITS file"),
    };

    match cards.first() {
        Some((key, CardValue::Logical(true))) if key == "SIMPLE" => {}
        _ => return fitserr!("stream does not begin with a FITS primary header"),
    }

    reader.seek_to(reader.pos + padded(hdu_data_size(&cards)?))?;

    loop {
        let cards = match reader.read_header()? {
            Some(cards) => cards,
            None => return fitserr!("no binary-table extension found"),
        };

        let xtension = match cards.first() {
            Some((key, CardValue::Str(s))) if key == "XTENSION" => s.clone(),
            _ => return fitserr!("extension HDU does not begin with XTENSION"),
        };

        let data_start = reader.pos;
        let data_size = hdu_data_size(&cards)?;

        if xtension == "BINTABLE" {
            return decode_bintable(&mut reader, &cards, data_start, columns, rows);
        }

        reader.seek_to(data_start + padded(data_size))?;
    }
}

/// Accumulates one column's values as rows stream by.
enum Acc {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Str(Vec<String>),
    VecI32 { data: Vec<i32>, width: usize },
    VecF64 { data: Vec<f64>, width: usize },
    MatF64 { data: Vec<f64>, d0: usize, d1: usize },
}

fn make_acc(spec: &ColSpec) -> Result<Acc, FitsFormatError> {
    match (spec.ftype, spec.repeat, spec.dims) {
        (FitsType::Text, _, None) => Ok(Acc::Str(Vec::new())),

        (FitsType::I32, 1, None) => Ok(Acc::I32(Vec::new())),
        (FitsType::I64, 1, None) => Ok(Acc::I64(Vec::new())),
        (FitsType::F32, 1, None) | (FitsType::F64, 1, None) => Ok(Acc::F64(Vec::new())),

        (FitsType::I32, w, None) => Ok(Acc::VecI32 {
            data: Vec::new(),
            width: w,
        }),

        (FitsType::F32, w, None) | (FitsType::F64, w, None) => Ok(Acc::VecF64 {
            data: Vec::new(),
            width: w,
        }),

        (FitsType::F64, r, Some((d0, d1))) if d0 * d1 == r => Ok(Acc::MatF64 {
            data: Vec::new(),
            d0,
            d1,
        }),

        _ => fitserr!(
            "column \"{}\": unsupported layout {}{:?}",
            spec.name,
            spec.tform(),
            spec.dims
        ),
    }
}

fn read_float(ftype: FitsType, chunk: &[u8]) -> f64 {
    match ftype {
        FitsType::F32 => BigEndian::read_f32(chunk) as f64,
        _ => BigEndian::read_f64(chunk),
    }
}

fn decode_row(specs: &[ColSpec], accs: &mut [Option<Acc>], buf: &[u8]) {
    let mut ofs = 0;

    for (spec, acc) in specs.iter().zip(accs.iter_mut()) {
        let nbytes = spec.n_bytes();

        if let Some(acc) = acc {
            let field = &buf[ofs..ofs + nbytes];
            let width = spec.ftype.n_bytes();

            match acc {
                Acc::I32(v) => v.push(BigEndian::read_i32(field)),
                Acc::I64(v) => v.push(BigEndian::read_i64(field)),
                Acc::F64(v) => v.push(read_float(spec.ftype, field)),

                Acc::Str(v) => {
                    let text: String = field
                        .iter()
                        .map(|&b| if b.is_ascii() { b as char } else { '?' })
                        .collect();
                    v.push(text.trim_end_matches(|c| c == ' ' || c == '\0').to_owned());
                }

                Acc::VecI32 { data, .. } => {
                    for chunk in field.chunks(width) {
                        data.push(BigEndian::read_i32(chunk));
                    }
                }

                Acc::VecF64 { data, .. } | Acc::MatF64 { data, .. } => {
                    for chunk in field.chunks(width) {
                        data.push(read_float(spec.ftype, chunk));
                    }
                }
            }
        }

        ofs += nbytes;
    }
}

fn decode_bintable<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    cards: &[(String, CardValue)],
    data_start: u64,
    columns: Option<&[&str]>,
    rows: Option<&[u64]>,
) -> Result<Table, FitsFormatError> {
    if header_int(cards, "NAXIS")? != 2 {
        return fitserr!("binary table extension should have NAXIS = 2");
    }

    let row_bytes = header_int(cards, "NAXIS1")? as usize;
    let n_rows = header_int(cards, "NAXIS2")? as u64;
    let tfields = header_int(cards, "TFIELDS")?;

    let mut specs = Vec::with_capacity(tfields as usize);

    for i in 1..=tfields {
        let name = header_str(cards, &format!("TTYPE{}", i))?.to_owned();
        let (repeat, ftype) = ColSpec::parse_tform(header_str(cards, &format!("TFORM{}", i))?)?;

        let dims = match cards.iter().find(|(k, _)| k == &format!("TDIM{}", i)) {
            Some((_, CardValue::Str(s))) => Some(ColSpec::parse_tdim(s)?),
            Some(_) => return fitserr!("TDIM{} should have a string value", i),
            None => None,
        };

        specs.push(ColSpec {
            name,
            ftype,
            repeat,
            dims,
        });
    }

    let declared: usize = specs.iter().map(|s| s.n_bytes()).sum();

    if declared != row_bytes {
        return fitserr!(
            "columns declare {} bytes per row but NAXIS1 is {}",
            declared,
            row_bytes
        );
    }

    if let Some(wanted) = columns {
        for name in wanted {
            if !specs.iter().any(|s| &s.name == name) {
                return fitserr!("no column named \"{}\" in the table", name);
            }
        }
    }

    let mut accs: Vec<Option<Acc>> = Vec::with_capacity(specs.len());

    for spec in &specs {
        let selected = columns.map_or(true, |wanted| wanted.contains(&spec.name.as_str()));
        accs.push(if selected { Some(make_acc(spec)?) } else { None });
    }

    let mut buf = vec![0u8; row_bytes];

    match rows {
        None => {
            for _ in 0..n_rows {
                reader.read_exact(&mut buf)?;
                decode_row(&specs, &mut accs, &buf);
            }
        }

        Some(rows) => {
            for &row in rows {
                if row >= n_rows {
                    return fitserr!("row index {} is out of range ({} rows)", row, n_rows);
                }

                reader.seek_to(data_start + row * row_bytes as u64)?;
                reader.read_exact(&mut buf)?;
                decode_row(&specs, &mut accs, &buf);
            }
        }
    }

    let out_rows = rows.map_or(n_rows as usize, <[u64]>::len);
    let mut table = Table::new();

    for (spec, acc) in specs.into_iter().zip(accs) {
        let acc = match acc {
            Some(acc) => acc,
            None => continue,
        };

        let col = match acc {
            Acc::I32(v) => Column::I32(v),
            Acc::I64(v) => Column::I64(v),
            Acc::F64(v) => Column::F64(v),
            Acc::Str(v) => Column::Str(v),

            Acc::VecI32 { data, width } => Column::VecI32(
                Array2::from_shape_vec((out_rows, width), data)
                    .map_err(|e| FitsFormatError::Generic(e.to_string()))?,
            ),

            Acc::VecF64 { data, width } => Column::VecF64(
                Array2::from_shape_vec((out_rows, width), data)
                    .map_err(|e| FitsFormatError::Generic(e.to_string()))?,
            ),

            Acc::MatF64 { data, d0, d1 } => Column::MatF64(
                Array3::from_shape_vec((out_rows, d0, d1), data)
                    .map_err(|e| FitsFormatError::Generic(e.to_string()))?,
            ),
        };

        table.push_column(spec.name, col);
    }

    Ok(table)
}

// Writing.

/// A streaming writer for a FITS file holding one binary-table extension.
///
/// The file is created immediately with an empty primary HDU. The first
/// appended batch fixes the table's schema and writes the table header with
/// a placeholder row count; subsequent batches must match that schema
/// exactly. [`TableWriter::finish`] pads the data area and patches the row
/// count, and must be called for the file to be valid.
#[derive(Debug)]
pub struct TableWriter {
    inner: BufWriter<File>,
    extname: String,
    specs: Option<Vec<ColSpec>>,
    naxis2_offset: u64,
    row_bytes: usize,
    n_rows: u64,
}

impl TableWriter {
    /// Create `path` afresh, clobbering any existing file, and write the
    /// primary HDU.
    pub fn create<P: AsRef<Path>>(path: P, extname: &str) -> Result<Self, FitsFormatError> {
        let mut inner = BufWriter::new(File::create(path)?);

        let cards = [
            ("SIMPLE", CardValue::Logical(true)),
            ("BITPIX", CardValue::Integer(8)),
            ("NAXIS", CardValue::Integer(0)),
            ("EXTEND", CardValue::Logical(true)),
        ];

        let mut block = Vec::with_capacity(BLOCK_SIZE);

        for (key, value) in &cards {
            block.extend_from_slice(&format_card(key, value)?);
        }

        block.extend_from_slice(&format_card("END", &CardValue::None)?);
        block.resize(BLOCK_SIZE, b' ');
        inner.write_all(&block)?;

        Ok(TableWriter {
            inner,
            extname: extname.to_owned(),
            specs: None,
            naxis2_offset: 0,
            row_bytes: 0,
            n_rows: 0,
        })
    }

    /// Append a batch of rows. The first batch fixes the schema; appending
    /// a batch with a different schema is a fatal error.
    pub fn append(&mut self, table: &Table) -> Result<(), FitsFormatError> {
        let specs = specs_for_table(table)?;

        match &self.specs {
            Some(existing) => {
                if existing != &specs {
                    return Err(FitsFormatError::SchemaMismatch);
                }
            }

            None => {
                self.write_bintable_header(&specs)?;
                self.row_bytes = specs.iter().map(|s| s.n_bytes()).sum();
                self.specs = Some(specs);
            }
        }

        let mut buf = Vec::with_capacity(self.row_bytes);

        for row in 0..table.nrows() {
            buf.clear();
            encode_row(table, row, &mut buf)?;
            self.inner.write_all(&buf)?;
        }

        self.n_rows += table.nrows() as u64;
        Ok(())
    }

    /// The number of rows appended so far.
    pub fn n_rows(&self) -> u64 {
        self.n_rows
    }

    /// Pad the data area to a block boundary, patch the row count into the
    /// table header, and flush. Consumes the writer.
    pub fn finish(mut self) -> Result<(), FitsFormatError> {
        if self.specs.is_none() {
            return fitserr!("no batches were appended; refusing to finalize an empty table");
        }

        let data_bytes = self.n_rows * self.row_bytes as u64;
        let pad = (padded(data_bytes) - data_bytes) as usize;

        if pad > 0 {
            self.inner.write_all(&vec![0u8; pad])?;
        }

        self.inner.seek(SeekFrom::Start(self.naxis2_offset))?;
        let card = format_card("NAXIS2", &CardValue::Integer(self.n_rows as i64))?;
        self.inner.write_all(&card)?;
        self.inner.flush()?;

        Ok(())
    }

    fn write_bintable_header(&mut self, specs: &[ColSpec]) -> Result<(), FitsFormatError> {
        let row_bytes: usize = specs.iter().map(|s| s.n_bytes()).sum();

        let mut cards: Vec<(String, CardValue)> = vec![
            ("XTENSION".to_owned(), CardValue::Str("BINTABLE".to_owned())),
            ("BITPIX".to_owned(), CardValue::Integer(8)),
            ("NAXIS".to_owned(), CardValue::Integer(2)),
            ("NAXIS1".to_owned(), CardValue::Integer(row_bytes as i64)),
            ("NAXIS2".to_owned(), CardValue::Integer(0)),
            ("PCOUNT".to_owned(), CardValue::Integer(0)),
            ("GCOUNT".to_owned(), CardValue::Integer(1)),
            ("TFIELDS".to_owned(), CardValue::Integer(specs.len() as i64)),
        ];

        for (i, spec) in specs.iter().enumerate() {
            cards.push((format!("TTYPE{}", i + 1), CardValue::Str(spec.name.clone())));
            cards.push((format!("TFORM{}", i + 1), CardValue::Str(spec.tform())));

            if let Some((d0, d1)) = spec.dims {
                cards.push((
                    format!("TDIM{}", i + 1),
                    CardValue::Str(format!("({},{})", d0, d1)),
                ));
            }
        }

        cards.push(("EXTNAME".to_owned(), CardValue::Str(self.extname.clone())));

        let start = self.inner.stream_position()?;
        let mut block = Vec::new();

        for (key, value) in &cards {
            if key == "NAXIS2" {
                self.naxis2_offset = start + block.len() as u64;
            }

            block.extend_from_slice(&format_card(key, value)?);
        }

        block.extend_from_slice(&format_card("END", &CardValue::None)?);

        let total = padded(block.len() as u64) as usize;
        block.resize(total, b' ');
        self.inner.write_all(&block)?;

        Ok(())
    }
}

fn specs_for_table(table: &Table) -> Result<Vec<ColSpec>, FitsFormatError> {
    let nrows = table.nrows();
    let mut specs = Vec::with_capacity(table.ncols());

    for (name, col) in table.columns() {
        if col.len() != nrows {
            return fitserr!(
                "column \"{}\" has {} rows but the table has {}",
                name,
                col.len(),
                nrows
            );
        }

        let spec = match col {
            Column::I32(_) => ColSpec {
                name: name.to_owned(),
                ftype: FitsType::I32,
                repeat: 1,
                dims: None,
            },

            Column::I64(_) => ColSpec {
                name: name.to_owned(),
                ftype: FitsType::I64,
                repeat: 1,
                dims: None,
            },

            Column::F64(_) => ColSpec {
                name: name.to_owned(),
                ftype: FitsType::F64,
                repeat: 1,
                dims: None,
            },

            Column::Str(_) => {
                return fitserr!(
                    "column \"{}\": text columns are not supported for writing",
                    name
                );
            }

            Column::VecI32(a) => ColSpec {
                name: name.to_owned(),
                ftype: FitsType::I32,
                repeat: a.ncols(),
                dims: None,
            },

            Column::VecF64(a) => ColSpec {
                name: name.to_owned(),
                ftype: FitsType::F64,
                repeat: a.ncols(),
                dims: None,
            },

            Column::MatF64(a) => {
                let d0 = a.shape()[1];
                let d1 = a.shape()[2];

                ColSpec {
                    name: name.to_owned(),
                    ftype: FitsType::F64,
                    repeat: d0 * d1,
                    dims: Some((d0, d1)),
                }
            }
        };

        specs.push(spec);
    }

    if specs.is_empty() {
        return fitserr!("refusing to write a table with no columns");
    }

    Ok(specs)
}

fn encode_row(table: &Table, row: usize, buf: &mut Vec<u8>) -> Result<(), FitsFormatError> {
    for (name, col) in table.columns() {
        match col {
            Column::I32(v) => buf.write_i32::<BigEndian>(v[row])?,
            Column::I64(v) => buf.write_i64::<BigEndian>(v[row])?,
            Column::F64(v) => buf.write_f64::<BigEndian>(v[row])?,

            Column::Str(_) => {
                return fitserr!(
                    "column \"{}\": text columns are not supported for writing",
                    name
                );
            }

            Column::VecI32(a) => {
                for &x in a.row(row).iter() {
                    buf.write_i32::<BigEndian>(x)?;
                }
            }

            Column::VecF64(a) => {
                for &x in a.row(row).iter() {
                    buf.write_f64::<BigEndian>(x)?;
                }
            }

            Column::MatF64(a) => {
                for &x in a.index_axis(Axis(0), row).iter() {
                    buf.write_f64::<BigEndian>(x)?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn card_round_trips() {
        let cases = [
            ("SIMPLE", CardValue::Logical(true)),
            ("BITPIX", CardValue::Integer(8)),
            ("NAXIS1", CardValue::Integer(-120)),
            ("TTYPE1", CardValue::Str("coadd_objects_id".to_owned())),
            ("EXTNAME", CardValue::Str("model_fits".to_owned())),
            ("END", CardValue::None),
        ];

        for (key, value) in &cases {
            let card = format_card(key, value).unwrap();
            let (k, v) = parse_card(&card).unwrap();
            assert_eq!(&k, key);
            assert_eq!(&v, value);
        }
    }

    #[test]
    fn card_parsing_handles_comments() {
        let mut card = [b' '; CARD_SIZE];
        card[..30].copy_from_slice(b"NAXIS   =                  999");
        card[31..41].copy_from_slice(b"/ comment ");

        let (key, value) = parse_card(&card).unwrap();
        assert_eq!(key, "NAXIS");
        assert_eq!(value, CardValue::Integer(999));
    }

    #[test]
    fn bad_keys_and_values_fail() {
        assert!(format_card("lowercase", &CardValue::None).is_err());
        assert!(format_card("WAYTOOLONGKEY", &CardValue::None).is_err());
        assert!(format_card("TTYPE1", &CardValue::Str("it's".to_owned())).is_err());
    }

    #[test]
    fn tform_parsing() {
        assert_eq!(ColSpec::parse_tform("1J").unwrap(), (1, FitsType::I32));
        assert_eq!(ColSpec::parse_tform("K").unwrap(), (1, FitsType::I64));
        assert_eq!(ColSpec::parse_tform("64D").unwrap(), (64, FitsType::F64));
        assert_eq!(ColSpec::parse_tform("12A").unwrap(), (12, FitsType::Text));
        assert!(ColSpec::parse_tform("3X").is_err());
        assert!(ColSpec::parse_tform("").is_err());
    }

    #[test]
    fn tdim_parsing() {
        assert_eq!(ColSpec::parse_tdim("(2,2)").unwrap(), (2, 2));
        assert_eq!(ColSpec::parse_tdim(" (8, 8) ").unwrap(), (8, 8));
        assert!(ColSpec::parse_tdim("(2,2,2)").is_err());
        assert!(ColSpec::parse_tdim("2,2").is_err());
    }

    fn sample_table(nrows: usize, id_base: i64) -> Table {
        let mut t = Table::new();

        t.push_column(
            "id",
            Column::I64((0..nrows).map(|i| id_base + i as i64).collect()),
        );
        t.push_column("flags", Column::I32(vec![0; nrows]));
        t.push_column(
            "x",
            Column::F64((0..nrows).map(|i| 0.5 * i as f64).collect()),
        );
        t.push_column(
            "vec",
            Column::VecF64(Array2::from_shape_fn((nrows, 2), |(r, c)| {
                (10 * r + c) as f64
            })),
        );
        t.push_column(
            "ivec",
            Column::VecI32(Array2::from_shape_fn((nrows, 3), |(r, c)| {
                (100 * r + c) as i32
            })),
        );
        t.push_column(
            "mat",
            Column::MatF64(Array3::from_shape_fn((nrows, 2, 2), |(r, i, j)| {
                (r * 100 + i * 10 + j) as f64
            })),
        );

        t
    }

    #[test]
    fn write_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.fits");

        let mut writer = TableWriter::create(&path, "model_fits").unwrap();
        writer.append(&sample_table(2, 100)).unwrap();
        writer.append(&sample_table(3, 200)).unwrap();
        assert_eq!(writer.n_rows(), 5);
        writer.finish().unwrap();

        let t = read_table(&path).unwrap();
        assert_eq!(t.nrows(), 5);
        assert_eq!(t.ncols(), 6);

        assert_eq!(t.i64s("id").unwrap(), &[100, 101, 200, 201, 202]);
        assert_eq!(t.f64s("x").unwrap(), &[0.0, 0.5, 0.0, 0.5, 1.0]);

        match t.column("vec").unwrap() {
            Column::VecF64(a) => {
                assert_eq!(a.ncols(), 2);
                assert_eq!(a[[3, 1]], 11.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        match t.column("mat").unwrap() {
            Column::MatF64(a) => assert_eq!(a[[4, 1, 0]], 210.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn selective_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.fits");

        let mut writer = TableWriter::create(&path, "model_fits").unwrap();
        writer.append(&sample_table(4, 0)).unwrap();
        writer.finish().unwrap();

        let t = read_table_rows(&path, &[3, 1]).unwrap();
        assert_eq!(t.nrows(), 2);
        assert_eq!(t.i64s("id").unwrap(), &[3, 1]);

        let t = read_table_columns(&path, &["x", "id"]).unwrap();
        assert_eq!(t.ncols(), 2);
        assert!(t.has_column("id"));
        assert!(t.has_column("x"));
        assert!(!t.has_column("vec"));

        assert!(read_table_rows(&path, &[4]).is_err());
        assert!(read_table_columns(&path, &["nope"]).is_err());
    }

    #[test]
    fn appends_enforce_the_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.fits");

        let mut writer = TableWriter::create(&path, "model_fits").unwrap();
        writer.append(&sample_table(2, 0)).unwrap();

        let mut other = Table::new();
        other.push_column("id", Column::I64(vec![7]));
        other.push_column("flags", Column::I32(vec![0]));
        other.push_column("x", Column::F64(vec![1.0]));
        other.push_column("vec", Column::VecF64(arr2(&[[1.0, 2.0, 3.0]])));
        other.push_column("ivec", Column::VecI32(arr2(&[[1, 2, 3]])));
        other.push_column(
            "mat",
            Column::MatF64(Array3::from_shape_vec((1, 2, 2), vec![0.; 4]).unwrap()),
        );

        match writer.append(&other) {
            Err(FitsFormatError::SchemaMismatch) => {}
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn text_columns_are_rejected_for_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.fits");

        let mut t = Table::new();
        t.push_column("name", Column::Str(vec!["a".to_owned()]));

        let mut writer = TableWriter::create(&path, "model_fits").unwrap();
        assert!(writer.append(&t).is_err());
    }

    /// Hand-assemble a table with a text column, which our writer refuses
    /// to produce, to exercise the reader's text support.
    #[test]
    fn text_columns_can_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.fits");

        let mut bytes = Vec::new();

        let mut primary = Vec::new();
        primary.extend_from_slice(&format_card("SIMPLE", &CardValue::Logical(true)).unwrap());
        primary.extend_from_slice(&format_card("BITPIX", &CardValue::Integer(8)).unwrap());
        primary.extend_from_slice(&format_card("NAXIS", &CardValue::Integer(0)).unwrap());
        primary.extend_from_slice(&format_card("END", &CardValue::None).unwrap());
        primary.resize(BLOCK_SIZE, b' ');
        bytes.extend_from_slice(&primary);

        let mut header = Vec::new();
        let cards = [
            ("XTENSION", CardValue::Str("BINTABLE".to_owned())),
            ("BITPIX", CardValue::Integer(8)),
            ("NAXIS", CardValue::Integer(2)),
            ("NAXIS1", CardValue::Integer(12)),
            ("NAXIS2", CardValue::Integer(2)),
            ("PCOUNT", CardValue::Integer(0)),
            ("GCOUNT", CardValue::Integer(1)),
            ("TFIELDS", CardValue::Integer(2)),
            ("TTYPE1", CardValue::Str("tile".to_owned())),
            ("TFORM1", CardValue::Str("8A".to_owned())),
            ("TTYPE2", CardValue::Str("n".to_owned())),
            ("TFORM2", CardValue::Str("1J".to_owned())),
            ("EXTNAME", CardValue::Str("tiles".to_owned())),
        ];

        for (key, value) in &cards {
            header.extend_from_slice(&format_card(key, value).unwrap());
        }

        header.extend_from_slice(&format_card("END", &CardValue::None).unwrap());
        header.resize(BLOCK_SIZE, b' ');
        bytes.extend_from_slice(&header);

        let mut data = Vec::new();
        data.extend_from_slice(b"DES0001 ");
        data.extend_from_slice(&5i32.to_be_bytes());
        data.extend_from_slice(b"DES0002 ");
        data.extend_from_slice(&7i32.to_be_bytes());
        data.resize(BLOCK_SIZE, 0);
        bytes.extend_from_slice(&data);

        std::fs::write(&path, &bytes).unwrap();

        let t = read_table(&path).unwrap();
        assert_eq!(t.nrows(), 2);

        match t.column("tile").unwrap() {
            Column::Str(v) => assert_eq!(v, &vec!["DES0001".to_owned(), "DES0002".to_owned()]),
            other => panic!("unexpected {:?}", other),
        }

        match t.column("n").unwrap() {
            Column::I32(v) => assert_eq!(v, &vec![5, 7]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
