//! Fonts for overlay text.
//!
//! Two fonts are available:
//! - **Builtin**: the standard Helvetica Type1 font with WinAnsi encoding.
//!   Nothing is embedded; widths come from the Adobe AFM metrics. Characters
//!   outside WinAnsi are replaced with `?`.
//! - **Embedded**: a TrueType file loaded at runtime and embedded as a
//!   composite font, which covers any Unicode character the face has.
//!
//! # PDF Font Structure
//!
//! For embedded Unicode text, PDFs use a composite font structure:
//! - **Type0 font**: The top-level font dictionary that references:
//!   - **CIDFont**: Contains glyph metrics and references:
//!     - **FontDescriptor**: Font metadata (flags, bounding box, etc.)
//!     - **FontFile2**: The embedded TrueType font program
//!   - **ToUnicode CMap**: Maps glyph IDs back to Unicode for copy/paste

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::path::Path;

use lopdf::{Document, Object, ObjectId, Stream};
use ttf_parser::Face;

use crate::error::{Error, Result};
use crate::fit::FontMetrics;

/// Name under which the overlay font is registered in page resources.
pub const OVERLAY_FONT_RESOURCE: &str = "FOverlay";

/// Glyph width used for characters without metrics, in 1/1000 em.
const FALLBACK_WIDTH: u16 = 556;

/// Font used to draw overlay text.
#[derive(Debug, Clone, Default)]
pub enum OverlayFont {
    /// Helvetica, not embedded
    #[default]
    Builtin,
    /// TrueType face embedded as a CID font
    Embedded(EmbeddedFont),
}

impl OverlayFont {
    /// Use the TrueType font at `path`, or Helvetica when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self::Embedded(EmbeddedFont::from_file(path)?)),
            None => Ok(Self::Builtin),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin => "Helvetica",
            Self::Embedded(font) => &font.name,
        }
    }

    /// Encode text as the hex body of a PDF string (no angle brackets).
    pub fn encode_hex(&self, text: &str) -> String {
        match self {
            Self::Builtin => text.chars().fold(String::new(), |mut acc, c| {
                let _ = write!(acc, "{:02X}", helvetica_glyph(c).0);
                acc
            }),
            Self::Embedded(font) => font.text_to_hex_glyphs(text),
        }
    }

    /// Add the font objects to `doc` and return the top-level font dictionary.
    pub fn add_to_document(&self, doc: &mut Document) -> ObjectId {
        match self {
            Self::Builtin => doc.add_object(lopdf::Dictionary::from_iter([
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                ("BaseFont", Object::Name(b"Helvetica".to_vec())),
                ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
            ])),
            Self::Embedded(font) => font.embed_in_document(doc),
        }
    }
}

impl FontMetrics for OverlayFont {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        match self {
            Self::Builtin => {
                let units: u32 = text.chars().map(|c| u32::from(helvetica_glyph(c).1)).sum();
                #[allow(clippy::cast_precision_loss)]
                let units = units as f32;
                units * size / 1000.0
            }
            Self::Embedded(font) => font.string_width(text, size),
        }
    }
}

// =============================================================================
// Embedded TrueType
// =============================================================================

/// A TrueType font prepared for embedding.
///
/// The face is parsed once on load; glyph ids and advances for every mapped
/// Unicode codepoint are kept so the raw bytes are only needed for embedding.
#[derive(Clone)]
pub struct EmbeddedFont {
    data: Vec<u8>,
    name: String,
    units_per_em: u16,
    glyphs: HashMap<char, (u16, u16)>,
    notdef_advance: u16,
    bbox: [i16; 4],
    ascender: i16,
    descender: i16,
    cap_height: i16,
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("units_per_em", &self.units_per_em)
            .field("glyphs", &self.glyphs.len())
            .field("bytes_len", &self.data.len())
            .finish()
    }
}

impl EmbeddedFont {
    /// Read and parse a TrueType file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            Error::FontLoad(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(data)
    }

    /// Parse TrueType font bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let face = Face::parse(&data, 0)
            .map_err(|e| Error::FontLoad(format!("Failed to parse font: {e}")))?;

        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(Error::FontLoad("Font has zero units per em".to_string()));
        }

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables.into_iter().filter(|s| s.is_unicode()) {
                subtable.codepoints(|cp| {
                    if let Some(c) = char::from_u32(cp)
                        && let Some(gid) = subtable.glyph_index(cp)
                    {
                        let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                        glyphs.entry(c).or_insert((gid.0, advance));
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(Error::FontLoad("Font has no Unicode cmap".to_string()));
        }

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .map(|n| n.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "OverlayFont".to_string());

        let bbox = face.global_bounding_box();
        let notdef_advance = face.glyph_hor_advance(ttf_parser::GlyphId(0)).unwrap_or(0);

        Ok(Self {
            name,
            units_per_em,
            notdef_advance,
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or_else(|| face.ascender()),
            glyphs,
            data,
        })
    }

    /// PostScript name used as the PDF BaseFont.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the glyph ID for a character, falling back to .notdef (0) if not found.
    pub fn glyph_id(&self, c: char) -> u16 {
        self.glyphs.get(&c).map_or(0, |&(gid, _)| gid)
    }

    fn advance(&self, c: char) -> u16 {
        self.glyphs
            .get(&c)
            .map_or(self.notdef_advance, |&(_, advance)| advance)
    }

    /// Calculate the width of a string in PDF points at the given font size.
    pub fn string_width(&self, text: &str, font_size: f32) -> f32 {
        let total_units: u32 = text.chars().map(|c| u32::from(self.advance(c))).sum();
        #[allow(clippy::cast_precision_loss)]
        let total_units = total_units as f32;
        total_units * font_size / f32::from(self.units_per_em)
    }

    /// Convert text to a hex string of glyph IDs for PDF content streams.
    /// Returns the hex string without angle brackets.
    pub fn text_to_hex_glyphs(&self, text: &str) -> String {
        text.chars().fold(String::new(), |mut acc, c| {
            let _ = write!(acc, "{:04X}", self.glyph_id(c));
            acc
        })
    }

    /// Embed the font program and its dictionaries into `doc`.
    ///
    /// Returns the Type0 font dictionary id.
    pub fn embed_in_document(&self, doc: &mut Document) -> ObjectId {
        let font_file_id = self.create_font_file(doc);
        let font_descriptor_id = self.create_font_descriptor(doc, font_file_id);
        let cid_font_id = self.create_cid_font(doc, font_descriptor_id);
        let to_unicode_id = self.create_to_unicode_cmap(doc);
        self.create_type0_font(doc, cid_font_id, to_unicode_id)
    }

    /// Create the FontFile2 stream containing the raw TrueType data.
    #[allow(clippy::cast_possible_wrap)] // Font size always fits in i64
    fn create_font_file(&self, doc: &mut Document) -> ObjectId {
        let mut dict = lopdf::Dictionary::new();
        dict.set("Length1", Object::Integer(self.data.len() as i64));

        let stream = Stream::new(dict, self.data.clone()).with_compression(true);
        doc.add_object(Object::Stream(stream))
    }

    fn create_font_descriptor(&self, doc: &mut Document, font_file_id: ObjectId) -> ObjectId {
        let dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.name.as_bytes().to_vec())),
            ("Flags", Object::Integer(32)), // Nonsymbolic
            (
                "FontBBox",
                Object::Array(self.bbox.iter().map(|&v| Object::Integer(i64::from(v))).collect()),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(i64::from(self.ascender))),
            ("Descent", Object::Integer(i64::from(self.descender))),
            ("CapHeight", Object::Integer(i64::from(self.cap_height))),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]);

        doc.add_object(Object::Dictionary(dict))
    }

    fn create_cid_font(&self, doc: &mut Document, font_descriptor_id: ObjectId) -> ObjectId {
        let widths_array = self.build_widths_array();
        let default_width = self.scale_width(self.advance(' '));

        let dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(self.name.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(lopdf::Dictionary::from_iter([
                    ("Registry", Object::string_literal("Adobe")),
                    ("Ordering", Object::string_literal("Identity")),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(font_descriptor_id)),
            ("DW", Object::Integer(default_width)),
            ("W", Object::Array(widths_array)),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]);

        doc.add_object(Object::Dictionary(dict))
    }

    /// Scale a font-unit width to PDF's 1000-unit system.
    fn scale_width(&self, width: u16) -> i64 {
        (i64::from(width) * 1000) / i64::from(self.units_per_em)
    }

    /// Build the W array: `[gid [w1 w2 ...]]` for runs of consecutive GIDs.
    fn build_widths_array(&self) -> Vec<Object> {
        let gid_widths: BTreeMap<u16, i64> = self
            .glyphs
            .values()
            .filter(|(gid, _)| *gid != 0)
            .map(|&(gid, advance)| (gid, self.scale_width(advance)))
            .collect();

        let mut result = Vec::new();
        let mut iter = gid_widths.iter().peekable();

        while let Some((&first_gid, &first_width)) = iter.next() {
            let mut widths = vec![Object::Integer(first_width)];
            let mut expected_next = u32::from(first_gid) + 1;

            while let Some(&(&gid, &width)) = iter.peek() {
                if u32::from(gid) != expected_next {
                    break;
                }
                widths.push(Object::Integer(width));
                expected_next += 1;
                iter.next();
            }

            result.push(Object::Integer(i64::from(first_gid)));
            result.push(Object::Array(widths));
        }

        result
    }

    /// ToUnicode CMap mapping each used glyph back to its character.
    fn create_to_unicode_cmap(&self, doc: &mut Document) -> ObjectId {
        let by_gid: BTreeMap<u16, char> = self
            .glyphs
            .iter()
            .filter(|(_, (gid, _))| *gid != 0)
            .map(|(&c, &(gid, _))| (gid, c))
            .collect();

        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );

        // bfchar sections hold at most 100 entries each
        let entries: Vec<(u16, char)> = by_gid.into_iter().collect();
        for chunk in entries.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(gid, c) in chunk {
                let mut units = [0u16; 2];
                let utf16 = c.encode_utf16(&mut units);
                let hex: String = utf16.iter().map(|u| format!("{u:04X}")).collect();
                let _ = writeln!(cmap, "<{gid:04X}> <{hex}>");
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend");

        let stream = Stream::new(lopdf::Dictionary::new(), cmap.into_bytes());
        doc.add_object(Object::Stream(stream))
    }

    fn create_type0_font(
        &self,
        doc: &mut Document,
        cid_font_id: ObjectId,
        to_unicode_id: ObjectId,
    ) -> ObjectId {
        let dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(self.name.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]);

        doc.add_object(Object::Dictionary(dict))
    }
}

// =============================================================================
// Builtin Helvetica
// =============================================================================

/// Helvetica advance widths for 0x20..=0x7E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

/// Helvetica advance widths for 0xA0..=0xFF (Latin-1 in WinAnsi).
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0
];

/// WinAnsi code and Helvetica width for a character; `?` when unmapped.
fn helvetica_glyph(c: char) -> (u8, u16) {
    let code = u32::from(c);
    if let Ok(byte) = u8::try_from(code) {
        match byte {
            0x20..=0x7E => return (byte, HELVETICA_ASCII[usize::from(byte - 0x20)]),
            0xA0..=0xFF => return (byte, HELVETICA_LATIN1[usize::from(byte - 0xA0)]),
            _ => {}
        }
    }

    match c {
        '€' => (0x80, 556),
        '‚' => (0x82, 222),
        'ƒ' => (0x83, 556),
        '„' => (0x84, 333),
        '…' => (0x85, 1000),
        '†' => (0x86, 556),
        '‡' => (0x87, 556),
        'ˆ' => (0x88, 333),
        '‰' => (0x89, 1000),
        'Š' => (0x8A, 667),
        '‹' => (0x8B, 333),
        'Œ' => (0x8C, 1000),
        'Ž' => (0x8E, 611),
        '‘' => (0x91, 222),
        '’' => (0x92, 222),
        '“' => (0x93, 333),
        '”' => (0x94, 333),
        '•' => (0x95, 350),
        '–' => (0x96, 556),
        '—' => (0x97, 1000),
        '˜' => (0x98, 333),
        '™' => (0x99, 1000),
        'š' => (0x9A, 500),
        '›' => (0x9B, 333),
        'œ' => (0x9C, 944),
        'ž' => (0x9E, 500),
        'Ÿ' => (0x9F, 667),
        '\t' | '\n' | '\r' => (0x20, 278),
        _ => (b'?', FALLBACK_WIDTH),
    }
}
