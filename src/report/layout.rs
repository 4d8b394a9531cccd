//! Deterministic page layout for analysis reports.
//!
//! The layout is computed from the analysis and the original text alone, so
//! two renders of the same input place exactly the same lines at exactly the
//! same positions. The PDF writer only draws what this module decides.

use crate::pipelines::analysis::AnalysisResult;

/// US Letter, matching the reports the service has always produced.
pub const PAGE_WIDTH_MM: f32 = 215.9;
pub const PAGE_HEIGHT_MM: f32 = 279.4;
pub const MARGIN_MM: f32 = 20.0;

const PT_TO_MM: f32 = 0.352_778;
const LINE_SPACING: f32 = 1.4;
const SECTION_GAP_MM: f32 = 6.0;

pub const REPORT_TITLE: &str = "Document Analysis Report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
}

impl TextStyle {
    pub fn size_pt(self) -> f32 {
        match self {
            TextStyle::Title => 18.0,
            TextStyle::Heading => 14.0,
            TextStyle::Body => 11.0,
        }
    }

    pub fn is_bold(self) -> bool {
        !matches!(self, TextStyle::Body)
    }

    fn line_height_mm(self) -> f32 {
        self.size_pt() * PT_TO_MM * LINE_SPACING
    }

    /// Drawn width of `text` in this style, from the Helvetica font metrics.
    pub fn measure_mm(self, text: &str) -> f32 {
        text.chars().map(|c| self.char_width_mm(c)).sum()
    }

    fn char_width_mm(self, c: char) -> f32 {
        let units = glyph_width(c, self.is_bold()) as f32;
        units / 1000.0 * self.size_pt() * PT_TO_MM
    }
}

/// Horizontal space available to a line.
pub const USABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

/// One line of text at its final position. Coordinates are from the page's
/// bottom-left corner, as PDF expects.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub style: TextStyle,
    pub x_mm: f32,
    pub y_mm: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pages: Vec<Vec<PlacedLine>>,
    substituted: usize,
}

impl ReportLayout {
    pub fn new(original_text: &str, analysis: &AnalysisResult) -> Self {
        let mut flow = Flow::new();

        flow.paragraph(TextStyle::Title, REPORT_TITLE);
        flow.gap();

        flow.paragraph(TextStyle::Heading, "Sentiment Analysis");
        flow.paragraph(TextStyle::Body, &format!("Sentiment: {}", analysis.sentiment()));
        flow.paragraph(
            TextStyle::Body,
            &format!("Confidence: {:.4}", analysis.confidence()),
        );
        flow.gap();

        flow.paragraph(TextStyle::Heading, "Summary");
        flow.paragraph(TextStyle::Body, analysis.summary());
        flow.gap();

        flow.paragraph(TextStyle::Heading, "Original Text");
        for line in original_text.lines() {
            flow.paragraph(TextStyle::Body, line);
        }

        flow.finish()
    }

    pub fn pages(&self) -> &[Vec<PlacedLine>] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All text in reading order, one entry per placed line.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flatten().map(|line| line.text.as_str())
    }

    /// Characters the built-in fonts cannot draw that were replaced by `?`.
    pub fn substituted_chars(&self) -> usize {
        self.substituted
    }
}

struct Flow {
    pages: Vec<Vec<PlacedLine>>,
    current: Vec<PlacedLine>,
    cursor_mm: f32,
    substituted: usize,
}

impl Flow {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
            substituted: 0,
        }
    }

    fn push(&mut self, style: TextStyle, text: String) {
        let height = style.line_height_mm();
        if self.cursor_mm - height < MARGIN_MM {
            self.break_page();
        }
        self.cursor_mm -= height;
        self.current.push(PlacedLine {
            text,
            style,
            x_mm: MARGIN_MM,
            y_mm: self.cursor_mm,
        });
    }

    /// Word-wraps `text`; an empty paragraph still takes one blank line.
    fn paragraph(&mut self, style: TextStyle, text: &str) {
        let (clean, substituted) = sanitize_counted(text);
        self.substituted += substituted;
        let wrapped = wrap(&clean, style);
        if wrapped.is_empty() {
            self.push(style, String::new());
            return;
        }
        for line in wrapped {
            self.push(style, line);
        }
    }

    fn gap(&mut self) {
        self.cursor_mm -= SECTION_GAP_MM;
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    }

    fn finish(mut self) -> ReportLayout {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        ReportLayout {
            pages: self.pages,
            substituted: self.substituted,
        }
    }
}

/// Maps text onto what the built-in PDF fonts can draw, which is the
/// WinAnsi (Windows-1252) repertoire. Accented Latin letters and the usual
/// typographic punctuation pass through unchanged; anything else becomes `?`.
pub fn sanitize(text: &str) -> String {
    sanitize_counted(text).0
}

/// [`sanitize`], also returning how many characters were replaced by `?`.
pub fn sanitize_counted(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut substituted = 0;
    for c in text.chars() {
        match c {
            '\t' => out.push_str("    "),
            // lopdf encodes byte 0xA0 as a plain space and has no soft hyphen
            '\u{00A0}' | '\u{2002}'..='\u{200A}' => out.push(' '),
            '\u{2010}' | '\u{2011}' | '\u{2212}' => out.push('-'),
            '\u{2032}' => out.push('\''),
            '\u{2033}' => out.push('"'),
            '\u{00AD}' | '\u{FEFF}' | '\u{200B}'..='\u{200D}' => {}
            c if c.is_control() => {}
            c if is_win_ansi(c) => out.push(c),
            _ => {
                substituted += 1;
                out.push('?');
            }
        }
    }
    (out, substituted)
}

fn is_win_ansi(c: char) -> bool {
    matches!(
        c,
        ' '..='~'
            | '\u{00A1}'..='\u{00FF}'
            | '\u{20AC}'
            | '\u{201A}'
            | '\u{0192}'
            | '\u{201E}'
            | '\u{2026}'
            | '\u{2020}'
            | '\u{2021}'
            | '\u{02C6}'
            | '\u{2030}'
            | '\u{0160}'
            | '\u{2039}'
            | '\u{0152}'
            | '\u{017D}'
            | '\u{2018}'
            | '\u{2019}'
            | '\u{201C}'
            | '\u{201D}'
            | '\u{2022}'
            | '\u{2013}'
            | '\u{2014}'
            | '\u{02DC}'
            | '\u{2122}'
            | '\u{0161}'
            | '\u{203A}'
            | '\u{0153}'
            | '\u{017E}'
            | '\u{0178}'
    )
}

/// Advance widths of printable ASCII (0x20..=0x7E) in 1/1000 em, from the
/// Adobe core font metrics.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Width of `c` in 1/1000 em. Accented letters share their base letter's
/// advance; anything unlisted is charged a full em so lines never overflow.
fn glyph_width(c: char, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    let ascii = |c: char| table[c as usize - 0x20];
    match c {
        ' '..='~' => ascii(c),
        '\u{00A0}' => ascii(' '),
        'À'..='Å' => ascii('A'),
        'Ç' => ascii('C'),
        'È'..='Ë' => ascii('E'),
        'Ì'..='Ï' | 'ì'..='ï' => 278,
        'Ð' => ascii('D'),
        'Ñ' => ascii('N'),
        'Ò'..='Ö' | 'Ø' => ascii('O'),
        'Ù'..='Ü' => ascii('U'),
        'Ý' | 'Ÿ' => ascii('Y'),
        'Š' => ascii('S'),
        'Ž' => ascii('Z'),
        'à'..='å' => ascii('a'),
        'ç' => ascii('c'),
        'è'..='ë' => ascii('e'),
        'ñ' => ascii('n'),
        'ò'..='ö' | 'ø' => ascii('o'),
        'ù'..='ü' => ascii('u'),
        'ý' | 'ÿ' => ascii('y'),
        'š' => ascii('s'),
        'ž' => ascii('z'),
        'ß' => 611,
        '\u{2013}' | '\u{20AC}' | '\u{2020}' | '\u{2021}' | '\u{0192}' => 556,
        '\u{2018}' | '\u{2019}' | '\u{201A}' => {
            if bold {
                278
            } else {
                222
            }
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' => {
            if bold {
                500
            } else {
                333
            }
        }
        '\u{2022}' => 350,
        '\u{2039}' | '\u{203A}' | '\u{02C6}' | '\u{02DC}' => 333,
        _ => 1000,
    }
}

/// Greedy word wrap on measured width. Words wider than a line are split
/// at the last character that still fits.
fn wrap(text: &str, style: TextStyle) -> Vec<String> {
    let space = style.char_width_mm(' ');
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_mm = 0.0_f32;

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        let mut word_mm = style.measure_mm(&word);
        while word_mm > USABLE_WIDTH_MM {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_mm = 0.0;
            }
            let (head, tail) = split_to_fit(&word, style);
            lines.push(head);
            word = tail;
            word_mm = style.measure_mm(&word);
        }
        if word.is_empty() {
            continue;
        }
        if !line.is_empty() && line_mm + space + word_mm > USABLE_WIDTH_MM {
            lines.push(std::mem::take(&mut line));
            line_mm = 0.0;
        }
        if !line.is_empty() {
            line.push(' ');
            line_mm += space;
        }
        line.push_str(&word);
        line_mm += word_mm;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Longest prefix of `word` that fits on a line, and the rest. The prefix
/// always holds at least one character.
fn split_to_fit(word: &str, style: TextStyle) -> (String, String) {
    let mut width = 0.0_f32;
    let mut cut = word.len();
    for (index, c) in word.char_indices() {
        width += style.char_width_mm(c);
        if width > USABLE_WIDTH_MM && index > 0 {
            cut = index;
            break;
        }
    }
    let (head, tail) = word.split_at(cut);
    (head.to_string(), tail.to_string())
}
