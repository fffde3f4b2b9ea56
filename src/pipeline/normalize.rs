//! Row normalisation: raw cell matrices → typed [`SignificantLine`] records.
//!
//! Text pulled out of a typeset PDF is messy in predictable ways:
//!
//! - `±` arrives as `Â±` or `+/-` depending on the font's encoding
//! - minus signs are U+2212, en dashes or em dashes rather than `-`
//! - ligatures (`ﬁ`), non-breaking and thin spaces, zero-width characters
//! - table captions, column headings, running heads and footnotes are
//!   interleaved with the data rows
//! - a row that wraps leaves its trailing values on the next line
//! - `PI ± SEM` is one printed column but two numbers
//!
//! [`clean_cell`] fixes the characters with an ordered chain of small rules;
//! [`normalize_tables`] classifies lines, stitches wrapped rows back together
//! and parses the token stream of each record.

use super::layout::RawTable;
use crate::config::IdentifierCorrections;
use crate::error::RowIssue;
use crate::records::{Direction, Flag, SignificantLine};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Apply all character-level cleanup rules to one cell.
///
/// Rules (applied in order):
/// 1. Repair UTF-8-read-as-Latin-1 sequences (`Â±`, `âˆ’`, `â€“`)
/// 2. Expand typographic ligatures
/// 3. Fold exotic spaces into ASCII space
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Fold minus signs and dashes into `-`
/// 6. Fold `+/-` spellings into `±`
/// 7. Fold arrows into `+` / `-` flags
/// 8. Collapse runs of whitespace and trim
pub fn clean_cell(input: &str) -> String {
    let s = repair_mojibake(input);
    let s = expand_ligatures(&s);
    let s = normalise_spaces(&s);
    let s = remove_invisible_chars(&s);
    let s = normalise_dashes(&s);
    let s = normalise_plus_minus(&s);
    let s = arrows_to_flags(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Mojibake ─────────────────────────────────────────────────────────

fn repair_mojibake(input: &str) -> String {
    input
        .replace("Â±", "±")
        .replace("âˆ’", "-")
        .replace("â€“", "-")
        .replace("â€”", "-")
        .replace("Â\u{00A0}", " ")
}

// ── Rule 2: Ligatures ────────────────────────────────────────────────────────

fn expand_ligatures(input: &str) -> String {
    input
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

// ── Rule 3: Spaces ───────────────────────────────────────────────────────────

fn normalise_spaces(input: &str) -> String {
    input.replace(
        [
            '\u{00A0}', '\u{2002}', '\u{2003}', '\u{2007}', '\u{2009}', '\u{200A}', '\u{202F}',
            '\t',
        ],
        " ",
    )
}

// ── Rule 4: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Dashes ───────────────────────────────────────────────────────────

fn normalise_dashes(input: &str) -> String {
    input.replace(
        ['\u{2212}', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}'],
        "-",
    )
}

// ── Rule 6: Plus-minus ───────────────────────────────────────────────────────

static RE_PLUS_SLASH_MINUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+\s*/\s*-").unwrap());

fn normalise_plus_minus(input: &str) -> String {
    RE_PLUS_SLASH_MINUS.replace_all(input, "±").to_string()
}

// ── Rule 7: Arrows ───────────────────────────────────────────────────────────

fn arrows_to_flags(input: &str) -> String {
    input.replace('\u{2191}', "+").replace('\u{2193}', "-")
}

// ── Rule 8: Whitespace ───────────────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Line classification ─────────────────────────────────────────────────────

/// Captions, headings, running heads and footnotes. Data rows never match.
static RE_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^table\s+\d+",
        r"(?i)\bvdrc\b",
        r"(?i)\bet al\.",
        r"(?i)^(primary|secondary|physical|mean|act\.?|change|memory|pi|sem|cg number|gene)\b",
        r"(?i)^(genes?|lines?)\s+(that|whose|with|for)\b",
        r"^[a-z*†‡§¶]\s",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RE_VDRC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,6}$").unwrap());
static RE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9:._()'\-]*$").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d*\.?\d+$").unwrap());
static RE_CG_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)(CG|CR)([0-9OoIl]+)$").unwrap());
/// A bare page number, or an activity value wrapped onto a line of its own.
static RE_BARE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}$").unwrap());

/// Placeholders printed for a missing value.
const MISSING: &[&str] = &["NA", "N/A", "n/a", "nd", "n.d.", "ND", "."];

fn is_noise(line: &str) -> bool {
    line.is_empty() || RE_BARE_INTEGER.is_match(line) || RE_NOISE.iter().any(|re| re.is_match(line))
}

/// Digits of a split `CG 1O23`, with the same OCR confusions as [`normalize_identifier`].
fn is_cg_digits(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, 'O' | 'o' | 'I' | 'i' | 'l' | 'L'))
}

fn is_number(token: &str) -> bool {
    RE_NUMBER.is_match(token)
}

fn is_value_like(token: &str) -> bool {
    is_number(token) || token == "±" || Flag::from_token(token).is_some() || MISSING.contains(&token)
}

/// Split a cleaned line into tokens, isolating `±` and re-joining `CG 1234`.
pub fn tokenize(line: &str) -> Vec<String> {
    let spaced = line.replace('±', " ± ");
    let raw: Vec<&str> = spaced.split_whitespace().collect();
    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let t = raw[i];
        let is_prefix = t.eq_ignore_ascii_case("CG") || t.eq_ignore_ascii_case("CR");
        if is_prefix && raw.get(i + 1).is_some_and(|n| is_cg_digits(n)) {
            tokens.push(format!("{}{}", t, raw[i + 1]));
            i += 2;
            continue;
        }
        tokens.push(t.to_string());
        i += 1;
    }
    tokens
}

fn is_record_start(tokens: &[String]) -> bool {
    tokens.len() >= 2 && RE_VDRC_ID.is_match(&tokens[0]) && RE_IDENTIFIER.is_match(&tokens[1])
}

/// Canonicalise a gene-model identifier: upper-case prefix, OCR digit
/// confusions (`O`→`0`, `I`/`l`→`1`), then the literal corrections table.
pub fn normalize_identifier(raw: &str, corrections: &IdentifierCorrections) -> String {
    let id = match RE_CG_DIGITS.captures(raw) {
        Some(caps) => {
            let digits: String = caps[2]
                .chars()
                .map(|c| match c {
                    'O' | 'o' => '0',
                    'I' | 'i' | 'l' | 'L' => '1',
                    other => other,
                })
                .collect();
            format!("{}{}", caps[1].to_ascii_uppercase(), digits)
        }
        None => raw.to_string(),
    };
    corrections.apply(&id)
}

// ── Record parsing ───────────────────────────────────────────────────────────

/// Result of normalising every page of one table.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub lines: Vec<SignificantLine>,
    pub raw_rows: usize,
    pub noise_rows: usize,
    pub issues: Vec<RowIssue>,
}

struct PendingRecord {
    page: usize,
    tokens: Vec<String>,
    raw: String,
}

/// Normalise every page of one table into significant-line records.
///
/// Unparseable rows are reported as [`RowIssue::Unparsed`] and skipped.
pub fn normalize_tables(
    tables: &[RawTable],
    direction: Direction,
    corrections: &IdentifierCorrections,
) -> NormalizedTable {
    let mut out = NormalizedTable::default();
    let mut pending: Option<PendingRecord> = None;
    // A bare integer after a record: page number unless a continuation follows.
    let mut held: Option<String> = None;
    let table_name = direction.table_name().to_string();

    let flush = |pending: &mut Option<PendingRecord>, out: &mut NormalizedTable| {
        if let Some(rec) = pending.take() {
            match parse_record(&rec.tokens, direction, rec.page, corrections) {
                Ok(line) => out.lines.push(line),
                Err(detail) => {
                    warn!("{} page {}: {}: '{}'", table_name, rec.page, detail, rec.raw);
                    out.issues.push(RowIssue::Unparsed {
                        table: table_name.clone(),
                        page: rec.page,
                        raw: rec.raw,
                        detail,
                    });
                }
            }
        }
    };

    let drop_held = |held: &mut Option<String>, out: &mut NormalizedTable, page: usize| {
        if let Some(line) = held.take() {
            debug!("{} page {}: noise '{}'", table_name, page, line);
            out.noise_rows += 1;
        }
    };

    for table in tables {
        for row in &table.rows {
            out.raw_rows += 1;
            let line = clean_cell(&row.join(" "));

            if pending.is_some() && RE_BARE_INTEGER.is_match(&line) {
                drop_held(&mut held, &mut out, table.page);
                held = Some(line);
                continue;
            }

            if is_noise(&line) {
                debug!("{} page {}: noise '{}'", table_name, table.page, line);
                out.noise_rows += 1;
                continue;
            }

            let tokens = tokenize(&line);
            if is_record_start(&tokens) {
                drop_held(&mut held, &mut out, table.page);
                flush(&mut pending, &mut out);
                pending = Some(PendingRecord {
                    page: table.page,
                    tokens,
                    raw: line,
                });
            } else if pending.is_some() && tokens.iter().all(|t| is_value_like(t)) {
                if let Some(rec) = pending.as_mut() {
                    if let Some(value) = held.take() {
                        rec.raw.push(' ');
                        rec.raw.push_str(&value);
                        rec.tokens.push(value);
                    }
                    rec.tokens.extend(tokens);
                    rec.raw.push(' ');
                    rec.raw.push_str(&line);
                }
            } else {
                drop_held(&mut held, &mut out, table.page);
                flush(&mut pending, &mut out);
                out.issues.push(RowIssue::Unparsed {
                    table: table_name.clone(),
                    page: table.page,
                    raw: line,
                    detail: "not a record and not a continuation".into(),
                });
            }
        }
        // A table row never wraps across a page break in this layout.
        drop_held(&mut held, &mut out, table.page);
        flush(&mut pending, &mut out);
    }

    debug!(
        "{}: {} raw rows → {} records, {} noise, {} issues",
        table_name,
        out.raw_rows,
        out.lines.len(),
        out.noise_rows,
        out.issues.len()
    );
    out
}

/// Cursor over a record's tokens.
struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Option<&'a str> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(t.as_str())
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn number(&mut self, what: &str) -> Result<f64, String> {
        match self.next() {
            Some(t) if is_number(t) => t
                .parse::<f64>()
                .map_err(|e| format!("{what}: '{t}': {e}")),
            Some(t) => Err(format!("{what}: expected a number, found '{t}'")),
            None => Err(format!("{what}: row ended early")),
        }
    }

    /// `PI ± SEM`; the `±` is optional because extraction sometimes drops it.
    fn pi_pair(&mut self, what: &str) -> Result<(f64, f64), String> {
        let pi = self.number(what)?;
        if self.peek() == Some("±") {
            self.pos += 1;
        }
        let sem = self.number(&format!("{what} SEM"))?;
        Ok((pi, sem))
    }

    fn rest(&self) -> &'a [String] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }
}

/// Parse one stitched record. The error string is shown to the user as-is.
fn parse_record(
    tokens: &[String],
    direction: Direction,
    page: usize,
    corrections: &IdentifierCorrections,
) -> Result<SignificantLine, String> {
    let mut cur = Cursor { tokens, pos: 0 };

    let vdrc_token = cur.next().ok_or("empty row")?;
    let vdrc_id: u32 = vdrc_token
        .parse()
        .map_err(|_| format!("bad VDRC ID '{vdrc_token}'"))?;
    let cg_number = normalize_identifier(cur.next().ok_or("missing CG number")?, corrections);

    let (primary_pi, primary_sem) = cur.pi_pair("primary PI")?;
    let (secondary_pi, secondary_sem) = cur.pi_pair("secondary PI")?;

    let mut flags: Vec<Flag> = Vec::new();
    let mut numbers: Vec<f64> = Vec::new();
    for t in cur.rest() {
        if let Some(f) = Flag::from_token(t) {
            flags.push(f);
        } else if is_number(t) {
            numbers.push(t.parse().map_err(|_| format!("bad number '{t}'"))?);
        } else if MISSING.contains(&t.as_str()) {
            continue;
        } else {
            return Err(format!("unexpected token '{t}'"));
        }
    }

    if numbers.len() > 1 {
        return Err(format!("expected at most one activity value, found {}", numbers.len()));
    }

    let (physical_abnormality, act_sig, change_in_memory) = match flags.as_slice() {
        [] => return Err("missing physical-abnormality flag".into()),
        // change-in-memory column absent: the table says which way it went
        [physical] => (*physical, None, direction.expected_flag()),
        [physical, change] => (*physical, None, *change),
        [physical, act, change] => (*physical, Some(*act), *change),
        more => return Err(format!("expected at most three flags, found {}", more.len())),
    };

    Ok(SignificantLine {
        vdrc_id,
        cg_number,
        primary_pi,
        primary_sem,
        secondary_pi,
        secondary_sem,
        physical_abnormality,
        mean_activity_difference: numbers.first().copied(),
        act_sig,
        change_in_memory,
        direction,
        page,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table(page: usize, rows: &[&str]) -> RawTable {
        RawTable::new(
            page,
            rows.iter()
                .map(|r| r.split('|').map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn no_corrections() -> IdentifierCorrections {
        IdentifierCorrections::default()
    }

    #[test]
    fn test_repair_mojibake() {
        assert_eq!(clean_cell("0.52 Â± 0.04"), "0.52 ± 0.04");
        assert_eq!(clean_cell("âˆ’0.3"), "-0.3");
    }

    #[test]
    fn test_ligatures() {
        assert_eq!(clean_cell("signiﬁcant"), "significant");
    }

    #[test]
    fn test_spaces_and_invisible() {
        assert_eq!(clean_cell("\u{00A0}CG\u{200B}1234\u{2009}+ "), "CG1234 +");
    }

    #[test]
    fn test_dashes() {
        assert_eq!(clean_cell("\u{2212}1.2 \u{2013}"), "-1.2 -");
    }

    #[test]
    fn test_plus_minus_spellings() {
        assert_eq!(clean_cell("0.5 +/- 0.1"), "0.5 ± 0.1");
        assert_eq!(clean_cell("0.5 +/\u{2212} 0.1"), "0.5 ± 0.1");
    }

    #[test]
    fn test_arrows() {
        assert_eq!(clean_cell("\u{2191}"), "+");
        assert_eq!(clean_cell("\u{2193}"), "-");
    }

    #[test]
    fn tokenize_splits_plus_minus_and_joins_cg() {
        assert_eq!(
            tokenize("104563 CG 1234 0.82±0.03"),
            vec!["104563", "CG1234", "0.82", "±", "0.03"]
        );
    }

    #[test]
    fn tokenize_joins_cg_with_ocr_digits() {
        assert_eq!(
            tokenize("22000 CG 1O23 0.40"),
            vec!["22000", "CG1O23", "0.40"]
        );
        assert_eq!(tokenize("CG Il"), vec!["CG", "Il"]);
    }

    #[test]
    fn spaced_cg_with_ocr_digits_parses() {
        let t = table(6, &["22000|CG 1O23|0.40 ± 0.05|0.41 ± 0.06|+|+"]);
        let out = normalize_tables(&[t], Direction::Increased, &no_corrections());
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        assert_eq!(out.lines[0].cg_number, "CG1023");
    }

    #[test]
    fn corrections_match_the_ocr_fixed_form() {
        let c = IdentifierCorrections::default().with("CG3123", "CG31234");
        assert_eq!(normalize_identifier("CG3I23", &c), "CG31234");
        let raw_key = IdentifierCorrections::default().with("CG3I23", "CG31234");
        assert_eq!(normalize_identifier("CG3I23", &raw_key), "CG3123");
    }

    #[test]
    fn identifier_ocr_fixes_and_corrections() {
        let c = IdentifierCorrections::default().with("CG9999", "CG10001");
        assert_eq!(normalize_identifier("cg1O23", &c), "CG1023");
        assert_eq!(normalize_identifier("CG3I2l", &c), "CG3121");
        assert_eq!(normalize_identifier("CG9999", &c), "CG10001");
        assert_eq!(normalize_identifier("rut", &c), "rut");
    }

    #[test]
    fn noise_lines_are_dropped() {
        for line in [
            "Table 1 Lines that increased memory",
            "VDRC ID CG number Primary PI",
            "PI ± SEM",
            "1334 E. Walkinshaw et al.",
            "a Physical abnormality observed",
            "1335",
            "",
        ] {
            assert!(is_noise(line), "should be noise: {line:?}");
        }
        assert!(!is_noise("104563 CG1234 0.82 ± 0.03"));
    }

    #[test]
    fn parses_full_row() {
        let t = table(5, &["104563|CG1234|0.82 ± 0.03|0.79 ± 0.02|-|-1.5|+|+"]);
        let out = normalize_tables(&[t], Direction::Increased, &no_corrections());
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        let l = &out.lines[0];
        assert_eq!(l.vdrc_id, 104_563);
        assert_eq!(l.cg_number, "CG1234");
        assert_eq!((l.primary_pi, l.primary_sem), (0.82, 0.03));
        assert_eq!((l.secondary_pi, l.secondary_sem), (0.79, 0.02));
        assert_eq!(l.physical_abnormality, Flag::Minus);
        assert_eq!(l.mean_activity_difference, Some(-1.5));
        assert_eq!(l.act_sig, Some(Flag::Plus));
        assert_eq!(l.change_in_memory, Flag::Plus);
        assert_eq!(l.page, 5);
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let t = table(
            7,
            &[
                "31000|CG5678|0.41 ± 0.05|0.44 ± 0.04|+|-",
                "31001|CG5679|0.40 ± 0.05|0.43 ± 0.04|-|NA|-",
            ],
        );
        let out = normalize_tables(&[t], Direction::Decreased, &no_corrections());
        assert_eq!(out.lines.len(), 2);
        assert_eq!(out.lines[0].mean_activity_difference, None);
        assert_eq!(out.lines[0].act_sig, None);
        assert_eq!(out.lines[0].change_in_memory, Flag::Minus);
        assert_eq!(out.lines[1].physical_abnormality, Flag::Minus);
    }

    #[test]
    fn missing_change_column_defaults_to_table_direction() {
        let t = table(5, &["104563|CG1234|0.82 ± 0.03|0.79 ± 0.02|-"]);
        let out = normalize_tables(&[t], Direction::Increased, &no_corrections());
        assert_eq!(out.lines[0].change_in_memory, Flag::Plus);
    }

    #[test]
    fn wrapped_row_is_stitched() {
        let t = table(
            6,
            &[
                "Table 2 Lines that decreased memory",
                "VDRC ID|CG number|Primary PI ± SEM|Secondary PI ± SEM",
                "22000|CG42|0.40 ±|0.05|0.41 ± 0.06",
                "+|-",
            ],
        );
        let out = normalize_tables(&[t], Direction::Decreased, &no_corrections());
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        assert_eq!(out.lines.len(), 1);
        assert_eq!(out.noise_rows, 2);
        assert_eq!(out.raw_rows, 4);
        assert_eq!(out.lines[0].primary_sem, 0.05);
        assert_eq!(out.lines[0].physical_abnormality, Flag::Plus);
    }

    #[test]
    fn wrapped_integer_activity_value_is_kept() {
        let t = table(
            5,
            &["22000|CG42|0.40 ± 0.05|0.41 ± 0.06|-", "3", "+|+"],
        );
        let out = normalize_tables(&[t], Direction::Increased, &no_corrections());
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        assert_eq!(out.noise_rows, 0);
        let l = &out.lines[0];
        assert_eq!(l.mean_activity_difference, Some(3.0));
        assert_eq!(l.act_sig, Some(Flag::Plus));
        assert_eq!(l.change_in_memory, Flag::Plus);
    }

    #[test]
    fn trailing_page_number_is_noise() {
        let t = table(
            5,
            &[
                "22000|CG42|0.40 ± 0.05|0.41 ± 0.06|-|+",
                "1335",
                "22001|CG43|0.40 ± 0.05|0.41 ± 0.06|-|+",
                "1336",
            ],
        );
        let out = normalize_tables(&[t], Direction::Increased, &no_corrections());
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        assert_eq!(out.lines.len(), 2);
        assert_eq!(out.noise_rows, 2);
        assert_eq!(out.lines[0].mean_activity_difference, None);
    }

    #[test]
    fn plus_minus_may_be_lost() {
        let t = table(6, &["22000|CG42|0.40|0.05|0.41|0.06|+|-"]);
        let out = normalize_tables(&[t], Direction::Decreased, &no_corrections());
        assert_eq!(out.lines[0].secondary_sem, 0.06);
    }

    #[test]
    fn bad_rows_become_issues() {
        let t = table(
            8,
            &[
                "22000|CG42|0.40 ± abc|0.41 ± 0.06|+|-",
                "Footnote text that is not a row",
                "22001|CG43|0.40 ± 0.05|0.41 ± 0.06|+|-",
            ],
        );
        let out = normalize_tables(&[t], Direction::Decreased, &no_corrections());
        assert_eq!(out.lines.len(), 1);
        assert_eq!(out.lines[0].vdrc_id, 22_001);
        assert_eq!(out.issues.len(), 2);
        match &out.issues[0] {
            RowIssue::Unparsed { page, detail, .. } => {
                assert_eq!(*page, 8);
                assert!(detail.contains("primary PI SEM"), "{detail}");
            }
            other => panic!("unexpected issue {other:?}"),
        }
    }

    #[test]
    fn too_many_flags_rejected() {
        let t = table(8, &["22000|CG42|0.4 ± 0.1|0.4 ± 0.1|+|-|+|-"]);
        let out = normalize_tables(&[t], Direction::Decreased, &no_corrections());
        assert!(out.lines.is_empty());
        assert_eq!(out.issues.len(), 1);
    }

    #[test]
    fn records_do_not_span_pages() {
        let p1 = table(5, &["22000|CG42|0.40 ± 0.05|0.41 ± 0.06"]);
        let p2 = table(6, &["+|-"]);
        let out = normalize_tables(&[p1, p2], Direction::Decreased, &no_corrections());
        assert!(out.lines.is_empty());
        assert_eq!(out.issues.len(), 2);
    }
}
